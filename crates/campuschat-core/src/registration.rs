use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    session::{ChatSession, SessionError},
    types::{UserInfo, UserType},
    validation::{validate_email, validate_name, validate_phone, validate_registration_number},
};

pub const NAME_FIELD: &str = "name";
pub const REG_NUMBER_FIELD: &str = "regNumber";
pub const EMAIL_FIELD: &str = "email";
pub const PHONE_FIELD: &str = "phone";
pub const CONTACT_FIELD: &str = "contact";

/// Field key to human-readable message, ordered by key.
pub type FieldErrors = BTreeMap<String, String>;

/// Raw form input. Fields that don't apply to the selected user type are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub name: String,
    pub reg_number: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("registration form has {} invalid field(s)", .0.len())]
    Invalid(FieldErrors),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Checks every field that applies to `user_type` and reports all failures
/// together.
pub fn validate_form(
    user_type: UserType,
    form: &RegistrationForm,
) -> Result<UserInfo, FieldErrors> {
    let mut errors = FieldErrors::new();

    if !validate_name(&form.name) {
        reject(&mut errors, NAME_FIELD, "Please enter a valid name");
    }

    if user_type.requires_registration_number() {
        if !validate_registration_number(&form.reg_number) {
            reject(
                &mut errors,
                REG_NUMBER_FIELD,
                "Please enter a valid registration number (format: YYBRANCH#####)",
            );
        }
    } else if form.email.is_empty() && form.phone.is_empty() {
        reject(
            &mut errors,
            CONTACT_FIELD,
            "Please provide either email or phone number",
        );
    } else {
        if !form.email.is_empty() && !validate_email(&form.email) {
            reject(&mut errors, EMAIL_FIELD, "Please enter a valid email");
        }
        if !form.phone.is_empty() && !validate_phone(&form.phone) {
            reject(
                &mut errors,
                PHONE_FIELD,
                "Please enter a valid phone number (10-15 digits)",
            );
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let name = form.name.trim().to_owned();
    Ok(match user_type {
        UserType::Student => UserInfo::Student {
            name,
            reg_number: form.reg_number.clone(),
        },
        UserType::Faculty => UserInfo::Faculty {
            name,
            reg_number: form.reg_number.clone(),
        },
        UserType::Visitor => UserInfo::Visitor {
            name,
            email: non_empty(&form.email),
            phone: non_empty(&form.phone),
        },
    })
}

/// Validates the form against the session's selected user type, commits the
/// identity and starts authentication. Nothing is committed on failure.
pub fn register(
    session: &ChatSession,
    form: &RegistrationForm,
) -> Result<JoinHandle<()>, RegistrationError> {
    let user_type = session.user_type().ok_or(SessionError::NoUserType)?;
    let identity = validate_form(user_type, form).map_err(|errors| {
        let fields = errors.keys().collect::<Vec<_>>();
        info!(%user_type, ?fields, "registration rejected");
        RegistrationError::Invalid(errors)
    })?;

    session.set_user_info(identity)?;
    Ok(session.authenticate()?)
}

fn reject(errors: &mut FieldErrors, field: &str, message: &str) {
    errors.insert(field.to_owned(), message.to_owned());
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
