//! Format checks for registration form fields.
//!
//! Every function is total and side-effect free. Only the name is trimmed;
//! the other fields must match exactly as typed.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::UserInfo;

const MAX_NAME_CHARS: usize = 100;

// Year, three-letter branch code, then a 5 or 6 digit roll number: 23bai10979.
static REGISTRATION_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}[a-zA-Z]{3}[0-9]{5,6}$").expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10,15}$").expect("valid regex"));

pub fn validate_name(name: &str) -> bool {
    let length = name.trim().chars().count();
    (1..=MAX_NAME_CHARS).contains(&length)
}

pub fn validate_registration_number(reg_number: &str) -> bool {
    REGISTRATION_NUMBER_RE.is_match(reg_number)
}

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn validate_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Applies the field checks for the identity's variant. A visitor needs at
/// least one contact field and every present field must be well formed.
pub fn validate_identity(identity: &UserInfo) -> bool {
    if !validate_name(identity.name()) {
        return false;
    }

    match identity {
        UserInfo::Student { reg_number, .. } | UserInfo::Faculty { reg_number, .. } => {
            validate_registration_number(reg_number)
        }
        UserInfo::Visitor { email, phone, .. } => {
            (email.is_some() || phone.is_some())
                && email.as_deref().is_none_or(validate_email)
                && phone.as_deref().is_none_or(validate_phone)
        }
    }
}
