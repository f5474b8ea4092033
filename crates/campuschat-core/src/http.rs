use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    registration::{self, FieldErrors, RegistrationError, RegistrationForm},
    session::{ChatSession, SessionError, SessionPhase, SessionSnapshot},
    types::{ChatMessage, UserInfo, UserType},
};

#[derive(Clone)]
pub struct AppState {
    pub session: ChatSession,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypeRequest {
    pub user_type: UserType,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub content: String,
}

/// What the page renders from.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub state: SessionPhase,
    pub user_type: Option<UserType>,
    pub identity: Option<UserInfo>,
    pub messages: Vec<ChatMessage>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub is_typing: bool,
}

impl From<SessionSnapshot> for SessionView {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            state: snapshot.state(),
            is_typing: snapshot.is_typing(),
            user_type: snapshot.user_type,
            identity: snapshot.identity,
            messages: snapshot.messages,
            is_authenticated: snapshot.is_authenticated,
            is_loading: snapshot.is_loading,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(current_session))
        .route("/api/session/user-type", post(select_user_type))
        .route("/api/session/register", post(register))
        .route("/api/session/messages", post(send_message))
        .route("/api/session/reset", post(reset_chat))
        .route("/api/session/back", post(back))
        .route("/api/session/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn current_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(view(&state.session))
}

async fn select_user_type(
    State(state): State<AppState>,
    Json(request): Json<UserTypeRequest>,
) -> Result<Json<SessionView>, ApiError> {
    state.session.set_user_type(request.user_type)?;
    Ok(Json(view(&state.session)))
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    // The handshake finishes in the background; the page polls for it.
    registration::register(&state.session, &form)?;
    Ok((StatusCode::ACCEPTED, Json(view(&state.session))))
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    state.session.send_message(&request.content)?;
    Ok((StatusCode::ACCEPTED, Json(view(&state.session))))
}

async fn reset_chat(State(state): State<AppState>) -> Json<SessionView> {
    state.session.reset_chat();
    Json(view(&state.session))
}

async fn back(State(state): State<AppState>) -> Json<SessionView> {
    state.session.back();
    Json(view(&state.session))
}

async fn logout(State(state): State<AppState>) -> Json<SessionView> {
    state.session.logout();
    Json(view(&state.session))
}

fn view(session: &ChatSession) -> SessionView {
    session.snapshot().into()
}

pub enum ApiError {
    Invalid(FieldErrors),
    Session(SessionError),
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        ApiError::Session(error)
    }
}

impl From<RegistrationError> for ApiError {
    fn from(error: RegistrationError) -> Self {
        match error {
            RegistrationError::Invalid(errors) => ApiError::Invalid(errors),
            RegistrationError::Session(error) => ApiError::Session(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::Session(error) => (StatusCode::CONFLICT, error.to_string()).into_response(),
        }
    }
}
