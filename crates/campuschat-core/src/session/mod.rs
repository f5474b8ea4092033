//! The session store: the one piece of shared state in the chat front-end.
//!
//! State lives in a `tokio::sync::watch` channel so presentation code can
//! subscribe and re-render on change. Every operation below is a single
//! atomic update of the snapshot.

mod handshake;

use std::{fmt, sync::Arc};

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    backend::BackendClient,
    conversation,
    types::{ChatMessage, Sender, UserInfo, UserType},
    validation::validate_identity,
};

pub use handshake::{Authenticator, LocalAuthenticator};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    TypeSelected,
    FormPending,
    Authenticating,
    Authenticated,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Anonymous => "anonymous",
            SessionPhase::TypeSelected => "type_selected",
            SessionPhase::FormPending => "form_pending",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Misuse of the session API. These indicate a wiring defect in the caller,
/// never bad user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no user type has been selected")]
    NoUserType,
    #[error("no identity has been committed")]
    NoIdentity,
    #[error("session is not authenticated")]
    NotAuthenticated,
    #[error("identity is a {provided} but the selected user type is {selected}")]
    UserTypeMismatch {
        selected: UserType,
        provided: UserType,
    },
    #[error("identity does not satisfy the {user_type} registration rules")]
    InvalidIdentity { user_type: UserType },
    #[error("{operation} is not allowed while the session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionPhase,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub user_type: Option<UserType>,
    pub identity: Option<UserInfo>,
    pub messages: Vec<ChatMessage>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pending_replies: usize,
    // Bumped by logout/back. Invalidates in-flight handshakes.
    session_epoch: u64,
    // Bumped by logout/back/reset. Invalidates in-flight replies.
    conversation_epoch: u64,
}

impl SessionSnapshot {
    pub fn is_typing(&self) -> bool {
        self.pending_replies > 0
    }

    pub fn state(&self) -> SessionPhase {
        if self.is_authenticated {
            SessionPhase::Authenticated
        } else if self.is_loading {
            SessionPhase::Authenticating
        } else if self.identity.is_some() {
            SessionPhase::FormPending
        } else if self.user_type.is_some() {
            SessionPhase::TypeSelected
        } else {
            SessionPhase::Anonymous
        }
    }

    fn cleared(&self) -> Self {
        Self {
            session_epoch: self.session_epoch + 1,
            conversation_epoch: self.conversation_epoch + 1,
            ..Self::default()
        }
    }

    fn ensure_not_signed_in(&self, operation: &'static str) -> Result<(), SessionError> {
        match self.state() {
            state @ (SessionPhase::Authenticating | SessionPhase::Authenticated) => {
                Err(SessionError::InvalidTransition { operation, state })
            }
            _ => Ok(()),
        }
    }
}

/// Identifies the conversation a pending reply was requested in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReplyTicket {
    conversation_epoch: u64,
}

pub fn welcome_message(name: &str) -> String {
    format!("Hello {name}! I'm your college assistant. How can I help you today?")
}

/// Handle to the session store. Clones share the same state.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: watch::Sender<SessionSnapshot>,
    backend: Arc<dyn BackendClient>,
    authenticator: Arc<dyn Authenticator>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn BackendClient>, authenticator: Arc<dyn Authenticator>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                state,
                backend,
                authenticator,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SessionPhase {
        self.inner.state.borrow().state()
    }

    pub fn user_type(&self) -> Option<UserType> {
        self.inner.state.borrow().user_type
    }

    pub fn identity(&self) -> Option<UserInfo> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.state.borrow().messages.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn is_typing(&self) -> bool {
        self.inner.state.borrow().is_typing()
    }

    pub fn set_user_type(&self, user_type: UserType) -> Result<(), SessionError> {
        self.transition(|state| {
            state.ensure_not_signed_in("set_user_type")?;
            state.user_type = Some(user_type);
            if state
                .identity
                .as_ref()
                .is_some_and(|identity| identity.user_type() != user_type)
            {
                state.identity = None;
            }
            Ok(())
        })?;
        info!(%user_type, "user type selected");
        Ok(())
    }

    pub fn set_user_info(&self, identity: UserInfo) -> Result<(), SessionError> {
        self.transition(|state| {
            state.ensure_not_signed_in("set_user_info")?;
            let provided = identity.user_type();
            if let Some(selected) = state.user_type.filter(|selected| *selected != provided) {
                return Err(SessionError::UserTypeMismatch { selected, provided });
            }
            if !validate_identity(&identity) {
                return Err(SessionError::InvalidIdentity {
                    user_type: provided,
                });
            }
            state.user_type = Some(provided);
            state.identity = Some(identity);
            Ok(())
        })
    }

    pub fn add_message(&self, content: impl Into<String>, sender: Sender) -> ChatMessage {
        let message = ChatMessage::new(content, sender);
        self.inner
            .state
            .send_modify(|state| state.messages.push(message.clone()));
        debug!(sender = sender.as_str(), id = %message.id, "message appended");
        message
    }

    /// Moves a committed identity into `Authenticating` and runs the
    /// handshake in the background. The returned handle resolves once the
    /// session has left `Authenticating`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn authenticate(&self) -> Result<JoinHandle<()>, SessionError> {
        let mut started = None;
        self.transition(|state| {
            state.ensure_not_signed_in("authenticate")?;
            let identity = state.identity.clone().ok_or(SessionError::NoIdentity)?;
            state.is_loading = true;
            started = Some((state.session_epoch, identity));
            Ok(())
        })?;
        let (epoch, identity) = started.ok_or(SessionError::NoIdentity)?;

        info!(user_type = %identity.user_type(), "authenticating session");
        let session = self.clone();
        Ok(tokio::spawn(async move {
            let outcome = session.inner.authenticator.verify(&identity).await;
            session.finish_authentication(epoch, &identity, outcome);
        }))
    }

    fn finish_authentication(&self, epoch: u64, identity: &UserInfo, outcome: anyhow::Result<()>) {
        let applied = self.inner.state.send_if_modified(|state| {
            if state.session_epoch != epoch || !state.is_loading {
                return false;
            }
            state.is_loading = false;
            if outcome.is_ok() {
                state.is_authenticated = true;
                state
                    .messages
                    .push(ChatMessage::new(welcome_message(identity.name()), Sender::Bot));
            }
            true
        });

        match (applied, outcome) {
            (false, _) => debug!("discarding handshake result for an ended session"),
            (true, Ok(())) => info!(user_type = %identity.user_type(), "session authenticated"),
            (true, Err(error)) => warn!(?error, "authentication handshake failed"),
        }
    }

    /// Submits a chat message. See [`conversation::submit`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn send_message(&self, text: &str) -> Result<Option<JoinHandle<()>>, SessionError> {
        conversation::submit(self, text)
    }

    /// Clears the timeline. Replies still in flight are dropped on arrival.
    pub fn reset_chat(&self) {
        self.inner.state.send_modify(|state| {
            state.messages.clear();
            state.pending_replies = 0;
            state.conversation_epoch += 1;
        });
        info!("chat timeline reset");
    }

    pub fn logout(&self) {
        self.inner.state.send_modify(|state| *state = state.cleared());
        info!("session logged out");
    }

    /// Leaves the registration form for type selection, keeping nothing.
    pub fn back(&self) {
        self.inner.state.send_modify(|state| *state = state.cleared());
        info!("returned to user type selection");
    }

    pub(crate) fn backend(&self) -> Arc<dyn BackendClient> {
        self.inner.backend.clone()
    }

    /// Appends the user's message and marks a reply as pending.
    pub(crate) fn begin_exchange(&self, text: &str) -> Result<ReplyTicket, SessionError> {
        let message = ChatMessage::new(text, Sender::User);
        let mut ticket = None;
        self.transition(|state| {
            if !state.is_authenticated {
                return Err(SessionError::NotAuthenticated);
            }
            state.messages.push(message);
            state.pending_replies += 1;
            ticket = Some(ReplyTicket {
                conversation_epoch: state.conversation_epoch,
            });
            Ok(())
        })?;
        ticket.ok_or(SessionError::NotAuthenticated)
    }

    /// Appends the bot's reply unless the conversation has been reset since
    /// the ticket was issued. Returns whether the reply was appended.
    pub(crate) fn finish_exchange(&self, ticket: ReplyTicket, content: String) -> bool {
        let appended = self.inner.state.send_if_modified(|state| {
            if state.conversation_epoch != ticket.conversation_epoch {
                return false;
            }
            state.pending_replies = state.pending_replies.saturating_sub(1);
            state.messages.push(ChatMessage::new(content, Sender::Bot));
            true
        });
        if !appended {
            debug!("discarding reply for an ended conversation");
        }
        appended
    }

    // `apply` must leave the state untouched when it returns `Err`.
    fn transition(
        &self,
        apply: impl FnOnce(&mut SessionSnapshot) -> Result<(), SessionError>,
    ) -> Result<(), SessionError> {
        let mut outcome = Ok(());
        self.inner.state.send_if_modified(|state| {
            outcome = apply(state);
            outcome.is_ok()
        });
        outcome
    }
}
