use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Faculty,
    Visitor,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Student => "student",
            UserType::Faculty => "faculty",
            UserType::Visitor => "visitor",
        }
    }

    /// Student and faculty identities are keyed by a registration number.
    pub fn requires_registration_number(self) -> bool {
        matches!(self, UserType::Student | UserType::Faculty)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated identity. Only the fields of the selected variant exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "userType", rename_all = "lowercase")]
pub enum UserInfo {
    #[serde(rename_all = "camelCase")]
    Student { name: String, reg_number: String },
    #[serde(rename_all = "camelCase")]
    Faculty { name: String, reg_number: String },
    Visitor {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
    },
}

impl UserInfo {
    pub fn user_type(&self) -> UserType {
        match self {
            UserInfo::Student { .. } => UserType::Student,
            UserInfo::Faculty { .. } => UserType::Faculty,
            UserInfo::Visitor { .. } => UserType::Visitor,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UserInfo::Student { name, .. }
            | UserInfo::Faculty { name, .. }
            | UserInfo::Visitor { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(content: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: next_message_id(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }
}

/// `msg-<sequence>-<random>`: the sequence keeps ids unique within the
/// process, the random suffix keeps them unguessable across restarts.
fn next_message_id() -> String {
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("msg-{seq}-{}", &suffix[..8])
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendReply {
    pub text: String,
    pub status: ReplyStatus,
}

impl BackendReply {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}
