use serde::{Deserialize, Serialize};

/// Who produced a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used in chat-completion payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label used in persisted transcripts.
    pub fn transcript_label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Bot",
        }
    }
}

/// One entry of a conversation history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// `"<label>: <content>"` with embedded newlines escaped so the entry stays on one line.
    pub fn transcript_line(&self) -> String {
        format!(
            "{}: {}",
            self.role.transcript_label(),
            self.content.replace('\r', "").replace('\n', "\\n")
        )
    }
}
