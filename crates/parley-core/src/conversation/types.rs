use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Party that produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human or calling system
    User,
    /// Coding agent
    Assistant,
}

impl Role {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Who said it
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the store accepted it
    pub timestamp: DateTime<Utc>,
    /// Synthetic summary produced by summarization
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_summary: bool,
}

impl ConversationMessage {
    /// New message stamped with the current time
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_summary: false,
        }
    }

    /// New user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// New assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Persisted history of one conversation
///
/// `messages` is append-only and keeps the full history. When
/// `summarized_messages` is present it replaces `messages` for everything
/// handed to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Conversation identity
    pub conversation_id: String,
    /// Full history in append order
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    /// Summary plus most recent turns, when summarized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarized_messages: Option<Vec<ConversationMessage>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last read or write
    pub last_accessed_at: DateTime<Utc>,
}

impl ConversationContext {
    /// Empty context
    #[must_use]
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            summarized_messages: None,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Messages used to build agent-facing context
    #[must_use]
    pub fn effective_messages(&self) -> &[ConversationMessage] {
        self.summarized_messages.as_deref().unwrap_or(&self.messages)
    }

    /// Whether a summary is in effect
    #[must_use]
    pub fn is_summarized(&self) -> bool {
        self.summarized_messages.is_some()
    }

    /// Update the last-accessed time
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// Partition of "last active conversation" pointers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    /// Default request channel
    #[default]
    Default,
    /// Telegram channel
    Telegram,
}

impl QueueType {
    /// Name used in keys
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Telegram => "telegram",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "telegram" => Ok(Self::Telegram),
            other => Err(format!("unknown queue type: {}", other)),
        }
    }
}
