use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Open metadata map attached to conversations and messages
///
/// Keys are not enforced. Conventional keys:
/// - `repository`: repository the agent works in
/// - `branch`: working branch
/// - `requestId`: id of the originating request
/// - `model`: model that produced an assistant message
pub type Metadata = HashMap<String, Value>;

/// Role of an agent conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Caller
    User,
    /// Agent reply
    Assistant,
    /// System instruction
    System,
    /// Tool invocation result
    Tool,
}

impl AgentRole {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "tool" => Ok(Self::Tool),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Channel a message arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    /// Command line
    Cli,
    /// HTTP API
    Api,
    /// Telegram bot
    Telegram,
    /// Slack app
    Slack,
    /// Web UI
    Web,
    /// Another agent
    Agent,
    /// Orchestrator itself
    System,
}

impl FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" => Ok(Self::Cli),
            "api" => Ok(Self::Api),
            "telegram" => Ok(Self::Telegram),
            "slack" => Ok(Self::Slack),
            "web" => Ok(Self::Web),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// Lifecycle status of an agent conversation
///
/// Opaque to the store: any transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// In progress
    #[default]
    Active,
    /// Finished successfully
    Completed,
    /// Kept for reference only
    Archived,
    /// Ended in failure
    Failed,
}

impl ConversationStatus {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// A stored agent conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// Unique message id
    pub message_id: String,
    /// Who produced it
    pub role: AgentRole,
    /// Message text
    pub content: String,
    /// When it was produced
    pub timestamp: DateTime<Utc>,
    /// Originating channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MessageSource>,
    /// Invoked tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
    /// Tool output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
    /// Provenance data
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

/// Input for appending an agent message
///
/// `message_id` and `timestamp` are generated when omitted.
#[derive(Debug, Clone)]
pub struct NewAgentMessage {
    /// Role
    pub role: AgentRole,
    /// Text
    pub content: String,
    /// Caller-supplied id
    pub message_id: Option<String>,
    /// Caller-supplied time
    pub timestamp: Option<DateTime<Utc>>,
    /// Originating channel
    pub source: Option<MessageSource>,
    /// Invoked tool
    pub tool_name: Option<String>,
    /// Tool arguments
    pub tool_args: Option<Value>,
    /// Tool output
    pub tool_output: Option<String>,
    /// Provenance data
    pub metadata: Metadata,
}

impl NewAgentMessage {
    /// Message with only role and content
    #[must_use]
    pub fn new(role: AgentRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            message_id: None,
            timestamp: None,
            source: None,
            tool_name: None,
            tool_args: None,
            tool_output: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the message id
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Set the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the source channel
    #[must_use]
    pub fn with_source(mut self, source: MessageSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a tool invocation
    #[must_use]
    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        args: Option<Value>,
        output: Option<String>,
    ) -> Self {
        self.tool_name = Some(name.into());
        self.tool_args = args;
        self.tool_output = output;
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Materialize, filling in id and timestamp
    #[must_use]
    pub fn into_message(self) -> AgentMessage {
        AgentMessage {
            message_id: self
                .message_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: self.role,
            content: self.content,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source,
            tool_name: self.tool_name,
            tool_args: self.tool_args,
            tool_output: self.tool_output,
            metadata: self.metadata,
        }
    }
}

/// A persisted agent conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConversation {
    /// Conversation identity
    pub conversation_id: String,
    /// Full history
    #[serde(default)]
    pub messages: Vec<AgentMessage>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last read or write
    pub last_accessed_at: DateTime<Utc>,
    /// Owning agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Open metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Lifecycle status
    #[serde(default)]
    pub status: ConversationStatus,
}

impl AgentConversation {
    /// Update the last-accessed time
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// Input for creating an agent conversation
#[derive(Debug, Clone, Default)]
pub struct NewAgentConversation {
    /// Caller-supplied id; generated when absent
    pub conversation_id: Option<String>,
    /// Owning agent
    pub agent_id: Option<String>,
    /// Display title
    pub title: Option<String>,
    /// Open metadata
    pub metadata: Metadata,
}

impl NewAgentConversation {
    /// Empty input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Set the owning agent
    #[must_use]
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub(crate) fn into_conversation(self) -> AgentConversation {
        let now = Utc::now();
        AgentConversation {
            conversation_id: self
                .conversation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            messages: Vec::new(),
            created_at: now,
            last_accessed_at: now,
            agent_id: self.agent_id,
            metadata: self.metadata,
            title: self.title,
            status: ConversationStatus::Active,
        }
    }
}
