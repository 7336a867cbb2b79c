//! Agent conversation store
//!
//! A second conversation class used by agent-to-agent and tool-driven
//! callers. Messages carry provenance (source channel, tool invocation),
//! conversations carry an opaque status, and enumeration goes through an
//! index set rather than a key scan.

mod store;
mod types;

pub use store::AgentConversationStore;
pub use types::{
    AgentConversation, AgentMessage, AgentRole, ConversationStatus, MessageSource, Metadata,
    NewAgentConversation, NewAgentMessage,
};

#[cfg(test)]
mod tests;
