//! Parley Core - Conversational Memory
//!
//! This crate provides the conversation memory layer for the Parley
//! coding-agent orchestrator, including:
//! - Backend: Redis and in-memory key-value adapters
//! - Availability: Reachability tracking and degraded mode
//! - Conversation: Context store with identity resolution and summarization
//! - Agent conversations: Provenance-rich store with a status attribute
//! - Context window: Detection of prompt-length exhaustion in agent output
//!
//! ## Degraded mode
//!
//! The backing store is an optimization, not a requirement. When it is
//! unreachable every store call returns immediately with an empty result,
//! and identity resolution hands out ephemeral ids.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent_conversation;
pub mod availability;
pub mod backend;
pub mod config;
pub mod context_window;
pub mod conversation;
pub mod error;
pub mod keys;

pub use agent_conversation::{
    AgentConversation, AgentConversationStore, AgentMessage, AgentRole, ConversationStatus,
    MessageSource, Metadata, NewAgentConversation, NewAgentMessage,
};
pub use availability::{Availability, BackingStore, ConnectBackoff};
pub use backend::{KvBackend, MemoryBackend, RedisBackend};
pub use config::StoreConfig;
pub use context_window::{is_context_window_error, matched_pattern};
pub use conversation::{
    render_context, ConversationContext, ConversationMessage, ConversationStore, QueueType, Role,
};
pub use error::{BackendError, Error, Result};
pub use keys::KeySpace;

use std::sync::Arc;

/// Both stores over one shared connection
#[derive(Clone)]
pub struct Stores {
    /// Primary conversation store
    pub conversations: ConversationStore,
    /// Agent conversation store
    pub agent_conversations: AgentConversationStore,
    /// Shared backing store
    pub backing: BackingStore,
}

impl Stores {
    /// Connect to Redis and build both stores
    ///
    /// Never fails on an unreachable server; the stores start degraded.
    ///
    /// # Errors
    ///
    /// Returns error on invalid configuration or an unparseable Redis URL.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let backend = RedisBackend::new(&config.redis_url)?;
        Ok(Self::connect_with(Arc::new(backend), config).await)
    }

    /// Build both stores over an arbitrary backend
    pub async fn connect_with(backend: Arc<dyn KvBackend>, config: &StoreConfig) -> Self {
        let backing = BackingStore::connect(backend, config).await;
        Self {
            conversations: ConversationStore::new(backing.clone(), config),
            agent_conversations: AgentConversationStore::new(backing.clone()),
            backing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stores_share_availability() {
        let backend = Arc::new(MemoryBackend::new());
        let stores = Stores::connect_with(backend.clone(), &StoreConfig::default()).await;
        assert!(stores.conversations.is_available());

        backend.set_unreachable(true);
        assert!(stores.agent_conversations.list_conversations().await.is_empty());
        assert!(!stores.conversations.is_available());
    }

    #[tokio::test]
    async fn test_stores_do_not_share_records() {
        let stores =
            Stores::connect_with(Arc::new(MemoryBackend::new()), &StoreConfig::default()).await;

        stores
            .conversations
            .append_message("shared-id", Role::User, "hi", false)
            .await;

        assert!(stores
            .agent_conversations
            .get_conversation("shared-id")
            .await
            .is_none());
        assert!(stores.agent_conversations.list_conversations().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = StoreConfig::default().with_ttl_seconds(0);
        assert!(matches!(
            Stores::connect(&config).await,
            Err(Error::Configuration(_))
        ));
    }
}
