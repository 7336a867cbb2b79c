use super::{
    AgentConversation, AgentMessage, ConversationStatus, Metadata, NewAgentConversation,
    NewAgentMessage,
};
use crate::availability::BackingStore;
use crate::error::{Error, Result};
use futures::future::join_all;
use tracing::{debug, info, warn};

/// Agent conversation store
///
/// Same degraded-mode and TTL contract as
/// [`ConversationStore`](crate::conversation::ConversationStore), with
/// richer message provenance, a status attribute and an index set for
/// enumeration. There is no summarization: the full history is always
/// returned.
///
/// Mutating an id that does not exist fails with
/// [`Error::ConversationNotFound`] when the store is reachable.
#[derive(Clone)]
pub struct AgentConversationStore {
    store: BackingStore,
}

impl AgentConversationStore {
    /// Create a store over a shared backing store
    #[must_use]
    pub fn new(store: BackingStore) -> Self {
        Self { store }
    }

    /// Whether the backing store is reachable
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    async fn load(&self, id: &str) -> Result<Option<AgentConversation>> {
        let key = self.store.keys().agent_conversation(id);
        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<AgentConversation>(&json) {
            Ok(conversation) => Ok(Some(conversation)),
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    error = %e,
                    "Stored agent conversation is unreadable, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Persist the record and keep it in the index, refreshing both TTLs
    async fn save(&self, conversation: &AgentConversation) -> Result<()> {
        let keys = self.store.keys();
        let json = serde_json::to_string(conversation)?;
        self.store
            .set(&keys.agent_conversation(&conversation.conversation_id), &json)
            .await?;

        let index = keys.agent_index();
        self.store
            .add_member(&index, &conversation.conversation_id)
            .await?;
        self.store.touch(&index).await?;

        debug!(
            conversation_id = %conversation.conversation_id,
            messages = conversation.messages.len(),
            status = %conversation.status,
            "Agent conversation saved"
        );
        Ok(())
    }

    /// Load-modify-save; `Ok(None)` when degraded
    async fn update<T, F>(&self, id: &str, op: &'static str, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut AgentConversation) -> T,
    {
        if !self.store.is_available() {
            return Ok(None);
        }

        let mut conversation = match self.load(id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => return Err(Error::ConversationNotFound(id.to_string())),
            Err(e) => {
                warn!(conversation_id = %id, op, error = %e, "Could not load agent conversation");
                return Ok(None);
            }
        };

        let out = f(&mut conversation);
        conversation.touch();

        if let Err(e) = self.save(&conversation).await {
            warn!(conversation_id = %id, op, error = %e, "Could not save agent conversation");
        }
        Ok(Some(out))
    }

    /// Create a conversation and return its id
    ///
    /// When degraded the id is returned without being persisted.
    pub async fn create_conversation(&self, input: NewAgentConversation) -> String {
        let conversation = input.into_conversation();
        let id = conversation.conversation_id.clone();

        if !self.store.is_available() {
            debug!(conversation_id = %id, "Store unavailable, agent conversation not persisted");
            return id;
        }

        match self.save(&conversation).await {
            Ok(()) => info!(
                conversation_id = %id,
                agent_id = ?conversation.agent_id,
                "Agent conversation created"
            ),
            Err(e) => warn!(conversation_id = %id, error = %e, "Could not create agent conversation"),
        }
        id
    }

    /// Fetch a conversation, refreshing its expiration
    pub async fn get_conversation(&self, id: &str) -> Option<AgentConversation> {
        if !self.store.is_available() {
            return None;
        }

        let result = async {
            let Some(mut conversation) = self.load(id).await? else {
                return Ok(None);
            };
            conversation.touch();
            self.save(&conversation).await?;
            Ok::<_, Error>(Some(conversation))
        }
        .await;

        match result {
            Ok(conversation) => conversation,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Could not read agent conversation");
                None
            }
        }
    }

    /// Append a message
    ///
    /// # Errors
    ///
    /// Returns `Error::ConversationNotFound` if the conversation was never
    /// created (or has expired).
    pub async fn add_message(&self, id: &str, input: NewAgentMessage) -> Result<AgentMessage> {
        let message = input.into_message();
        let stored = message.clone();
        self.update(id, "add_message", move |c| c.messages.push(stored))
            .await?;
        Ok(message)
    }

    /// Full message history
    pub async fn get_messages(&self, id: &str) -> Vec<AgentMessage> {
        self.get_conversation(id)
            .await
            .map(|c| c.messages)
            .unwrap_or_default()
    }

    /// Set the status; any transition is accepted
    ///
    /// # Errors
    ///
    /// Returns `Error::ConversationNotFound` on an unknown id.
    pub async fn update_status(&self, id: &str, status: ConversationStatus) -> Result<()> {
        if let Some(previous) = self
            .update(id, "update_status", |c| std::mem::replace(&mut c.status, status))
            .await?
        {
            info!(conversation_id = %id, from = %previous, to = %status, "Agent conversation status changed");
        }
        Ok(())
    }

    /// Set the title
    ///
    /// # Errors
    ///
    /// Returns `Error::ConversationNotFound` on an unknown id.
    pub async fn update_title(&self, id: &str, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        self.update(id, "update_title", |c| c.title = Some(title))
            .await?;
        Ok(())
    }

    /// Merge entries into the conversation metadata
    ///
    /// # Errors
    ///
    /// Returns `Error::ConversationNotFound` on an unknown id.
    pub async fn merge_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        self.update(id, "merge_metadata", |c| c.metadata.extend(metadata))
            .await?;
        Ok(())
    }

    /// Every indexed conversation, most recently accessed first
    ///
    /// Ids whose records have expired are dropped from the index.
    pub async fn list_conversations(&self) -> Vec<AgentConversation> {
        if !self.store.is_available() {
            return Vec::new();
        }

        let index = self.store.keys().agent_index();
        let ids = match self.store.members(&index).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not read agent conversation index");
                return Vec::new();
            }
        };

        let results = join_all(ids.iter().map(|id| self.load(id))).await;

        let mut conversations = Vec::with_capacity(ids.len());
        let mut stale = 0usize;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Some(conversation)) => conversations.push(conversation),
                Ok(None) => {
                    stale += 1;
                    if let Err(e) = self.store.remove_member(&index, id).await {
                        debug!(conversation_id = %id, error = %e, "Could not prune index");
                    }
                }
                Err(e) => warn!(conversation_id = %id, error = %e, "Could not load agent conversation"),
            }
        }

        if stale > 0 {
            debug!(stale, "Pruned expired agent conversations from index");
            if let Err(e) = self.store.touch(&index).await {
                debug!(error = %e, "Could not refresh index expiration");
            }
        }

        conversations.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        conversations
    }

    /// Conversations owned by `agent_id`, most recently accessed first
    pub async fn list_by_agent(&self, agent_id: &str) -> Vec<AgentConversation> {
        self.list_conversations()
            .await
            .into_iter()
            .filter(|c| c.agent_id.as_deref() == Some(agent_id))
            .collect()
    }
}
