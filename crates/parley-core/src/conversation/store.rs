use super::render::render_context;
use super::{ConversationContext, ConversationMessage, QueueType, Role};
use crate::availability::BackingStore;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Messages kept verbatim after a summary
pub const SUMMARY_TAIL_LEN: usize = 3;

/// Prefix of the synthetic summary message
pub const SUMMARY_PREFIX: &str = "[Conversation Summary]";

/// Conversation context store
///
/// Owns identity resolution, append/read, summarization and rendering for
/// the primary conversation class. Every public method checks availability
/// first; backing store failures degrade to empty results and never reach
/// the caller.
///
/// Writers to the same id are last-write-wins: each read-modify-write loads
/// the full record before saving it.
#[derive(Clone)]
pub struct ConversationStore {
    store: BackingStore,
    debug_mode: bool,
}

fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

impl ConversationStore {
    /// Create a store over a shared backing store
    #[must_use]
    pub fn new(store: BackingStore, config: &StoreConfig) -> Self {
        Self {
            store,
            debug_mode: config.debug_mode,
        }
    }

    /// Whether the backing store is reachable
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    /// Explicit reachability probe
    pub async fn health_check(&self) -> bool {
        self.store.probe().await
    }

    /// Load a context; unparseable records count as absent
    async fn load(&self, id: &str) -> Result<Option<ConversationContext>> {
        let key = self.store.keys().conversation(id);
        let Some(json) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<ConversationContext>(&json) {
            Ok(ctx) => Ok(Some(ctx)),
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    error = %e,
                    "Stored conversation is unreadable, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Persist a context with a fresh TTL
    async fn save(&self, ctx: &ConversationContext) -> Result<()> {
        let key = self.store.keys().conversation(&ctx.conversation_id);
        let json = serde_json::to_string(ctx)?;
        self.store.set(&key, &json).await?;
        debug!(
            conversation_id = %ctx.conversation_id,
            messages = ctx.messages.len(),
            "Conversation saved"
        );
        Ok(())
    }

    async fn set_pointer(&self, queue: QueueType, id: &str) -> Result<()> {
        let key = self.store.keys().last_conversation(queue);
        self.store.set(&key, id).await?;
        Ok(())
    }

    /// Load, refresh last-accessed, and re-persist
    async fn load_and_touch(&self, id: &str) -> Result<Option<ConversationContext>> {
        let Some(mut ctx) = self.load(id).await? else {
            return Ok(None);
        };
        ctx.touch();
        self.save(&ctx).await?;
        Ok(Some(ctx))
    }

    /// Resolve the conversation to use for a request
    ///
    /// An explicit id is returned unchanged (created if absent, refreshed
    /// otherwise) and never touches the queue's pointer. Without one, the
    /// queue's last active conversation is used, or a new one is created.
    /// Never fails: if the backing store is down, a fresh unpersisted id is
    /// returned.
    pub async fn resolve_conversation_id(
        &self,
        explicit_id: Option<&str>,
        queue: QueueType,
    ) -> String {
        if let Some(id) = explicit_id {
            if self.store.is_available() {
                if let Err(e) = self.refresh_or_init(id).await {
                    warn!(conversation_id = %id, error = %e, "Could not refresh explicit conversation");
                }
            }
            return id.to_string();
        }

        if !self.store.is_available() {
            let id = new_conversation_id();
            debug!(conversation_id = %id, queue = %queue, "Store unavailable, using ephemeral conversation");
            return id;
        }

        match self.resolve_implicit(queue).await {
            Ok(id) => id,
            Err(e) => {
                let id = new_conversation_id();
                warn!(
                    queue = %queue,
                    conversation_id = %id,
                    error = %e,
                    "Conversation resolution failed, using ephemeral conversation"
                );
                id
            }
        }
    }

    async fn refresh_or_init(&self, id: &str) -> Result<()> {
        if self.load_and_touch(id).await?.is_none() {
            self.save(&ConversationContext::new(id)).await?;
            debug!(conversation_id = %id, "Created conversation for explicit id");
        }
        Ok(())
    }

    async fn resolve_implicit(&self, queue: QueueType) -> Result<String> {
        let pointer_key = self.store.keys().last_conversation(queue);

        if let Some(id) = self.store.get(&pointer_key).await? {
            self.refresh_or_init(&id).await?;
            self.store.touch(&pointer_key).await?;
            debug!(conversation_id = %id, queue = %queue, "Resumed last active conversation");
            return Ok(id);
        }

        let id = new_conversation_id();
        self.save(&ConversationContext::new(&id)).await?;
        self.set_pointer(queue, &id).await?;
        info!(conversation_id = %id, queue = %queue, "Started new conversation");
        Ok(id)
    }

    /// Last active conversation of a queue, without creating one
    pub async fn current_conversation_id(&self, queue: QueueType) -> Option<String> {
        if !self.store.is_available() {
            return None;
        }

        let key = self.store.keys().last_conversation(queue);
        match self.store.get(&key).await {
            Ok(id) => id,
            Err(e) => {
                debug!(queue = %queue, error = %e, "Could not read queue pointer");
                None
            }
        }
    }

    /// Start a fresh, empty conversation under `id` and make it the queue's
    /// active conversation
    pub async fn create_conversation(&self, id: &str, queue: QueueType) {
        if !self.store.is_available() {
            return;
        }

        let result = async {
            self.save(&ConversationContext::new(id)).await?;
            self.set_pointer(queue, id).await
        }
        .await;

        match result {
            Ok(()) => info!(conversation_id = %id, queue = %queue, "Conversation created"),
            Err(e) => warn!(conversation_id = %id, error = %e, "Could not create conversation"),
        }
    }

    /// Generate an id and start a fresh conversation with it
    pub async fn force_new_conversation(&self, queue: QueueType) -> String {
        let id = new_conversation_id();
        self.create_conversation(&id, queue).await;
        id
    }

    /// Append a turn
    ///
    /// Review turns are dropped unless debug mode is on.
    pub async fn append_message(
        &self,
        id: &str,
        role: Role,
        content: &str,
        is_review_turn: bool,
    ) {
        if !self.store.is_available() {
            return;
        }

        if is_review_turn && !self.debug_mode {
            debug!(conversation_id = %id, "Skipping review turn");
            return;
        }

        let result = async {
            let mut ctx = self
                .load(id)
                .await?
                .unwrap_or_else(|| ConversationContext::new(id));
            let message = ConversationMessage::new(role, content);
            if let Some(summarized) = ctx.summarized_messages.as_mut() {
                summarized.push(message.clone());
            }
            ctx.messages.push(message);
            ctx.touch();
            self.save(&ctx).await
        }
        .await;

        if let Err(e) = result {
            warn!(conversation_id = %id, role = %role, error = %e, "Could not append message");
        }
    }

    /// Messages for the agent: the summarized view if present, else the
    /// full history
    pub async fn get_context(&self, id: &str) -> Vec<ConversationMessage> {
        self.get_conversation(id)
            .await
            .map(|ctx| ctx.effective_messages().to_vec())
            .unwrap_or_default()
    }

    /// Full record, including the unsummarized history
    pub async fn get_conversation(&self, id: &str) -> Option<ConversationContext> {
        if !self.store.is_available() {
            return None;
        }

        match self.load_and_touch(id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Could not read conversation");
                None
            }
        }
    }

    /// Rendered history for the agent prompt; empty when unavailable
    pub async fn get_rendered_context(&self, id: &str) -> String {
        render_context(&self.get_context(id).await)
    }

    /// Replace the agent-facing view with a summary plus the last turns
    ///
    /// `summarize_fn` receives the current effective messages and returns the
    /// summary text. The full history in `messages` is left intact.
    ///
    /// # Errors
    ///
    /// Returns `Error::Summarization` if `summarize_fn` fails. Backing store
    /// failures are absorbed.
    pub async fn summarize<F, Fut, E>(&self, id: &str, summarize_fn: F) -> Result<()>
    where
        F: FnOnce(Vec<ConversationMessage>) -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
        E: Display,
    {
        if !self.store.is_available() {
            return Ok(());
        }

        let mut ctx = match self.load(id).await {
            Ok(Some(ctx)) => ctx,
            Ok(None) => {
                warn!(conversation_id = %id, "Nothing to summarize, conversation not found");
                return Ok(());
            }
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Could not load conversation to summarize");
                return Ok(());
            }
        };

        let current = ctx.effective_messages().to_vec();
        let before = current.len();
        let tail_start = before.saturating_sub(SUMMARY_TAIL_LEN);
        let tail = current[tail_start..].to_vec();

        let text = summarize_fn(current)
            .await
            .map_err(|e| Error::Summarization(e.to_string()))?;

        let mut summary =
            ConversationMessage::assistant(format!("{} {}", SUMMARY_PREFIX, text));
        summary.is_summary = true;

        let mut summarized = Vec::with_capacity(tail.len() + 1);
        summarized.push(summary);
        summarized.extend(tail);
        let after = summarized.len();

        ctx.summarized_messages = Some(summarized);
        ctx.touch();

        match self.save(&ctx).await {
            Ok(()) => info!(conversation_id = %id, before, after, "Conversation summarized"),
            Err(e) => warn!(conversation_id = %id, error = %e, "Could not save summary"),
        }
        Ok(())
    }

    /// Every persisted conversation, most recently accessed first
    ///
    /// Listing does not refresh expirations.
    pub async fn list_all(&self) -> Vec<ConversationContext> {
        if !self.store.is_available() {
            return Vec::new();
        }

        let keys = match self.store.scan(&self.store.keys().conversation_pattern()).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Could not enumerate conversations");
                return Vec::new();
            }
        };

        let prefix = self.store.keys().conversation("");
        let loads = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(|id| self.load(id));

        let mut contexts: Vec<ConversationContext> = join_all(loads)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(ctx) => ctx,
                Err(e) => {
                    error!(error = %e, "Could not load listed conversation");
                    None
                }
            })
            .collect();

        contexts.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        contexts
    }
}
