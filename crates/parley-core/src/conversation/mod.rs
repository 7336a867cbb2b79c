//! Conversation context store
//!
//! Persists multi-turn exchanges between a caller and the coding agent:
//! - Identity resolution (explicit id, or the queue's last active one)
//! - Append and read with a sliding TTL
//! - Summarization that keeps the most recent turns
//! - Rendering of history into the agent prompt

mod render;
mod store;
mod types;

pub use render::{
    is_review_message, render_context, AGENT_LABEL, REVIEW_REQUEST_MARKER,
    REVIEW_RESPONSE_MARKER, USER_LABEL,
};
pub use store::{ConversationStore, SUMMARY_PREFIX, SUMMARY_TAIL_LEN};
pub use types::{ConversationContext, ConversationMessage, QueueType, Role};
