//! Rendering history into the agent prompt
//!
//! The output format is consumed verbatim by the agent invocation layer:
//! one `label: content` line per message, messages separated by a blank
//! line, review-protocol messages dropped.

use super::{ConversationMessage, Role};

/// Prefix of messages sent to the review agent
pub const REVIEW_REQUEST_MARKER: &str = "[Review Agent Request]";

/// Prefix of messages returned by the review agent
pub const REVIEW_RESPONSE_MARKER: &str = "[Review Agent Response]";

/// Label for the human party
pub const USER_LABEL: &str = "user";

/// Label for the coding agent
pub const AGENT_LABEL: &str = "cursor";

/// Whether a message belongs to the internal review protocol
#[must_use]
pub fn is_review_message(content: &str) -> bool {
    let content = content.trim_start();
    content.starts_with(REVIEW_REQUEST_MARKER) || content.starts_with(REVIEW_RESPONSE_MARKER)
}

/// Render messages as labeled, double-newline separated lines
#[must_use]
pub fn render_context(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .filter(|m| !is_review_message(&m.content))
        .map(|m| {
            let label = match m.role {
                Role::User => USER_LABEL,
                Role::Assistant => AGENT_LABEL,
            };
            format!("{}: {}", label, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
