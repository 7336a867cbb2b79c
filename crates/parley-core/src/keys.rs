//! Key layout in the backing store
//!
//! - `<prefix>:conversation:<id>`
//! - `<prefix>:<queue>:last_conversation_id`
//! - `<prefix>:agent_conversation:<id>`
//! - `<prefix>:agent_conversations` (index set)

use crate::conversation::QueueType;

/// Namespaced key builder
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space under `prefix`
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Primary conversation record
    #[must_use]
    pub fn conversation(&self, id: &str) -> String {
        format!("{}:conversation:{}", self.prefix, id)
    }

    /// Pattern matching every primary conversation record
    #[must_use]
    pub fn conversation_pattern(&self) -> String {
        format!("{}:conversation:*", escape_glob(&self.prefix))
    }

    /// Queue-scoped "last active" pointer
    #[must_use]
    pub fn last_conversation(&self, queue: QueueType) -> String {
        format!("{}:{}:last_conversation_id", self.prefix, queue.as_str())
    }

    /// Agent conversation record
    #[must_use]
    pub fn agent_conversation(&self, id: &str) -> String {
        format!("{}:agent_conversation:{}", self.prefix, id)
    }

    /// Index set of agent conversation ids
    #[must_use]
    pub fn agent_index(&self) -> String {
        format!("{}:agent_conversations", self.prefix)
    }
}

/// Escape glob metacharacters so `literal` matches only itself in `SCAN MATCH`
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
