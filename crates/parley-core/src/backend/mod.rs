//! Backing store adapter
//!
//! A thin capability over a remote key-value service. The stores only need
//! string values with expiry, pattern enumeration and set membership.
//!
//! - `RedisBackend`: production backend over a multiplexed connection
//! - `MemoryBackend`: in-process backend for tests and Redis-less runs

mod memory_backend;
mod redis_backend;

pub use memory_backend::MemoryBackend;
pub use redis_backend::RedisBackend;

use crate::error::BackendError;
use async_trait::async_trait;
use std::time::Duration;

/// Result type for adapter calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Key-value capability required by the conversation stores
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Make one connection attempt
    async fn connect(&self) -> BackendResult<()>;

    /// Round-trip ping; returns the raw reply
    async fn ping(&self) -> BackendResult<String>;

    /// Get a string value
    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Set a string value with expiry
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()>;

    /// Reset the expiry of an existing key; false if the key is absent
    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool>;

    /// Delete a key; false if it did not exist
    async fn del(&self, key: &str) -> BackendResult<bool>;

    /// Enumerate keys matching a glob pattern
    async fn scan_match(&self, pattern: &str) -> BackendResult<Vec<String>>;

    /// Add a member to a set
    async fn sadd(&self, set: &str, member: &str) -> BackendResult<()>;

    /// Remove a member from a set
    async fn srem(&self, set: &str, member: &str) -> BackendResult<()>;

    /// All members of a set
    async fn smembers(&self, set: &str) -> BackendResult<Vec<String>>;
}
