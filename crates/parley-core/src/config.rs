//! Store configuration
//!
//! ```toml
//! [store]
//! redis_url = "redis://127.0.0.1:6379"
//! key_prefix = "parley"
//! ttl_seconds = 3600
//! debug_mode = false
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sliding expiration (one hour)
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Configuration for the conversation stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backing service connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Namespace prefix for every key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Sliding TTL applied on every read and write
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Persist review turns (normally suppressed)
    #[serde(default)]
    pub debug_mode: bool,
    /// Connection attempts at startup before giving up
    #[serde(default = "default_connect_max_attempts")]
    pub connect_max_attempts: u32,
    /// Delay before the second connection attempt
    #[serde(default = "default_connect_initial_delay_ms")]
    pub connect_initial_delay_ms: u64,
    /// Upper bound for the delay between attempts
    #[serde(default = "default_connect_max_delay_ms")]
    pub connect_max_delay_ms: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "parley".to_string()
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_connect_max_attempts() -> u32 {
    3
}

fn default_connect_initial_delay_ms() -> u64 {
    200
}

fn default_connect_max_delay_ms() -> u64 {
    2000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            ttl_seconds: default_ttl_seconds(),
            debug_mode: false,
            connect_max_attempts: default_connect_max_attempts(),
            connect_initial_delay_ms: default_connect_initial_delay_ms(),
            connect_max_delay_ms: default_connect_max_delay_ms(),
        }
    }
}

impl StoreConfig {
    /// Set the Redis URL
    #[must_use]
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Set the key prefix
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the sliding TTL
    #[must_use]
    pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Enable or disable debug mode
    #[must_use]
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Sliding TTL as a duration
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Reject values the stores cannot operate with
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` on a zero TTL, an empty prefix or a
    /// zero attempt count.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_seconds == 0 {
            return Err(Error::Configuration(
                "ttl_seconds must be greater than zero".to_string(),
            ));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(Error::Configuration("key_prefix must not be empty".to_string()));
        }
        if self.connect_max_attempts == 0 {
            return Err(Error::Configuration(
                "connect_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
