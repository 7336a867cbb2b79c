//! Availability tracking and backing store glue
//!
//! The conversational memory is an optimization: when the backing service
//! is down, every store call degrades to a no-op instead of blocking or
//! failing the caller.
//!
//! ## Events
//!
//! The availability flag starts `false` and only moves on three events:
//! - connection established → `true`
//! - connection error (from any call) → `false`
//! - explicit probe (`PING`) → `true` on `PONG`, `false` otherwise
//!
//! Data calls never reconnect on their own. Recovery after an outage is
//! the job of [`BackingStore::probe`], invoked by the caller or by
//! [`BackingStore::spawn_health_probe`].

use crate::backend::{BackendResult, KvBackend};
use crate::config::StoreConfig;
use crate::error::BackendError;
use crate::keys::KeySpace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared reachability flag
#[derive(Debug, Clone, Default)]
pub struct Availability {
    flag: Arc<AtomicBool>,
}

impl Availability {
    /// New tracker, initially unreachable
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the backing store is currently considered reachable
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Connection established
    pub fn mark_connected(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("Backing store reachable");
        }
    }

    /// Connection error observed
    pub fn mark_error(&self, reason: &str) {
        if self.flag.swap(false, Ordering::SeqCst) {
            warn!(reason, "Backing store unreachable, entering degraded mode");
        }
    }
}

/// Bounded exponential backoff for the startup connection
#[derive(Debug, Clone)]
pub struct ConnectBackoff {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier applied per attempt
    pub multiplier: u32,
}

impl Default for ConnectBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2,
        }
    }
}

impl ConnectBackoff {
    /// Backoff derived from store configuration
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            max_attempts: config.connect_max_attempts.max(1),
            initial_delay: Duration::from_millis(config.connect_initial_delay_ms),
            max_delay: Duration::from_millis(config.connect_max_delay_ms),
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Backing store handle shared by the conversation stores
///
/// Every data call consults the availability flag first and fails fast with
/// [`BackendError::Unavailable`] when it is down. Connectivity errors flip
/// the flag.
#[derive(Clone)]
pub struct BackingStore {
    backend: Arc<dyn KvBackend>,
    availability: Availability,
    keys: KeySpace,
    ttl: Duration,
}

impl BackingStore {
    /// Wrap a backend without connecting; the store starts degraded
    #[must_use]
    pub fn new(backend: Arc<dyn KvBackend>, config: &StoreConfig) -> Self {
        Self {
            backend,
            availability: Availability::new(),
            keys: KeySpace::new(config.key_prefix.clone()),
            ttl: config.ttl(),
        }
    }

    /// Wrap a backend and attempt the initial connection
    ///
    /// Tries up to `connect_max_attempts` times with increasing delay, then
    /// gives up and returns a degraded store. Never fails.
    pub async fn connect(backend: Arc<dyn KvBackend>, config: &StoreConfig) -> Self {
        let store = Self::new(backend, config);
        store.connect_with_backoff(&ConnectBackoff::from_config(config)).await;
        store
    }

    async fn connect_with_backoff(&self, backoff: &ConnectBackoff) -> bool {
        for attempt in 1..=backoff.max_attempts {
            match self.backend.connect().await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(attempt, "Connected after retry");
                    }
                    self.availability.mark_connected();
                    return true;
                }
                Err(e) => {
                    self.availability.mark_error(&e.to_string());
                    if attempt < backoff.max_attempts {
                        let delay = backoff.delay_for(attempt);
                        warn!(
                            attempt,
                            max_attempts = backoff.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Backing store connection failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            attempts = attempt,
                            error = %e,
                            "Giving up on backing store, running without persistence"
                        );
                    }
                }
            }
        }
        false
    }

    /// Explicit reachability probe
    ///
    /// Reconnects once if needed, then pings. Only a `PONG` reply counts as
    /// reachable; any error or other reply marks the store unreachable.
    pub async fn probe(&self) -> bool {
        if !self.availability.is_available() {
            if let Err(e) = self.backend.connect().await {
                debug!(error = %e, "Probe could not reconnect");
                self.availability.mark_error(&e.to_string());
                return false;
            }
        }

        match self.backend.ping().await {
            Ok(reply) if reply.eq_ignore_ascii_case("PONG") => {
                self.availability.mark_connected();
                true
            }
            Ok(reply) => {
                self.availability
                    .mark_error(&format!("unexpected ping reply: {}", reply));
                false
            }
            Err(e) => {
                self.availability.mark_error(&e.to_string());
                false
            }
        }
    }

    /// Run [`probe`](Self::probe) on a fixed interval in the background
    pub fn spawn_health_probe(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.probe().await;
            }
        })
    }

    /// Current availability
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    /// Availability tracker shared with this store
    #[must_use]
    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Key layout
    #[must_use]
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Sliding TTL
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn guard(&self) -> BackendResult<()> {
        if self.availability.is_available() {
            Ok(())
        } else {
            Err(BackendError::Unavailable)
        }
    }

    fn observe<T>(&self, result: BackendResult<T>) -> BackendResult<T> {
        if let Err(e) = &result {
            if e.is_connectivity() {
                self.availability.mark_error(&e.to_string());
            }
        }
        result
    }

    /// GET
    pub async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.guard()?;
        self.observe(self.backend.get(key).await)
    }

    /// SET with the sliding TTL
    pub async fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.guard()?;
        self.observe(self.backend.set_ex(key, value, self.ttl).await)
    }

    /// Re-apply the sliding TTL
    pub async fn touch(&self, key: &str) -> BackendResult<bool> {
        self.guard()?;
        self.observe(self.backend.expire(key, self.ttl).await)
    }

    /// Keys matching a glob pattern
    pub async fn scan(&self, pattern: &str) -> BackendResult<Vec<String>> {
        self.guard()?;
        self.observe(self.backend.scan_match(pattern).await)
    }

    /// SADD
    pub async fn add_member(&self, set: &str, member: &str) -> BackendResult<()> {
        self.guard()?;
        self.observe(self.backend.sadd(set, member).await)
    }

    /// SREM
    pub async fn remove_member(&self, set: &str, member: &str) -> BackendResult<()> {
        self.guard()?;
        self.observe(self.backend.srem(set, member).await)
    }

    /// SMEMBERS
    pub async fn members(&self, set: &str) -> BackendResult<Vec<String>> {
        self.guard()?;
        self.observe(self.backend.smembers(set).await)
    }
}

#[cfg(test)]
mod tests;
