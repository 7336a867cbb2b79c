use super::{BackendResult, KvBackend};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Value {
    String(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process key-value backend
///
/// Honors expiry lazily using the tokio clock, so tests can drive TTLs with
/// `tokio::time::pause` and `advance`. `set_unreachable(true)` makes every
/// call fail the way a dropped connection would.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
    unreachable: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the service going down or coming back
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of data calls received (connect excluded)
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Remaining time to live of a key, if it has one
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Overwrite a raw value, bypassing the stores (no expiry)
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: Value::String(value.to_string()),
                expires_at: None,
            },
        );
    }

    fn check(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Translate a Redis `MATCH` glob (`*`, `?`, `[...]`, `\` escapes) into a regex
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let mut out = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => out.push_str(&regex::escape(&chars.next()?.to_string())),
            '[' => {
                out.push('[');
                let mut first = true;
                loop {
                    match chars.next()? {
                        ']' if !first => break,
                        '^' if first => out.push('^'),
                        '-' if !first => out.push('-'),
                        '\\' => out.push_str(&regex::escape(&chars.next()?.to_string())),
                        c => out.push_str(&regex::escape(&c.to_string())),
                    }
                    first = false;
                }
                out.push(']');
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    regex::Regex::new(&out).ok()
}

fn wrong_type(command: &'static str) -> BackendError {
    BackendError::Command {
        command,
        message: "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn connect(&self) -> BackendResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> BackendResult<String> {
        self.check()?;
        Ok("PONG".to_string())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.check()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(key).filter(|e| !e.is_expired(now)) {
            Some(Entry {
                value: Value::String(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type("GET")),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()> {
        self.check()?;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: Value::String(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        self.check()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> BackendResult<bool> {
        self.check()?;
        let now = Instant::now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|e| !e.is_expired(now)))
    }

    async fn scan_match(&self, pattern: &str) -> BackendResult<Vec<String>> {
        self.check()?;
        let Some(re) = glob_to_regex(pattern) else {
            return Ok(Vec::new());
        };
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| !e.is_expired(now) && re.is_match(k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn sadd(&self, set: &str, member: &str) -> BackendResult<()> {
        self.check()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(set.to_string())
            .and_modify(|e| {
                if e.is_expired(now) {
                    *e = Entry {
                        value: Value::Set(HashSet::new()),
                        expires_at: None,
                    };
                }
            })
            .or_insert_with(|| Entry {
                value: Value::Set(HashSet::new()),
                expires_at: None,
            });
        match &mut entry.value {
            Value::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            Value::String(_) => Err(wrong_type("SADD")),
        }
    }

    async fn srem(&self, set: &str, member: &str) -> BackendResult<()> {
        self.check()?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(set).map(|e| &mut e.value) {
            Some(Value::Set(members)) => {
                members.remove(member);
                Ok(())
            }
            Some(Value::String(_)) => Err(wrong_type("SREM")),
            None => Ok(()),
        }
    }

    async fn smembers(&self, set: &str) -> BackendResult<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        let entries = self.entries.read().await;
        match entries.get(set).filter(|e| !e.is_expired(now)) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                let mut out: Vec<String> = members.iter().cloned().collect();
                out.sort();
                Ok(out)
            }
            Some(_) => Err(wrong_type("SMEMBERS")),
            None => Ok(Vec::new()),
        }
    }
}
