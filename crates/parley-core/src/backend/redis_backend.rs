use super::{BackendResult, KvBackend};
use crate::error::BackendError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{FromRedisValue, RedisError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Upper bound for a single connection attempt
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 100;

/// Redis-backed adapter
///
/// Holds a single multiplexed connection shared by every store operation.
/// A connectivity failure drops the cached connection; it is only
/// re-established by an explicit [`KvBackend::connect`].
pub struct RedisBackend {
    client: redis::Client,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    /// Create an unconnected backend
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn new(redis_url: &str) -> BackendResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| BackendError::Connection(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
        })
    }

    async fn connection(&self) -> BackendResult<MultiplexedConnection> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| BackendError::Connection("not connected".to_string()))
    }

    async fn run<T>(&self, command: &'static str, cmd: &redis::Cmd) -> BackendResult<T>
    where
        T: FromRedisValue + Send,
    {
        let mut conn = self.connection().await?;

        match cmd.query_async::<T>(&mut conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = classify(command, e);
                if err.is_connectivity() {
                    warn!(command, error = %err, "Redis connection lost");
                    self.connection.write().await.take();
                }
                Err(err)
            }
        }
    }
}

fn classify(command: &'static str, err: RedisError) -> BackendError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Command {
            command,
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn connect(&self) -> BackendResult<()> {
        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| BackendError::Connection("connection attempt timed out".to_string()))?
        .map_err(|e| BackendError::Connection(e.to_string()))?;

        *self.connection.write().await = Some(conn);
        debug!("Redis connection established");
        Ok(())
    }

    async fn ping(&self) -> BackendResult<String> {
        self.run("PING", &redis::cmd("PING")).await
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.run("GET", redis::cmd("GET").arg(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()> {
        self.run(
            "SET",
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs().max(1)),
        )
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> BackendResult<bool> {
        let updated: i64 = self
            .run(
                "EXPIRE",
                redis::cmd("EXPIRE").arg(key).arg(ttl.as_secs().max(1)),
            )
            .await?;
        Ok(updated > 0)
    }

    async fn del(&self, key: &str) -> BackendResult<bool> {
        let deleted: i64 = self.run("DEL", redis::cmd("DEL").arg(key)).await?;
        Ok(deleted > 0)
    }

    async fn scan_match(&self, pattern: &str) -> BackendResult<Vec<String>> {
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .run(
                    "SCAN",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH),
                )
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn sadd(&self, set: &str, member: &str) -> BackendResult<()> {
        let _: i64 = self.run("SADD", redis::cmd("SADD").arg(set).arg(member)).await?;
        Ok(())
    }

    async fn srem(&self, set: &str, member: &str) -> BackendResult<()> {
        let _: i64 = self.run("SREM", redis::cmd("SREM").arg(set).arg(member)).await?;
        Ok(())
    }

    async fn smembers(&self, set: &str) -> BackendResult<Vec<String>> {
        self.run("SMEMBERS", redis::cmd("SMEMBERS").arg(set)).await
    }
}
