//! Redis-backed counters shared by every API instance

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::sync::{Mutex, RwLock};

use super::{Budget, Consumption, CounterStore, LimiterError};

/// Upper bound on one connection attempt
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Minimum gap between two failed connection attempts
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Increments the counter, starts its expiry on the first hit and returns
/// `{hits, ttl_ms}` in one round trip.
const CONSUME_SCRIPT: &str = r#"
local hits = redis.call('INCR', KEYS[1])
if hits == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {hits, ttl}
"#;

/// Connects on first use. Until a connection exists every call fails fast,
/// which sends the registry to its fallback; attempts are retried after
/// `RECONNECT_BACKOFF`. Once connected, `ConnectionManager` reconnects on
/// its own.
pub struct RedisCounterStore {
    client: redis::Client,
    connection: RwLock<Option<ConnectionManager>>,
    /// Time of the last connection attempt; held while connecting
    last_attempt: Mutex<Option<Instant>>,
    reconnect_backoff: Duration,
    script: Script,
}

impl RedisCounterStore {
    /// Parse `url` without connecting.
    pub fn open(url: &str) -> Result<Self, LimiterError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: RwLock::new(None),
            last_attempt: Mutex::new(None),
            reconnect_backoff: RECONNECT_BACKOFF,
            script: Script::new(CONSUME_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, LimiterError> {
        if let Some(connection) = self.connection.read().await.clone() {
            return Ok(connection);
        }

        // One task connects; the rest fall back instead of queueing.
        let Ok(mut last_attempt) = self.last_attempt.try_lock() else {
            return Err(LimiterError::Store("Redis connection in progress".to_string()));
        };

        if let Some(connection) = self.connection.read().await.clone() {
            return Ok(connection);
        }
        if last_attempt.is_some_and(|at| at.elapsed() < self.reconnect_backoff) {
            return Err(LimiterError::Store("Redis unavailable".to_string()));
        }
        *last_attempt = Some(Instant::now());

        let connection = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|_| LimiterError::Store("Redis connection timed out".to_string()))??;

        tracing::info!("Connected to Redis");
        *self.connection.write().await = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn consume(&self, key: &str, budget: Budget) -> Result<Consumption, LimiterError> {
        let mut connection = self.connection().await?;
        let (hits, ttl_ms): (i64, i64) = self
            .script
            .key(format!("{}:{}", budget.prefix(), key))
            .arg(budget.window_millis())
            .invoke_async(&mut connection)
            .await?;

        if hits > i64::from(budget.points) {
            Ok(Consumption::Rejected {
                ms_before_next: ttl_ms.max(0) as u64,
            })
        } else {
            Ok(Consumption::Allowed {
                remaining: (i64::from(budget.points) - hits) as u32,
            })
        }
    }

    async fn ping(&self) -> Result<(), LimiterError> {
        let mut connection = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }
}
