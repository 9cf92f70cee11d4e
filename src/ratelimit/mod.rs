//! Rate limiting
//!
//! Fixed-window request budgets per endpoint class. A shared primary store
//! (Redis) is consulted first; a process-local store acts as fallback when
//! the primary fails or rejects.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Window shared by every budget
pub const WINDOW: Duration = Duration::from_secs(60);

/// Retry-After used when the primary store gave no timing
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Budget {
    pub points: u32,
    pub window: Duration,
}

impl Budget {
    pub const fn per_minute(points: u32) -> Self {
        Self {
            points,
            window: WINDOW,
        }
    }

    /// Namespace keeping counters of different budgets apart
    pub fn prefix(&self) -> String {
        format!("rl:{}:{}", self.points, self.window.as_secs())
    }

    pub fn window_millis(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

/// Budget for a request path. First match wins.
pub fn endpoint_budget(path: &str) -> Budget {
    if path.contains("/upload") {
        Budget::per_minute(15)
    } else if path.contains("/metrics/anomalies") {
        Budget::per_minute(40)
    } else if path.contains("/metrics/sources") {
        Budget::per_minute(80)
    } else if path.contains("/metrics") {
        Budget::per_minute(120)
    } else {
        Budget::per_minute(100)
    }
}

/// Limiter key: `{tenant}:{ip}:{METHOD}:{path}`
pub fn limiter_key(tenant: &str, ip: &str, method: &str, path: &str) -> String {
    format!("{}:{}:{}:{}", tenant, ip, method, path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Allowed { remaining: u32 },
    Rejected { ms_before_next: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("Counter store error: {0}")]
    Store(String),
}

impl From<::redis::RedisError> for LimiterError {
    fn from(err: ::redis::RedisError) -> Self {
        LimiterError::Store(err.to_string())
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one hit against `key` under `budget`.
    async fn consume(&self, key: &str, budget: Budget) -> Result<Consumption, LimiterError>;

    async fn ping(&self) -> Result<(), LimiterError>;
}

#[derive(Clone)]
pub struct RateLimiterRegistry {
    primary: Option<Arc<dyn CounterStore>>,
    fallback: Arc<MemoryCounterStore>,
}

impl RateLimiterRegistry {
    pub fn new(primary: Arc<dyn CounterStore>) -> Self {
        Self {
            primary: Some(primary),
            fallback: Arc::new(MemoryCounterStore::new()),
        }
    }

    /// Process-local limiting only.
    pub fn in_memory() -> Self {
        Self {
            primary: None,
            fallback: Arc::new(MemoryCounterStore::new()),
        }
    }

    pub async fn check(&self, key: &str, budget: Budget) -> Decision {
        let retry_hint = match &self.primary {
            Some(store) => match store.consume(key, budget).await {
                Ok(Consumption::Allowed { .. }) => return Decision::Allowed,
                Ok(Consumption::Rejected { ms_before_next }) => Some(ms_before_next),
                Err(e) => {
                    tracing::warn!(error = %e, "Primary rate limit store failed, using fallback");
                    None
                }
            },
            None => None,
        };

        match self.fallback.consume_now(key, budget, Instant::now()) {
            Consumption::Allowed { .. } => Decision::Allowed,
            Consumption::Rejected { .. } => {
                let retry_after_secs = retry_hint
                    .map(|ms| ms.div_ceil(1000))
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                tracing::debug!(key = %key, retry_after_secs, "Rate limit exceeded");
                Decision::Limited { retry_after_secs }
            }
        }
    }

    /// Drop expired fallback windows; returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.fallback.sweep_expired(Instant::now())
    }

    pub async fn primary_healthy(&self) -> bool {
        match &self.primary {
            Some(store) => store.ping().await.is_ok(),
            None => false,
        }
    }
}
