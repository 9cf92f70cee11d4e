//! Process-local fixed-window counters

use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Budget, Consumption, CounterStore, LimiterError};

#[derive(Debug, Clone, Copy)]
struct Window {
    hits: u32,
    resets_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, Window>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consume_now(&self, key: &str, budget: Budget, now: Instant) -> Consumption {
        let mut entry = self
            .windows
            .entry(format!("{}:{}", budget.prefix(), key))
            .or_insert(Window {
                hits: 0,
                resets_at: now + budget.window,
            });

        if now >= entry.resets_at {
            *entry = Window {
                hits: 0,
                resets_at: now + budget.window,
            };
        }

        entry.hits = entry.hits.saturating_add(1);

        if entry.hits > budget.points {
            let wait = entry.resets_at.saturating_duration_since(now);
            Consumption::Rejected {
                ms_before_next: wait.as_millis() as u64,
            }
        } else {
            Consumption::Allowed {
                remaining: budget.points - entry.hits,
            }
        }
    }

    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.resets_at > now);
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn consume(&self, key: &str, budget: Budget) -> Result<Consumption, LimiterError> {
        Ok(self.consume_now(key, budget, Instant::now()))
    }

    async fn ping(&self) -> Result<(), LimiterError> {
        Ok(())
    }
}
