//! Scheduled Jobs
//!
//! Background maintenance for process-local state.

use std::time::Duration;

use tokio::time::interval;

use crate::ratelimit::RateLimiterRegistry;

/// Drop fallback rate-limit windows that have expired
pub fn sweep_rate_limit_windows(limiter: &RateLimiterRegistry) -> usize {
    let removed = limiter.sweep();

    if removed > 0 {
        tracing::debug!(windows_removed = removed, "Swept expired rate limit windows");
    }

    removed
}

/// Interval between rate limit window sweeps
pub const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    limiter: RateLimiterRegistry,
}

impl JobScheduler {
    pub fn new(limiter: RateLimiterRegistry) -> Self {
        Self { limiter }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut sweep_interval = interval(RATE_LIMIT_SWEEP_INTERVAL);

        loop {
            sweep_interval.tick().await;
            sweep_rate_limit_windows(&self.limiter);
        }
    }
}
