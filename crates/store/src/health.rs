//! Storage health monitor.
//!
//! Pings the store on a fixed cadence. A successful ping resets the failure
//! count; reaching `max_failures` consecutive failures ends the monitor with a
//! [`StorageOutage`] verdict, which the process treats as fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::store::MirrorStore;

/// Configuration for storage health polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Interval between pings.
    pub check_interval: Duration,
    /// Consecutive failures before the outage is declared.
    pub max_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            max_failures: 3,
        }
    }
}

impl HealthConfig {
    /// Create a config for testing with shorter intervals.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            check_interval: Duration::from_millis(20),
            max_failures: 2,
        }
    }

    /// Set the check interval.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the maximum failures before the outage is declared.
    #[must_use]
    pub const fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }
}

/// Verdict returned when the store stayed unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOutage {
    pub consecutive_failures: u32,
    pub last_error: StoreError,
}

impl std::fmt::Display for StorageOutage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "storage unreachable after {} consecutive failed pings: {}",
            self.consecutive_failures, self.last_error
        )
    }
}

/// Pings a mirror store until stopped or until the outage threshold is hit.
pub struct StorageHealthMonitor {
    store: Arc<dyn MirrorStore>,
    config: HealthConfig,
    failure_count: u32,
}

impl StorageHealthMonitor {
    pub fn new(store: Arc<dyn MirrorStore>, config: HealthConfig) -> Self {
        Self {
            store,
            config,
            failure_count: 0,
        }
    }

    /// Increment the failure count and return whether threshold is reached.
    fn increment_failures(&mut self) -> bool {
        self.failure_count = self.failure_count.saturating_add(1);
        self.failure_count >= self.config.max_failures
    }

    /// Run until `stop` flips to true (returns `Ok`) or the store stays down
    /// for `max_failures` pings in a row (returns the outage).
    ///
    /// # Errors
    ///
    /// Returns `StorageOutage` on a sustained outage.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> Result<(), StorageOutage> {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.store.ping().await {
                        Ok(()) => {
                            if self.failure_count > 0 {
                                debug!(after = self.failure_count, "Storage ping recovered");
                            }
                            self.failure_count = 0;
                        }
                        Err(e) => {
                            let exhausted = self.increment_failures();
                            warn!(
                                error = %e,
                                unreachable = e.is_unavailable(),
                                failures = self.failure_count,
                                max_failures = self.config.max_failures,
                                "Storage ping failed"
                            );
                            if exhausted {
                                let outage = StorageOutage {
                                    consecutive_failures: self.failure_count,
                                    last_error: e,
                                };
                                error!(%outage, "Sustained storage outage");
                                return Err(outage);
                            }
                        }
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        debug!("Storage health monitor stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}
