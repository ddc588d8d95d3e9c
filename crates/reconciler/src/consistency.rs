//! Periodic mirror-versus-source count comparison.
//!
//! Watches can drop events across connection resets without anyone noticing.
//! Once per interval each kind's mirrored row count is compared with the
//! number of live objects that would project; a mismatch forces a fresh
//! bootstrap through the registry.

use std::sync::{Arc, Weak};
use std::time::Duration;

use mirror_core::{Conditions, Error, LogResultExt, ResourceKind, Result};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::liveness::{ControllerState, StopSignal};
use crate::registry::Registry;
use crate::source::SourceProvider;

/// Result of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    InSync { count: usize },
    /// Counts differed and the kind was resynced.
    Diverged { mirror: usize, source: usize },
    /// The controller was not watching, so nothing was compared.
    Skipped { state: ControllerState },
}

/// Checks one kind on a fixed interval.
pub struct ConsistencyChecker<P: SourceProvider> {
    registry: Weak<Registry<P>>,
    kind: ResourceKind,
    interval: Duration,
}

impl<P: SourceProvider> ConsistencyChecker<P> {
    pub fn new(registry: &Arc<Registry<P>>, kind: ResourceKind) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            kind,
            interval: registry.config().consistency_interval,
        }
    }

    /// Compare counts once, resyncing the kind on a mismatch.
    ///
    /// # Errors
    ///
    /// `NotRunning` if the kind is no longer registered, `QueryFailed` if
    /// either count could not be taken.
    pub async fn check_once(&self) -> Result<CheckOutcome> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| Error::not_running(self.kind.as_str()))?;
        let controller = registry
            .lookup(self.kind)
            .await
            .ok_or_else(|| Error::not_running(self.kind.as_str()))?;

        let state = controller.state();
        if state != ControllerState::Watching {
            debug!(kind = %self.kind, state = %state, "Skipping consistency check");
            return Ok(CheckOutcome::Skipped { state });
        }

        let mirror = controller.count(&Conditions::new()).await?;
        let source = controller.source_count().await?;
        if mirror == source {
            debug!(kind = %self.kind, count = mirror, "Mirror in sync");
            return Ok(CheckOutcome::InSync { count: mirror });
        }

        warn!(kind = %self.kind, mirror, source, "Mirror diverged from source, resyncing");
        registry.resync(self.kind).await?;
        Ok(CheckOutcome::Diverged { mirror, source })
    }

    /// Check every interval until shutdown or until the registry is dropped.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut shutdown = StopSignal::new(shutdown);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = shutdown.stopped() => break,
            }
            if self.registry.strong_count() == 0 {
                break;
            }
            if let Some(outcome) = self.check_once().await.ok_logged("Consistency check failed") {
                debug!(kind = %self.kind, ?outcome, "Consistency check done");
            }
        }
        debug!(kind = %self.kind, "Consistency checker stopped");
    }
}
