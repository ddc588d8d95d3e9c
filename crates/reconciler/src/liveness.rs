//! Controller lifecycle signals.
//!
//! Each controller owns two watch channels. The stop channel carries the
//! request to wind down. The state channel publishes [`ControllerState`] and
//! doubles as the liveness signal: its sender lives inside the running loop
//! and is dropped when the loop exits, for any reason, which closes the
//! channel exactly once.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    NotStarted,
    Bootstrapping,
    Watching,
    /// The loop has exited, whether stopped, failed or panicked.
    Crashed,
}

impl ControllerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Bootstrapping => "bootstrapping",
            Self::Watching => "watching",
            Self::Crashed => "crashed",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer half of a controller's state channel.
#[derive(Debug, Clone)]
pub struct Liveness {
    rx: watch::Receiver<ControllerState>,
}

impl Liveness {
    pub(crate) const fn new(rx: watch::Receiver<ControllerState>) -> Self {
        Self { rx }
    }

    /// Last published state.
    pub fn state(&self) -> ControllerState {
        *self.rx.borrow()
    }

    /// Whether the controller's loop has exited.
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }

    /// Wait until the loop has exited.
    pub async fn closed(&mut self) {
        while self.rx.changed().await.is_ok() {}
    }

    /// Wait until the controller publishes `state`, or its loop exits.
    ///
    /// Returns whether `state` was reached.
    pub async fn reached(&mut self, state: ControllerState) -> bool {
        self.rx.wait_for(|s| *s == state).await.is_ok()
    }
}

/// Publisher half, held by the running loop.
///
/// Dropping the guard marks the controller `Crashed` and closes the channel.
pub(crate) struct LivenessGuard {
    tx: Option<watch::Sender<ControllerState>>,
}

impl LivenessGuard {
    pub(crate) const fn new(tx: watch::Sender<ControllerState>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn set(&self, state: ControllerState) {
        if let Some(tx) = &self.tx {
            tx.send_replace(state);
        }
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(ControllerState::Crashed);
        }
    }
}

/// Receiving side of a stop request.
#[derive(Debug, Clone)]
pub(crate) struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub(crate) const fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Resolve once stop is requested.
    pub(crate) async fn stopped(&mut self) {
        // Err means the sender is gone, which is also a stop.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
