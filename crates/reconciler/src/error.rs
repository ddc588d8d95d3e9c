//! Error types for the reconciler crate.
//!
//! A [`ControllerError`] explains why a controller's loop ended. It is logged
//! by the controller and acted on by the registry, never returned to query
//! callers, which only ever see [`mirror_core::Error`].

use std::fmt;

use mirror_core::ResourceKind;

use crate::source::SourceError;

/// Why a controller loop stopped running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// The kind's table could not be reset before bootstrap.
    ResetFailed { kind: ResourceKind, reason: String },
    /// The initial listing failed.
    ListFailed { kind: ResourceKind, reason: String },
    /// The watch could not be opened or reported a fault.
    WatchFailed { kind: ResourceKind, reason: String },
    /// The event stream ended.
    StreamClosed { kind: ResourceKind },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResetFailed { kind, reason } => {
                write!(f, "resetting the {kind} table failed: {reason}")
            }
            Self::ListFailed { kind, reason } => {
                write!(f, "listing {kind} failed: {reason}")
            }
            Self::WatchFailed { kind, reason } => {
                write!(f, "watching {kind} failed: {reason}")
            }
            Self::StreamClosed { kind } => {
                write!(f, "{kind} event stream closed")
            }
        }
    }
}

impl std::error::Error for ControllerError {}

impl ControllerError {
    /// Create a reset failed error.
    pub fn reset_failed(kind: ResourceKind, reason: impl fmt::Display) -> Self {
        Self::ResetFailed {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Create a list failed error.
    pub fn list_failed(kind: ResourceKind, reason: &SourceError) -> Self {
        Self::ListFailed {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Create a watch failed error.
    pub fn watch_failed(kind: ResourceKind, reason: &SourceError) -> Self {
        Self::WatchFailed {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Create a stream closed error.
    pub const fn stream_closed(kind: ResourceKind) -> Self {
        Self::StreamClosed { kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ControllerError::list_failed(
            ResourceKind::Pod,
            &SourceError::Transient("connection reset".to_string()),
        );
        assert!(err.to_string().contains("pods"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_stream_closed_names_kind() {
        let err = ControllerError::stream_closed(ResourceKind::Job);
        assert_eq!(err.to_string(), "jobs event stream closed");
    }
}
