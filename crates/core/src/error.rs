//! Core error types for mirror operations.
//!
//! These are the only errors a query caller ever sees. Internal watch and
//! storage fault detail is logged where it happens and never carried here.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for mirror operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Query errors
    #[error("unknown resource kind '{kind}'")]
    UnknownKind { kind: String },

    #[error("resource kind '{kind}' is not running")]
    NotRunning { kind: String },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("query against '{kind}' failed")]
    QueryFailed { kind: String },

    // Configuration errors
    #[error("failed to read config file '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create an unknown kind error.
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Create a not running error.
    pub fn not_running(kind: impl Into<String>) -> Self {
        Self::NotRunning { kind: kind.into() }
    }

    /// Create an invalid query error.
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }

    /// Create a query failed error.
    pub fn query_failed(kind: impl Into<String>) -> Self {
        Self::QueryFailed { kind: kind.into() }
    }

    /// Create a config read error.
    pub fn config_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether the caller supplied something malformed, as opposed to a
    /// failure inside the mirror.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::UnknownKind { .. } | Self::InvalidQuery { .. })
    }
}
