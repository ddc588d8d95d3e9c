//! Store error types.
//!
//! All errors are explicit and typed. None of them cross the query boundary:
//! controllers log them and hand callers a plain "query failed".

use thiserror::Error;

/// Errors that can occur during mirror store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Failed to connect to the database
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Query execution failed
    #[error("query failed: {reason}")]
    QueryFailed { reason: String },

    /// A row with this key is already mirrored
    #[error("row already exists: {key}")]
    AlreadyExists { key: String },

    /// Row encoding or decoding failed
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },

    /// Table reset failed
    #[error("schema error: {reason}")]
    SchemaError { reason: String },

    /// Timeout waiting for operation
    #[error("operation timed out")]
    Timeout,
}

impl StoreError {
    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a query failed error.
    pub fn query_failed(reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            reason: reason.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create a serialization error.
    pub fn serialization_error(reason: impl Into<String>) -> Self {
        Self::SerializationError {
            reason: reason.into(),
        }
    }

    /// Create a schema error.
    pub fn schema_error(reason: impl Into<String>) -> Self {
        Self::SchemaError {
            reason: reason.into(),
        }
    }

    /// Whether the failure is about reaching the store at all.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Classify a SurrealDB error.
///
/// Database errors are matched on their variant. Only client-side API
/// errors fall back to reading the message, because record ids (and so
/// object names) show up in database error text.
pub fn from_surrealdb_error(err: surrealdb::Error) -> StoreError {
    use surrealdb::error::Db;

    match &err {
        surrealdb::Error::Db(db) => match db {
            Db::RecordExists { .. } | Db::IndexExists { .. } => {
                StoreError::already_exists(err.to_string())
            }
            Db::QueryTimedout { .. } => StoreError::Timeout,
            _ => StoreError::query_failed(err.to_string()),
        },
        _ => classify_message(&err.to_string()),
    }
}

const CONNECTION_PHRASES: [&str; 5] = [
    "connection refused",
    "connection reset",
    "connection closed",
    "failed to connect",
    "not connected",
];

/// Classify an error that only comes with a message.
///
/// "already exists" is checked first: Kubernetes names cannot contain
/// spaces, so no object name can fake that phrase.
fn classify_message(msg: &str) -> StoreError {
    let lower = msg.to_ascii_lowercase();
    if lower.contains("already exists") {
        StoreError::already_exists(msg)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        StoreError::Timeout
    } else if CONNECTION_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        StoreError::connection_failed(msg)
    } else {
        StoreError::query_failed(msg)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_classified() {
        let err = classify_message("Database record `mirror_pods:x` already exists");
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_already_exists_wins_over_words_in_the_record_id() {
        for name in ["timeout-runner", "kafka-connect", "connection-pool"] {
            let err = classify_message(&format!(
                "There was a problem with the database: Database record `mirror_pods:⟨default/{name}⟩` already exists"
            ));
            assert!(matches!(err, StoreError::AlreadyExists { .. }), "{name}: {err:?}");
        }
    }

    #[test]
    fn test_connection_classified() {
        let err = classify_message("Connection refused (os error 111)");
        assert!(matches!(err, StoreError::ConnectionFailed { .. }));
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_timeout_classified() {
        assert_eq!(classify_message("request timed out"), StoreError::Timeout);
    }

    #[test]
    fn test_other_is_query_failed() {
        let err = classify_message("Parse error near `kafka-connect`");
        assert_eq!(err.to_string(), "query failed: Parse error near `kafka-connect`");
    }
}
