//! Result type definition and logging combinators.
//!
//! Storage and source faults inside a controller are recovered locally: the
//! failure is logged and the worker moves on. These combinators keep that
//! pattern to a single call at each site.

use crate::error::Error;

/// The standard Result type for mirror operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for recovering from a failed operation by logging it.
pub trait LogResultExt<T, E> {
    /// Convert to an Option, logging the error at `warn` with some context.
    fn ok_logged(self, context: &str) -> Option<T>;

    /// Get the value or a default, logging the error at `warn`.
    fn or_default_logged(self, context: &str, default: T) -> T;

    /// Inspect the error without consuming the Result.
    fn inspect_error<F: FnOnce(&E)>(self, f: F) -> Self;
}

impl<T, E: std::fmt::Display> LogResultExt<T, E> for std::result::Result<T, E> {
    fn ok_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }

    fn or_default_logged(self, context: &str, default: T) -> T {
        self.ok_logged(context).unwrap_or(default)
    }

    fn inspect_error<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}
