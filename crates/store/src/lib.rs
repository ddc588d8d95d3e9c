//! # Mirror Store
//!
//! Per-kind mirror tables. Each table holds one denormalized row per live
//! cluster object and answers equality-filtered, ordered, paged queries.
//!
//! Two backends share the [`MirrorStore`] trait: [`SurrealMirrorStore`] for
//! real deployments and [`InMemoryMirrorStore`] for tests.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

mod error;
pub mod health;
pub mod row;
pub mod spec;
mod store;
pub mod surreal;
pub mod testing;

pub use error::{StoreError, StoreResult, from_surrealdb_error};
pub use health::{HealthConfig, StorageHealthMonitor, StorageOutage};
pub use row::{MirrorRow, RowKey, StoredRow};
pub use spec::RowSpec;
pub use store::{InMemoryMirrorStore, MirrorStore, compare_rows};
pub use surreal::{StoreConfig, SurrealMirrorStore};
