//! Per-kind list+watch controllers for the resource mirror.
//!
//! # Key Concepts
//!
//! ## Controllers
//!
//! One [`KindController`] per resource kind owns that kind's mirror table:
//! 1. Reset the table
//! 2. List every object and insert the projectable ones
//! 3. Watch from the listing's resource version and apply each event
//!
//! Its liveness closes exactly once when the loop exits, whatever the reason.
//!
//! ## Registry
//!
//! The [`Registry`] builds controllers from a closed match over
//! [`ResourceKind`], restarts any whose liveness closes, and resyncs a kind on
//! demand. [`ConsistencyChecker`] uses that to repair mirrors whose row count
//! drifted from the source.
//!
//! ## Queries
//!
//! [`QueryFacade`] parses condition and paging strings and dispatches to the
//! registered controller.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mirror_core::ResourceKind;
//! use mirror_reconciler::{QueryFacade, Registry, RegistryConfig, testing::FakeProvider};
//! use mirror_store::InMemoryMirrorStore;
//!
//! let registry = Registry::new(
//!     InMemoryMirrorStore::new_arc(),
//!     Arc::new(FakeProvider::new()),
//!     RegistryConfig::default(),
//! );
//! registry.run_all(&ResourceKind::ALL).await;
//! let page = QueryFacade::new(registry)
//!     .list_resource("deployments", "status=stopped", "page=1,limit=20")
//!     .await?;
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod consistency;
pub mod controller;
pub mod error;
pub mod facade;
pub mod kube_source;
pub mod liveness;
pub mod registry;
pub mod source;
pub mod testing;

pub use consistency::{CheckOutcome, ConsistencyChecker};
pub use controller::{KindController, MirrorController};
pub use error::ControllerError;
pub use facade::{ComponentReport, ComponentStatus, NamespaceUsage, QueryFacade, ResourceList};
pub use kube_source::{KubeProvider, KubeSource};
pub use liveness::{ControllerState, Liveness};
pub use registry::{ControllerStatus, Registry, RegistryConfig};
pub use source::{EventStream, ObjectSource, Snapshot, SourceError, SourceProvider, WatchEvent};
