//! # Mirror Core
//!
//! Shared vocabulary for the kube-mirror crates: the closed set of resource
//! kinds, query predicates, configuration and the caller-facing error type.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
mod error;
pub mod kind;
pub mod query;
mod result;

pub use config::MirrorConfig;
pub use error::Error;
pub use kind::{META_COLUMNS, ResourceKind};
pub use query::{Conditions, Order, OrderField, PageQuery, PageRequest, Paging};
pub use result::{LogResultExt, Result};
