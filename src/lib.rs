#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # kube-mirror
//!
//! Command-line front end for the mirror. The library half holds the CLI
//! definitions and command handlers so they can be tested without spawning
//! the binary.

pub mod cli;
pub mod commands;
