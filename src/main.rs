//! # kube-mirror
//!
//! Entry point. `run` brings the mirror up in this order:
//!
//! 1. **Store** - connect to SurrealDB and ping it
//! 2. **Cluster client** - from kubeconfig or the in-cluster environment
//! 3. **Registry** - one controller per configured kind, plus the supervisor
//!    and consistency checkers
//! 4. **Storage health monitor** - a sustained outage ends the process with
//!    exit code 1
//!
//! Ctrl+C stops every controller and background loop before exit.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use kube_mirror::cli::Cli;
use kube_mirror::commands::execute_command;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    execute_command(cli.command).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
