//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// kube-mirror - queryable relational mirror of cluster resources
#[derive(Parser, Debug)]
#[command(name = "kube-mirror")]
#[command(version)]
#[command(about = "Mirror Kubernetes resources into relational tables kept current by list+watch")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror the configured kinds until interrupted
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Comma-separated kinds, replacing the configured list
        #[arg(long)]
        kinds: Option<String>,

        /// Store URL, replacing `store.url`
        #[arg(long)]
        store_url: Option<String>,
    },

    /// Bootstrap one kind into a scratch mirror and print a query result
    Query {
        /// Kind name, e.g. `deployments` or `pods`
        kind: String,

        /// Conditions as `key=value,...`
        #[arg(short = 'w', long = "where", default_value = "")]
        conditions: String,

        /// Paging as `page=<n>,limit=<n>[,order=<field>][,desc=<bool>]`
        #[arg(short, long, default_value = "")]
        page: String,

        /// Seconds to wait for the bootstrap to finish
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },

    /// List supported kinds and their filter columns
    Kinds,

    /// Validate a configuration file
    CheckConfig {
        /// TOML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}
