//! Command-line parsing and config loading.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::io::Write;

use clap::Parser;
use kube_mirror::cli::{Cli, Commands};
use kube_mirror::commands::load_config;
use mirror_core::ResourceKind;

fn config_file(content: &str) -> Result<tempfile::NamedTempFile, Box<dyn std::error::Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn test_run_parses_overrides() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::try_parse_from([
        "kube-mirror",
        "run",
        "--config",
        "mirror.toml",
        "--kinds",
        "pods,nodes",
        "--store-url",
        "ws://db:8000",
    ])?;
    match cli.command {
        Commands::Run {
            config,
            kinds,
            store_url,
        } => {
            assert_eq!(config.to_str(), Some("mirror.toml"));
            assert_eq!(kinds.as_deref(), Some("pods,nodes"));
            assert_eq!(store_url.as_deref(), Some("ws://db:8000"));
        }
        other => return Err(format!("unexpected command {other:?}").into()),
    }
    Ok(())
}

#[test]
fn test_query_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::try_parse_from(["kube-mirror", "query", "deployments", "-w", "status=stopped"])?;
    match cli.command {
        Commands::Query {
            kind,
            conditions,
            page,
            timeout_secs,
        } => {
            assert_eq!(kind, "deployments");
            assert_eq!(conditions, "status=stopped");
            assert!(page.is_empty());
            assert_eq!(timeout_secs, 60);
        }
        other => return Err(format!("unexpected command {other:?}").into()),
    }
    Ok(())
}

#[test]
fn test_run_requires_config() {
    assert!(Cli::try_parse_from(["kube-mirror", "run"]).is_err());
}

#[test]
fn test_load_config_applies_overrides() -> Result<(), Box<dyn std::error::Error>> {
    // GIVEN: a config mirroring everything into memory
    let file = config_file("[store]\nurl = \"mem://\"\n")?;

    // WHEN: loading with a kind list and store URL override
    let config = load_config(file.path(), Some("nodes, pods,pods"), Some("ws://db:8000"))?;

    // THEN: kinds come back deduplicated in start-up order
    assert_eq!(config.store.url, "ws://db:8000");
    assert_eq!(
        config.resolved_kinds()?,
        vec![ResourceKind::Pod, ResourceKind::Node]
    );
    Ok(())
}

#[test]
fn test_load_config_rejects_unknown_kind_override() -> Result<(), Box<dyn std::error::Error>> {
    let file = config_file("")?;
    let result = load_config(file.path(), Some("pods,widgets"), None);
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_load_config_reports_missing_file() {
    let result = load_config(std::path::Path::new("/nonexistent/mirror.toml"), None, None);
    let message = result.err().map(|e| format!("{e:#}")).unwrap_or_default();
    assert!(message.contains("Failed to load config"), "{message}");
}
