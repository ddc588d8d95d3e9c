//! CLI command handlers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mirror_core::{META_COLUMNS, MirrorConfig, ResourceKind};
use mirror_reconciler::{ControllerState, KubeProvider, QueryFacade, Registry, RegistryConfig};
use mirror_store::{
    HealthConfig, InMemoryMirrorStore, MirrorStore, StorageHealthMonitor, StorageOutage,
    StoreConfig, SurrealMirrorStore,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cli::Commands;

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run {
            config,
            kinds,
            store_url,
        } => {
            let config = load_config(&config, kinds.as_deref(), store_url.as_deref())?;
            cmd_run(config).await
        }
        Commands::Query {
            kind,
            conditions,
            page,
            timeout_secs,
        } => cmd_query(&kind, &conditions, &page, Duration::from_secs(timeout_secs)).await,
        Commands::Kinds => {
            print!("{}", kinds_table());
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckConfig { config } => {
            let config = load_config(&config, None, None)?;
            let kinds = config.resolved_kinds()?;
            println!(
                "config ok: store {} ({}/{}), {} kinds",
                config.store.url,
                config.store.namespace,
                config.store.database,
                kinds.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load a config file and apply command-line overrides.
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, or if the result is invalid.
pub fn load_config(
    path: &Path,
    kinds: Option<&str>,
    store_url: Option<&str>,
) -> Result<MirrorConfig> {
    let mut config = MirrorConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if let Some(list) = kinds {
        config.override_kinds(list);
    }
    if let Some(url) = store_url {
        config.store.url = url.to_string();
    }
    config.validate().context("Invalid configuration after overrides")?;
    Ok(config)
}

pub fn health_config(config: &MirrorConfig) -> HealthConfig {
    HealthConfig::default()
        .with_check_interval(config.health_interval())
        .with_max_failures(config.health.max_failures)
}

/// One line per kind: name, scope and filter columns.
pub fn kinds_table() -> String {
    ResourceKind::ALL
        .into_iter()
        .map(|kind| {
            let scope = if kind.is_namespaced() {
                "namespaced"
            } else {
                "cluster"
            };
            let columns: Vec<&str> = META_COLUMNS
                .into_iter()
                .chain(kind.columns().iter().copied())
                .collect();
            format!("{:<24} {:<11} {}\n", kind.as_str(), scope, columns.join(","))
        })
        .collect()
}

enum Ended {
    Interrupted,
    Outage(StorageOutage),
    MonitorStopped,
}

/// Mirror every configured kind until Ctrl+C or a sustained storage outage.
///
/// Returns exit code 1 after an outage.
async fn cmd_run(config: MirrorConfig) -> Result<ExitCode> {
    let kinds = config.resolved_kinds()?;

    let store: Arc<dyn MirrorStore> = Arc::new(
        SurrealMirrorStore::connect(&StoreConfig::from_settings(&config.store))
            .await
            .with_context(|| format!("Failed to connect to store at {}", config.store.url))?,
    );
    store.ping().await.context("Store health check failed")?;
    info!(url = %config.store.url, "Store connected");

    let client = kube::Client::try_default()
        .await
        .context("Failed to build cluster client")?;
    let registry = Registry::new(
        Arc::clone(&store),
        Arc::new(KubeProvider::new(client)),
        RegistryConfig::from_config(&config),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut health: JoinHandle<Result<(), StorageOutage>> = tokio::spawn(
        StorageHealthMonitor::new(Arc::clone(&store), health_config(&config)).run(stop_rx),
    );

    registry.run_all(&kinds).await;
    info!(kinds = kinds.len(), "Mirror running. Press Ctrl+C to stop.");

    let ended = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            Ended::Interrupted
        }
        joined = &mut health => match joined {
            Ok(Err(outage)) => Ended::Outage(outage),
            Ok(Ok(())) => Ended::MonitorStopped,
            Err(e) => {
                warn!(error = %e, "Storage health monitor ended abnormally");
                Ended::MonitorStopped
            }
        },
    };

    stop_tx.send_replace(true);
    registry.shutdown().await;

    match ended {
        Ended::Interrupted => {
            if let Err(e) = health.await {
                warn!(error = %e, "Storage health monitor ended abnormally");
            }
            info!("Mirror stopped");
            Ok(ExitCode::SUCCESS)
        }
        Ended::Outage(outage) => {
            error!(%outage, "Exiting after storage outage");
            Ok(ExitCode::FAILURE)
        }
        Ended::MonitorStopped => {
            warn!("Storage health monitor stopped early");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Mirror `kind` into a private in-memory store, answer one query, exit.
async fn cmd_query(kind: &str, conditions: &str, page: &str, wait: Duration) -> Result<ExitCode> {
    let resource: ResourceKind = kind.parse()?;
    let client = kube::Client::try_default()
        .await
        .context("Failed to build cluster client")?;
    let registry = Registry::new(
        InMemoryMirrorStore::new_arc(),
        Arc::new(KubeProvider::new(client)),
        RegistryConfig::default(),
    );
    registry.run_all(&[resource]).await;

    let Some(controller) = registry.lookup(resource).await else {
        bail!("{resource} controller was not registered");
    };
    let mut liveness = controller.liveness();
    let bootstrapped = tokio::time::timeout(wait, liveness.reached(ControllerState::Watching))
        .await
        .unwrap_or(false);
    if !bootstrapped {
        registry.shutdown().await;
        bail!("{resource} did not finish bootstrapping within {wait:?}");
    }

    let result = QueryFacade::new(Arc::clone(&registry))
        .list_resource(kind, conditions, page)
        .await;
    registry.shutdown().await;

    match result {
        Ok(list) => {
            println!("{}", serde_json::to_string_pretty(&list)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(ExitCode::from(query_failure_code(&e)))
        }
    }
}

/// Exit status for a failed query: 2 when the request itself was malformed,
/// 1 when the mirror failed to answer it.
const fn query_failure_code(err: &mirror_core::Error) -> u8 {
    if err.is_caller_error() { 2 } else { 1 }
}
