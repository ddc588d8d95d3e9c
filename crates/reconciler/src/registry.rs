//! The controller supervisor.
//!
//! The registry owns `{kind -> controller}`. It builds controllers through a
//! closed match over [`ResourceKind`], starts them without waiting for their
//! bootstrap, and runs a supervising loop that replaces any controller whose
//! liveness has closed. It is constructed explicitly and shared by `Arc`; the
//! background loops hold only a weak reference, so dropping the last `Arc`
//! winds them down too.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use mirror_adapters::{
    ClusterRoleAdapter, ConfigMapAdapter, CronJobAdapter, DaemonSetAdapter, DeploymentAdapter,
    IngressAdapter, JobAdapter, NamespaceAdapter, NodeAdapter, PersistentVolumeClaimAdapter,
    PodAdapter, ReplicaSetAdapter, ResourceAdapter, RoleAdapter, RoleBindingAdapter,
    SecretAdapter, ServiceAdapter, StatefulSetAdapter, StorageClassAdapter,
};
use mirror_core::{Error, MirrorConfig, ResourceKind, Result};
use mirror_store::MirrorStore;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};

use crate::consistency::ConsistencyChecker;
use crate::controller::{KindController, MirrorController};
use crate::liveness::{ControllerState, StopSignal};
use crate::source::SourceProvider;

/// How long a stopped controller gets to exit before it is replaced anyway.
const STOP_GRACE: Duration = Duration::from_secs(30);

/// Registry timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How often the supervising loop checks liveness.
    pub poll_interval: Duration,
    /// How often each kind's mirror is compared with its source.
    pub consistency_interval: Duration,
    pub consistency_enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            consistency_interval: Duration::from_secs(30 * 60),
            consistency_enabled: true,
        }
    }
}

impl RegistryConfig {
    pub const fn from_config(config: &MirrorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            consistency_interval: config.consistency_interval(),
            consistency_enabled: config.consistency.enabled,
        }
    }

    /// Create a config for testing with shorter intervals.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            consistency_interval: Duration::from_millis(100),
            consistency_enabled: false,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_consistency(mut self, interval: Duration) -> Self {
        self.consistency_interval = interval;
        self.consistency_enabled = true;
        self
    }
}

/// What `states()` reports for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    /// Times the kind's controller was re-created.
    pub restarts: u32,
}

struct Entry {
    controller: Arc<dyn MirrorController>,
    restarts: u32,
}

/// Owns one running controller per registered kind.
pub struct Registry<P: SourceProvider> {
    store: Arc<dyn MirrorStore>,
    provider: Arc<P>,
    config: RegistryConfig,
    controllers: Mutex<HashMap<ResourceKind, Entry>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    supervising: AtomicBool,
}

impl<P: SourceProvider> Registry<P> {
    pub fn new(store: Arc<dyn MirrorStore>, provider: Arc<P>, config: RegistryConfig) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            store,
            provider,
            config,
            controllers: Mutex::new(HashMap::new()),
            shutdown_tx,
            tasks: StdMutex::new(Vec::new()),
            supervising: AtomicBool::new(false),
        })
    }

    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Build a fresh, unstarted controller for `kind`.
    fn build(&self, kind: ResourceKind) -> Arc<dyn MirrorController> {
        match kind {
            ResourceKind::Deployment => self.controller::<DeploymentAdapter>(),
            ResourceKind::StatefulSet => self.controller::<StatefulSetAdapter>(),
            ResourceKind::DaemonSet => self.controller::<DaemonSetAdapter>(),
            ResourceKind::ReplicaSet => self.controller::<ReplicaSetAdapter>(),
            ResourceKind::Job => self.controller::<JobAdapter>(),
            ResourceKind::CronJob => self.controller::<CronJobAdapter>(),
            ResourceKind::Pod => self.controller::<PodAdapter>(),
            ResourceKind::Service => self.controller::<ServiceAdapter>(),
            ResourceKind::Ingress => self.controller::<IngressAdapter>(),
            ResourceKind::PersistentVolumeClaim => {
                self.controller::<PersistentVolumeClaimAdapter>()
            }
            ResourceKind::StorageClass => self.controller::<StorageClassAdapter>(),
            ResourceKind::Namespace => self.controller::<NamespaceAdapter>(),
            ResourceKind::Node => self.controller::<NodeAdapter>(),
            ResourceKind::Secret => self.controller::<SecretAdapter>(),
            ResourceKind::ConfigMap => self.controller::<ConfigMapAdapter>(),
            ResourceKind::Role => self.controller::<RoleAdapter>(),
            ResourceKind::ClusterRole => self.controller::<ClusterRoleAdapter>(),
            ResourceKind::RoleBinding => self.controller::<RoleBindingAdapter>(),
        }
    }

    fn controller<A: ResourceAdapter>(&self) -> Arc<dyn MirrorController> {
        Arc::new(KindController::<A>::new(
            Arc::clone(&self.store),
            self.provider.source::<A>(),
        ))
    }

    fn spawn(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// Start a controller for every kind not already registered, then make
    /// sure the supervising loop and consistency checkers are running.
    ///
    /// Returns once the controllers are spawned; bootstrap happens in the
    /// background.
    pub async fn run_all(self: &Arc<Self>, kinds: &[ResourceKind]) {
        {
            let mut controllers = self.controllers.lock().await;
            for &kind in kinds {
                if controllers.contains_key(&kind) {
                    debug!(kind = %kind, "Kind already registered");
                    continue;
                }
                let controller = self.build(kind);
                controller.start();
                controllers.insert(
                    kind,
                    Entry {
                        controller,
                        restarts: 0,
                    },
                );
                if self.config.consistency_enabled {
                    let checker = ConsistencyChecker::new(self, kind);
                    self.spawn(tokio::spawn(checker.run(self.shutdown_tx.subscribe())));
                }
            }
        }

        if !self.supervising.swap(true, Ordering::SeqCst) {
            let supervisor = supervise(Arc::downgrade(self), self.shutdown_tx.subscribe());
            self.spawn(tokio::spawn(supervisor));
        }
        info!(kinds = kinds.len(), "Controllers started");
    }

    /// The controller currently serving `kind`.
    pub async fn lookup(&self, kind: ResourceKind) -> Option<Arc<dyn MirrorController>> {
        self.controllers
            .lock()
            .await
            .get(&kind)
            .map(|entry| Arc::clone(&entry.controller))
    }

    /// Registered kinds, in declaration order.
    pub async fn kinds(&self) -> Vec<ResourceKind> {
        let controllers = self.controllers.lock().await;
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| controllers.contains_key(kind))
            .collect()
    }

    /// State and restart count of every registered kind.
    pub async fn states(&self) -> BTreeMap<ResourceKind, ControllerStatus> {
        self.controllers
            .lock()
            .await
            .iter()
            .map(|(kind, entry)| {
                (
                    *kind,
                    ControllerStatus {
                        state: entry.controller.state(),
                        restarts: entry.restarts,
                    },
                )
            })
            .collect()
    }

    /// Stop `kind`'s controller, wait for it to exit, and replace it with a
    /// fresh one that bootstraps from scratch.
    ///
    /// The registry lock is not held while waiting, so lookups for every kind
    /// keep answering. If the supervising loop replaced the controller in the
    /// meantime, that replacement stands.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotRunning` if the kind is not registered.
    pub async fn resync(&self, kind: ResourceKind) -> Result<()> {
        let old = self
            .lookup(kind)
            .await
            .ok_or_else(|| Error::not_running(kind.as_str()))?;
        stop_and_wait(old.as_ref()).await;

        let mut controllers = self.controllers.lock().await;
        let entry = controllers
            .get_mut(&kind)
            .ok_or_else(|| Error::not_running(kind.as_str()))?;
        if !Arc::ptr_eq(&entry.controller, &old) {
            debug!(kind = %kind, "Controller already replaced during resync");
            return Ok(());
        }
        let fresh = self.build(kind);
        fresh.start();
        entry.controller = fresh;
        entry.restarts = entry.restarts.saturating_add(1);
        info!(kind = %kind, restarts = entry.restarts, "Controller resynced");
        Ok(())
    }

    /// Replace every controller whose loop has exited.
    async fn restart_closed(&self) {
        let mut controllers = self.controllers.lock().await;
        for (kind, entry) in controllers.iter_mut() {
            if !entry.controller.liveness().is_closed() {
                continue;
            }
            let fresh = self.build(*kind);
            fresh.start();
            entry.controller = fresh;
            entry.restarts = entry.restarts.saturating_add(1);
            warn!(kind = %kind, restarts = entry.restarts, "Controller exited, restarted");
        }
    }

    /// Stop the supervising loop, the checkers and every controller.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        let controllers: Vec<Arc<dyn MirrorController>> = self
            .controllers
            .lock()
            .await
            .drain()
            .map(|(_, entry)| entry.controller)
            .collect();
        for controller in &controllers {
            controller.stop();
        }
        for controller in &controllers {
            let mut liveness = controller.liveness();
            if timeout(STOP_GRACE, liveness.closed()).await.is_err() {
                warn!(kind = %controller.kind(), "Controller did not stop in time");
            }
        }
        info!(controllers = controllers.len(), "Registry shut down");
    }
}

async fn stop_and_wait(controller: &dyn MirrorController) {
    controller.stop();
    let mut liveness = controller.liveness();
    if timeout(STOP_GRACE, liveness.closed()).await.is_err() {
        warn!(kind = %controller.kind(), "Controller did not stop in time, replacing anyway");
    }
}

/// Poll liveness every `poll_interval` until shutdown or the registry is gone.
async fn supervise<P: SourceProvider>(registry: Weak<Registry<P>>, shutdown: watch::Receiver<bool>) {
    let mut shutdown = StopSignal::new(shutdown);
    let Some(period) = registry.upgrade().map(|r| r.config.poll_interval) else {
        return;
    };
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown.stopped() => break,
        }
        let Some(live) = registry.upgrade() else {
            break;
        };
        live.restart_closed().await;
    }
    debug!("Supervising loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;
    use mirror_store::InMemoryMirrorStore;

    #[tokio::test]
    async fn test_every_kind_builds_a_matching_controller() {
        let registry = Registry::new(
            InMemoryMirrorStore::new_arc(),
            Arc::new(FakeProvider::new()),
            RegistryConfig::for_testing(),
        );
        for kind in ResourceKind::ALL {
            let controller = registry.build(kind);
            assert_eq!(controller.kind(), kind);
            assert_eq!(controller.state(), ControllerState::NotStarted);
        }
    }

    #[tokio::test]
    async fn test_resync_of_unregistered_kind_is_not_running() {
        let registry = Registry::new(
            InMemoryMirrorStore::new_arc(),
            Arc::new(FakeProvider::new()),
            RegistryConfig::for_testing(),
        );
        let result = registry.resync(ResourceKind::Pod).await;
        assert_eq!(result, Err(Error::not_running("pods")));
        assert!(registry.lookup(ResourceKind::Pod).await.is_none());
    }

    #[tokio::test]
    async fn test_run_all_registers_kinds_once() {
        let registry = Registry::new(
            InMemoryMirrorStore::new_arc(),
            Arc::new(FakeProvider::new()),
            RegistryConfig::for_testing(),
        );
        registry
            .run_all(&[ResourceKind::Node, ResourceKind::Namespace])
            .await;
        registry.run_all(&[ResourceKind::Node]).await;
        assert_eq!(
            registry.kinds().await,
            vec![ResourceKind::Namespace, ResourceKind::Node]
        );
        registry.shutdown().await;
        assert!(registry.states().await.is_empty());
    }
}
