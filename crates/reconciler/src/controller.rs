//! Per-kind controllers.
//!
//! A controller owns exactly one mirror table. Its loop resets the table,
//! lists the kind, inserts every projectable object, then applies watch
//! events from the listing's resource version onward. Storage faults on a
//! single row are logged and skipped; source faults end the loop, and the
//! registry's restart is the retry.

use std::any::Any;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use mirror_adapters::ResourceAdapter;
use mirror_core::{Conditions, Error, LogResultExt, Order, Paging, ResourceKind, Result};
use mirror_store::{MirrorRow, MirrorStore, RowKey, StoreError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::ControllerError;
use crate::liveness::{ControllerState, Liveness, LivenessGuard, StopSignal};
use crate::source::{ObjectSource, SourceError, WatchEvent};

/// Object-safe face of a controller, whatever its adapter.
#[async_trait]
pub trait MirrorController: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Spawn the bootstrap and watch loop. Returns without waiting for
    /// bootstrap. A controller runs at most once; later calls return `false`.
    fn start(&self) -> bool;

    /// Ask the loop to wind down. Idempotent.
    fn stop(&self);

    fn state(&self) -> ControllerState;

    /// Signal that closes when the loop exits.
    fn liveness(&self) -> Liveness;

    /// Count mirrored rows matching `conditions`.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for a column the kind lacks, `QueryFailed` when the
    /// store cannot answer.
    async fn count(&self, conditions: &Conditions) -> Result<usize>;

    /// List mirrored rows matching `conditions`, with the total match count.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for a column the kind lacks, `QueryFailed` when the
    /// store cannot answer.
    async fn list(
        &self,
        conditions: &Conditions,
        paging: Option<Paging>,
        order: Order,
    ) -> Result<(usize, Vec<MirrorRow>)>;

    /// Count the live objects of the kind that would be mirrored.
    ///
    /// # Errors
    ///
    /// `QueryFailed` when the source cannot be listed.
    async fn source_count(&self) -> Result<usize>;
}

/// The controller for adapter `A`'s kind.
pub struct KindController<A: ResourceAdapter> {
    store: Arc<dyn MirrorStore>,
    source: Arc<dyn ObjectSource<A::Source>>,
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<ControllerState>,
    /// State sender, moved into the loop on start.
    pending: Mutex<Option<watch::Sender<ControllerState>>>,
    adapter: PhantomData<fn() -> A>,
}

impl<A: ResourceAdapter> KindController<A> {
    pub fn new(store: Arc<dyn MirrorStore>, source: Arc<dyn ObjectSource<A::Source>>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(ControllerState::NotStarted);
        Self {
            store,
            source,
            stop_tx,
            state_rx,
            pending: Mutex::new(Some(state_tx)),
            adapter: PhantomData,
        }
    }

    fn take_sender(&self) -> Option<watch::Sender<ControllerState>> {
        match self.pending.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn prepare(conditions: &Conditions) -> Result<Conditions> {
        let conditions = conditions.clone().normalized_for(A::KIND);
        conditions.validate_for(A::KIND)?;
        Ok(conditions)
    }

    fn query_failed(err: &StoreError) -> Error {
        warn!(kind = %A::KIND, error = %err, "Mirror query failed");
        Error::query_failed(A::KIND.as_str())
    }
}

#[async_trait]
impl<A: ResourceAdapter> MirrorController for KindController<A> {
    fn kind(&self) -> ResourceKind {
        A::KIND
    }

    fn start(&self) -> bool {
        let Some(state_tx) = self.take_sender() else {
            warn!(kind = %A::KIND, "Controller already started");
            return false;
        };
        let worker = Worker::<A> {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            guard: LivenessGuard::new(state_tx),
            adapter: PhantomData,
        };
        tokio::spawn(worker.run(StopSignal::new(self.stop_tx.subscribe())));
        debug!(kind = %A::KIND, "Controller started");
        true
    }

    fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    fn state(&self) -> ControllerState {
        *self.state_rx.borrow()
    }

    fn liveness(&self) -> Liveness {
        Liveness::new(self.state_rx.clone())
    }

    async fn count(&self, conditions: &Conditions) -> Result<usize> {
        let conditions = Self::prepare(conditions)?;
        self.store
            .count(A::KIND, &conditions)
            .await
            .map_err(|e| Self::query_failed(&e))
    }

    async fn list(
        &self,
        conditions: &Conditions,
        paging: Option<Paging>,
        order: Order,
    ) -> Result<(usize, Vec<MirrorRow>)> {
        let conditions = Self::prepare(conditions)?;
        self.store
            .list(A::KIND, &conditions, paging, order)
            .await
            .map_err(|e| Self::query_failed(&e))
    }

    async fn source_count(&self) -> Result<usize> {
        let snapshot = self.source.list().await.map_err(|e| {
            warn!(kind = %A::KIND, error = %e, "Listing source for count failed");
            Error::query_failed(A::KIND.as_str())
        })?;
        Ok(snapshot
            .items
            .iter()
            .filter(|object| A::project(object).is_some())
            .count())
    }
}

/// The running loop. Dropping it closes the controller's liveness.
struct Worker<A: ResourceAdapter> {
    store: Arc<dyn MirrorStore>,
    source: Arc<dyn ObjectSource<A::Source>>,
    guard: LivenessGuard,
    adapter: PhantomData<fn() -> A>,
}

impl<A: ResourceAdapter> Worker<A> {
    /// Run until the loop fails or `stop` fires. A stop abandons whatever
    /// store or source call is in flight, so no write lands once the
    /// controller's liveness has closed.
    async fn run(self, mut stop: StopSignal) {
        let kind = A::KIND;
        let outcome = tokio::select! {
            biased;
            () = stop.stopped() => None,
            outcome = AssertUnwindSafe(self.mirror()).catch_unwind() => Some(outcome),
        };
        match outcome {
            None => info!(kind = %kind, "Controller stopped"),
            Some(Ok(Ok(never))) => match never {},
            Some(Ok(Err(e))) => warn!(kind = %kind, error = %e, "Controller loop ended"),
            Some(Err(payload)) => {
                error!(kind = %kind, panic = %panic_message(&*payload), "Controller panicked");
            }
        }
    }

    async fn mirror(&self) -> std::result::Result<Infallible, ControllerError> {
        let kind = A::KIND;
        self.guard.set(ControllerState::Bootstrapping);

        self.store
            .reset(kind)
            .await
            .map_err(|e| ControllerError::reset_failed(kind, e))?;
        let snapshot = self
            .source
            .list()
            .await
            .map_err(|e| ControllerError::list_failed(kind, &e))?;

        let mut mirrored = 0_usize;
        for object in &snapshot.items {
            if self.added(object).await {
                mirrored += 1;
            }
            self.write_back(object).await;
        }

        let mut events = self
            .source
            .watch(&snapshot.resource_version)
            .await
            .map_err(|e| ControllerError::watch_failed(kind, &e))?;
        self.guard.set(ControllerState::Watching);
        info!(
            kind = %kind,
            listed = snapshot.items.len(),
            mirrored,
            resource_version = %snapshot.resource_version,
            "Bootstrap complete, watching"
        );

        loop {
            match events.next().await {
                Some(Ok(event)) => self.apply(event).await,
                Some(Err(SourceError::Malformed(reason))) => {
                    warn!(kind = %kind, reason = %reason, "Skipping malformed event");
                }
                Some(Err(e)) => return Err(ControllerError::watch_failed(kind, &e)),
                None => return Err(ControllerError::stream_closed(kind)),
            }
        }
    }

    async fn apply(&self, event: WatchEvent<A::Source>) {
        match event {
            WatchEvent::Added(object) => {
                self.added(&object).await;
                self.write_back(&object).await;
            }
            WatchEvent::Modified(object) => {
                self.modified(&object).await;
                self.write_back(&object).await;
            }
            WatchEvent::Deleted(object) => self.deleted(&object).await,
        }
    }

    /// Insert a new object's row. Returns whether a row was written.
    async fn added(&self, object: &A::Source) -> bool {
        let Some(row) = A::project(object) else {
            debug!(kind = %A::KIND, key = ?A::key_of(object), "Object not mirrored");
            return false;
        };
        match self.store.insert(&row).await {
            Ok(()) => true,
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(kind = %A::KIND, key = %row.key, "Row already mirrored, replacing");
                self.store
                    .upsert(&row)
                    .await
                    .ok_logged("Failed to replace mirror row")
                    .is_some()
            }
            Err(e) => {
                warn!(kind = %A::KIND, key = %row.key, error = %e, "Failed to insert mirror row");
                false
            }
        }
    }

    async fn modified(&self, object: &A::Source) {
        match A::project(object) {
            Some(row) => {
                if let Err(e) = self.store.upsert(&row).await {
                    warn!(kind = %A::KIND, key = %row.key, error = %e, "Failed to update mirror row");
                }
            }
            // No longer projectable: whatever was mirrored for it goes.
            None => {
                if let Some(key) = A::key_of(object) {
                    self.remove(&key).await;
                }
            }
        }
    }

    async fn deleted(&self, object: &A::Source) {
        match A::key_of(object) {
            Some(key) => self.remove(&key).await,
            None => warn!(kind = %A::KIND, "Deleted object has no name"),
        }
    }

    async fn remove(&self, key: &RowKey) {
        match self.store.remove(A::KIND, key).await {
            Ok(true) => {}
            Ok(false) => debug!(kind = %A::KIND, key = %key, "Row already absent"),
            Err(e) => warn!(kind = %A::KIND, key = %key, error = %e, "Failed to remove mirror row"),
        }
    }

    async fn write_back(&self, object: &A::Source) {
        let Some(patch) = A::annotation_update(object) else {
            return;
        };
        let Some(key) = A::key_of(object) else {
            return;
        };
        let result = self
            .source
            .annotate(key.namespace.as_deref(), &key.name, &patch.key, &patch.value)
            .await;
        match result {
            Ok(()) => debug!(kind = %A::KIND, key = %key, annotation = %patch.key, "Annotation written"),
            Err(e) => warn!(kind = %A::KIND, key = %key, error = %e, "Failed to write annotation"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use crate::testing::InMemorySource;
    use k8s_openapi::api::core::v1::ConfigMap;
    use mirror_adapters::ConfigMapAdapter;
    use mirror_store::InMemoryMirrorStore;
    use serde_json::json;

    fn config_map(name: &str) -> std::result::Result<ConfigMap, serde_json::Error> {
        serde_json::from_value(json!({
            "metadata": {"name": name, "namespace": "shop", "uid": format!("uid-{name}")},
            "data": {"k": "v"}
        }))
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMirrorStore::new_arc();
        let source = Arc::new(InMemorySource::<ConfigMap>::new());
        source.apply(config_map("a")?);

        let controller = KindController::<ConfigMapAdapter>::new(store, source);
        assert_eq!(controller.state(), ControllerState::NotStarted);
        assert!(controller.start());
        assert!(!controller.start());

        let mut liveness = controller.liveness();
        assert!(liveness.reached(ControllerState::Watching).await);
        controller.stop();
        liveness.closed().await;
        assert_eq!(controller.state(), ControllerState::Crashed);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_column_is_invalid_query() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let controller = KindController::<ConfigMapAdapter>::new(
            InMemoryMirrorStore::new_arc(),
            Arc::new(InMemorySource::<ConfigMap>::new()),
        );
        let err = controller
            .count(&Conditions::new().with("node", "n1"))
            .await
            .err()
            .ok_or("expected an error")?;
        assert!(matches!(err, Error::InvalidQuery { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_store_fault_is_query_failed() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryMirrorStore::new_arc();
        store.set_available(false);
        let controller = KindController::<ConfigMapAdapter>::new(
            store,
            Arc::new(InMemorySource::<ConfigMap>::new()),
        );
        let err = controller
            .list(&Conditions::new(), None, Order::default())
            .await
            .err()
            .ok_or("expected an error")?;
        assert_eq!(err, Error::query_failed("configmaps"));
        Ok(())
    }

    #[test]
    fn test_panic_message_from_str_and_string() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new("bang".to_string());
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*literal), "boom");
        assert_eq!(panic_message(&*owned), "bang");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
