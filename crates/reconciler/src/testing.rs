//! In-memory cluster sources for tests.
//!
//! [`InMemorySource`] keeps objects in a map and fans change events out to
//! every open watch. It versions each change, so a watch opened from a
//! listing's resource version replays whatever happened in between, the way
//! an API server does. Fault hooks break watches, fail listings, and mutate
//! objects without telling anyone.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use k8s_openapi::Metadata;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use mirror_adapters::ResourceAdapter;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::source::{EventStream, ObjectSource, SourceError, Snapshot, SourceProvider, WatchEvent};

const EVENT_BUFFER: usize = 1024;

type Item<K> = Result<WatchEvent<K>, SourceError>;

struct SourceState<K> {
    objects: BTreeMap<String, K>,
    version: u64,
    history: Vec<(u64, WatchEvent<K>)>,
    fail_list: bool,
    annotations: Vec<(String, String, String)>,
}

/// A fake API server for one kind.
pub struct InMemorySource<K> {
    state: Mutex<SourceState<K>>,
    events: broadcast::Sender<Item<K>>,
}

impl<K> Default for InMemorySource<K>
where
    K: Metadata<Ty = ObjectMeta> + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn object_key(meta: &ObjectMeta) -> String {
    match &meta.namespace {
        Some(ns) => format!("{ns}/{}", meta.name.as_deref().unwrap_or_default()),
        None => meta.name.clone().unwrap_or_default(),
    }
}

fn key_of(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    }
}

impl<K> InMemorySource<K>
where
    K: Metadata<Ty = ObjectMeta> + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Mutex::new(SourceState {
                objects: BTreeMap::new(),
                version: 0,
                history: Vec::new(),
                fail_list: false,
                annotations: Vec::new(),
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SourceState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut SourceState<K>, event: WatchEvent<K>) {
        state.version += 1;
        state.history.push((state.version, event.clone()));
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(Ok(event));
    }

    /// Create or replace an object, emitting `Added` or `Modified`.
    pub fn apply(&self, mut object: K) {
        let mut state = self.lock();
        let key = object_key(object.metadata());
        object.metadata_mut().resource_version = Some((state.version + 1).to_string());
        let event = if state.objects.insert(key, object.clone()).is_some() {
            WatchEvent::Modified(object)
        } else {
            WatchEvent::Added(object)
        };
        self.publish(&mut state, event);
    }

    /// Delete an object, emitting `Deleted`. Returns whether it existed.
    pub fn delete(&self, namespace: Option<&str>, name: &str) -> bool {
        let mut state = self.lock();
        match state.objects.remove(&key_of(namespace, name)) {
            Some(object) => {
                self.publish(&mut state, WatchEvent::Deleted(object));
                true
            }
            None => false,
        }
    }

    /// Create or replace an object without emitting an event.
    pub fn insert_silently(&self, object: K) {
        let key = object_key(object.metadata());
        self.lock().objects.insert(key, object);
    }

    /// Delete an object without emitting an event.
    pub fn remove_silently(&self, namespace: Option<&str>, name: &str) -> bool {
        self.lock()
            .objects
            .remove(&key_of(namespace, name))
            .is_some()
    }

    /// Fail every open watch with a transient error.
    pub fn break_watches(&self) {
        let _ = self
            .events
            .send(Err(SourceError::Transient("watch connection reset".to_string())));
    }

    /// Deliver an undecodable object to every open watch.
    pub fn send_malformed(&self, reason: &str) {
        let _ = self.events.send(Err(SourceError::Malformed(reason.to_string())));
    }

    /// Make `list` fail until turned off again.
    pub fn set_fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    pub fn watcher_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn get(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        self.lock().objects.get(&key_of(namespace, name)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Annotation writes received, as `(object key, annotation key, value)`.
    pub fn annotation_writes(&self) -> Vec<(String, String, String)> {
        self.lock().annotations.clone()
    }
}

#[async_trait]
impl<K> ObjectSource<K> for InMemorySource<K>
where
    K: Metadata<Ty = ObjectMeta> + Clone + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Snapshot<K>, SourceError> {
        let state = self.lock();
        if state.fail_list {
            return Err(SourceError::Transient("list refused".to_string()));
        }
        Ok(Snapshot {
            items: state.objects.values().cloned().collect(),
            resource_version: state.version.to_string(),
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<EventStream<K>, SourceError> {
        let since = resource_version.parse::<u64>().map_err(|_| {
            SourceError::Transient(format!("bad resource version '{resource_version}'"))
        })?;
        // Subscribe under the lock so no event falls between replay and live.
        let state = self.lock();
        let live = self.events.subscribe();
        let replay: Vec<Item<K>> = state
            .history
            .iter()
            .filter(|(version, _)| *version > since)
            .map(|(_, event)| Ok(event.clone()))
            .collect();
        drop(state);

        let live = stream::unfold(live, |mut rx| async move {
            match rx.recv().await {
                Ok(item) => Some((item, rx)),
                Err(RecvError::Lagged(missed)) => Some((
                    Err(SourceError::Transient(format!("watch lagged by {missed} events"))),
                    rx,
                )),
                Err(RecvError::Closed) => None,
            }
        });
        Ok(stream::iter(replay).chain(live).boxed())
    }

    async fn annotate(
        &self,
        namespace: Option<&str>,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SourceError> {
        let object_key = key_of(namespace, name);
        let mut object = self
            .lock()
            .objects
            .get(&object_key)
            .cloned()
            .ok_or_else(|| SourceError::Transient(format!("{object_key} not found")))?;
        object
            .metadata_mut()
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self.lock()
            .annotations
            .push((object_key, key.to_string(), value.to_string()));
        self.apply(object);
        Ok(())
    }
}

/// Hands out one shared [`InMemorySource`] per object type.
#[derive(Default)]
pub struct FakeProvider {
    sources: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The source backing adapter `A`, created on first use.
    pub fn source_for<A: ResourceAdapter>(&self) -> Arc<InMemorySource<A::Source>> {
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = sources
            .entry(TypeId::of::<A::Source>())
            .or_insert_with(|| {
                Arc::new(InMemorySource::<A::Source>::new()) as Arc<dyn Any + Send + Sync>
            });
        match Arc::clone(entry).downcast::<InMemorySource<A::Source>>() {
            Ok(source) => source,
            Err(_) => {
                let source = Arc::new(InMemorySource::<A::Source>::new());
                *entry = Arc::clone(&source) as Arc<dyn Any + Send + Sync>;
                source
            }
        }
    }
}

impl SourceProvider for FakeProvider {
    fn source<A: ResourceAdapter>(&self) -> Arc<dyn ObjectSource<A::Source>> {
        self.source_for::<A>()
    }
}
