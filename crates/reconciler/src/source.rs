//! Where controllers read cluster objects from.
//!
//! An [`ObjectSource`] lists one kind, watches it from a resource version and
//! writes annotations back. A [`SourceProvider`] hands out one source per
//! adapter, so the registry can build every controller the same way whether
//! it talks to a live API server or to the in-memory fake.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mirror_adapters::ResourceAdapter;
use thiserror::Error;

/// A change to one object, as seen by a watch.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
}

/// Every object of a kind plus the version the listing was taken at.
#[derive(Debug, Clone)]
pub struct Snapshot<K> {
    pub items: Vec<K>,
    pub resource_version: String,
}

/// Faults reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The call or the stream failed; retrying later may succeed.
    #[error("transient source error: {0}")]
    Transient(String),

    /// One object could not be decoded. The stream itself is still usable.
    #[error("malformed object: {0}")]
    Malformed(String),
}

/// Stream of watch events. `None` means the server closed the watch.
pub type EventStream<K> = BoxStream<'static, Result<WatchEvent<K>, SourceError>>;

/// Read and annotate access to one kind of cluster object.
#[async_trait]
pub trait ObjectSource<K>: Send + Sync {
    /// List every object of the kind.
    async fn list(&self) -> Result<Snapshot<K>, SourceError>;

    /// Watch for changes after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<EventStream<K>, SourceError>;

    /// Merge one annotation into an object's metadata.
    async fn annotate(
        &self,
        namespace: Option<&str>,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SourceError>;
}

/// Hands out a source for each adapter's object type.
pub trait SourceProvider: Send + Sync + 'static {
    fn source<A: ResourceAdapter>(&self) -> Arc<dyn ObjectSource<A::Source>>;
}
