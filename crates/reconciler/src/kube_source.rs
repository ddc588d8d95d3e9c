//! Cluster sources backed by the Kubernetes API.
//!
//! Each watch runs in its own task and forwards events over a channel, so the
//! stream handed to the controller owns everything it needs. When the server
//! ends a watch on its own timeout the task reopens it from the last version
//! it saw; any real fault is forwarded and ends the stream.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use kube::api::{Api, ListParams, Patch, PatchParams, WatchParams};
use kube::core::{Request, WatchEvent as KubeWatchEvent};
use kube::{Client, Resource, ResourceExt};
use mirror_adapters::ResourceAdapter;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::source::{EventStream, ObjectSource, SourceError, Snapshot, SourceProvider, WatchEvent};

const WATCH_BUFFER: usize = 256;

fn source_error(err: kube::Error) -> SourceError {
    match err {
        kube::Error::SerdeError(e) => SourceError::Malformed(e.to_string()),
        other => SourceError::Transient(other.to_string()),
    }
}

/// Lists, watches and annotates one kind across all namespaces.
pub struct KubeSource<K> {
    client: Client,
    api: Api<K>,
}

impl<K> KubeSource<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client.clone()),
            client,
        }
    }
}

#[async_trait]
impl<K> ObjectSource<K> for KubeSource<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Snapshot<K>, SourceError> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(source_error)?;
        Ok(Snapshot {
            resource_version: list.metadata.resource_version.unwrap_or_default(),
            items: list.items,
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<EventStream<K>, SourceError> {
        let api = self.api.clone();
        let mut version = resource_version.to_string();
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);

        tokio::spawn(async move {
            loop {
                let params = WatchParams::default();
                let from = version.clone();
                let watch = match api.watch(&params, &from).await {
                    Ok(watch) => watch,
                    Err(e) => {
                        let _ = tx.send(Err(source_error(e))).await;
                        return;
                    }
                };
                let mut watch = std::pin::pin!(watch);
                while let Some(item) = watch.next().await {
                    let forwarded = match item {
                        Ok(KubeWatchEvent::Added(object)) => {
                            version = object.resource_version().unwrap_or(version);
                            Ok(WatchEvent::Added(object))
                        }
                        Ok(KubeWatchEvent::Modified(object)) => {
                            version = object.resource_version().unwrap_or(version);
                            Ok(WatchEvent::Modified(object))
                        }
                        Ok(KubeWatchEvent::Deleted(object)) => {
                            version = object.resource_version().unwrap_or(version);
                            Ok(WatchEvent::Deleted(object))
                        }
                        Ok(KubeWatchEvent::Bookmark(bookmark)) => {
                            version = bookmark.metadata.resource_version;
                            continue;
                        }
                        Ok(KubeWatchEvent::Error(status)) => {
                            Err(SourceError::Transient(format!("{status:?}")))
                        }
                        Err(e) => Err(source_error(e)),
                    };
                    let fatal = matches!(forwarded, Err(SourceError::Transient(_)));
                    if tx.send(forwarded).await.is_err() || fatal {
                        return;
                    }
                }
                if tx.is_closed() {
                    return;
                }
                debug!(resource_version = %version, "Watch timed out, reopening");
            }
        });

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(events.boxed())
    }

    async fn annotate(
        &self,
        namespace: Option<&str>,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), SourceError> {
        let annotations = BTreeMap::from([(key, value)]);
        let patch = json!({"metadata": {"annotations": annotations}});
        let request = Request::new(K::url_path(&(), namespace))
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .map_err(|e| SourceError::Transient(e.to_string()))?;
        self.client
            .request::<K>(request)
            .await
            .map_err(source_error)?;
        Ok(())
    }
}

/// Builds a [`KubeSource`] per adapter from one shared client.
#[derive(Clone)]
pub struct KubeProvider {
    client: Client,
}

impl KubeProvider {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

impl SourceProvider for KubeProvider {
    fn source<A: ResourceAdapter>(&self) -> Arc<dyn ObjectSource<A::Source>> {
        Arc::new(KubeSource::<A::Source>::new(self.client.clone()))
    }
}
