//! Shared fixtures for reconciler integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mirror_core::{Conditions, Order, Paging, ResourceKind};
use mirror_store::{InMemoryMirrorStore, MirrorRow, MirrorStore, RowKey, StoreResult};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim};
use k8s_openapi::api::rbac::v1::ClusterRole;
use serde_json::json;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `check` every 10ms until it returns true or `WAIT` elapses.
pub async fn eventually<F, Fut>(what: &str, mut check: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err(format!("timed out waiting for {what}"))
}

/// A Deployment that is `running` with `replicas > 0` and `stopped` at 0.
pub fn deployment(namespace: &str, name: &str, replicas: i32) -> Result<Deployment, String> {
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{namespace}-{name}"),
            "creationTimestamp": "2024-01-01T00:00:00Z",
            "labels": {"app": name}
        },
        "spec": {
            "replicas": replicas,
            "selector": {"matchLabels": {"app": name}},
            "template": {"spec": {"containers": [{"name": "main", "image": format!("{name}:1")}]}}
        },
        "status": {
            "replicas": replicas,
            "availableReplicas": replicas,
            "updatedReplicas": replicas
        }
    }))
    .map_err(|e| format!("bad deployment fixture: {e}"))
}

/// A Deployment rolling out: desired 3, one replica updated and ready.
pub fn updating_deployment(namespace: &str, name: &str) -> Result<Deployment, String> {
    let mut deployment = deployment(namespace, name, 3)?;
    if let Some(status) = deployment.status.as_mut() {
        status.available_replicas = Some(1);
        status.updated_replicas = Some(1);
    }
    Ok(deployment)
}

pub fn config_map(namespace: &str, name: &str, value: &str) -> Result<ConfigMap, String> {
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{namespace}-{name}"),
            "creationTimestamp": "2024-01-01T00:00:00Z"
        },
        "data": {"value": value}
    }))
    .map_err(|e| format!("bad configmap fixture: {e}"))
}

pub fn cluster_role(name: &str) -> Result<ClusterRole, String> {
    serde_json::from_value(json!({
        "metadata": {"name": name, "uid": format!("uid-{name}")},
        "rules": [{"apiGroups": [""], "resources": ["pods"], "verbs": ["get"]}]
    }))
    .map_err(|e| format!("bad clusterrole fixture: {e}"))
}

pub fn claim(namespace: &str, name: &str, class: &str, phase: &str) -> Result<PersistentVolumeClaim, String> {
    serde_json::from_value(json!({
        "metadata": {"name": name, "namespace": namespace, "uid": format!("uid-{namespace}-{name}")},
        "spec": {
            "storageClassName": class,
            "resources": {"requests": {"storage": "1Gi"}}
        },
        "status": {"phase": phase}
    }))
    .map_err(|e| format!("bad claim fixture: {e}"))
}

/// A Job in `ops` that is still running, or failed when `failed` is set.
pub fn job(name: &str, uid: &str, failed: bool) -> Result<Job, String> {
    let conditions = if failed {
        json!([{
            "type": "Failed",
            "status": "True",
            "reason": "BackoffLimitExceeded",
            "message": "Job has reached the specified backoff limit",
            "lastTransitionTime": "2024-03-01T00:10:00Z"
        }])
    } else {
        json!([])
    };
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "namespace": "ops",
            "uid": uid,
            "creationTimestamp": "2024-03-01T00:00:00Z"
        },
        "spec": {
            "completions": 1,
            "template": {"spec": {"containers": [{"name": "b", "image": "backup:2"}]}}
        },
        "status": {
            "failed": i32::from(failed),
            "startTime": "2024-03-01T00:00:05Z",
            "conditions": conditions
        }
    }))
    .map_err(|e| format!("bad job fixture: {e}"))
}

/// In-memory store whose `upsert` can be made to hang forever.
#[derive(Default)]
pub struct StallingStore {
    inner: InMemoryMirrorStore,
    stall: AtomicBool,
}

impl StallingStore {
    pub fn set_stalled(&self, stalled: bool) {
        self.stall.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl MirrorStore for StallingStore {
    async fn reset(&self, kind: ResourceKind) -> StoreResult<()> {
        self.inner.reset(kind).await
    }

    async fn insert(&self, row: &MirrorRow) -> StoreResult<()> {
        self.inner.insert(row).await
    }

    async fn upsert(&self, row: &MirrorRow) -> StoreResult<()> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.upsert(row).await
    }

    async fn remove(&self, kind: ResourceKind, key: &RowKey) -> StoreResult<bool> {
        self.inner.remove(kind, key).await
    }

    async fn count(&self, kind: ResourceKind, conditions: &Conditions) -> StoreResult<usize> {
        self.inner.count(kind, conditions).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        conditions: &Conditions,
        paging: Option<Paging>,
        order: Order,
    ) -> StoreResult<(usize, Vec<MirrorRow>)> {
        self.inner.list(kind, conditions, paging, order).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}
