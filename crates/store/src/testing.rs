//! Row builders for tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::row::{MirrorRow, RowKey};
use crate::spec::{ContainerSummary, PodSpec, PodStatus, RowSpec, WorkloadSpec, WorkloadStatus};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// A Deployment row whose status is one of `running`, `updating`, `stopped`.
pub fn deployment_row(namespace: &str, name: &str, status: &str, updated_secs: i64) -> MirrorRow {
    let status = match status {
        "stopped" => WorkloadStatus::Stopped,
        "updating" => WorkloadStatus::Updating,
        _ => WorkloadStatus::Running,
    };
    let desired = i32::from(status != WorkloadStatus::Stopped);
    MirrorRow {
        key: RowKey::namespaced(namespace, name),
        uid: format!("uid-{namespace}-{name}"),
        created_at: at(0),
        updated_at: at(updated_secs),
        annotations: BTreeMap::new(),
        labels: BTreeMap::from([("app".to_string(), name.to_string())]),
        spec: RowSpec::Deployment(WorkloadSpec {
            status,
            app: name.to_string(),
            owner: String::new(),
            desired,
            ready: desired,
            updated: desired,
            available: desired,
            selector: BTreeMap::from([("app".to_string(), name.to_string())]),
            containers: vec![ContainerSummary {
                name: "main".to_string(),
                image: format!("registry.local/{name}:1"),
                cpu_request: None,
                memory_request: None,
            }],
        }),
    }
}

/// A running Pod row scheduled on `node`.
pub fn pod_row(namespace: &str, name: &str, node: &str, updated_secs: i64) -> MirrorRow {
    MirrorRow {
        key: RowKey::namespaced(namespace, name),
        uid: format!("uid-{namespace}-{name}"),
        created_at: at(0),
        updated_at: at(updated_secs),
        annotations: BTreeMap::new(),
        labels: BTreeMap::new(),
        spec: RowSpec::Pod(PodSpec {
            status: PodStatus::Running,
            node: node.to_string(),
            node_ip: String::new(),
            pod_ip: String::new(),
            owner_kind: String::new(),
            owner_name: String::new(),
            restarts: 0,
            ready_containers: 1,
            containers: Vec::new(),
        }),
    }
}
