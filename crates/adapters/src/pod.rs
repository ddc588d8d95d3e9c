//! Pods.

use k8s_openapi::api::core::v1::Pod;
use mirror_core::ResourceKind;
use mirror_store::spec::{PodSpec, PodStatus};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta::{self, latest, opt_time};

/// Phase of the pod, or `terminating` once deletion has begun.
pub fn pod_status(pod: &Pod) -> PodStatus {
    if pod.metadata.deletion_timestamp.is_some() {
        return PodStatus::Terminating;
    }
    match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
        Some("Pending") => PodStatus::Pending,
        Some("Running") => PodStatus::Running,
        Some("Succeeded") => PodStatus::Succeeded,
        Some("Failed") => PodStatus::Failed,
        _ => PodStatus::Unknown,
    }
}

pub struct PodAdapter;

impl ResourceAdapter for PodAdapter {
    type Source = Pod;
    const KIND: ResourceKind = ResourceKind::Pod;

    fn project(source: &Pod) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let container_statuses = status
            .and_then(|s| s.container_statuses.as_ref())
            .into_iter()
            .flatten();
        let owner = meta::owner(&source.metadata);
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref()))
                .chain([opt_time(status.and_then(|s| s.start_time.as_ref()))]),
        );
        let row = PodSpec {
            status: pod_status(source),
            node: spec.and_then(|s| s.node_name.clone()).unwrap_or_default(),
            node_ip: status.and_then(|s| s.host_ip.clone()).unwrap_or_default(),
            pod_ip: status.and_then(|s| s.pod_ip.clone()).unwrap_or_default(),
            owner_kind: owner.map(|o| o.kind.clone()).unwrap_or_default(),
            owner_name: owner.map(|o| o.name.clone()).unwrap_or_default(),
            restarts: container_statuses
                .clone()
                .map(|c| c.restart_count)
                .fold(0_i32, i32::saturating_add),
            ready_containers: container_statuses.filter(|c| c.ready).count(),
            containers: spec.map(|s| meta::containers(&s.containers)).unwrap_or_default(),
        };
        meta::build_row(&source.metadata, RowSpec::Pod(row), updated_at)
    }
}
