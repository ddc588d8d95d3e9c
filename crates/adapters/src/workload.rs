//! Replicated workloads: Deployments, StatefulSets, DaemonSets, ReplicaSets.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use mirror_core::ResourceKind;
use mirror_store::spec::{ContainerSummary, WorkloadSpec, WorkloadStatus};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta::{self, latest, opt_time};

/// `stopped` when scaled to zero, `running` once ready and updated replicas
/// both reach the desired count, `updating` in between.
pub const fn workload_status(desired: i32, ready: i32, updated: i32) -> WorkloadStatus {
    if desired <= 0 {
        WorkloadStatus::Stopped
    } else if ready >= desired && updated >= desired {
        WorkloadStatus::Running
    } else {
        WorkloadStatus::Updating
    }
}

struct Counts {
    desired: i32,
    ready: i32,
    updated: i32,
    available: i32,
}

fn workload_spec(
    meta: &ObjectMeta,
    counts: &Counts,
    selector: BTreeMap<String, String>,
    containers: Vec<ContainerSummary>,
) -> WorkloadSpec {
    WorkloadSpec {
        status: workload_status(counts.desired, counts.ready, counts.updated),
        app: meta::app(meta),
        owner: meta::owner_name(meta),
        desired: counts.desired,
        ready: counts.ready,
        updated: counts.updated,
        available: counts.available,
        selector,
        containers,
    }
}

pub struct DeploymentAdapter;

impl ResourceAdapter for DeploymentAdapter {
    type Source = Deployment;
    const KIND: ResourceKind = ResourceKind::Deployment;

    fn project(source: &Deployment) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let counts = Counts {
            desired: spec.and_then(|s| s.replicas).unwrap_or(1),
            ready: status.and_then(|s| s.available_replicas).unwrap_or(0),
            updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
            available: status.and_then(|s| s.available_replicas).unwrap_or(0),
        };
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .flat_map(|c| {
                    [
                        opt_time(c.last_update_time.as_ref()),
                        opt_time(c.last_transition_time.as_ref()),
                    ]
                }),
        );
        let row = workload_spec(
            &source.metadata,
            &counts,
            meta::selector_labels(spec.map(|s| &s.selector)),
            meta::template_containers(spec.map(|s| &s.template)),
        );
        meta::build_row(&source.metadata, RowSpec::Deployment(row), updated_at)
    }
}

pub struct StatefulSetAdapter;

impl ResourceAdapter for StatefulSetAdapter {
    type Source = StatefulSet;
    const KIND: ResourceKind = ResourceKind::StatefulSet;

    fn project(source: &StatefulSet) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let counts = Counts {
            desired: spec.and_then(|s| s.replicas).unwrap_or(1),
            ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            updated: status.and_then(|s| s.updated_replicas).unwrap_or(0),
            available: status.and_then(|s| s.available_replicas).unwrap_or(0),
        };
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref())),
        );
        let row = workload_spec(
            &source.metadata,
            &counts,
            meta::selector_labels(spec.map(|s| &s.selector)),
            meta::template_containers(spec.map(|s| &s.template)),
        );
        meta::build_row(&source.metadata, RowSpec::StatefulSet(row), updated_at)
    }
}

pub struct DaemonSetAdapter;

impl ResourceAdapter for DaemonSetAdapter {
    type Source = DaemonSet;
    const KIND: ResourceKind = ResourceKind::DaemonSet;

    fn project(source: &DaemonSet) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let counts = Counts {
            desired: status.map_or(0, |s| s.desired_number_scheduled),
            ready: status.map_or(0, |s| s.number_ready),
            updated: status.and_then(|s| s.updated_number_scheduled).unwrap_or(0),
            available: status.and_then(|s| s.number_available).unwrap_or(0),
        };
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref())),
        );
        let row = workload_spec(
            &source.metadata,
            &counts,
            meta::selector_labels(spec.map(|s| &s.selector)),
            meta::template_containers(spec.map(|s| &s.template)),
        );
        meta::build_row(&source.metadata, RowSpec::DaemonSet(row), updated_at)
    }
}

pub struct ReplicaSetAdapter;

impl ResourceAdapter for ReplicaSetAdapter {
    type Source = ReplicaSet;
    const KIND: ResourceKind = ResourceKind::ReplicaSet;

    fn project(source: &ReplicaSet) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        // A ReplicaSet has a single template, so every current replica is up to date.
        let counts = Counts {
            desired: spec.and_then(|s| s.replicas).unwrap_or(1),
            ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            updated: status.map_or(0, |s| s.replicas),
            available: status.and_then(|s| s.available_replicas).unwrap_or(0),
        };
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref())),
        );
        let row = workload_spec(
            &source.metadata,
            &counts,
            meta::selector_labels(spec.map(|s| &s.selector)),
            meta::template_containers(spec.and_then(|s| s.template.as_ref())),
        );
        meta::build_row(&source.metadata, RowSpec::ReplicaSet(row), updated_at)
    }
}
