//! # Mirror Adapters
//!
//! One adapter per resource kind. An adapter is a pure, total, deterministic
//! projection from a typed cluster object to a [`MirrorRow`], or a decision
//! to skip the object entirely.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fmt::Debug;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use mirror_core::ResourceKind;
use mirror_store::{MirrorRow, RowKey};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod batch;
pub mod cluster;
pub mod data;
pub mod meta;
pub mod network;
pub mod pod;
pub mod rbac;
pub mod revision;
pub mod storage;
pub mod workload;

pub use batch::{CronJobAdapter, JobAdapter};
pub use cluster::{NamespaceAdapter, NodeAdapter};
pub use data::{ConfigMapAdapter, SecretAdapter};
pub use network::{IngressAdapter, ServiceAdapter};
pub use pod::PodAdapter;
pub use rbac::{ClusterRoleAdapter, RoleAdapter, RoleBindingAdapter};
pub use revision::{MAX_REVISIONS, REVISIONS_ANNOTATION, RevisionHistory};
pub use storage::{PersistentVolumeClaimAdapter, StorageClassAdapter};
pub use workload::{DaemonSetAdapter, DeploymentAdapter, ReplicaSetAdapter, StatefulSetAdapter};

/// An annotation the controller should write back to the source object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationPatch {
    pub key: String,
    pub value: String,
}

/// Per-kind projection from a cluster object to a mirror row.
pub trait ResourceAdapter: Send + Sync + 'static {
    /// The typed cluster object this adapter reads.
    type Source: k8s_openapi::Resource
        + k8s_openapi::Metadata<Ty = ObjectMeta>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    const KIND: ResourceKind;

    /// Project an object, or `None` to leave it out of the mirror.
    fn project(source: &Self::Source) -> Option<MirrorRow>;

    /// Annotation to write back after the object was mirrored, if any.
    fn annotation_update(_source: &Self::Source) -> Option<AnnotationPatch> {
        None
    }

    /// Row key of an object, whether or not it projects.
    fn key_of(source: &Self::Source) -> Option<RowKey> {
        meta::row_key(Self::KIND, k8s_openapi::Metadata::metadata(source))
    }
}
