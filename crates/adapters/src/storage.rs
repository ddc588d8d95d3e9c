//! PersistentVolumeClaims and StorageClasses.

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use mirror_core::ResourceKind;
use mirror_store::spec::{ClaimSpec, ClaimStatus, StorageClassSpec};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta::{self, latest, opt_time};

pub const DEFAULT_CLASS_ANNOTATIONS: [&str; 2] = [
    "storageclass.kubernetes.io/is-default-class",
    "storageclass.beta.kubernetes.io/is-default-class",
];

pub struct PersistentVolumeClaimAdapter;

impl ResourceAdapter for PersistentVolumeClaimAdapter {
    type Source = PersistentVolumeClaim;
    const KIND: ResourceKind = ResourceKind::PersistentVolumeClaim;

    fn project(source: &PersistentVolumeClaim) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let status = source.status.as_ref();
        let requested = spec
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"));
        let capacity = status
            .and_then(|s| s.capacity.as_ref())
            .and_then(|c| c.get("storage"))
            .or(requested)
            .map(|q| q.0.clone())
            .unwrap_or_default();
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref())),
        );
        let row = ClaimSpec {
            status: match status.and_then(|s| s.phase.as_deref()) {
                Some("Bound") => ClaimStatus::Bound,
                Some("Lost") => ClaimStatus::Lost,
                _ => ClaimStatus::Pending,
            },
            storage_class: spec
                .and_then(|s| s.storage_class_name.clone())
                .unwrap_or_default(),
            volume: spec.and_then(|s| s.volume_name.clone()).unwrap_or_default(),
            capacity,
            access_modes: spec.and_then(|s| s.access_modes.clone()).unwrap_or_default(),
        };
        meta::build_row(
            &source.metadata,
            RowSpec::PersistentVolumeClaim(row),
            updated_at,
        )
    }
}

pub struct StorageClassAdapter;

impl ResourceAdapter for StorageClassAdapter {
    type Source = StorageClass;
    const KIND: ResourceKind = ResourceKind::StorageClass;

    fn project(source: &StorageClass) -> Option<MirrorRow> {
        let is_default = DEFAULT_CLASS_ANNOTATIONS
            .iter()
            .any(|key| meta::annotation(&source.metadata, key) == Some("true"));
        let row = StorageClassSpec {
            provisioner: source.provisioner.clone(),
            is_default,
            reclaim_policy: source
                .reclaim_policy
                .clone()
                .unwrap_or_else(|| "Delete".to_string()),
            binding_mode: source
                .volume_binding_mode
                .clone()
                .unwrap_or_else(|| "Immediate".to_string()),
            allow_expansion: source.allow_volume_expansion.unwrap_or(false),
        };
        meta::build_row(&source.metadata, RowSpec::StorageClass(row), None)
    }
}
