//! Secrets and ConfigMaps.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use mirror_core::ResourceKind;
use mirror_store::spec::{ConfigMapSpec, SecretSpec};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta;

pub struct SecretAdapter;

impl ResourceAdapter for SecretAdapter {
    type Source = Secret;
    const KIND: ResourceKind = ResourceKind::Secret;

    /// Entry names only; secret values never reach the mirror.
    fn project(source: &Secret) -> Option<MirrorRow> {
        let row = SecretSpec {
            secret_type: source.type_.clone().unwrap_or_else(|| "Opaque".to_string()),
            keys: meta::keys_of([source.data.as_ref()])
                .into_iter()
                .chain(meta::keys_of([source.string_data.as_ref()]))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        meta::build_row(&source.metadata, RowSpec::Secret(row), None)
    }
}

pub struct ConfigMapAdapter;

impl ResourceAdapter for ConfigMapAdapter {
    type Source = ConfigMap;
    const KIND: ResourceKind = ResourceKind::ConfigMap;

    fn project(source: &ConfigMap) -> Option<MirrorRow> {
        let row = ConfigMapSpec {
            data: source.data.clone().unwrap_or_default(),
        };
        meta::build_row(&source.metadata, RowSpec::ConfigMap(row), None)
    }
}
