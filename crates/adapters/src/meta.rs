//! Shared projection helpers over object metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta, OwnerReference, Time,
};
use mirror_core::ResourceKind;
use mirror_store::spec::ContainerSummary;
use mirror_store::{MirrorRow, RowKey, RowSpec};

/// Annotations that are never mirrored.
pub const DROPPED_ANNOTATIONS: [&str; 1] = ["kubectl.kubernetes.io/last-applied-configuration"];

/// Annotation naming the user or system that created an object.
pub const CREATOR_ANNOTATION: &str = "creator";

/// Convert an API timestamp.
pub fn time(t: &Time) -> Option<DateTime<Utc>> {
    let text = serde_json::to_value(t).ok()?;
    DateTime::parse_from_rfc3339(text.as_str()?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn opt_time(t: Option<&Time>) -> Option<DateTime<Utc>> {
    t.and_then(time)
}

/// Latest of a set of optional timestamps.
pub fn latest<I>(times: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    times.into_iter().flatten().max()
}

pub fn row_key(kind: ResourceKind, meta: &ObjectMeta) -> Option<RowKey> {
    let name = meta.name.clone().filter(|n| !n.is_empty())?;
    Some(if kind.is_namespaced() {
        RowKey::namespaced(
            meta.namespace.clone().unwrap_or_else(|| "default".to_string()),
            name,
        )
    } else {
        RowKey::cluster(name)
    })
}

/// Assemble a row from metadata and kind-specific content.
///
/// `updated` is the latest status timestamp the kind knows about; the
/// creation timestamp stands in when there is none.
pub fn build_row(meta: &ObjectMeta, spec: RowSpec, updated: Option<DateTime<Utc>>) -> Option<MirrorRow> {
    let key = row_key(spec.kind(), meta)?;
    let created_at = opt_time(meta.creation_timestamp.as_ref()).unwrap_or_else(Utc::now);
    let annotations = meta
        .annotations
        .iter()
        .flatten()
        .filter(|(k, _)| !DROPPED_ANNOTATIONS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some(MirrorRow {
        key,
        uid: meta.uid.clone().unwrap_or_default(),
        created_at,
        updated_at: updated.map_or(created_at, |u| u.max(created_at)),
        annotations,
        labels: meta.labels.clone().unwrap_or_default(),
        spec,
    })
}

pub fn label<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.labels.as_ref()?.get(key).map(String::as_str)
}

pub fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations.as_ref()?.get(key).map(String::as_str)
}

/// The `app` label, falling back to the recommended `app.kubernetes.io/name`.
pub fn app(meta: &ObjectMeta) -> String {
    label(meta, "app")
        .or_else(|| label(meta, "app.kubernetes.io/name"))
        .unwrap_or_default()
        .to_string()
}

pub fn creator(meta: &ObjectMeta) -> String {
    annotation(meta, CREATOR_ANNOTATION)
        .unwrap_or_default()
        .to_string()
}

/// The managing owner: the controller reference if there is one, else the first.
pub fn owner(meta: &ObjectMeta) -> Option<&OwnerReference> {
    let refs = meta.owner_references.as_ref()?;
    refs.iter()
        .find(|r| r.controller == Some(true))
        .or_else(|| refs.first())
}

pub fn owner_name(meta: &ObjectMeta) -> String {
    owner(meta).map(|r| r.name.clone()).unwrap_or_default()
}

pub fn selector_labels(selector: Option<&LabelSelector>) -> BTreeMap<String, String> {
    selector
        .and_then(|s| s.match_labels.clone())
        .unwrap_or_default()
}

pub fn containers(list: &[Container]) -> Vec<ContainerSummary> {
    list.iter()
        .map(|c| {
            let request = |resource: &str| {
                c.resources
                    .as_ref()
                    .and_then(|r| r.requests.as_ref())
                    .and_then(|req| req.get(resource))
                    .map(|q| q.0.clone())
            };
            ContainerSummary {
                name: c.name.clone(),
                image: c.image.clone().unwrap_or_default(),
                cpu_request: request("cpu"),
                memory_request: request("memory"),
            }
        })
        .collect()
}

pub fn template_containers(template: Option<&PodTemplateSpec>) -> Vec<ContainerSummary> {
    template
        .and_then(|t| t.spec.as_ref())
        .map(|s| containers(&s.containers))
        .unwrap_or_default()
}

/// Sorted, deduplicated keys of any number of maps.
pub fn keys_of<'a, I, V>(maps: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<&'a BTreeMap<String, V>>>,
    V: 'a,
{
    maps.into_iter()
        .flatten()
        .flat_map(BTreeMap::keys)
        .cloned()
        .sorted()
        .dedup()
        .collect()
}
