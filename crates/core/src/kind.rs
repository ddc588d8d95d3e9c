//! The closed set of mirrored resource kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Columns every kind can be filtered on.
pub const META_COLUMNS: [&str; 4] = ["name", "namespace", "uid", "status"];

/// A mirrored cluster resource kind.
///
/// The set is closed: adding a kind means adding a variant here, an adapter,
/// and an arm in the registry's controller construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "deployments")]
    Deployment,
    #[serde(rename = "statefulsets")]
    StatefulSet,
    #[serde(rename = "daemonsets")]
    DaemonSet,
    #[serde(rename = "replicasets")]
    ReplicaSet,
    #[serde(rename = "jobs")]
    Job,
    #[serde(rename = "cronjobs")]
    CronJob,
    #[serde(rename = "pods")]
    Pod,
    #[serde(rename = "services")]
    Service,
    #[serde(rename = "ingresses")]
    Ingress,
    #[serde(rename = "persistentvolumeclaims")]
    PersistentVolumeClaim,
    #[serde(rename = "storageclasses")]
    StorageClass,
    #[serde(rename = "namespaces")]
    Namespace,
    #[serde(rename = "nodes")]
    Node,
    #[serde(rename = "secrets")]
    Secret,
    #[serde(rename = "configmaps")]
    ConfigMap,
    #[serde(rename = "roles")]
    Role,
    #[serde(rename = "clusterroles")]
    ClusterRole,
    #[serde(rename = "rolebindings")]
    RoleBinding,
}

impl ResourceKind {
    /// Every mirrored kind, in start-up order.
    pub const ALL: [Self; 18] = [
        Self::Namespace,
        Self::Node,
        Self::StorageClass,
        Self::Deployment,
        Self::StatefulSet,
        Self::DaemonSet,
        Self::ReplicaSet,
        Self::Job,
        Self::CronJob,
        Self::Pod,
        Self::Service,
        Self::Ingress,
        Self::PersistentVolumeClaim,
        Self::Secret,
        Self::ConfigMap,
        Self::Role,
        Self::ClusterRole,
        Self::RoleBinding,
    ];

    /// Return the stable API name of this kind (plural, lowercase).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "deployments",
            Self::StatefulSet => "statefulsets",
            Self::DaemonSet => "daemonsets",
            Self::ReplicaSet => "replicasets",
            Self::Job => "jobs",
            Self::CronJob => "cronjobs",
            Self::Pod => "pods",
            Self::Service => "services",
            Self::Ingress => "ingresses",
            Self::PersistentVolumeClaim => "persistentvolumeclaims",
            Self::StorageClass => "storageclasses",
            Self::Namespace => "namespaces",
            Self::Node => "nodes",
            Self::Secret => "secrets",
            Self::ConfigMap => "configmaps",
            Self::Role => "roles",
            Self::ClusterRole => "clusterroles",
            Self::RoleBinding => "rolebindings",
        }
    }

    /// Name of the mirror table owned by this kind.
    #[must_use]
    pub fn table(self) -> String {
        format!("mirror_{}", self.as_str())
    }

    /// Whether objects of this kind live inside a namespace.
    #[must_use]
    pub const fn is_namespaced(self) -> bool {
        !matches!(
            self,
            Self::StorageClass | Self::Namespace | Self::Node | Self::ClusterRole
        )
    }

    /// Kind-specific filter columns, in addition to [`META_COLUMNS`].
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Deployment | Self::StatefulSet | Self::DaemonSet => &["app"],
            Self::ReplicaSet | Self::Job => &["app", "owner"],
            Self::CronJob => &["schedule"],
            Self::Pod => &["node", "node_ip", "pod_ip", "owner_kind", "owner_name"],
            Self::Service => &["type", "cluster_ip", "app"],
            Self::Ingress => &["ip", "class"],
            Self::PersistentVolumeClaim => &["storage_class", "volume"],
            Self::StorageClass => &["provisioner", "is_default"],
            Self::Namespace => &["creator"],
            Self::Node => &["ip", "role"],
            Self::Secret => &["type"],
            Self::ConfigMap => &[],
            Self::Role | Self::ClusterRole => &["creator"],
            Self::RoleBinding => &["role"],
        }
    }

    /// Whether `column` is a meta column or one of this kind's own columns.
    #[must_use]
    pub fn is_filterable(self, column: &str) -> bool {
        META_COLUMNS.contains(&column) || self.columns().contains(&column)
    }

    /// Whether `column` is a meta column.
    #[must_use]
    pub fn is_meta_column(column: &str) -> bool {
        META_COLUMNS.contains(&column)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "deployments" | "deployment" | "deploy" => Self::Deployment,
            "statefulsets" | "statefulset" | "sts" => Self::StatefulSet,
            "daemonsets" | "daemonset" | "ds" => Self::DaemonSet,
            "replicasets" | "replicaset" | "rs" => Self::ReplicaSet,
            "jobs" | "job" => Self::Job,
            "cronjobs" | "cronjob" | "cj" => Self::CronJob,
            "pods" | "pod" | "po" => Self::Pod,
            "services" | "service" | "svc" => Self::Service,
            "ingresses" | "ingress" | "ing" => Self::Ingress,
            "persistentvolumeclaims" | "persistentvolumeclaim" | "pvc" => {
                Self::PersistentVolumeClaim
            }
            "storageclasses" | "storageclass" | "sc" => Self::StorageClass,
            "namespaces" | "namespace" | "ns" => Self::Namespace,
            "nodes" | "node" | "no" => Self::Node,
            "secrets" | "secret" => Self::Secret,
            "configmaps" | "configmap" | "cm" => Self::ConfigMap,
            "roles" | "role" => Self::Role,
            "clusterroles" | "clusterrole" => Self::ClusterRole,
            "rolebindings" | "rolebinding" => Self::RoleBinding,
            _ => return Err(Error::unknown_kind(s)),
        };
        Ok(kind)
    }
}
