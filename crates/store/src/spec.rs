//! Kind-specific row content.
//!
//! Each kind contributes a derived status (where it has one), a handful of
//! flat filter columns, and a detail payload that is stored as encoded text.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use mirror_core::ResourceKind;
use serde::{Deserialize, Serialize};

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum!(
    /// Rollout state of a replicated workload.
    WorkloadStatus { Running => "running", Updating => "updating", Stopped => "stopped" }
);
status_enum!(JobStatus { Running => "running", Completed => "completed", Failed => "failed" });
status_enum!(CronJobStatus { Running => "running", Paused => "paused" });
status_enum!(
    /// Pod phase, plus `terminating` for pods being deleted.
    PodStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Unknown => "unknown",
        Terminating => "terminating",
    }
);
status_enum!(ClaimStatus { Bound => "bound", Pending => "pending", Lost => "lost" });
status_enum!(NamespaceStatus { Active => "active", Terminating => "terminating" });
status_enum!(NodeStatus { Running => "running", NotReady => "not_ready", Unschedulable => "unschedulable" });

impl JobStatus {
    /// Whether the job will not run again under this UID.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
}

/// Deployments, StatefulSets, DaemonSets and ReplicaSets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub status: WorkloadStatus,
    pub app: String,
    /// Owning controller name, if any.
    pub owner: String,
    pub desired: i32,
    pub ready: i32,
    pub updated: i32,
    pub available: i32,
    pub selector: BTreeMap<String, String>,
    pub containers: Vec<ContainerSummary>,
}

/// One recorded execution attempt of a Job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub revision: u32,
    pub uid: String,
    pub status: JobStatus,
    pub desired: i32,
    pub succeeded: i32,
    pub failed: i32,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub status: JobStatus,
    pub app: String,
    pub owner: String,
    pub completions: i32,
    pub parallelism: i32,
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub containers: Vec<ContainerSummary>,
    pub revisions: Vec<Revision>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronJobSpec {
    pub status: CronJobStatus,
    pub schedule: String,
    pub last_schedule_time: Option<DateTime<Utc>>,
    pub active_jobs: Vec<String>,
    pub containers: Vec<ContainerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub status: PodStatus,
    pub node: String,
    pub node_ip: String,
    pub pod_ip: String,
    pub owner_kind: String,
    pub owner_name: String,
    pub restarts: i32,
    pub ready_containers: usize,
    pub containers: Vec<ContainerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePortSummary {
    pub name: String,
    pub protocol: String,
    pub port: i32,
    pub target_port: String,
    pub node_port: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub service_type: String,
    pub cluster_ip: String,
    pub app: String,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePortSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPathSummary {
    pub host: String,
    pub path: String,
    pub service: String,
    pub port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpec {
    pub ip: String,
    pub class: String,
    pub tls_hosts: Vec<String>,
    pub paths: Vec<IngressPathSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSpec {
    pub status: ClaimStatus,
    pub storage_class: String,
    pub volume: String,
    pub capacity: String,
    pub access_modes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClassSpec {
    pub provisioner: String,
    pub is_default: bool,
    pub reclaim_policy: String,
    pub binding_mode: String,
    pub allow_expansion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    pub status: NamespaceStatus,
    pub creator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub status: NodeStatus,
    pub ip: String,
    pub role: String,
    pub os_image: String,
    pub kernel_version: String,
    pub kubelet_version: String,
    pub cpu: String,
    pub memory: String,
    pub pods: String,
}

/// Secret metadata only. Values are never mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub secret_type: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMapSpec {
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

/// Roles and ClusterRoles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub creator: String,
    pub rules: Vec<RuleSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBindingSpec {
    pub role: String,
    pub role_kind: String,
    pub subjects: Vec<SubjectSummary>,
}

/// Kind-specific content of a mirror row, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowSpec {
    Deployment(WorkloadSpec),
    StatefulSet(WorkloadSpec),
    DaemonSet(WorkloadSpec),
    ReplicaSet(WorkloadSpec),
    Job(JobSpec),
    CronJob(CronJobSpec),
    Pod(PodSpec),
    Service(ServiceSpec),
    Ingress(IngressSpec),
    PersistentVolumeClaim(ClaimSpec),
    StorageClass(StorageClassSpec),
    Namespace(NamespaceSpec),
    Node(NodeSpec),
    Secret(SecretSpec),
    ConfigMap(ConfigMapSpec),
    Role(RoleSpec),
    ClusterRole(RoleSpec),
    RoleBinding(RoleBindingSpec),
}

impl RowSpec {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::StatefulSet(_) => ResourceKind::StatefulSet,
            Self::DaemonSet(_) => ResourceKind::DaemonSet,
            Self::ReplicaSet(_) => ResourceKind::ReplicaSet,
            Self::Job(_) => ResourceKind::Job,
            Self::CronJob(_) => ResourceKind::CronJob,
            Self::Pod(_) => ResourceKind::Pod,
            Self::Service(_) => ResourceKind::Service,
            Self::Ingress(_) => ResourceKind::Ingress,
            Self::PersistentVolumeClaim(_) => ResourceKind::PersistentVolumeClaim,
            Self::StorageClass(_) => ResourceKind::StorageClass,
            Self::Namespace(_) => ResourceKind::Namespace,
            Self::Node(_) => ResourceKind::Node,
            Self::Secret(_) => ResourceKind::Secret,
            Self::ConfigMap(_) => ResourceKind::ConfigMap,
            Self::Role(_) => ResourceKind::Role,
            Self::ClusterRole(_) => ResourceKind::ClusterRole,
            Self::RoleBinding(_) => ResourceKind::RoleBinding,
        }
    }

    /// Derived status, empty for kinds without one.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Deployment(w) | Self::StatefulSet(w) | Self::DaemonSet(w) | Self::ReplicaSet(w) => {
                w.status.as_str()
            }
            Self::Job(j) => j.status.as_str(),
            Self::CronJob(c) => c.status.as_str(),
            Self::Pod(p) => p.status.as_str(),
            Self::PersistentVolumeClaim(c) => c.status.as_str(),
            Self::Namespace(n) => n.status.as_str(),
            Self::Node(n) => n.status.as_str(),
            Self::Service(_)
            | Self::Ingress(_)
            | Self::StorageClass(_)
            | Self::Secret(_)
            | Self::ConfigMap(_)
            | Self::Role(_)
            | Self::ClusterRole(_)
            | Self::RoleBinding(_) => "",
        }
    }

    /// Flat filter columns, keyed exactly as [`ResourceKind::columns`] names them.
    #[must_use]
    pub fn columns(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            Self::Deployment(w) | Self::StatefulSet(w) | Self::DaemonSet(w) => {
                vec![("app", w.app.clone())]
            }
            Self::ReplicaSet(w) => vec![("app", w.app.clone()), ("owner", w.owner.clone())],
            Self::Job(j) => vec![("app", j.app.clone()), ("owner", j.owner.clone())],
            Self::CronJob(c) => vec![("schedule", c.schedule.clone())],
            Self::Pod(p) => vec![
                ("node", p.node.clone()),
                ("node_ip", p.node_ip.clone()),
                ("pod_ip", p.pod_ip.clone()),
                ("owner_kind", p.owner_kind.clone()),
                ("owner_name", p.owner_name.clone()),
            ],
            Self::Service(s) => vec![
                ("type", s.service_type.clone()),
                ("cluster_ip", s.cluster_ip.clone()),
                ("app", s.app.clone()),
            ],
            Self::Ingress(i) => vec![("ip", i.ip.clone()), ("class", i.class.clone())],
            Self::PersistentVolumeClaim(c) => vec![
                ("storage_class", c.storage_class.clone()),
                ("volume", c.volume.clone()),
            ],
            Self::StorageClass(s) => vec![
                ("provisioner", s.provisioner.clone()),
                ("is_default", s.is_default.to_string()),
            ],
            Self::Namespace(n) => vec![("creator", n.creator.clone())],
            Self::Node(n) => vec![("ip", n.ip.clone()), ("role", n.role.clone())],
            Self::Secret(s) => vec![("type", s.secret_type.clone())],
            Self::ConfigMap(_) => Vec::new(),
            Self::Role(r) | Self::ClusterRole(r) => vec![("creator", r.creator.clone())],
            Self::RoleBinding(b) => vec![("role", b.role.clone())],
        };
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(status: WorkloadStatus) -> WorkloadSpec {
        WorkloadSpec {
            status,
            app: "web".to_string(),
            owner: String::new(),
            desired: 1,
            ready: 1,
            updated: 1,
            available: 1,
            selector: BTreeMap::new(),
            containers: Vec::new(),
        }
    }

    #[test]
    fn test_columns_match_kind_declaration() {
        let specs = [
            RowSpec::Deployment(workload(WorkloadStatus::Running)),
            RowSpec::ReplicaSet(workload(WorkloadStatus::Running)),
            RowSpec::StorageClass(StorageClassSpec {
                provisioner: "csi".to_string(),
                is_default: true,
                reclaim_policy: "Delete".to_string(),
                binding_mode: "Immediate".to_string(),
                allow_expansion: false,
            }),
            RowSpec::ConfigMap(ConfigMapSpec {
                data: BTreeMap::new(),
            }),
        ];
        for spec in specs {
            let columns = spec.columns();
            let declared: Vec<&str> = spec.kind().columns().to_vec();
            let produced: Vec<&str> = columns.keys().map(String::as_str).collect();
            let mut declared_sorted = declared.clone();
            declared_sorted.sort_unstable();
            assert_eq!(produced, declared_sorted, "columns of {}", spec.kind());
        }
    }

    #[test]
    fn test_status_text() {
        assert_eq!(RowSpec::DaemonSet(workload(WorkloadStatus::Stopped)).status(), "stopped");
        assert_eq!(NodeStatus::NotReady.as_str(), "not_ready");
        assert_eq!(
            RowSpec::ConfigMap(ConfigMapSpec {
                data: BTreeMap::new()
            })
            .status(),
            ""
        );
    }

    #[test]
    fn test_status_serde_is_snake_case() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&NodeStatus::NotReady)?, "\"not_ready\"");
        let parsed: JobStatus = serde_json::from_str("\"completed\"")?;
        assert_eq!(parsed, JobStatus::Completed);
        Ok(())
    }

    #[test]
    fn test_terminal_job_status() {
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
