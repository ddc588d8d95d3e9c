//! Namespaces and Nodes.

use k8s_openapi::api::core::v1::{Namespace, Node};
use mirror_core::ResourceKind;
use mirror_store::spec::{NamespaceSpec, NamespaceStatus, NodeSpec, NodeStatus};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta::{self, latest, opt_time};

const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// `unschedulable` when cordoned, `running` when `Ready=True`, else `not_ready`.
pub fn node_status(node: &Node) -> NodeStatus {
    if node.spec.as_ref().and_then(|s| s.unschedulable).unwrap_or(false) {
        return NodeStatus::Unschedulable;
    }
    let ready = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .any(|c| c.type_ == "Ready" && c.status == "True");
    if ready {
        NodeStatus::Running
    } else {
        NodeStatus::NotReady
    }
}

/// Roles from `node-role.kubernetes.io/<role>` labels, comma-joined; `worker`
/// when there are none.
pub fn node_role(node: &Node) -> String {
    let roles: Vec<&str> = node
        .metadata
        .labels
        .iter()
        .flatten()
        .filter_map(|(k, _)| k.strip_prefix(ROLE_LABEL_PREFIX))
        .filter(|role| !role.is_empty())
        .collect();
    if roles.is_empty() {
        "worker".to_string()
    } else {
        roles.join(",")
    }
}

pub struct NamespaceAdapter;

impl ResourceAdapter for NamespaceAdapter {
    type Source = Namespace;
    const KIND: ResourceKind = ResourceKind::Namespace;

    fn project(source: &Namespace) -> Option<MirrorRow> {
        let status = source.status.as_ref();
        let terminating = source.metadata.deletion_timestamp.is_some()
            || status.and_then(|s| s.phase.as_deref()) == Some("Terminating");
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref())),
        );
        let row = NamespaceSpec {
            status: if terminating {
                NamespaceStatus::Terminating
            } else {
                NamespaceStatus::Active
            },
            creator: meta::creator(&source.metadata),
        };
        meta::build_row(&source.metadata, RowSpec::Namespace(row), updated_at)
    }
}

pub struct NodeAdapter;

impl ResourceAdapter for NodeAdapter {
    type Source = Node;
    const KIND: ResourceKind = ResourceKind::Node;

    fn project(source: &Node) -> Option<MirrorRow> {
        let status = source.status.as_ref();
        let info = status.and_then(|s| s.node_info.as_ref());
        let capacity = |resource: &str| {
            status
                .and_then(|s| s.capacity.as_ref())
                .and_then(|c| c.get(resource))
                .map(|q| q.0.clone())
                .unwrap_or_default()
        };
        let updated_at = latest(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| opt_time(c.last_transition_time.as_ref())),
        );
        let row = NodeSpec {
            status: node_status(source),
            ip: status
                .and_then(|s| s.addresses.as_ref())
                .into_iter()
                .flatten()
                .find(|a| a.type_ == "InternalIP")
                .map(|a| a.address.clone())
                .unwrap_or_default(),
            role: node_role(source),
            os_image: info.map(|i| i.os_image.clone()).unwrap_or_default(),
            kernel_version: info.map(|i| i.kernel_version.clone()).unwrap_or_default(),
            kubelet_version: info.map(|i| i.kubelet_version.clone()).unwrap_or_default(),
            cpu: capacity("cpu"),
            memory: capacity("memory"),
            pods: capacity("pods"),
        };
        meta::build_row(&source.metadata, RowSpec::Node(row), updated_at)
    }
}
