//! Roles, ClusterRoles and RoleBindings.
//!
//! Objects whose name carries the reserved `system:` prefix belong to the
//! control plane and are left out of the mirror.

use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use mirror_core::ResourceKind;
use mirror_store::spec::{RoleBindingSpec, RoleSpec, RuleSummary, SubjectSummary};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta;

pub const RESERVED_PREFIX: &str = "system:";

pub fn is_reserved(meta: &ObjectMeta) -> bool {
    meta.name
        .as_deref()
        .is_some_and(|name| name.starts_with(RESERVED_PREFIX))
}

fn rules(list: Option<&Vec<PolicyRule>>) -> Vec<RuleSummary> {
    list.into_iter()
        .flatten()
        .map(|r| RuleSummary {
            api_groups: r.api_groups.clone().unwrap_or_default(),
            resources: r.resources.clone().unwrap_or_default(),
            verbs: r.verbs.clone(),
        })
        .collect()
}

pub struct RoleAdapter;

impl ResourceAdapter for RoleAdapter {
    type Source = Role;
    const KIND: ResourceKind = ResourceKind::Role;

    fn project(source: &Role) -> Option<MirrorRow> {
        if is_reserved(&source.metadata) {
            return None;
        }
        let row = RoleSpec {
            creator: meta::creator(&source.metadata),
            rules: rules(source.rules.as_ref()),
        };
        meta::build_row(&source.metadata, RowSpec::Role(row), None)
    }
}

pub struct ClusterRoleAdapter;

impl ResourceAdapter for ClusterRoleAdapter {
    type Source = ClusterRole;
    const KIND: ResourceKind = ResourceKind::ClusterRole;

    fn project(source: &ClusterRole) -> Option<MirrorRow> {
        if is_reserved(&source.metadata) {
            return None;
        }
        let row = RoleSpec {
            creator: meta::creator(&source.metadata),
            rules: rules(source.rules.as_ref()),
        };
        meta::build_row(&source.metadata, RowSpec::ClusterRole(row), None)
    }
}

pub struct RoleBindingAdapter;

impl ResourceAdapter for RoleBindingAdapter {
    type Source = RoleBinding;
    const KIND: ResourceKind = ResourceKind::RoleBinding;

    fn project(source: &RoleBinding) -> Option<MirrorRow> {
        if is_reserved(&source.metadata) {
            return None;
        }
        let row = RoleBindingSpec {
            role: source.role_ref.name.clone(),
            role_kind: source.role_ref.kind.clone(),
            subjects: source
                .subjects
                .iter()
                .flatten()
                .map(|s| SubjectSummary {
                    kind: s.kind.clone(),
                    name: s.name.clone(),
                    namespace: s.namespace.clone().unwrap_or_default(),
                })
                .collect(),
        };
        meta::build_row(&source.metadata, RowSpec::RoleBinding(row), None)
    }
}
