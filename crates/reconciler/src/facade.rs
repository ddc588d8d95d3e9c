//! Caller-facing reads over the mirror.
//!
//! The facade turns the string-shaped requests of an API layer into
//! controller queries: a kind name, a `key=value,...` condition string and a
//! `page=<n>,limit=<n>` paging string. It also answers a few aggregates that
//! compose several kinds' counts and listings.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use mirror_core::{Conditions, Error, Order, OrderField, PageQuery, ResourceKind, Result};
use mirror_store::MirrorRow;
use serde::Serialize;
use tracing::debug;

use crate::controller::MirrorController;
use crate::registry::Registry;
use crate::source::SourceProvider;

/// Namespace `component_status` looks at when none are given.
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// Kinds whose objects count as cluster components.
pub const COMPONENT_KINDS: [ResourceKind; 3] = [
    ResourceKind::Deployment,
    ResourceKind::StatefulSet,
    ResourceKind::DaemonSet,
];

/// One page of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceList {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub items: Vec<MirrorRow>,
}

/// Health of one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub status: String,
    pub healthy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentReport {
    pub components: Vec<ComponentStatus>,
    pub healthy: usize,
    pub total: usize,
}

/// Object counts per kind within one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceUsage {
    pub namespace: String,
    pub used: BTreeMap<ResourceKind, usize>,
}

/// Read-only entry point for callers of the mirror.
pub struct QueryFacade<P: SourceProvider> {
    registry: Arc<Registry<P>>,
}

impl<P: SourceProvider> Clone for QueryFacade<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P: SourceProvider> QueryFacade<P> {
    pub const fn new(registry: Arc<Registry<P>>) -> Self {
        Self { registry }
    }

    async fn controller(&self, kind: ResourceKind) -> Result<Arc<dyn MirrorController>> {
        self.registry
            .lookup(kind)
            .await
            .ok_or_else(|| Error::not_running(kind.as_str()))
    }

    /// List one kind by name with string-shaped conditions and paging.
    ///
    /// Without paging the whole matching set comes back, reported as page 1
    /// with `limit == total`.
    ///
    /// # Errors
    ///
    /// `UnknownKind` for an unrecognised kind name, `InvalidQuery` for a
    /// malformed condition or paging string, `NotRunning` if the kind has no
    /// controller, and `QueryFailed` if the store cannot answer.
    pub async fn list_resource(
        &self,
        kind: &str,
        conditions: &str,
        paging: &str,
    ) -> Result<ResourceList> {
        let kind = ResourceKind::from_str(kind)?;
        let conditions = Conditions::parse(conditions)?;
        let query = PageQuery::parse(paging)?;
        let controller = self.controller(kind).await?;

        let (total, items) = controller
            .list(&conditions, query.page.map(|p| p.paging()), query.order)
            .await?;
        let (page, limit) = query.page.map_or((1, total), |p| (p.page, p.limit));
        debug!(kind = %kind, conditions = %conditions, total, page, limit, "Listed resources");
        Ok(ResourceList {
            total,
            page,
            limit,
            items,
        })
    }

    /// Count one kind by name with a string-shaped condition.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_resource`].
    pub async fn count_resource(&self, kind: &str, conditions: &str) -> Result<usize> {
        let kind = ResourceKind::from_str(kind)?;
        let conditions = Conditions::parse(conditions)?;
        self.controller(kind).await?.count(&conditions).await
    }

    /// Workload health across `namespaces`, `kube-system` when empty.
    ///
    /// Kinds without a running controller are left out.
    ///
    /// # Errors
    ///
    /// `QueryFailed` if a listing fails.
    pub async fn component_status(&self, namespaces: &[&str]) -> Result<ComponentReport> {
        let namespaces = if namespaces.is_empty() {
            &[SYSTEM_NAMESPACE][..]
        } else {
            namespaces
        };

        let mut report = ComponentReport::default();
        for kind in COMPONENT_KINDS {
            let Some(controller) = self.registry.lookup(kind).await else {
                debug!(kind = %kind, "Component kind not running");
                continue;
            };
            for namespace in namespaces {
                let conditions = Conditions::new().with("namespace", *namespace);
                let (_, rows) = controller
                    .list(&conditions, None, Order::ascending(OrderField::Name))
                    .await?;
                report.components.extend(rows.into_iter().map(|row| {
                    let status = row.status().to_string();
                    ComponentStatus {
                        kind,
                        namespace: row.key.namespace.clone().unwrap_or_default(),
                        name: row.key.name.clone(),
                        healthy: status == "running",
                        status,
                    }
                }));
            }
        }
        report.total = report.components.len();
        report.healthy = report.components.iter().filter(|c| c.healthy).count();
        Ok(report)
    }

    /// Object count per namespaced kind inside `namespace`.
    ///
    /// # Errors
    ///
    /// `QueryFailed` if a count fails.
    pub async fn namespace_quota(&self, namespace: &str) -> Result<NamespaceUsage> {
        let conditions = Conditions::new().with("namespace", namespace);
        let mut used = BTreeMap::new();
        for kind in self.registry.kinds().await {
            if !kind.is_namespaced() {
                continue;
            }
            let controller = self.controller(kind).await?;
            used.insert(kind, controller.count(&conditions).await?);
        }
        Ok(NamespaceUsage {
            namespace: namespace.to_string(),
            used,
        })
    }

    /// Total object count per registered kind.
    ///
    /// # Errors
    ///
    /// `QueryFailed` if a count fails.
    pub async fn cluster_quota(&self) -> Result<BTreeMap<ResourceKind, usize>> {
        let mut used = BTreeMap::new();
        for kind in self.registry.kinds().await {
            let controller = self.controller(kind).await?;
            used.insert(kind, controller.count(&Conditions::new()).await?);
        }
        Ok(used)
    }

    /// Number of claims bound through storage class `name`.
    ///
    /// # Errors
    ///
    /// `NotRunning` without a claim controller, `QueryFailed` if the count
    /// fails.
    pub async fn storage_class_usage(&self, name: &str) -> Result<usize> {
        let conditions = Conditions::new()
            .with("storage_class", name)
            .with("status", "bound");
        self.controller(ResourceKind::PersistentVolumeClaim)
            .await?
            .count(&conditions)
            .await
    }
}
