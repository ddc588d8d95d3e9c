//! Query facade over a registry fed by in-memory sources.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

mod common;

use std::sync::Arc;

use mirror_adapters::{ClusterRoleAdapter, ConfigMapAdapter, DeploymentAdapter, PersistentVolumeClaimAdapter};
use mirror_core::{Error, ResourceKind};
use mirror_reconciler::testing::FakeProvider;
use mirror_reconciler::{ControllerState, QueryFacade, Registry, RegistryConfig, ResourceList};
use mirror_store::InMemoryMirrorStore;

use common::{claim, cluster_role, config_map, deployment, eventually};

async fn running(
    provider: Arc<FakeProvider>,
    kinds: &[ResourceKind],
) -> Result<(Arc<Registry<FakeProvider>>, QueryFacade<FakeProvider>), String> {
    let registry = Registry::new(
        InMemoryMirrorStore::new_arc(),
        provider,
        RegistryConfig::for_testing(),
    );
    registry.run_all(kinds).await;
    let expected = kinds.len();
    let live = &registry;
    eventually("every controller to watch", || async move {
        let states = live.states().await;
        states.len() == expected
            && states.values().all(|s| s.state == ControllerState::Watching)
    })
    .await?;
    let facade = QueryFacade::new(Arc::clone(&registry));
    Ok((registry, facade))
}

/// Five deployments in `shop`, `b` and `d` scaled to zero.
fn shop_deployments(provider: &FakeProvider) -> Result<(), String> {
    let source = provider.source_for::<DeploymentAdapter>();
    for (name, replicas) in [("a", 2), ("b", 0), ("c", 1), ("d", 0), ("e", 3)] {
        source.apply(deployment("shop", name, replicas)?);
    }
    Ok(())
}

fn names(list: &ResourceList) -> Vec<&str> {
    list.items.iter().map(|row| row.key.name.as_str()).collect()
}

#[tokio::test]
async fn test_unpaged_list_reports_single_page() -> Result<(), String> {
    // GIVEN: five deployments, two stopped
    let provider = Arc::new(FakeProvider::new());
    shop_deployments(&provider)?;
    let (registry, facade) = running(provider, &[ResourceKind::Deployment]).await?;

    // WHEN: listing stopped ones without paging
    let list = facade
        .list_resource("deployments", "status=stopped", "")
        .await
        .map_err(|e| format!("list failed: {e}"))?;

    // THEN: the whole matching set comes back as page 1
    assert_eq!((list.total, list.page, list.limit), (2, 1, 2));
    let mut stopped = names(&list);
    stopped.sort_unstable();
    assert_eq!(stopped, vec!["b", "d"]);

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_paging_and_ordering() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    shop_deployments(&provider)?;
    let (registry, facade) = running(provider, &[ResourceKind::Deployment]).await?;

    let second = facade
        .list_resource("deploy", "namespace=shop", "page=2,limit=2,order=name")
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    assert_eq!((second.total, second.page, second.limit), (5, 2, 2));
    assert_eq!(names(&second), vec!["c", "d"]);

    let last = facade
        .list_resource("deployments", "", "page=3,limit=2,order=name")
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    assert_eq!(names(&last), vec!["e"]);

    let past_end = facade
        .list_resource("deployments", "", "page=9,limit=2")
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    assert_eq!(past_end.total, 5);
    assert!(past_end.items.is_empty());

    let newest_names = facade
        .list_resource("deployments", "", "limit=2,order=name,desc=true")
        .await
        .map_err(|e| format!("list failed: {e}"))?;
    assert_eq!(names(&newest_names), vec!["e", "d"]);

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_caller_errors() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    shop_deployments(&provider)?;
    let (registry, facade) = running(provider, &[ResourceKind::Deployment]).await?;

    assert!(matches!(
        facade.list_resource("widgets", "", "").await,
        Err(Error::UnknownKind { .. })
    ));
    assert_eq!(
        facade.list_resource("pods", "", "").await,
        Err(Error::not_running("pods"))
    );
    assert!(matches!(
        facade.list_resource("deployments", "colour=red", "").await,
        Err(Error::InvalidQuery { .. })
    ));
    assert!(matches!(
        facade.list_resource("deployments", "status", "").await,
        Err(Error::InvalidQuery { .. })
    ));
    assert!(matches!(
        facade.list_resource("deployments", "", "page=0").await,
        Err(Error::InvalidQuery { .. })
    ));
    assert!(matches!(
        facade.count_resource("deployments", "=web").await,
        Err(Error::InvalidQuery { .. })
    ));

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_namespace_condition_ignored_for_cluster_kinds() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    let roles = provider.source_for::<ClusterRoleAdapter>();
    roles.apply(cluster_role("viewer")?);
    roles.apply(cluster_role("editor")?);
    let (registry, facade) = running(provider, &[ResourceKind::ClusterRole]).await?;

    let count = facade
        .count_resource("clusterroles", "namespace=shop")
        .await
        .map_err(|e| format!("count failed: {e}"))?;
    assert_eq!(count, 2);

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_component_status_defaults_to_system_namespace() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    let deployments = provider.source_for::<DeploymentAdapter>();
    deployments.apply(deployment("kube-system", "coredns", 2)?);
    deployments.apply(common::updating_deployment("kube-system", "metrics-server")?);
    deployments.apply(deployment("shop", "web", 1)?);
    // StatefulSets and DaemonSets are not registered and are left out.
    let (registry, facade) = running(provider, &[ResourceKind::Deployment]).await?;

    let report = facade
        .component_status(&[])
        .await
        .map_err(|e| format!("status failed: {e}"))?;
    assert_eq!((report.total, report.healthy), (2, 1));
    let unhealthy: Vec<&str> = report
        .components
        .iter()
        .filter(|c| !c.healthy)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(unhealthy, vec!["metrics-server"]);

    let shop = facade
        .component_status(&["shop"])
        .await
        .map_err(|e| format!("status failed: {e}"))?;
    assert_eq!((shop.total, shop.healthy), (1, 1));

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_quotas_count_per_kind() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    shop_deployments(&provider)?;
    let maps = provider.source_for::<ConfigMapAdapter>();
    maps.apply(config_map("shop", "settings", "1")?);
    maps.apply(config_map("other", "settings", "1")?);
    provider
        .source_for::<ClusterRoleAdapter>()
        .apply(cluster_role("viewer")?);
    let kinds = [
        ResourceKind::Deployment,
        ResourceKind::ConfigMap,
        ResourceKind::ClusterRole,
    ];
    let (registry, facade) = running(provider, &kinds).await?;

    let shop = facade
        .namespace_quota("shop")
        .await
        .map_err(|e| format!("quota failed: {e}"))?;
    assert_eq!(shop.namespace, "shop");
    assert_eq!(shop.used.get(&ResourceKind::Deployment), Some(&5));
    assert_eq!(shop.used.get(&ResourceKind::ConfigMap), Some(&1));
    assert!(!shop.used.contains_key(&ResourceKind::ClusterRole));

    let cluster = facade
        .cluster_quota()
        .await
        .map_err(|e| format!("quota failed: {e}"))?;
    assert_eq!(cluster.get(&ResourceKind::Deployment), Some(&5));
    assert_eq!(cluster.get(&ResourceKind::ConfigMap), Some(&2));
    assert_eq!(cluster.get(&ResourceKind::ClusterRole), Some(&1));

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_storage_class_usage_counts_bound_claims() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    let claims = provider.source_for::<PersistentVolumeClaimAdapter>();
    claims.apply(claim("shop", "data-0", "fast", "Bound")?);
    claims.apply(claim("shop", "data-1", "fast", "Bound")?);
    claims.apply(claim("shop", "data-2", "fast", "Pending")?);
    claims.apply(claim("shop", "logs", "slow", "Bound")?);
    let (registry, facade) = running(provider, &[ResourceKind::PersistentVolumeClaim]).await?;

    assert_eq!(facade.storage_class_usage("fast").await, Ok(2));
    assert_eq!(facade.storage_class_usage("slow").await, Ok(1));
    assert_eq!(facade.storage_class_usage("none").await, Ok(0));

    registry.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_storage_class_usage_without_claim_controller() -> Result<(), String> {
    let provider = Arc::new(FakeProvider::new());
    let (registry, facade) = running(provider, &[]).await?;
    assert_eq!(
        facade.storage_class_usage("fast").await,
        Err(Error::not_running("persistentvolumeclaims"))
    );
    registry.shutdown().await;
    Ok(())
}
