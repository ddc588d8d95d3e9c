//! Mirror store trait and the in-memory implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use mirror_core::{Conditions, Order, OrderField, Paging, ResourceKind};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::row::{MirrorRow, RowKey, StoredRow};

/// Trait for mirror table backends.
///
/// One table per kind. A table is only ever written by its kind's controller;
/// reads may come from anywhere.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Drop every row of a kind and recreate its empty table, atomically.
    async fn reset(&self, kind: ResourceKind) -> StoreResult<()>;

    /// Insert a new row. Fails with `AlreadyExists` if the key is taken.
    async fn insert(&self, row: &MirrorRow) -> StoreResult<()>;

    /// Insert or replace the row with this key.
    async fn upsert(&self, row: &MirrorRow) -> StoreResult<()>;

    /// Remove a row by key. Returns whether a row was removed.
    async fn remove(&self, kind: ResourceKind, key: &RowKey) -> StoreResult<bool>;

    /// Count rows matching every condition.
    async fn count(&self, kind: ResourceKind, conditions: &Conditions) -> StoreResult<usize>;

    /// List matching rows in `order`, windowed by `paging` when given.
    ///
    /// Returns the total number of matching rows alongside the window.
    async fn list(
        &self,
        kind: ResourceKind,
        conditions: &Conditions,
        paging: Option<Paging>,
        order: Order,
    ) -> StoreResult<(usize, Vec<MirrorRow>)>;

    /// Cheap round trip used by the health monitor.
    async fn ping(&self) -> StoreResult<()>;
}

/// Compare stored rows by `order`, breaking ties on the key.
pub fn compare_rows(a: &StoredRow, b: &StoredRow, order: Order) -> Ordering {
    let primary = match order.field {
        OrderField::Name => a.name.cmp(&b.name),
        OrderField::CreatedAt => a.created_at_ms.cmp(&b.created_at_ms),
        OrderField::UpdatedAt => a.updated_at_ms.cmp(&b.updated_at_ms),
        OrderField::Status => a.status.cmp(&b.status),
    };
    let primary = if order.descending {
        primary.reverse()
    } else {
        primary
    };
    primary.then_with(|| a.key.cmp(&b.key))
}

type Table = BTreeMap<String, StoredRow>;

/// In-memory mirror store.
///
/// Rows go through the same encode/decode boundary as the database store.
/// Availability can be toggled to simulate an outage.
pub struct InMemoryMirrorStore {
    tables: RwLock<HashMap<ResourceKind, Table>>,
    available: AtomicBool,
}

impl Default for InMemoryMirrorStore {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryMirrorStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every operation fail (or succeed again) with a connection error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::connection_failed("store unavailable"))
        }
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn reset(&self, kind: ResourceKind) -> StoreResult<()> {
        self.check_available()?;
        self.tables.write().await.insert(kind, Table::new());
        Ok(())
    }

    async fn insert(&self, row: &MirrorRow) -> StoreResult<()> {
        self.check_available()?;
        let stored = row.encode()?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(row.kind()).or_default();
        if table.contains_key(&stored.key) {
            return Err(StoreError::already_exists(stored.key));
        }
        table.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn upsert(&self, row: &MirrorRow) -> StoreResult<()> {
        self.check_available()?;
        let stored = row.encode()?;
        self.tables
            .write()
            .await
            .entry(row.kind())
            .or_default()
            .insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn remove(&self, kind: ResourceKind, key: &RowKey) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self
            .tables
            .write()
            .await
            .get_mut(&kind)
            .and_then(|table| table.remove(&key.id()))
            .is_some())
    }

    async fn count(&self, kind: ResourceKind, conditions: &Conditions) -> StoreResult<usize> {
        self.check_available()?;
        Ok(self.tables.read().await.get(&kind).map_or(0, |table| {
            table
                .values()
                .filter(|row| conditions.matches(|c| row.field(c)))
                .count()
        }))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        conditions: &Conditions,
        paging: Option<Paging>,
        order: Order,
    ) -> StoreResult<(usize, Vec<MirrorRow>)> {
        self.check_available()?;
        let mut matching: Vec<StoredRow> = self
            .tables
            .read()
            .await
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|row| conditions.matches(|c| row.field(c)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let total = matching.len();
        matching.sort_by(|a, b| compare_rows(a, b, order));

        let window: Vec<&StoredRow> = match paging {
            Some(p) => matching.iter().skip(p.offset).take(p.limit).collect(),
            None => matching.iter().collect(),
        };
        let rows = window
            .into_iter()
            .map(StoredRow::decode)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((total, rows))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{deployment_row, pod_row};
    use mirror_core::Order;

    #[tokio::test]
    async fn test_insert_then_count() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        store.insert(&deployment_row("default", "web", "running", 10)).await?;
        store.insert(&deployment_row("default", "api", "stopped", 20)).await?;

        assert_eq!(store.count(ResourceKind::Deployment, &Conditions::new()).await?, 2);
        let stopped = Conditions::new().with("status", "stopped");
        assert_eq!(store.count(ResourceKind::Deployment, &stopped).await?, 1);
        assert_eq!(store.count(ResourceKind::Pod, &Conditions::new()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        let row = deployment_row("default", "web", "running", 10);
        store.insert(&row).await?;
        let again = store.insert(&row).await;
        assert!(matches!(again, Err(StoreError::AlreadyExists { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_replaces() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        store.upsert(&deployment_row("default", "web", "running", 10)).await?;
        store.upsert(&deployment_row("default", "web", "stopped", 11)).await?;

        let (total, rows) = store
            .list(ResourceKind::Deployment, &Conditions::new(), None, Order::default())
            .await?;
        assert_eq!(total, 1);
        assert_eq!(rows.first().map(MirrorRow::status), Some("stopped"));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        store.insert(&pod_row("default", "p1", "n1", 5)).await?;
        let key = RowKey::namespaced("default", "ghost");
        assert!(!store.remove(ResourceKind::Pod, &key).await?);
        assert_eq!(store.count(ResourceKind::Pod, &Conditions::new()).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_clears_only_one_kind() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        store.insert(&pod_row("default", "p1", "n1", 5)).await?;
        store.insert(&deployment_row("default", "web", "running", 10)).await?;
        store.reset(ResourceKind::Pod).await?;
        assert_eq!(store.count(ResourceKind::Pod, &Conditions::new()).await?, 0);
        assert_eq!(store.count(ResourceKind::Deployment, &Conditions::new()).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_order_is_most_recent_first() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        store.insert(&deployment_row("default", "old", "running", 1)).await?;
        store.insert(&deployment_row("default", "new", "running", 3)).await?;
        store.insert(&deployment_row("default", "mid", "running", 2)).await?;

        let (_, rows) = store
            .list(ResourceKind::Deployment, &Conditions::new(), None, Order::default())
            .await?;
        let names: Vec<&str> = rows.iter().map(|r| r.key.name.as_str()).collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_paging_window_and_total() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        for i in 0..5 {
            store
                .insert(&deployment_row("default", &format!("d{i}"), "running", i))
                .await?;
        }
        let (total, rows) = store
            .list(
                ResourceKind::Deployment,
                &Conditions::new(),
                Some(Paging::new(2, 4)),
                Order::ascending(OrderField::Name),
            )
            .await?;
        assert_eq!(total, 5);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().map(|r| r.key.name.as_str()), Some("d4"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() -> StoreResult<()> {
        let store = InMemoryMirrorStore::new();
        store.set_available(false);
        assert!(store.ping().await.is_err());
        let insert = store.insert(&pod_row("default", "p1", "n1", 5)).await;
        assert!(matches!(insert, Err(StoreError::ConnectionFailed { .. })));
        store.set_available(true);
        store.ping().await
    }
}
