//! SurrealDB-backed mirror store.
//!
//! One SCHEMALESS table per kind (`mirror_<kind>`), record id = row key.
//! Kind-specific filter columns live under a nested `columns` object.

use std::sync::Arc;

use async_trait::async_trait;
use mirror_core::{Conditions, Order, OrderField, Paging, ResourceKind};
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

use crate::error::{StoreError, StoreResult, from_surrealdb_error};
use crate::row::{MirrorRow, RowKey, StoredRow};
use crate::store::MirrorStore;

/// Configuration for the SurrealDB connection.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Connection URL (e.g., "mem://", "ws://localhost:8000")
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Optional root credentials
    pub credentials: Option<Credentials>,
}

/// Root credentials for authentication.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl StoreConfig {
    /// Create an in-memory configuration for testing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".to_string(),
            namespace: "cluster".to_string(),
            database: "mirror".to_string(),
            credentials: None,
        }
    }

    /// Build from the `[store]` section of the mirror configuration.
    #[must_use]
    pub fn from_settings(settings: &mirror_core::config::StoreSettings) -> Self {
        let credentials = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Self {
            url: settings.url.clone(),
            namespace: settings.namespace.clone(),
            database: settings.database.clone(),
            credentials,
        }
    }

    /// Set the connection URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set credentials for authentication.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

/// Mirror store on a SurrealDB connection.
#[derive(Debug, Clone)]
pub struct SurrealMirrorStore {
    db: Arc<Surreal<Any>>,
}

impl SurrealMirrorStore {
    /// Connect to the database with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or authentication fails.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let db = Surreal::<Any>::init();

        db.connect(config.url.as_str())
            .await
            .map_err(|e| StoreError::connection_failed(e.to_string()))?;

        if let Some(creds) = &config.credentials {
            db.signin(Root {
                username: &creds.username,
                password: &creds.password,
            })
            .await
            .map_err(|e| StoreError::connection_failed(e.to_string()))?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(from_surrealdb_error)?;

        tracing::info!(url = %config.url, ns = %config.namespace, db = %config.database, "Connected mirror store");
        Ok(Self { db: Arc::new(db) })
    }

    async fn write(&self, sql: &str, row: &MirrorRow) -> StoreResult<()> {
        let stored = row.encode()?;
        let key = stored.key.clone();
        self.db
            .query(sql)
            .bind(("tb", row.kind().table()))
            .bind(("id", key.clone()))
            .bind(("row", stored))
            .await
            .map_err(from_surrealdb_error)?
            .check()
            .map_err(|e| match from_surrealdb_error(e) {
                StoreError::AlreadyExists { .. } => StoreError::already_exists(key),
                other => other,
            })?;
        Ok(())
    }
}

/// Field path of a filterable column inside a stored record.
fn column_path(kind: ResourceKind, column: &str) -> StoreResult<String> {
    if ResourceKind::is_meta_column(column) {
        Ok(column.to_string())
    } else if kind.is_filterable(column) {
        Ok(format!("columns.{column}"))
    } else {
        Err(StoreError::query_failed(format!(
            "'{column}' is not a column of {kind}"
        )))
    }
}

/// Build a `WHERE` clause with values bound as `$c0`, `$c1`, ...
fn where_clause(
    kind: ResourceKind,
    conditions: &Conditions,
) -> StoreResult<(String, Vec<(String, String)>)> {
    let mut terms = Vec::with_capacity(conditions.len());
    let mut binds = Vec::with_capacity(conditions.len());
    for (i, (column, value)) in conditions.iter().enumerate() {
        let param = format!("c{i}");
        terms.push(format!("{} = ${param}", column_path(kind, column)?));
        binds.push((param, value.to_string()));
    }
    let clause = if terms.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", terms.join(" AND "))
    };
    Ok((clause, binds))
}

const fn order_column(field: OrderField) -> &'static str {
    match field {
        OrderField::Name => "name",
        OrderField::CreatedAt => "created_at_ms",
        OrderField::UpdatedAt => "updated_at_ms",
        OrderField::Status => "status",
    }
}

#[async_trait]
impl MirrorStore for SurrealMirrorStore {
    async fn reset(&self, kind: ResourceKind) -> StoreResult<()> {
        let table = kind.table();
        let sql = format!(
            "BEGIN TRANSACTION;
             REMOVE TABLE IF EXISTS {table};
             DEFINE TABLE {table} SCHEMALESS;
             COMMIT TRANSACTION;"
        );
        self.db
            .query(sql)
            .await
            .map_err(from_surrealdb_error)?
            .check()
            .map_err(|e| StoreError::schema_error(e.to_string()))?;
        Ok(())
    }

    async fn insert(&self, row: &MirrorRow) -> StoreResult<()> {
        self.write("CREATE type::thing($tb, $id) CONTENT $row RETURN NONE", row)
            .await
    }

    async fn upsert(&self, row: &MirrorRow) -> StoreResult<()> {
        self.write("UPSERT type::thing($tb, $id) CONTENT $row RETURN NONE", row)
            .await
    }

    async fn remove(&self, kind: ResourceKind, key: &RowKey) -> StoreResult<bool> {
        let removed: Vec<StoredRow> = self
            .db
            .query("DELETE type::thing($tb, $id) RETURN BEFORE")
            .bind(("tb", kind.table()))
            .bind(("id", key.id()))
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;
        Ok(!removed.is_empty())
    }

    async fn count(&self, kind: ResourceKind, conditions: &Conditions) -> StoreResult<usize> {
        let (clause, binds) = where_clause(kind, conditions)?;
        let sql = format!("SELECT count() FROM type::table($tb){clause} GROUP ALL");
        let query = binds
            .into_iter()
            .fold(self.db.query(sql).bind(("tb", kind.table())), |q, b| {
                q.bind(b)
            });
        let count: Option<CountRow> = query
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;
        Ok(count.map_or(0, |c| c.count))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        conditions: &Conditions,
        paging: Option<Paging>,
        order: Order,
    ) -> StoreResult<(usize, Vec<MirrorRow>)> {
        let (clause, binds) = where_clause(kind, conditions)?;
        let direction = if order.descending { "DESC" } else { "ASC" };
        let window = paging.map_or_else(String::new, |p| {
            format!(" LIMIT {} START {}", p.limit, p.offset)
        });
        let sql = format!(
            "SELECT count() FROM type::table($tb){clause} GROUP ALL;
             SELECT * FROM type::table($tb){clause} ORDER BY {} {direction}, key ASC{window};",
            order_column(order.field),
        );
        let query = binds
            .into_iter()
            .fold(self.db.query(sql).bind(("tb", kind.table())), |q, b| {
                q.bind(b)
            });
        let mut response = query.await.map_err(from_surrealdb_error)?;
        let total: Option<CountRow> = response.take(0).map_err(from_surrealdb_error)?;
        let stored: Vec<StoredRow> = response.take(1).map_err(from_surrealdb_error)?;
        let rows = stored
            .iter()
            .map(StoredRow::decode)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((total.map_or(0, |c| c.count), rows))
    }

    async fn ping(&self) -> StoreResult<()> {
        let alive: Option<bool> = self
            .db
            .query("RETURN true")
            .await
            .map_err(from_surrealdb_error)?
            .take(0)
            .map_err(from_surrealdb_error)?;
        match alive {
            Some(true) => Ok(()),
            _ => Err(StoreError::query_failed("ping returned no value")),
        }
    }
}
