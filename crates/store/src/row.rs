//! Mirror rows and their persisted encoding.
//!
//! `MirrorRow` is the typed form the rest of the crate works with.
//! `StoredRow` is what a table actually holds: flat, string-typed filter
//! columns plus the structured parts encoded as JSON text. Conversion happens
//! only at the store edge, in [`MirrorRow::encode`] and [`StoredRow::decode`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use mirror_core::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::spec::RowSpec;

/// Identity of a mirrored object: `name` for cluster-scoped kinds,
/// `(namespace, name)` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl RowKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Record id inside the kind's table.
    #[must_use]
    pub fn id(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// A denormalized projection of one live cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRow {
    pub key: RowKey,
    pub uid: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub spec: RowSpec,
}

impl MirrorRow {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    #[must_use]
    pub const fn status(&self) -> &'static str {
        self.spec.status()
    }

    /// Encode for storage.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SerializationError` if a blob cannot be encoded.
    pub fn encode(&self) -> StoreResult<StoredRow> {
        Ok(StoredRow {
            key: self.key.id(),
            name: self.key.name.clone(),
            namespace: self.key.namespace.clone().unwrap_or_default(),
            uid: self.uid.clone(),
            status: self.status().to_string(),
            created_at_ms: self.created_at.timestamp_millis(),
            updated_at_ms: self.updated_at.timestamp_millis(),
            columns: self.spec.columns(),
            annotations: serde_json::to_string(&self.annotations)?,
            labels: serde_json::to_string(&self.labels)?,
            spec: serde_json::to_string(&self.spec)?,
        })
    }
}

/// The persisted shape of a mirror row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub key: String,
    pub name: String,
    /// Empty for cluster-scoped kinds.
    pub namespace: String,
    pub uid: String,
    /// Empty for kinds without a derived status.
    pub status: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub columns: BTreeMap<String, String>,
    pub annotations: String,
    pub labels: String,
    pub spec: String,
}

impl StoredRow {
    /// Value of a filterable column.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "name" => Some(&self.name),
            "namespace" => Some(&self.namespace),
            "uid" => Some(&self.uid),
            "status" => Some(&self.status),
            other => self.columns.get(other).map(String::as_str),
        }
    }

    /// Decode back into a typed row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::SerializationError` if a blob or timestamp is corrupt.
    pub fn decode(&self) -> StoreResult<MirrorRow> {
        let key = if self.namespace.is_empty() {
            RowKey::cluster(self.name.clone())
        } else {
            RowKey::namespaced(self.namespace.clone(), self.name.clone())
        };
        Ok(MirrorRow {
            key,
            uid: self.uid.clone(),
            created_at: from_millis(self.created_at_ms)?,
            updated_at: from_millis(self.updated_at_ms)?,
            annotations: serde_json::from_str(&self.annotations)?,
            labels: serde_json::from_str(&self.labels)?,
            spec: serde_json::from_str(&self.spec)?,
        })
    }
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::serialization_error(format!("timestamp out of range: {ms}")))
}
