//! Job revision history.
//!
//! A bounded log of execution attempts kept in the Job's `revisions`
//! annotation. Entries are keyed by the Job UID, so a Job deleted and
//! re-created under the same name gets a new entry instead of overwriting
//! the previous run.

use std::collections::BTreeMap;

use mirror_store::spec::Revision;

pub const REVISIONS_ANNOTATION: &str = "revisions";

/// Entries kept; the oldest are dropped first.
pub const MAX_REVISIONS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionHistory {
    entries: Vec<Revision>,
}

impl RevisionHistory {
    /// Decode the history from an object's annotations.
    ///
    /// A missing or unreadable annotation yields an empty history.
    pub fn from_annotations(annotations: Option<&BTreeMap<String, String>>) -> Self {
        let Some(raw) = annotations.and_then(|a| a.get(REVISIONS_ANNOTATION)) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<Revision>>(raw) {
            Ok(mut entries) => {
                entries.sort_by_key(|e| e.revision);
                Self { entries }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable revision history");
                Self::default()
            }
        }
    }

    pub fn entries(&self) -> &[Revision] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Revision> {
        self.entries
    }

    /// Record an attempt. Returns whether the history changed.
    ///
    /// An attempt whose UID is already recorded replaces that entry (keeping
    /// its revision number) unless the status is unchanged. A new UID gets the
    /// next revision number.
    pub fn record(&mut self, attempt: Revision) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.uid == attempt.uid) {
            if existing.status == attempt.status {
                return false;
            }
            *existing = Revision {
                revision: existing.revision,
                ..attempt
            };
            return true;
        }

        let next = self
            .entries
            .iter()
            .map(|e| e.revision)
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        self.entries.push(Revision {
            revision: next,
            ..attempt
        });
        if self.entries.len() > MAX_REVISIONS {
            let excess = self.entries.len() - MAX_REVISIONS;
            self.entries.drain(..excess);
        }
        true
    }

    /// Annotation value for this history.
    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(&self.entries).ok()
    }
}
