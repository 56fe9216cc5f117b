//! Result objects produced by cloud-to-local restore.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncEntity;

/// A single remote record (or whole collection) that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRecordError {
    pub entity: SyncEntity,
    /// Remote id when it could be read from the document.
    pub record_id: Option<String>,
    pub message: String,
}

/// Per-collection report returned by the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRestoreReport {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<RestoreRecordError>,
}

/// Aggregated counts for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRestoreSummary {
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<RestoreRecordError>,
}

/// Outcome of one `restore_missing_data_from_cloud` invocation. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub tenant_id: String,
    pub entities: BTreeMap<SyncEntity, EntityRestoreSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RestoreResult {
    pub fn new(tenant_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            entities: BTreeMap::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn summary_mut(&mut self, entity: SyncEntity) -> &mut EntityRestoreSummary {
        self.entities.entry(entity).or_default()
    }

    pub fn summary(&self, entity: SyncEntity) -> Option<&EntityRestoreSummary> {
        self.entities.get(&entity)
    }

    pub fn inserted_for(&self, entity: SyncEntity) -> usize {
        self.summary(entity).map(|s| s.inserted).unwrap_or(0)
    }

    /// Total number of records inserted across every entity type.
    pub fn restored_count(&self) -> usize {
        self.entities.values().map(|s| s.inserted).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.entities.values().map(|s| s.skipped).sum()
    }

    pub fn error_count(&self) -> usize {
        self.entities.values().map(|s| s.errors.len()).sum()
    }

    /// Errors in entity order, then in the order they were encountered.
    pub fn errors(&self) -> Vec<&RestoreRecordError> {
        self.entities
            .values()
            .flat_map(|summary| summary.errors.iter())
            .collect()
    }

    /// Partial restores count as success: any restored data beats none.
    pub fn is_success(&self) -> bool {
        true
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}
