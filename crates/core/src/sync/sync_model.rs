//! Sync domain models and the outbox contract consumed by the push synchronizer.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Canonical list of local tables that participate in cloud sync, in restore order.
pub const SYNC_TABLES: [&str; 4] = ["customers", "suppliers", "reservations", "payments"];

/// Entity names used by the outbox and the remote collection layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    /// Renter, matched across stores by national id number
    Customer,
    /// Car rental company, matched by name
    Supplier,
    /// Booking, matched by supplier contract number
    Reservation,
    /// Payment against a reservation, matched by receipt number
    Payment,
}

impl SyncEntity {
    pub const ALL: [SyncEntity; 4] = [
        SyncEntity::Customer,
        SyncEntity::Supplier,
        SyncEntity::Reservation,
        SyncEntity::Payment,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Supplier => "supplier",
            Self::Reservation => "reservation",
            Self::Payment => "payment",
        }
    }

    pub fn from_db_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_db_str() == value)
            .ok_or_else(|| Error::Sync(format!("Unsupported sync entity '{value}'")))
    }

    /// Local table holding this entity. Remote collections use the same name.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Supplier => "suppliers",
            Self::Reservation => "reservations",
            Self::Payment => "payments",
        }
    }

    pub fn from_table_name(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|entity| entity.table_name() == table)
    }
}

/// Outcome of the last push attempt for an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Dirtied since the last push
    Pending,
    /// Last push succeeded
    Ok,
    /// Last push failed; the entry stays dirty
    Error,
}

impl SyncStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }

    pub fn from_db_str(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            other => Err(Error::Sync(format!("Unknown sync status '{other}'"))),
        }
    }
}

/// One row of the dirty outbox. At most one exists per (entity, entity_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub entity: SyncEntity,
    pub entity_id: i64,
    pub is_dirty: bool,
    /// Epoch milliseconds of the latest local mutation.
    pub last_dirty_at: i64,
    pub last_sync_status: SyncStatus,
    pub last_sync_error: Option<String>,
}

impl OutboxEntry {
    pub fn last_dirty_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.last_dirty_at).single()
    }
}

/// Result reported by the push synchronizer for one outbox row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkSyncedRequest {
    pub entity: SyncEntity,
    pub entity_id: i64,
    pub status: SyncStatus,
    pub error: Option<String>,
    /// `last_dirty_at` of the entry that was pushed. A success only clears the
    /// dirty flag when no newer mutation landed after it.
    pub pushed_dirty_at: Option<i64>,
}

impl MarkSyncedRequest {
    pub fn ok(entity: SyncEntity, entity_id: i64, pushed_dirty_at: i64) -> Self {
        Self {
            entity,
            entity_id,
            status: SyncStatus::Ok,
            error: None,
            pushed_dirty_at: Some(pushed_dirty_at),
        }
    }

    pub fn failed(entity: SyncEntity, entity_id: i64, error: impl Into<String>) -> Self {
        Self {
            entity,
            entity_id,
            status: SyncStatus::Error,
            error: Some(error.into()),
            pushed_dirty_at: None,
        }
    }
}

/// What happened to the dirty marker written alongside a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyMark {
    Recorded,
    /// The marker could not be written; the mutation itself still commits.
    Failed(String),
}

impl DirtyMark {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded)
    }
}

/// Read/write side of the outbox used by the external push synchronizer.
#[async_trait]
pub trait OutboxRepositoryTrait: Send + Sync {
    fn list_dirty(&self, limit: i64) -> Result<Vec<OutboxEntry>>;

    fn get_entry(&self, entity: SyncEntity, entity_id: i64) -> Result<Option<OutboxEntry>>;

    fn count_dirty(&self) -> Result<i64>;

    async fn mark_dirty(&self, entity: SyncEntity, entity_id: i64, at: DateTime<Utc>)
        -> Result<DirtyMark>;

    async fn mark_synced(&self, request: MarkSyncedRequest) -> Result<()>;
}
