use diesel::prelude::*;

use rentdesk_core::errors::Result;
use rentdesk_core::sync::{OutboxEntry, SyncEntity, SyncStatus};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = crate::schema::sync_outbox)]
#[diesel(primary_key(entity_type, entity_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OutboxEntryDB {
    pub entity_type: String,
    pub entity_id: i64,
    pub is_dirty: bool,
    pub last_dirty_at: i64,
    pub last_sync_status: String,
    pub last_sync_error: Option<String>,
}

impl OutboxEntryDB {
    pub fn into_entry(self) -> Result<OutboxEntry> {
        Ok(OutboxEntry {
            entity: SyncEntity::from_db_str(&self.entity_type)?,
            entity_id: self.entity_id,
            is_dirty: self.is_dirty,
            last_dirty_at: self.last_dirty_at,
            last_sync_status: SyncStatus::from_db_str(&self.last_sync_status)?,
            last_sync_error: self.last_sync_error,
        })
    }
}
