use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use log::error;

use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::sync::{
    DirtyMark, MarkSyncedRequest, OutboxEntry, OutboxRepositoryTrait, SyncEntity, SyncStatus,
};

use super::model::OutboxEntryDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_outbox;

const UPSERT_DIRTY_SQL: &str = "INSERT INTO sync_outbox
        (entity_type, entity_id, is_dirty, last_dirty_at, last_sync_status, last_sync_error)
    VALUES (?, ?, 1, ?, 'pending', NULL)
    ON CONFLICT (entity_type, entity_id) DO UPDATE SET
        is_dirty = 1,
        last_dirty_at = MAX(sync_outbox.last_dirty_at, excluded.last_dirty_at),
        last_sync_status = 'pending',
        last_sync_error = NULL";

/// Records that `entity_id` changed locally.
///
/// Call it on the connection of the mutation's own transaction. The marker is
/// written in a savepoint: if it fails, only the savepoint is rolled back, the
/// failure is logged and returned, and the caller's mutation still commits.
pub fn mark_dirty(
    conn: &mut SqliteConnection,
    entity: SyncEntity,
    entity_id: i64,
    at: DateTime<Utc>,
) -> DirtyMark {
    let result = conn.transaction::<_, StorageError, _>(|sp| {
        diesel::sql_query(UPSERT_DIRTY_SQL)
            .bind::<Text, _>(entity.as_db_str())
            .bind::<BigInt, _>(entity_id)
            .bind::<BigInt, _>(at.timestamp_millis())
            .execute(sp)?;
        Ok(())
    });

    match result {
        Ok(()) => DirtyMark::Recorded,
        Err(e) => {
            error!(
                "[Outbox] Failed to mark {} {} dirty; it will not be pushed until modified again: {}",
                entity.as_db_str(),
                entity_id,
                e
            );
            DirtyMark::Failed(e.to_string())
        }
    }
}

pub struct OutboxRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl OutboxRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl OutboxRepositoryTrait for OutboxRepository {
    /// Dirty entries, oldest change first.
    fn list_dirty(&self, limit: i64) -> Result<Vec<OutboxEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_outbox::table
            .filter(sync_outbox::is_dirty.eq(true))
            .order((sync_outbox::last_dirty_at.asc(), sync_outbox::entity_id.asc()))
            .limit(limit)
            .select(OutboxEntryDB::as_select())
            .load::<OutboxEntryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(OutboxEntryDB::into_entry).collect()
    }

    fn get_entry(&self, entity: SyncEntity, entity_id: i64) -> Result<Option<OutboxEntry>> {
        let mut conn = get_connection(&self.pool)?;
        sync_outbox::table
            .find((entity.as_db_str(), entity_id))
            .select(OutboxEntryDB::as_select())
            .first::<OutboxEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(OutboxEntryDB::into_entry)
            .transpose()
    }

    fn count_dirty(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = sync_outbox::table
            .filter(sync_outbox::is_dirty.eq(true))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn mark_dirty(
        &self,
        entity: SyncEntity,
        entity_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DirtyMark> {
        self.writer
            .exec(move |conn| Ok(mark_dirty(conn, entity, entity_id, at)))
            .await
    }

    /// Records a push result. A success clears the dirty flag only if no newer
    /// mutation arrived after the pushed one; an error keeps the row dirty.
    async fn mark_synced(&self, request: MarkSyncedRequest) -> Result<()> {
        if request.status == SyncStatus::Pending {
            return Err(Error::Validation(
                "mark_synced expects an ok or error status".to_string(),
            ));
        }

        self.writer
            .exec(move |conn| {
                let key = (request.entity.as_db_str(), request.entity_id);
                let row = sync_outbox::table
                    .find(key)
                    .select(OutboxEntryDB::as_select())
                    .first::<OutboxEntryDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        Error::Database(DatabaseError::NotFound(format!(
                            "no outbox entry for {} {}",
                            request.entity.as_db_str(),
                            request.entity_id
                        )))
                    })?;

                match request.status {
                    SyncStatus::Ok => {
                        let pushed = request.pushed_dirty_at.unwrap_or(i64::MAX);
                        let superseded = row.last_dirty_at > pushed;
                        let status = if superseded {
                            SyncStatus::Pending
                        } else {
                            SyncStatus::Ok
                        };
                        diesel::update(sync_outbox::table.find(key))
                            .set((
                                sync_outbox::is_dirty.eq(superseded),
                                sync_outbox::last_sync_status.eq(status.as_db_str()),
                                sync_outbox::last_sync_error.eq::<Option<String>>(None),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                    _ => {
                        diesel::update(sync_outbox::table.find(key))
                            .set((
                                sync_outbox::is_dirty.eq(true),
                                sync_outbox::last_sync_status.eq(SyncStatus::Error.as_db_str()),
                                sync_outbox::last_sync_error.eq(request.error.clone()),
                            ))
                            .execute(conn)
                            .map_err(StorageError::from)?;
                    }
                }
                Ok(())
            })
            .await
    }
}
