use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::SqliteConnection;
use log::{debug, info};

use rentdesk_core::errors::{Error, Result};
use rentdesk_core::sync::{BackfillReport, SyncEntity, TenantBackfillTrait};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::outbox::mark_dirty;
use crate::sql::{quote_identifier, validate_sync_table, CountRow};

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

pub struct TenantBackfillRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TenantBackfillRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Tracked rows that still have no owner.
    pub fn count_unowned(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let mut total = 0;
        for entity in SyncEntity::ALL {
            let row = diesel::sql_query(format!(
                "SELECT COUNT(*) AS c FROM {} WHERE tenant_id IS NULL",
                quote_identifier(entity.table_name())
            ))
            .get_result::<CountRow>(&mut conn)
            .map_err(StorageError::from)?;
            total += row.c;
        }
        Ok(total)
    }
}

fn stamp_table(
    conn: &mut SqliteConnection,
    entity: SyncEntity,
    tenant_id: &str,
    now: chrono::DateTime<Utc>,
) -> Result<usize> {
    let table = entity.table_name();
    validate_sync_table(table)?;
    let table = quote_identifier(table);

    let ids = diesel::sql_query(format!("SELECT id FROM {table} WHERE tenant_id IS NULL ORDER BY id"))
        .load::<IdRow>(conn)
        .map_err(StorageError::from)?;
    if ids.is_empty() {
        return Ok(0);
    }

    let updated = diesel::sql_query(format!(
        "UPDATE {table} SET tenant_id = ?, updated_at = ? WHERE tenant_id IS NULL"
    ))
    .bind::<Text, _>(tenant_id)
    .bind::<Text, _>(now.to_rfc3339())
    .execute(conn)
    .map_err(StorageError::from)?;

    for row in &ids {
        mark_dirty(conn, entity, row.id, now);
    }
    debug!(
        "[Backfill] Stamped {} {} rows with tenant {}",
        updated,
        entity.table_name(),
        tenant_id
    );
    Ok(updated)
}

#[async_trait]
impl TenantBackfillTrait for TenantBackfillRepository {
    async fn backfill_tenant_id(&self, tenant_id: &str) -> Result<BackfillReport> {
        let tenant_id = tenant_id.trim().to_string();
        if tenant_id.is_empty() {
            return Err(Error::Validation("tenant id must not be empty".to_string()));
        }

        let report = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<BackfillReport> {
                let now = Utc::now();
                let mut report = BackfillReport::new(tenant_id.clone());
                for entity in SyncEntity::ALL {
                    let stamped = stamp_table(conn, entity, &tenant_id, now)?;
                    if stamped > 0 {
                        report.stamped.insert(entity, stamped);
                    }
                }
                Ok(report)
            })
            .await?;

        if report.total() > 0 {
            info!(
                "[Backfill] Assigned tenant {} to {} legacy rows",
                report.tenant_id,
                report.total()
            );
        }
        Ok(report)
    }
}
