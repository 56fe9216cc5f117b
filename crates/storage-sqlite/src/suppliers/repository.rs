use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

use rentdesk_core::entities::{
    check_tenant_change, EntityRecord, NewSupplier, Supplier, SupplierRepositoryTrait,
};
use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::sync::SyncEntity;

use super::model::{NewSupplierDB, SupplierDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::outbox::mark_dirty;
use crate::schema::suppliers;

pub struct SupplierRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SupplierRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SupplierRepositoryTrait for SupplierRepository {
    fn get_supplier(&self, supplier_id: i64) -> Result<Option<Supplier>> {
        let mut conn = get_connection(&self.pool)?;
        let row = suppliers::table
            .find(supplier_id)
            .select(SupplierDB::as_select())
            .first::<SupplierDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Supplier::from))
    }

    fn list_suppliers_for_tenant(&self, tenant_id: &str) -> Result<Vec<Supplier>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = suppliers::table
            .filter(suppliers::tenant_id.eq(tenant_id))
            .order(suppliers::name.asc())
            .select(SupplierDB::as_select())
            .load::<SupplierDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Supplier::from).collect())
    }

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = suppliers::table
            .filter(suppliers::tenant_id.eq(tenant_id))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn insert_supplier(&self, new_supplier: NewSupplier) -> Result<Supplier> {
        new_supplier.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Supplier> {
                let now = Utc::now();
                let row = NewSupplierDB::from_domain(new_supplier, &now.to_rfc3339());
                let inserted = diesel::insert_into(suppliers::table)
                    .values(&row)
                    .returning(SupplierDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Supplier, inserted.id, now);
                Ok(Supplier::from(inserted))
            })
            .await
    }

    async fn update_supplier(&self, supplier: Supplier) -> Result<Supplier> {
        supplier.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Supplier> {
                let existing = suppliers::table
                    .find(supplier.id)
                    .select(SupplierDB::as_select())
                    .first::<SupplierDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        Error::Database(DatabaseError::NotFound(format!("supplier {}", supplier.id)))
                    })?;
                check_tenant_change(existing.tenant_id.as_deref(), supplier.tenant_id.as_deref())?;

                let now = Utc::now();
                let mut row = SupplierDB::from(supplier);
                row.created_at = existing.created_at;
                row.updated_at = now.to_rfc3339();
                let updated = diesel::update(suppliers::table.find(row.id))
                    .set(&row)
                    .returning(SupplierDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Supplier, updated.id, now);
                Ok(Supplier::from(updated))
            })
            .await
    }
}
