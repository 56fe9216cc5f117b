use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

use rentdesk_core::entities::{
    check_tenant_change, EntityRecord, NewPayment, Payment, PaymentRepositoryTrait,
};
use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::sync::SyncEntity;

use super::model::{NewPaymentDB, PaymentDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::outbox::mark_dirty;
use crate::schema::payments;

pub struct PaymentRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PaymentRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl PaymentRepositoryTrait for PaymentRepository {
    fn get_payment(&self, payment_id: i64) -> Result<Option<Payment>> {
        let mut conn = get_connection(&self.pool)?;
        let row = payments::table
            .find(payment_id)
            .select(PaymentDB::as_select())
            .first::<PaymentDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Payment::from))
    }

    fn list_payments_for_tenant(&self, tenant_id: &str) -> Result<Vec<Payment>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = payments::table
            .filter(payments::tenant_id.eq(tenant_id))
            .order((payments::paid_at.desc(), payments::id.desc()))
            .select(PaymentDB::as_select())
            .load::<PaymentDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = payments::table
            .filter(payments::tenant_id.eq(tenant_id))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn insert_payment(&self, new_payment: NewPayment) -> Result<Payment> {
        new_payment.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Payment> {
                let now = Utc::now();
                let row = NewPaymentDB::from_domain(new_payment, &now.to_rfc3339());
                let inserted = diesel::insert_into(payments::table)
                    .values(&row)
                    .returning(PaymentDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Payment, inserted.id, now);
                Ok(Payment::from(inserted))
            })
            .await
    }

    async fn update_payment(&self, payment: Payment) -> Result<Payment> {
        payment.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Payment> {
                let existing = payments::table
                    .find(payment.id)
                    .select(PaymentDB::as_select())
                    .first::<PaymentDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        Error::Database(DatabaseError::NotFound(format!("payment {}", payment.id)))
                    })?;
                check_tenant_change(existing.tenant_id.as_deref(), payment.tenant_id.as_deref())?;

                let now = Utc::now();
                let mut row = PaymentDB::from(payment);
                row.created_at = existing.created_at;
                row.updated_at = now.to_rfc3339();
                let updated = diesel::update(payments::table.find(row.id))
                    .set(&row)
                    .returning(PaymentDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Payment, updated.id, now);
                Ok(Payment::from(updated))
            })
            .await
    }
}
