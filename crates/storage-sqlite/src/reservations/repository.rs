use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;

use rentdesk_core::entities::{
    check_tenant_change, EntityRecord, NewReservation, Reservation, ReservationRepositoryTrait,
};
use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::sync::SyncEntity;

use super::model::{NewReservationDB, ReservationDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::outbox::mark_dirty;
use crate::schema::reservations;

pub struct ReservationRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ReservationRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ReservationRepositoryTrait for ReservationRepository {
    fn get_reservation(&self, reservation_id: i64) -> Result<Option<Reservation>> {
        let mut conn = get_connection(&self.pool)?;
        reservations::table
            .find(reservation_id)
            .select(ReservationDB::as_select())
            .first::<ReservationDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(ReservationDB::into_domain)
            .transpose()
    }

    fn list_reservations_for_tenant(&self, tenant_id: &str) -> Result<Vec<Reservation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = reservations::table
            .filter(reservations::tenant_id.eq(tenant_id))
            .order((reservations::pickup_date.desc(), reservations::id.desc()))
            .select(ReservationDB::as_select())
            .load::<ReservationDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(ReservationDB::into_domain).collect()
    }

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = reservations::table
            .filter(reservations::tenant_id.eq(tenant_id))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn insert_reservation(&self, new_reservation: NewReservation) -> Result<Reservation> {
        new_reservation.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Reservation> {
                let now = Utc::now();
                let row = NewReservationDB::from_domain(new_reservation, &now.to_rfc3339());
                let inserted = diesel::insert_into(reservations::table)
                    .values(&row)
                    .returning(ReservationDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Reservation, inserted.id, now);
                inserted.into_domain()
            })
            .await
    }

    async fn update_reservation(&self, reservation: Reservation) -> Result<Reservation> {
        reservation.validate()?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Reservation> {
                let existing = reservations::table
                    .find(reservation.id)
                    .select(ReservationDB::as_select())
                    .first::<ReservationDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| {
                        Error::Database(DatabaseError::NotFound(format!(
                            "reservation {}",
                            reservation.id
                        )))
                    })?;
                check_tenant_change(
                    existing.tenant_id.as_deref(),
                    reservation.tenant_id.as_deref(),
                )?;

                let now = Utc::now();
                let mut row = ReservationDB::from(reservation);
                row.created_at = existing.created_at;
                row.updated_at = now.to_rfc3339();
                let updated = diesel::update(reservations::table.find(row.id))
                    .set(&row)
                    .returning(ReservationDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                mark_dirty(conn, SyncEntity::Reservation, updated.id, now);
                updated.into_domain()
            })
            .await
    }
}
