use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use rentdesk_core::entities::{NewReservation, Reservation, ReservationStatus};
use rentdesk_core::errors::Result;

#[derive(
    Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::reservations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDB {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub customer_id: i64,
    pub supplier_id: Option<i64>,
    pub contract_number: Option<String>,
    pub car_description: String,
    pub pickup_date: String,
    pub return_date: String,
    pub total_price: f64,
    pub commission_amount: Option<f64>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservationDB {
    pub tenant_id: Option<String>,
    pub customer_id: i64,
    pub supplier_id: Option<i64>,
    pub contract_number: Option<String>,
    pub car_description: String,
    pub pickup_date: String,
    pub return_date: String,
    pub total_price: f64,
    pub commission_amount: Option<f64>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl NewReservationDB {
    pub fn from_domain(reservation: NewReservation, now: &str) -> Self {
        Self {
            tenant_id: reservation.tenant_id,
            customer_id: reservation.customer_id,
            supplier_id: reservation.supplier_id,
            contract_number: reservation.contract_number,
            car_description: reservation.car_description,
            pickup_date: reservation.pickup_date,
            return_date: reservation.return_date,
            total_price: reservation.total_price,
            commission_amount: reservation.commission_amount,
            status: reservation.status.as_db_str().to_string(),
            notes: reservation.notes,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

impl ReservationDB {
    pub fn into_domain(self) -> Result<Reservation> {
        Ok(Reservation {
            status: ReservationStatus::from_db_str(&self.status)?,
            id: self.id,
            tenant_id: self.tenant_id,
            customer_id: self.customer_id,
            supplier_id: self.supplier_id,
            contract_number: self.contract_number,
            car_description: self.car_description,
            pickup_date: self.pickup_date,
            return_date: self.return_date,
            total_price: self.total_price,
            commission_amount: self.commission_amount,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<Reservation> for ReservationDB {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            tenant_id: reservation.tenant_id,
            customer_id: reservation.customer_id,
            supplier_id: reservation.supplier_id,
            contract_number: reservation.contract_number,
            car_description: reservation.car_description,
            pickup_date: reservation.pickup_date,
            return_date: reservation.return_date,
            total_price: reservation.total_price,
            commission_amount: reservation.commission_amount,
            status: reservation.status.as_db_str().to_string(),
            notes: reservation.notes,
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}
