use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{normalize_natural_key, require_non_empty, EntityRecord};
use crate::errors::{Error, Result};
use crate::sync::SyncEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Validation(format!(
                "Unknown reservation status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub customer_id: i64,
    pub supplier_id: Option<i64>,
    /// Supplier-side contract number, the natural key across devices.
    pub contract_number: Option<String>,
    pub car_description: String,
    pub pickup_date: String,
    pub return_date: String,
    pub total_price: f64,
    pub commission_amount: Option<f64>,
    #[serde(default)]
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub tenant_id: Option<String>,
    pub customer_id: i64,
    pub supplier_id: Option<i64>,
    pub contract_number: Option<String>,
    pub car_description: String,
    pub pickup_date: String,
    pub return_date: String,
    pub total_price: f64,
    pub commission_amount: Option<f64>,
    pub status: ReservationStatus,
    pub notes: Option<String>,
}

impl NewReservation {
    pub fn validate(&self) -> Result<()> {
        check_booking(
            self.customer_id,
            &self.car_description,
            &self.pickup_date,
            &self.return_date,
            self.total_price,
        )
    }
}

fn check_booking(
    customer_id: i64,
    car_description: &str,
    pickup_date: &str,
    return_date: &str,
    total_price: f64,
) -> Result<()> {
    require_non_empty("carDescription", car_description)?;
    require_non_empty("pickupDate", pickup_date)?;
    require_non_empty("returnDate", return_date)?;
    if customer_id <= 0 {
        return Err(Error::Validation("customerId must be positive".to_string()));
    }
    if return_date < pickup_date {
        return Err(Error::Validation(format!(
            "returnDate {return_date} is before pickupDate {pickup_date}"
        )));
    }
    if !total_price.is_finite() || total_price < 0.0 {
        return Err(Error::Validation("totalPrice must not be negative".to_string()));
    }
    Ok(())
}

impl EntityRecord for Reservation {
    const ENTITY: SyncEntity = SyncEntity::Reservation;

    fn id(&self) -> i64 {
        self.id
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn natural_key(&self) -> Option<&str> {
        normalize_natural_key(self.contract_number.as_deref())
    }

    fn validate(&self) -> Result<()> {
        check_booking(
            self.customer_id,
            &self.car_description,
            &self.pickup_date,
            &self.return_date,
            self.total_price,
        )
    }
}

#[async_trait]
pub trait ReservationRepositoryTrait: Send + Sync {
    fn get_reservation(&self, reservation_id: i64) -> Result<Option<Reservation>>;

    fn list_reservations_for_tenant(&self, tenant_id: &str) -> Result<Vec<Reservation>>;

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64>;

    async fn insert_reservation(&self, new_reservation: NewReservation) -> Result<Reservation>;

    async fn update_reservation(&self, reservation: Reservation) -> Result<Reservation>;
}
