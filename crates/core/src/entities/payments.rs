use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{normalize_natural_key, require_non_empty, EntityRecord};
use crate::errors::{Error, Result};
use crate::sync::SyncEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub reservation_id: i64,
    pub amount: f64,
    pub method: String,
    pub paid_at: String,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub tenant_id: Option<String>,
    pub reservation_id: i64,
    pub amount: f64,
    pub method: String,
    pub paid_at: String,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<()> {
        check_payment(self.reservation_id, self.amount, &self.method, &self.paid_at)
    }
}

fn check_payment(reservation_id: i64, amount: f64, method: &str, paid_at: &str) -> Result<()> {
    require_non_empty("method", method)?;
    require_non_empty("paidAt", paid_at)?;
    if reservation_id <= 0 {
        return Err(Error::Validation("reservationId must be positive".to_string()));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::Validation(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    Ok(())
}

impl EntityRecord for Payment {
    const ENTITY: SyncEntity = SyncEntity::Payment;

    fn id(&self) -> i64 {
        self.id
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn natural_key(&self) -> Option<&str> {
        normalize_natural_key(self.receipt_number.as_deref())
    }

    fn validate(&self) -> Result<()> {
        check_payment(self.reservation_id, self.amount, &self.method, &self.paid_at)
    }
}

#[async_trait]
pub trait PaymentRepositoryTrait: Send + Sync {
    fn get_payment(&self, payment_id: i64) -> Result<Option<Payment>>;

    fn list_payments_for_tenant(&self, tenant_id: &str) -> Result<Vec<Payment>>;

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64>;

    async fn insert_payment(&self, new_payment: NewPayment) -> Result<Payment>;

    async fn update_payment(&self, payment: Payment) -> Result<Payment>;
}
