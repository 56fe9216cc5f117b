use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use rentdesk_core::entities::{NewPayment, Payment};

#[derive(
    Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDB {
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

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPaymentDB {
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

impl NewPaymentDB {
    pub fn from_domain(payment: NewPayment, now: &str) -> Self {
        Self {
            tenant_id: payment.tenant_id,
            reservation_id: payment.reservation_id,
            amount: payment.amount,
            method: payment.method,
            paid_at: payment.paid_at,
            receipt_number: payment.receipt_number,
            notes: payment.notes,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

impl From<PaymentDB> for Payment {
    fn from(db: PaymentDB) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            reservation_id: db.reservation_id,
            amount: db.amount,
            method: db.method,
            paid_at: db.paid_at,
            receipt_number: db.receipt_number,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<Payment> for PaymentDB {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            tenant_id: payment.tenant_id,
            reservation_id: payment.reservation_id,
            amount: payment.amount,
            method: payment.method,
            paid_at: payment.paid_at,
            receipt_number: payment.receipt_number,
            notes: payment.notes,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}
