use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use rentdesk_core::entities::{Customer, NewCustomer};

#[derive(
    Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::customers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDB {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub id_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::customers)]
pub struct NewCustomerDB {
    pub tenant_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub id_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl NewCustomerDB {
    pub fn from_domain(customer: NewCustomer, now: &str) -> Self {
        Self {
            tenant_id: customer.tenant_id,
            first_name: customer.first_name,
            last_name: customer.last_name,
            id_number: customer.id_number,
            phone: customer.phone,
            email: customer.email,
            address: customer.address,
            notes: customer.notes,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

impl From<CustomerDB> for Customer {
    fn from(db: CustomerDB) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            first_name: db.first_name,
            last_name: db.last_name,
            id_number: db.id_number,
            phone: db.phone,
            email: db.email,
            address: db.address,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<Customer> for CustomerDB {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            tenant_id: customer.tenant_id,
            first_name: customer.first_name,
            last_name: customer.last_name,
            id_number: customer.id_number,
            phone: customer.phone,
            email: customer.email,
            address: customer.address,
            notes: customer.notes,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}
