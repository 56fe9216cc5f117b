use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use rentdesk_core::entities::{NewSupplier, Supplier};

#[derive(
    Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable, Serialize, Deserialize,
)]
#[diesel(table_name = crate::schema::suppliers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct SupplierDB {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub commission_rate: Option<f64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::suppliers)]
pub struct NewSupplierDB {
    pub tenant_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub commission_rate: Option<f64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl NewSupplierDB {
    pub fn from_domain(supplier: NewSupplier, now: &str) -> Self {
        Self {
            tenant_id: supplier.tenant_id,
            name: supplier.name,
            phone: supplier.phone,
            email: supplier.email,
            address: supplier.address,
            commission_rate: supplier.commission_rate,
            notes: supplier.notes,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

impl From<SupplierDB> for Supplier {
    fn from(db: SupplierDB) -> Self {
        Self {
            id: db.id,
            tenant_id: db.tenant_id,
            name: db.name,
            phone: db.phone,
            email: db.email,
            address: db.address,
            commission_rate: db.commission_rate,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<Supplier> for SupplierDB {
    fn from(supplier: Supplier) -> Self {
        Self {
            id: supplier.id,
            tenant_id: supplier.tenant_id,
            name: supplier.name,
            phone: supplier.phone,
            email: supplier.email,
            address: supplier.address,
            commission_rate: supplier.commission_rate,
            notes: supplier.notes,
            created_at: supplier.created_at,
            updated_at: supplier.updated_at,
        }
    }
}
