use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{normalize_natural_key, require_non_empty, EntityRecord};
use crate::errors::{Error, Result};
use crate::sync::SyncEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Fraction of the reservation price paid as commission (0.12 = 12%).
    pub commission_rate: Option<f64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplier {
    pub tenant_id: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub commission_rate: Option<f64>,
    pub notes: Option<String>,
}

impl NewSupplier {
    pub fn validate(&self) -> Result<()> {
        check_supplier(&self.name, self.commission_rate)
    }
}

fn check_supplier(name: &str, commission_rate: Option<f64>) -> Result<()> {
    require_non_empty("name", name)?;
    if let Some(rate) = commission_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::Validation(format!(
                "commissionRate must be between 0 and 1, got {rate}"
            )));
        }
    }
    Ok(())
}

impl EntityRecord for Supplier {
    const ENTITY: SyncEntity = SyncEntity::Supplier;

    fn id(&self) -> i64 {
        self.id
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn natural_key(&self) -> Option<&str> {
        normalize_natural_key(Some(self.name.as_str()))
    }

    fn validate(&self) -> Result<()> {
        check_supplier(&self.name, self.commission_rate)
    }
}

#[async_trait]
pub trait SupplierRepositoryTrait: Send + Sync {
    fn get_supplier(&self, supplier_id: i64) -> Result<Option<Supplier>>;

    fn list_suppliers_for_tenant(&self, tenant_id: &str) -> Result<Vec<Supplier>>;

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64>;

    async fn insert_supplier(&self, new_supplier: NewSupplier) -> Result<Supplier>;

    async fn update_supplier(&self, supplier: Supplier) -> Result<Supplier>;
}
