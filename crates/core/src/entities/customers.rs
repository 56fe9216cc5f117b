use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{normalize_natural_key, require_non_empty, EntityRecord};
use crate::errors::Result;
use crate::sync::SyncEntity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub tenant_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// National id / passport number, the natural key across devices.
    pub id_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub tenant_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub id_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

fn check_names(first_name: &str, last_name: &str) -> Result<()> {
    require_non_empty("firstName", first_name)?;
    require_non_empty("lastName", last_name)
}

impl NewCustomer {
    pub fn validate(&self) -> Result<()> {
        check_names(&self.first_name, &self.last_name)
    }
}

impl EntityRecord for Customer {
    const ENTITY: SyncEntity = SyncEntity::Customer;

    fn id(&self) -> i64 {
        self.id
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn natural_key(&self) -> Option<&str> {
        normalize_natural_key(self.id_number.as_deref())
    }

    fn validate(&self) -> Result<()> {
        check_names(&self.first_name, &self.last_name)
    }
}

#[async_trait]
pub trait CustomerRepositoryTrait: Send + Sync {
    fn get_customer(&self, customer_id: i64) -> Result<Option<Customer>>;

    fn list_customers_for_tenant(&self, tenant_id: &str) -> Result<Vec<Customer>>;

    fn count_for_tenant(&self, tenant_id: &str) -> Result<i64>;

    async fn insert_customer(&self, new_customer: NewCustomer) -> Result<Customer>;

    async fn update_customer(&self, customer: Customer) -> Result<Customer>;
}
