//! Tenant ownership backfill for rows created before multi-tenancy.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SyncEntity;
use crate::errors::Result;

/// Rows stamped per entity type by one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub tenant_id: String,
    pub stamped: BTreeMap<SyncEntity, usize>,
}

impl BackfillReport {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            stamped: BTreeMap::new(),
        }
    }

    pub fn stamped_for(&self, entity: SyncEntity) -> usize {
        self.stamped.get(&entity).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.stamped.values().sum()
    }
}

/// Assigns `tenant_id` to every tracked row whose owner is null.
/// Rows already owned by any tenant are never reassigned.
#[async_trait]
pub trait TenantBackfillTrait: Send + Sync {
    async fn backfill_tenant_id(&self, tenant_id: &str) -> Result<BackfillReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_every_entity() {
        let mut report = BackfillReport::new("tenant-a");
        report.stamped.insert(SyncEntity::Customer, 4);
        report.stamped.insert(SyncEntity::Payment, 1);
        assert_eq!(report.total(), 5);
        assert_eq!(report.stamped_for(SyncEntity::Supplier), 0);
    }
}
