//! The sequence run once a tenant has signed in on this device.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{BackfillReport, CloudRestoreService, RestoreResult, TenantBackfillTrait};
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLoginReport {
    pub backfill_before_restore: BackfillReport,
    pub restore: Option<RestoreResult>,
    /// Set when restore failed as a whole; the caller should schedule a retry
    /// if `restore_retryable` is true.
    pub restore_error: Option<String>,
    pub restore_retryable: bool,
    pub backfill_after_restore: BackfillReport,
}

pub struct PostLoginSync {
    backfill: Arc<dyn TenantBackfillTrait>,
    restore: Arc<CloudRestoreService>,
}

impl PostLoginSync {
    pub fn new(backfill: Arc<dyn TenantBackfillTrait>, restore: Arc<CloudRestoreService>) -> Self {
        Self { backfill, restore }
    }

    /// Backfill, restore, backfill again.
    ///
    /// The first backfill claims legacy rows so restore matches them by natural
    /// key. The second one covers rows that arrived without an owner. A failed
    /// restore does not fail the login; backfill errors do.
    pub async fn run(&self, tenant_id: &str) -> Result<PostLoginReport> {
        let backfill_before_restore = self.backfill.backfill_tenant_id(tenant_id).await?;

        let (restore, restore_error, restore_retryable) =
            match self.restore.restore_missing_data_from_cloud(tenant_id).await {
                Ok(result) => (Some(result), None, false),
                Err(err) => {
                    warn!(
                        "[CloudSync] Restore after login failed for tenant {}: {}",
                        tenant_id, err
                    );
                    let retryable = err.is_retryable();
                    (None, Some(err.to_string()), retryable)
                }
            };

        let backfill_after_restore = self.backfill.backfill_tenant_id(tenant_id).await?;

        info!(
            "[CloudSync] Post-login sync for tenant {}: backfilled={} restored={}",
            tenant_id,
            backfill_before_restore.total() + backfill_after_restore.total(),
            restore.as_ref().map(|r| r.restored_count()).unwrap_or(0)
        );

        Ok(PostLoginReport {
            backfill_before_restore,
            restore,
            restore_error,
            restore_retryable,
            backfill_after_restore,
        })
    }
}
