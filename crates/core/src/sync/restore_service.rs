//! Cloud-to-local restore: insert-only, per tenant, partial-failure tolerant.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};

use super::remote::RemoteStore;
use super::{CollectionRestoreReport, RestoreRecordError, RestoreResult, SyncEntity};
use crate::errors::{Error, Result};

/// Storage side of restore. Implementations insert every document that has
/// no local match and skip the rest; they never update or delete.
#[async_trait]
pub trait RestoreRepositoryTrait: Send + Sync {
    async fn insert_missing(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
        documents: Vec<serde_json::Value>,
    ) -> Result<CollectionRestoreReport>;
}

pub struct CloudRestoreService {
    remote: Arc<dyn RemoteStore>,
    repository: Arc<dyn RestoreRepositoryTrait>,
}

impl CloudRestoreService {
    pub fn new(remote: Arc<dyn RemoteStore>, repository: Arc<dyn RestoreRepositoryTrait>) -> Self {
        Self { remote, repository }
    }

    /// Pulls every tracked collection for `tenant_id` and inserts what the
    /// local store is missing. Local rows always win.
    ///
    /// Per-record and per-collection failures are collected in the result.
    /// Only when no collection could be fetched at all is the error returned,
    /// so the caller can schedule a retry.
    pub async fn restore_missing_data_from_cloud(&self, tenant_id: &str) -> Result<RestoreResult> {
        let tenant_id = tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(Error::Validation("tenant id must not be empty".to_string()));
        }

        let started_at = Utc::now();
        info!("[Restore] Starting cloud restore for tenant {}", tenant_id);

        let remote = Arc::clone(&self.remote);
        let fetches = join_all(SyncEntity::ALL.into_iter().map(|entity| {
            let remote = Arc::clone(&remote);
            async move { (entity, remote.fetch_collection(tenant_id, entity).await) }
        }))
        .await;

        let mut result = RestoreResult::new(tenant_id, started_at);
        let mut fetch_failures: Vec<Error> = Vec::new();

        for (entity, fetched) in fetches {
            let documents = match fetched {
                Ok(documents) => documents,
                Err(err) => {
                    warn!(
                        "[Restore] Failed to fetch {} for tenant {}: {}",
                        entity.table_name(),
                        tenant_id,
                        err
                    );
                    result.summary_mut(entity).errors.push(RestoreRecordError {
                        entity,
                        record_id: None,
                        message: format!("fetch failed: {err}"),
                    });
                    fetch_failures.push(err);
                    continue;
                }
            };

            debug!(
                "[Restore] Fetched {} remote {} for tenant {}",
                documents.len(),
                entity.table_name(),
                tenant_id
            );
            result.summary_mut(entity).fetched = documents.len();

            match self
                .repository
                .insert_missing(tenant_id, entity, documents)
                .await
            {
                Ok(report) => {
                    let summary = result.summary_mut(entity);
                    summary.inserted += report.inserted;
                    summary.skipped += report.skipped;
                    summary.errors.extend(report.errors);
                }
                Err(err) => {
                    warn!(
                        "[Restore] Local insert of {} failed for tenant {}: {}",
                        entity.table_name(),
                        tenant_id,
                        err
                    );
                    result.summary_mut(entity).errors.push(RestoreRecordError {
                        entity,
                        record_id: None,
                        message: format!("local insert failed: {err}"),
                    });
                }
            }
        }

        if fetch_failures.len() == SyncEntity::ALL.len() {
            let first = fetch_failures.remove(0);
            warn!(
                "[Restore] No collection could be fetched for tenant {}; reporting for retry",
                tenant_id
            );
            return Err(first);
        }

        result.finished_at = Utc::now();
        info!(
            "[Restore] Finished cloud restore for tenant {}: restored={} skipped={} errors={}",
            tenant_id,
            result.restored_count(),
            result.skipped_count(),
            result.error_count()
        );
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Remote that serves fixed collections and fails the first N fetch rounds.
    #[derive(Default)]
    pub struct FakeRemote {
        pub collections: HashMap<SyncEntity, Vec<serde_json::Value>>,
        pub failing_rounds: AtomicUsize,
        pub retryable: bool,
        pub fetch_calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn fetch_collection(
            &self,
            _tenant_id: &str,
            entity: SyncEntity,
        ) -> Result<Vec<serde_json::Value>> {
            let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let round = call / SyncEntity::ALL.len();
            if round < self.failing_rounds.load(Ordering::SeqCst) {
                return Err(Error::remote("connection reset", self.retryable));
            }
            Ok(self.collections.get(&entity).cloned().unwrap_or_default())
        }

        async fn put_document(
            &self,
            _tenant_id: &str,
            _entity: SyncEntity,
            _document_id: &str,
            _document: &serde_json::Value,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// Repository that "inserts" every document whose id it has not seen.
    #[derive(Default)]
    pub struct FakeRestoreRepository {
        pub seen: Mutex<HashMap<SyncEntity, Vec<String>>>,
    }

    #[async_trait]
    impl RestoreRepositoryTrait for FakeRestoreRepository {
        async fn insert_missing(
            &self,
            _tenant_id: &str,
            entity: SyncEntity,
            documents: Vec<serde_json::Value>,
        ) -> Result<CollectionRestoreReport> {
            let mut seen = self.seen.lock().unwrap();
            let ids = seen.entry(entity).or_default();
            let mut report = CollectionRestoreReport::default();
            for document in documents {
                match crate::sync::document_id(&document) {
                    Some(id) if ids.contains(&id) => report.skipped += 1,
                    Some(id) => {
                        ids.push(id);
                        report.inserted += 1;
                    }
                    None => report.errors.push(RestoreRecordError {
                        entity,
                        record_id: None,
                        message: "missing id".to_string(),
                    }),
                }
            }
            Ok(report)
        }
    }
}
