//! Contract for the remote document store.
//!
//! Entities live under a per-tenant namespace, one collection per entity
//! type, keyed by the entity's stable id.

use async_trait::async_trait;

use super::SyncEntity;
use crate::errors::Result;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches every document of one entity collection owned by `tenant_id`.
    async fn fetch_collection(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
    ) -> Result<Vec<serde_json::Value>>;

    /// Writes one document. Used by the push synchronizer; writes are
    /// idempotent so at-least-once delivery is safe.
    async fn put_document(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
        document_id: &str,
        document: &serde_json::Value,
    ) -> Result<()>;
}

/// Reads a document id as text whether it was stored as a number or a string.
pub fn document_id(document: &serde_json::Value) -> Option<String> {
    match document.get("id")? {
        serde_json::Value::Number(v) => Some(v.to_string()),
        serde_json::Value::String(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}
