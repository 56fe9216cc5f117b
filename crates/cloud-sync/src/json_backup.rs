//! Restore source backed by an exported JSON backup file.
//!
//! Accepts `{"tables": {"customers": [...], ...}}` as written by the app's
//! backup export and by the emergency migration export. Column names may be
//! snake_case; they are converted to the camelCase field names restore reads.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use serde_json::{Map, Value};

use rentdesk_core::errors::Error;
use rentdesk_core::sync::{RemoteStore, SyncEntity};

use crate::error::{CloudError, Result};

#[derive(Deserialize)]
struct BackupFile {
    #[serde(default)]
    tables: HashMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct JsonBackupSource {
    tables: HashMap<SyncEntity, Vec<Value>>,
}

impl JsonBackupSource {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let source = Self::from_json(&contents)?;
        info!(
            "[Restore] Loaded backup {} ({} documents)",
            path.display(),
            source.document_count()
        );
        Ok(source)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let file: BackupFile = serde_json::from_str(contents)?;
        if file.tables.is_empty() {
            return Err(CloudError::invalid_request("backup contains no tables"));
        }
        let tables = file
            .tables
            .into_iter()
            .filter_map(|(name, rows)| {
                let entity = SyncEntity::from_table_name(&name)?;
                Some((entity, rows.into_iter().map(camel_case_keys).collect()))
            })
            .collect();
        Ok(Self { tables })
    }

    pub fn document_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn camel_case_keys(document: Value) -> Value {
    match document {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (to_camel_case(&key), value))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Only unowned documents and the tenant's own are offered; a backup may
/// hold several tenants.
fn visible_to(tenant_id: &str, document: &Value) -> bool {
    match document.get("tenantId") {
        None | Some(Value::Null) => true,
        Some(Value::String(owner)) => owner.trim() == tenant_id,
        Some(_) => true,
    }
}

#[async_trait]
impl RemoteStore for JsonBackupSource {
    async fn fetch_collection(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
    ) -> rentdesk_core::Result<Vec<Value>> {
        let tenant_id = tenant_id.trim();
        Ok(self
            .tables
            .get(&entity)
            .map(|rows| {
                rows.iter()
                    .filter(|doc| visible_to(tenant_id, doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_document(
        &self,
        _tenant_id: &str,
        _entity: SyncEntity,
        _document_id: &str,
        _document: &Value,
    ) -> rentdesk_core::Result<()> {
        Err(Error::Validation("a backup file is read-only".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn converts_snake_case_columns() {
        assert_eq!(to_camel_case("first_name"), "firstName");
        assert_eq!(to_camel_case("tenant_id"), "tenantId");
        assert_eq!(to_camel_case("id"), "id");
        assert_eq!(to_camel_case("_private"), "private");
    }

    #[tokio::test]
    async fn filters_documents_of_other_tenants() {
        let source = JsonBackupSource::from_json(
            &json!({
                "version": 25,
                "tables": {
                    "customers": [
                        { "id": 1, "tenant_id": "tenant-a" },
                        { "id": 2, "tenant_id": null },
                        { "id": 3, "tenant_id": "tenant-b" }
                    ],
                    "migration_log": [{ "id": 1 }]
                }
            })
            .to_string(),
        )
        .unwrap();

        let docs = source
            .fetch_collection("tenant-a", SyncEntity::Customer)
            .await
            .unwrap();
        let ids = docs.iter().map(|d| d["id"].as_i64().unwrap()).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(source.document_count(), 3);
        assert!(source
            .fetch_collection("tenant-a", SyncEntity::Payment)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn empty_backup_is_rejected() {
        assert!(JsonBackupSource::from_json(r#"{"tables":{}}"#).is_err());
        assert!(JsonBackupSource::from_json("not json").is_err());
    }
}
