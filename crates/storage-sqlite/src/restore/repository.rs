use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::SqliteConnection;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use rentdesk_core::entities::{Customer, EntityRecord, Payment, Reservation, Supplier};
use rentdesk_core::errors::{Error, Result};
use rentdesk_core::sync::{
    document_id, CollectionRestoreReport, RestoreRecordError, RestoreRepositoryTrait, SyncEntity,
};

use crate::customers::CustomerDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::payments::PaymentDB;
use crate::reservations::ReservationDB;
use crate::schema::{customers, payments, reservations, suppliers};
use crate::sql::{quote_identifier, CountRow};
use crate::suppliers::SupplierDB;

/// Entity types that restore can write. The natural key column is compared
/// trimmed, matching `normalize_natural_key`.
trait RestoreTarget: EntityRecord + DeserializeOwned + Sized {
    const NATURAL_KEY_COLUMN: &'static str;

    fn insert_restored(self, conn: &mut SqliteConnection) -> QueryResult<usize>;
}

impl RestoreTarget for Customer {
    const NATURAL_KEY_COLUMN: &'static str = "id_number";

    fn insert_restored(self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::insert_into(customers::table)
            .values(CustomerDB::from(self))
            .execute(conn)
    }
}

impl RestoreTarget for Supplier {
    const NATURAL_KEY_COLUMN: &'static str = "name";

    fn insert_restored(self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::insert_into(suppliers::table)
            .values(SupplierDB::from(self))
            .execute(conn)
    }
}

impl RestoreTarget for Reservation {
    const NATURAL_KEY_COLUMN: &'static str = "contract_number";

    fn insert_restored(self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::insert_into(reservations::table)
            .values(ReservationDB::from(self))
            .execute(conn)
    }
}

impl RestoreTarget for Payment {
    const NATURAL_KEY_COLUMN: &'static str = "receipt_number";

    fn insert_restored(self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        diesel::insert_into(payments::table)
            .values(PaymentDB::from(self))
            .execute(conn)
    }
}

#[derive(QueryableByName)]
struct OwnerRow {
    #[diesel(sql_type = Nullable<Text>)]
    tenant_id: Option<String>,
}

enum RecordOutcome {
    Inserted,
    Skipped,
}

#[derive(Debug)]
enum RecordFailure {
    Rejected(String),
    Storage(StorageError),
}

impl From<StorageError> for RecordFailure {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<diesel::result::Error> for RecordFailure {
    fn from(err: diesel::result::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}

impl std::fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(message) => f.write_str(message),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

pub struct RestoreRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl RestoreRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Rows of one tracked table visible to `tenant_id`, unowned rows included.
    pub fn local_count(&self, tenant_id: &str, entity: SyncEntity) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let table = quote_identifier(entity.table_name());
        let row = diesel::sql_query(format!(
            "SELECT COUNT(*) AS c FROM {table} WHERE tenant_id = ? OR tenant_id IS NULL"
        ))
        .bind::<Text, _>(tenant_id)
        .get_result::<CountRow>(&mut conn)
        .map_err(StorageError::from)?;
        Ok(row.c)
    }
}

#[async_trait]
impl RestoreRepositoryTrait for RestoreRepository {
    async fn insert_missing(
        &self,
        tenant_id: &str,
        entity: SyncEntity,
        documents: Vec<Value>,
    ) -> Result<CollectionRestoreReport> {
        let tenant_id = tenant_id.trim().to_string();
        if tenant_id.is_empty() {
            return Err(Error::Validation("tenant id must not be empty".to_string()));
        }
        if documents.is_empty() {
            return Ok(CollectionRestoreReport::default());
        }

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<CollectionRestoreReport> {
                let report = match entity {
                    SyncEntity::Customer => restore_collection::<Customer>(conn, &tenant_id, documents),
                    SyncEntity::Supplier => restore_collection::<Supplier>(conn, &tenant_id, documents),
                    SyncEntity::Reservation => {
                        restore_collection::<Reservation>(conn, &tenant_id, documents)
                    }
                    SyncEntity::Payment => restore_collection::<Payment>(conn, &tenant_id, documents),
                };
                debug!(
                    "[Restore] {}: inserted={} skipped={} errors={}",
                    entity.table_name(),
                    report.inserted,
                    report.skipped,
                    report.errors.len()
                );
                Ok(report)
            })
            .await
    }
}

fn restore_collection<T: RestoreTarget>(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    documents: Vec<Value>,
) -> CollectionRestoreReport {
    let now = Utc::now().to_rfc3339();
    let mut report = CollectionRestoreReport::default();

    for document in documents {
        let record_id = document_id(&document);
        let outcome = conn.transaction::<RecordOutcome, RecordFailure, _>(|sp| {
            let record: T = parse_document(tenant_id, document, &now)?;
            restore_record(sp, tenant_id, record)
        });

        match outcome {
            Ok(RecordOutcome::Inserted) => report.inserted += 1,
            Ok(RecordOutcome::Skipped) => report.skipped += 1,
            Err(failure) => {
                warn!(
                    "[Restore] Skipping {} record {}: {}",
                    T::ENTITY.table_name(),
                    record_id.as_deref().unwrap_or("<no id>"),
                    failure
                );
                report.errors.push(RestoreRecordError {
                    entity: T::ENTITY,
                    record_id,
                    message: failure.to_string(),
                });
            }
        }
    }
    report
}

fn restore_record<T: RestoreTarget>(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    record: T,
) -> std::result::Result<RecordOutcome, RecordFailure> {
    let table = quote_identifier(T::ENTITY.table_name());

    let same_id = diesel::sql_query(format!("SELECT tenant_id FROM {table} WHERE id = ?"))
        .bind::<BigInt, _>(record.id())
        .get_result::<OwnerRow>(conn)
        .optional()?;
    if let Some(existing) = same_id {
        // The local row wins either way; a row held by another tenant is
        // reported so the remote record is not dropped silently.
        return match existing.tenant_id.as_deref() {
            None => Ok(RecordOutcome::Skipped),
            Some(owner) if owner == tenant_id => Ok(RecordOutcome::Skipped),
            Some(_) => Err(RecordFailure::Rejected(format!(
                "id {} is owned by another tenant",
                record.id()
            ))),
        };
    }

    if let Some(key) = record.natural_key() {
        let column = quote_identifier(T::NATURAL_KEY_COLUMN);
        let same_key = diesel::sql_query(format!(
            "SELECT COUNT(*) AS c FROM {table} WHERE TRIM({column}) = ? AND (tenant_id = ? OR tenant_id IS NULL)"
        ))
        .bind::<Text, _>(key)
        .bind::<Text, _>(tenant_id)
        .get_result::<CountRow>(conn)?;
        if same_key.c > 0 {
            return Ok(RecordOutcome::Skipped);
        }
    }

    record.insert_restored(conn)?;
    Ok(RecordOutcome::Inserted)
}

/// Stamps ownership and timestamps onto a remote document and parses it.
fn parse_document<T: RestoreTarget>(
    tenant_id: &str,
    document: Value,
    now: &str,
) -> std::result::Result<T, RecordFailure> {
    let Value::Object(mut fields) = document else {
        return Err(RecordFailure::Rejected("document is not a JSON object".to_string()));
    };

    match fields.get("tenantId") {
        None | Some(Value::Null) => {}
        Some(Value::String(owner)) if owner.trim() == tenant_id => {}
        Some(other) => {
            return Err(RecordFailure::Rejected(format!(
                "document belongs to tenant {other}, not '{tenant_id}'"
            )));
        }
    }
    fields.insert("tenantId".to_string(), Value::String(tenant_id.to_string()));

    let id = match fields.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match id {
        Some(id) if id > 0 => {
            fields.insert("id".to_string(), Value::from(id));
        }
        _ => {
            return Err(RecordFailure::Rejected(
                "document has no positive numeric id".to_string(),
            ));
        }
    }

    for key in ["createdAt", "updatedAt"] {
        if matches!(fields.get(key), None | Some(Value::Null)) {
            fields.insert(key.to_string(), Value::String(now.to_string()));
        }
    }

    let record: T = serde_json::from_value(Value::Object(fields))
        .map_err(|e| RecordFailure::Rejected(format!("malformed document: {e}")))?;
    record
        .validate()
        .map_err(|e| RecordFailure::Rejected(format!("invalid document: {e}")))?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_stamps_tenant_and_timestamps() {
        let customer: Customer = parse_document(
            "tenant-a",
            json!({ "id": "12", "firstName": "Dana", "lastName": "Levi" }),
            "2025-01-01T00:00:00Z",
        )
        .unwrap();
        assert_eq!(customer.id, 12);
        assert_eq!(customer.tenant_id.as_deref(), Some("tenant-a"));
        assert_eq!(customer.created_at, "2025-01-01T00:00:00Z");
    }

    #[test]
    fn parse_rejects_foreign_tenant_and_bad_ids() {
        let foreign = parse_document::<Customer>(
            "tenant-a",
            json!({ "id": 1, "tenantId": "tenant-b", "firstName": "A", "lastName": "B" }),
            "now",
        );
        assert!(matches!(foreign, Err(RecordFailure::Rejected(_))));

        let zero = parse_document::<Customer>(
            "tenant-a",
            json!({ "id": 0, "firstName": "A", "lastName": "B" }),
            "now",
        );
        assert!(matches!(zero, Err(RecordFailure::Rejected(_))));

        let array = parse_document::<Customer>("tenant-a", json!([1, 2]), "now");
        assert!(matches!(array, Err(RecordFailure::Rejected(_))));
    }

    #[test]
    fn parse_applies_entity_field_rules() {
        let reservation = parse_document::<Reservation>(
            "tenant-a",
            json!({
                "id": 8,
                "customerId": 1,
                "carDescription": "",
                "pickupDate": "2025-03-05",
                "returnDate": "2025-03-01",
                "totalPrice": -50.0,
            }),
            "now",
        );
        assert!(matches!(reservation, Err(RecordFailure::Rejected(m)) if m.starts_with("invalid document")));

        let customer = parse_document::<Customer>(
            "tenant-a",
            json!({ "id": 9, "firstName": " ", "lastName": "" }),
            "now",
        );
        assert!(matches!(customer, Err(RecordFailure::Rejected(_))));

        let payment = parse_document::<Payment>(
            "tenant-a",
            json!({ "id": 10, "reservationId": 1, "amount": 0.0, "method": "cash", "paidAt": "2025-03-01" }),
            "now",
        );
        assert!(matches!(payment, Err(RecordFailure::Rejected(_))));
    }

    #[test]
    fn parse_reports_missing_required_fields() {
        let err = parse_document::<Reservation>(
            "tenant-a",
            json!({ "id": 3, "customerId": 1 }),
            "now",
        )
        .err()
        .unwrap();
        assert!(err.to_string().starts_with("malformed document"));
    }
}
