mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::tempdir;

use rentdesk_core::entities::{
    CustomerRepositoryTrait, NewCustomer, ReservationRepositoryTrait,
};
use rentdesk_core::sync::{
    CloudRestoreService, OutboxRepositoryTrait, PostLoginSync, SyncEntity,
};
use rentdesk_storage_sqlite::{open_store, LocalStore};

use common::{customer, reservation, store_config, StaticRemote};

fn service(store: &LocalStore, remote: StaticRemote) -> CloudRestoreService {
    CloudRestoreService::new(Arc::new(remote), Arc::new(store.restore_repository()))
}

fn remote_customer(id: i64, first_name: &str, id_number: Option<&str>) -> Value {
    json!({
        "id": id,
        "firstName": first_name,
        "lastName": "Remote",
        "idNumber": id_number,
        "createdAt": "2024-06-01T10:00:00Z",
        "updatedAt": "2024-06-02T10:00:00Z",
    })
}

fn remote_reservation(id: i64, customer_id: i64) -> Value {
    json!({
        "id": id,
        "tenantId": "tenant-b",
        "customerId": customer_id,
        "contractNumber": format!("B-{id}"),
        "carDescription": "Skoda Octavia",
        "pickupDate": "2024-07-01",
        "returnDate": "2024-07-04",
        "totalPrice": 480.0,
        "status": "completed",
    })
}

#[tokio::test]
async fn partial_failures_are_reported_per_record() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    let customers = store.customer_repository();
    let reservations = store.reservation_repository();

    let owner = customers
        .insert_customer(customer("tenant-a", "Dana", Some("300")))
        .await
        .unwrap();
    for n in 0..100 {
        reservations
            .insert_reservation(reservation("tenant-a", owner.id, &format!("A-{n}")))
            .await
            .unwrap();
    }
    let dirty_before = store.outbox_repository().count_dirty().unwrap();

    let mut remote_reservations = (1001..=1035)
        .map(|id| remote_reservation(id, 5001))
        .collect::<Vec<_>>();
    remote_reservations.push(json!({ "id": 1036, "customerId": 5001, "carDescription": "Fiat 500" }));
    remote_reservations.push(json!({
        "id": 1037,
        "customerId": 5001,
        "carDescription": "",
        "pickupDate": "2025-03-05",
        "returnDate": "2025-03-01",
        "totalPrice": -50.0,
    }));
    remote_reservations.push(json!("not a document"));
    remote_reservations.push({
        let mut doc = remote_reservation(1039, 5001);
        doc["status"] = json!("archived");
        doc
    });
    remote_reservations.push(remote_reservation(1040, 9999));
    assert_eq!(remote_reservations.len(), 40);

    let mut remote = StaticRemote::default();
    remote.collections.insert(
        SyncEntity::Customer,
        vec![
            remote_customer(5001, "Omer", Some("901")),
            json!({ "id": 5002, "firstName": " ", "lastName": "" }),
        ],
    );
    remote
        .collections
        .insert(SyncEntity::Reservation, remote_reservations);

    let result = service(&store, remote)
        .restore_missing_data_from_cloud("tenant-b")
        .await
        .unwrap();

    assert_eq!(result.inserted_for(SyncEntity::Reservation), 35);
    assert_eq!(result.restored_count(), 36);
    let summary = result.summary(SyncEntity::Reservation).unwrap();
    assert_eq!(summary.fetched, 40);
    assert_eq!(summary.errors.len(), 5);
    assert!(summary
        .errors
        .iter()
        .any(|e| e.record_id.as_deref() == Some("1040")));
    assert!(summary
        .errors
        .iter()
        .any(|e| e.record_id.as_deref() == Some("1037") && e.message.starts_with("invalid document")));
    assert_eq!(result.summary(SyncEntity::Customer).unwrap().errors.len(), 1);
    assert!(result.is_success());
    assert!(reservations.get_reservation(1037).unwrap().is_none());
    assert!(store.customer_repository().get_customer(5002).unwrap().is_none());

    assert_eq!(reservations.count_for_tenant("tenant-a").unwrap(), 100);
    assert_eq!(reservations.count_for_tenant("tenant-b").unwrap(), 35);
    let restored = reservations.get_reservation(1001).unwrap().unwrap();
    assert_eq!(restored.tenant_id.as_deref(), Some("tenant-b"));
    assert_eq!(restored.contract_number.as_deref(), Some("B-1001"));

    // Restored rows already exist remotely.
    assert_eq!(store.outbox_repository().count_dirty().unwrap(), dirty_before);
}

#[tokio::test]
async fn second_restore_is_a_no_op() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();

    let mut remote = StaticRemote::default();
    remote.collections.insert(
        SyncEntity::Customer,
        vec![
            remote_customer(11, "Lior", Some("111")),
            remote_customer(12, "Tal", None),
        ],
    );
    remote.collections.insert(
        SyncEntity::Reservation,
        vec![remote_reservation(21, 11), remote_reservation(22, 12)],
    );
    remote.collections.insert(
        SyncEntity::Payment,
        vec![json!({
            "id": 31,
            "reservationId": 21,
            "amount": 480.0,
            "method": "card",
            "paidAt": "2024-07-01",
            "receiptNumber": "R-31",
        })],
    );
    let service = service(&store, remote);

    let first = service.restore_missing_data_from_cloud("tenant-b").await.unwrap();
    assert_eq!(first.restored_count(), 5);
    assert_eq!(first.error_count(), 0);

    let second = service.restore_missing_data_from_cloud("tenant-b").await.unwrap();
    assert_eq!(second.restored_count(), 0);
    assert_eq!(second.skipped_count(), 5);

    let repository = store.restore_repository();
    assert_eq!(repository.local_count("tenant-b", SyncEntity::Customer).unwrap(), 2);
    assert_eq!(repository.local_count("tenant-b", SyncEntity::Payment).unwrap(), 1);
}

#[tokio::test]
async fn local_rows_always_win() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    let customers = store.customer_repository();

    for n in 1..=5 {
        customers
            .insert_customer(customer("tenant-b", &format!("Local {n}"), None))
            .await
            .unwrap();
    }
    let local = customers.get_customer(5).unwrap().unwrap();

    let mut remote = StaticRemote::default();
    remote.collections.insert(
        SyncEntity::Customer,
        vec![remote_customer(5, "Overwritten", Some("999"))],
    );
    let result = service(&store, remote)
        .restore_missing_data_from_cloud("tenant-b")
        .await
        .unwrap();

    assert_eq!(result.restored_count(), 0);
    assert_eq!(result.skipped_count(), 1);
    assert_eq!(customers.get_customer(5).unwrap().unwrap(), local);
}

#[tokio::test]
async fn ids_held_by_another_tenant_are_reported_not_skipped() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    let customers = store.customer_repository();
    let reservations = store.reservation_repository();

    let owner = customers
        .insert_customer(customer("tenant-a", "Dana", None))
        .await
        .unwrap();
    for n in 1..=5 {
        reservations
            .insert_reservation(reservation("tenant-a", owner.id, &format!("A-{n}")))
            .await
            .unwrap();
    }
    let before = reservations.get_reservation(3).unwrap().unwrap();

    let mut remote = StaticRemote::default();
    remote.collections.insert(
        SyncEntity::Reservation,
        (1..=5).map(|id| remote_reservation(id, owner.id)).collect(),
    );
    let result = service(&store, remote)
        .restore_missing_data_from_cloud("tenant-b")
        .await
        .unwrap();

    let summary = result.summary(SyncEntity::Reservation).unwrap();
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.errors.len(), 5);
    assert_eq!(summary.errors[0].message, "id 1 is owned by another tenant");
    assert_eq!(reservations.count_for_tenant("tenant-b").unwrap(), 0);
    assert_eq!(reservations.get_reservation(3).unwrap().unwrap(), before);
}

#[tokio::test]
async fn natural_keys_match_own_and_unowned_rows_only() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    let customers = store.customer_repository();

    customers
        .insert_customer(customer("tenant-b", "Own", Some("100")))
        .await
        .unwrap();
    customers
        .insert_customer(NewCustomer {
            tenant_id: None,
            ..customer("ignored", "Legacy", Some("200"))
        })
        .await
        .unwrap();
    customers
        .insert_customer(customer("tenant-c", "Other", Some("300")))
        .await
        .unwrap();

    let mut remote = StaticRemote::default();
    remote.collections.insert(
        SyncEntity::Customer,
        vec![
            remote_customer(40, "Own copy", Some(" 100 ")),
            remote_customer(41, "Legacy copy", Some("200")),
            remote_customer(42, "Same key, other owner", Some("300")),
            remote_customer(43, "Blank key", Some("  ")),
        ],
    );
    let result = service(&store, remote)
        .restore_missing_data_from_cloud("tenant-b")
        .await
        .unwrap();

    assert_eq!(result.skipped_count(), 2);
    assert_eq!(result.inserted_for(SyncEntity::Customer), 2);
    assert!(customers.get_customer(42).unwrap().is_some());
    assert!(customers.get_customer(43).unwrap().is_some());
    assert!(customers.get_customer(40).unwrap().is_none());
}

#[tokio::test]
async fn documents_owned_by_another_tenant_are_rejected() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();

    let mut doc = remote_customer(77, "Stranger", None);
    doc["tenantId"] = json!("tenant-c");
    let mut remote = StaticRemote::default();
    remote.collections.insert(SyncEntity::Customer, vec![doc]);

    let result = service(&store, remote)
        .restore_missing_data_from_cloud("tenant-b")
        .await
        .unwrap();

    assert_eq!(result.restored_count(), 0);
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_id.as_deref(), Some("77"));
    assert!(store.customer_repository().get_customer(77).unwrap().is_none());
}

#[tokio::test]
async fn post_login_claims_legacy_rows_before_restoring() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    common::seed_baseline_database(&config);
    let store = open_store(&config).unwrap();

    // Remote copy of legacy customer 1 under a different id: the natural key
    // matches once backfill has claimed the local row.
    let mut remote = StaticRemote::default();
    remote.collections.insert(
        SyncEntity::Customer,
        vec![
            remote_customer(501, "Noa", Some("123456789")),
            remote_customer(502, "New", Some("42")),
        ],
    );
    let restore = Arc::new(service(&store, remote));
    let post_login = PostLoginSync::new(Arc::new(store.backfill_repository()), restore);

    let report = post_login.run("tenant-b").await.unwrap();
    assert_eq!(report.backfill_before_restore.total(), 6);
    assert_eq!(report.backfill_after_restore.total(), 0);
    let restored = report.restore.unwrap();
    assert_eq!(restored.inserted_for(SyncEntity::Customer), 1);
    assert_eq!(restored.skipped_count(), 1);
    assert_eq!(report.restore_error, None);

    assert_eq!(store.customer_repository().count_for_tenant("tenant-b").unwrap(), 4);
}
