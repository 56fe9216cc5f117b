mod common;

use tempfile::tempdir;

use rentdesk_core::entities::{CustomerRepositoryTrait, NewCustomer};
use rentdesk_core::errors::Error;
use rentdesk_core::sync::{OutboxRepositoryTrait, SyncEntity, TenantBackfillTrait};
use rentdesk_storage_sqlite::open_store;

use common::{customer, seed_baseline_database, store_config};

#[tokio::test]
async fn legacy_rows_get_the_tenant_and_owned_rows_keep_theirs() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    seed_baseline_database(&config);
    let store = open_store(&config).unwrap();
    let customers = store.customer_repository();
    let owned = customers
        .insert_customer(customer("tenant-a", "Owned", None))
        .await
        .unwrap();

    let backfill = store.backfill_repository();
    assert_eq!(backfill.count_unowned().unwrap(), 6);

    let report = backfill.backfill_tenant_id("tenant-b").await.unwrap();
    assert_eq!(report.stamped_for(SyncEntity::Customer), 3);
    assert_eq!(report.stamped_for(SyncEntity::Reservation), 2);
    assert_eq!(report.stamped_for(SyncEntity::Payment), 1);
    assert_eq!(report.stamped_for(SyncEntity::Supplier), 0);
    assert_eq!(report.total(), 6);
    assert_eq!(backfill.count_unowned().unwrap(), 0);

    assert_eq!(
        customers.get_customer(owned.id).unwrap().unwrap().tenant_id.as_deref(),
        Some("tenant-a")
    );
    assert_eq!(customers.count_for_tenant("tenant-b").unwrap(), 3);

    let outbox = store.outbox_repository();
    let entry = outbox.get_entry(SyncEntity::Payment, 1).unwrap().unwrap();
    assert!(entry.is_dirty);
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    store
        .customer_repository()
        .insert_customer(NewCustomer {
            tenant_id: None,
            ..customer("unused", "Legacy", None)
        })
        .await
        .unwrap();

    let backfill = store.backfill_repository();
    assert_eq!(backfill.backfill_tenant_id("tenant-a").await.unwrap().total(), 1);

    let second = backfill.backfill_tenant_id("tenant-b").await.unwrap();
    assert_eq!(second.total(), 0);
    assert_eq!(
        store.customer_repository().count_for_tenant("tenant-a").unwrap(),
        1
    );
}

#[tokio::test]
async fn blank_tenant_is_rejected() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    let err = store
        .backfill_repository()
        .backfill_tenant_id("   ")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn updates_cannot_move_a_row_to_another_tenant() {
    let dir = tempdir().unwrap();
    let store = open_store(&store_config(dir.path())).unwrap();
    let customers = store.customer_repository();
    let created = customers
        .insert_customer(customer("tenant-a", "Owned", None))
        .await
        .unwrap();

    let mut moved = created.clone();
    moved.tenant_id = Some("tenant-b".to_string());
    assert!(matches!(
        customers.update_customer(moved).await.unwrap_err(),
        Error::Validation(_)
    ));

    let mut cleared = created;
    cleared.tenant_id = None;
    assert!(customers.update_customer(cleared).await.is_err());
}
