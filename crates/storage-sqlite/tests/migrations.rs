mod common;

use std::fs;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::SqliteConnection;
use tempfile::tempdir;

use rentdesk_core::entities::{ReservationRepositoryTrait, ReservationStatus};
use rentdesk_core::errors::{Error, MigrationError, Result};
use rentdesk_core::migrations::{MigrationOutcome, RiskLevel};
use rentdesk_storage_sqlite::config::JsonExportPolicy;
use rentdesk_storage_sqlite::db::get_connection;
use rentdesk_storage_sqlite::migrations::{
    create_whole_file_backup, ensure_migration_log, load_migration_log, MigrationManager,
    MigrationPlan, MigrationStep, StepMode, LATEST_VERSION,
};
use rentdesk_storage_sqlite::open_store;
use rentdesk_storage_sqlite::sql::{
    count_rows, get_user_version, index_exists, set_user_version, table_columns, table_exists,
    user_tables,
};

use common::{files_in, raw_connection, seed_baseline_database, store_config};

fn add_email_then_fail(conn: &mut SqliteConnection) -> Result<()> {
    diesel::sql_query("ALTER TABLE customers ADD COLUMN email TEXT")
        .execute(conn)
        .map_err(|e| Error::Unexpected(e.to_string()))?;
    Err(Error::Unexpected("disk full".to_string()))
}

fn wipe_reservations_then_fail(conn: &mut SqliteConnection) -> Result<()> {
    diesel::sql_query("DELETE FROM reservations")
        .execute(conn)
        .map_err(|e| Error::Unexpected(e.to_string()))?;
    diesel::sql_query("ALTER TABLE reservations ADD COLUMN junk TEXT")
        .execute(conn)
        .map_err(|e| Error::Unexpected(e.to_string()))?;
    Err(Error::Unexpected("rebuild interrupted".to_string()))
}

fn destroy_reservations_and_shadow(conn: &mut SqliteConnection) -> Result<()> {
    diesel::sql_query("DROP TABLE reservations_backup")
        .execute(conn)
        .map_err(|e| Error::Unexpected(e.to_string()))?;
    diesel::sql_query("DROP TABLE reservations")
        .execute(conn)
        .map_err(|e| Error::Unexpected(e.to_string()))?;
    Err(Error::Unexpected("rebuild interrupted".to_string()))
}

fn single_step_plan(
    at_risk_tables: &'static [&'static str],
    mode: StepMode,
    apply: fn(&mut SqliteConnection) -> Result<()>,
) -> MigrationPlan {
    MigrationPlan::new(vec![MigrationStep {
        from: 18,
        to: 19,
        name: "failing step",
        at_risk_tables,
        risk: RiskLevel::High,
        mode,
        apply,
    }])
    .unwrap()
}

#[test]
fn fresh_install_walks_the_whole_chain_and_leaves_no_backups() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    let store = open_store(&config).unwrap();

    assert_eq!(store.schema_version().unwrap(), LATEST_VERSION);
    let report = store.migration_report();
    assert_eq!(report.from_version, 18);
    assert_eq!(report.reached_version, LATEST_VERSION);
    assert_eq!(report.steps.len(), 16);
    assert!(report.steps.iter().all(|s| s.outcome == MigrationOutcome::Committed));

    let mut conn = get_connection(store.pool()).unwrap();
    let tables = user_tables(&mut conn).unwrap();
    assert!(tables.iter().all(|t| !t.ends_with("_backup")), "{tables:?}");
    assert!(table_exists(&mut conn, "sync_outbox").unwrap());
    assert!(index_exists(&mut conn, "idx_sync_outbox_dirty").unwrap());
    assert!(!index_exists(&mut conn, "idx_customers_name_legacy").unwrap());

    let log = load_migration_log(&mut conn).unwrap();
    assert_eq!(log.len(), 16);
    assert!(log.iter().any(|entry| entry.from_version == 27 && entry.step_name == "reserved"));

    assert!(files_in(config.backup_dir()).is_empty());
}

#[test]
fn upgrade_from_baseline_keeps_every_row() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path()).with_json_export(JsonExportPolicy::Always);
    seed_baseline_database(&config);

    let store = open_store(&config).unwrap();
    assert_eq!(store.migration_report().from_version, 18);
    assert_eq!(store.schema_version().unwrap(), LATEST_VERSION);

    let mut conn = get_connection(store.pool()).unwrap();
    assert_eq!(count_rows(&mut conn, "customers").unwrap(), 3);
    assert_eq!(count_rows(&mut conn, "reservations").unwrap(), 2);
    assert_eq!(count_rows(&mut conn, "payments").unwrap(), 1);

    let columns = table_columns(&mut conn, "reservations").unwrap();
    for column in ["tenant_id", "updated_at", "status", "commission_amount"] {
        assert!(columns.contains(&column.to_string()), "missing {column}");
    }

    let reservations = store.reservation_repository();
    let past = reservations.get_reservation(1).unwrap().unwrap();
    let future = reservations.get_reservation(2).unwrap().unwrap();
    assert_eq!(past.status, ReservationStatus::Completed);
    assert_eq!(future.status, ReservationStatus::Pending);
    assert_eq!(past.updated_at, past.created_at);
    assert_eq!(past.tenant_id, None);

    // Shadow tables, JSON exports and the pre-open copy are all gone.
    let tables = user_tables(&mut conn).unwrap();
    assert!(tables.iter().all(|t| !t.ends_with("_backup")), "{tables:?}");
    assert!(files_in(config.backup_dir()).is_empty());
}

#[test]
fn failed_transactional_step_rolls_back_to_the_previous_version() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path()).with_json_export(JsonExportPolicy::Always);
    seed_baseline_database(&config);
    let plan = single_step_plan(&["customers"], StepMode::Transactional, add_email_then_fail);

    let mut conn = raw_connection(&config);
    let report = MigrationManager::new(&mut conn, &plan, &config)
        .apply_migrations(18, 19)
        .unwrap();

    let failed = report.failed_step().unwrap();
    assert!(matches!(failed.outcome, MigrationOutcome::RolledBack { .. }));
    assert_eq!(failed.table_counts_before, failed.table_counts_after);
    assert_eq!(report.reached_version, 18);

    assert_eq!(get_user_version(&mut conn).unwrap(), 18);
    assert_eq!(count_rows(&mut conn, "customers").unwrap(), 3);
    assert!(!table_columns(&mut conn, "customers")
        .unwrap()
        .contains(&"email".to_string()));
    assert!(!table_exists(&mut conn, "customers_backup").unwrap());
    assert!(files_in(config.backup_dir()).is_empty());

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, MigrationError::RolledBack { from: 18, to: 19, .. }));
}

#[test]
fn failed_autocommit_step_is_restored_from_its_shadow_table() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    seed_baseline_database(&config);
    let plan = single_step_plan(&["reservations"], StepMode::Autocommit, wipe_reservations_then_fail);

    let mut conn = raw_connection(&config);
    let report = MigrationManager::new(&mut conn, &plan, &config)
        .apply_migrations(18, 19)
        .unwrap();

    assert!(matches!(
        report.failed_step().unwrap().outcome,
        MigrationOutcome::RolledBack { .. }
    ));
    assert_eq!(get_user_version(&mut conn).unwrap(), 18);
    assert_eq!(count_rows(&mut conn, "reservations").unwrap(), 2);
    assert!(!table_columns(&mut conn, "reservations")
        .unwrap()
        .contains(&"junk".to_string()));
    assert!(index_exists(&mut conn, "idx_reservations_customer").unwrap());
    assert!(!table_exists(&mut conn, "reservations_backup").unwrap());
}

#[test]
fn lost_shadow_table_is_unrecoverable_and_keeps_every_backup() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path()).with_json_export(JsonExportPolicy::Always);
    let db_path = seed_baseline_database(&config);
    let whole_file = create_whole_file_backup(&db_path, config.backup_dir()).unwrap();
    let plan = single_step_plan(
        &["reservations"],
        StepMode::Autocommit,
        destroy_reservations_and_shadow,
    );

    let mut conn = raw_connection(&config);
    let mut manager =
        MigrationManager::new(&mut conn, &plan, &config).with_whole_file_backup(Some(whole_file.clone()));
    let report = manager.apply_migrations(18, 19).unwrap();
    assert_eq!(manager.whole_file_backup(), Some(whole_file.as_path()));

    let failed = report.failed_step().unwrap().clone();
    assert!(matches!(failed.outcome, MigrationOutcome::Unrecoverable { .. }));
    assert!(whole_file.exists());
    let export = failed.json_export.expect("json export is kept");
    assert!(export.exists());
    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&export).unwrap()).unwrap();
    assert_eq!(exported["tables"]["reservations"].as_array().unwrap().len(), 2);

    let err = Error::from(report.into_result().unwrap_err());
    assert!(err.is_fatal());
}

#[test]
fn committed_step_drops_its_shadow_tables() {
    fn noop(_: &mut SqliteConnection) -> Result<()> {
        Ok(())
    }
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    seed_baseline_database(&config);
    let plan = single_step_plan(&["customers", "payments"], StepMode::Transactional, noop);

    let mut conn = raw_connection(&config);
    let report = MigrationManager::new(&mut conn, &plan, &config)
        .apply_migrations(18, 19)
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.steps[0].backup_tables, vec!["customers_backup", "payments_backup"]);
    assert_eq!(get_user_version(&mut conn).unwrap(), 19);
    assert!(!table_exists(&mut conn, "payments_backup").unwrap());
}

/// Leaves a table in `sqlite_master` that the connection cannot scan.
fn register_unscannable_table(conn: &mut SqliteConnection) -> Result<()> {
    conn.batch_execute(
        "PRAGMA writable_schema = ON;
         INSERT INTO sqlite_master (type, name, tbl_name, rootpage, sql)
         VALUES ('table', 'ghost', 'ghost', 0, 'CREATE VIRTUAL TABLE ghost USING no_such_module()');
         PRAGMA writable_schema = OFF;",
    )
    .map_err(|e| Error::Unexpected(e.to_string()))
}

#[test]
fn committed_step_is_reported_even_when_counting_afterwards_fails() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    let db_path = seed_baseline_database(&config);
    let whole_file = create_whole_file_backup(&db_path, config.backup_dir()).unwrap();
    let plan = MigrationPlan::new(vec![MigrationStep {
        from: 18,
        to: 19,
        name: "register ghost",
        at_risk_tables: &["ghost"],
        risk: RiskLevel::Low,
        mode: StepMode::Transactional,
        apply: register_unscannable_table,
    }])
    .unwrap();

    let mut conn = raw_connection(&config);
    ensure_migration_log(&mut conn).unwrap();
    let report = MigrationManager::new(&mut conn, &plan, &config)
        .with_whole_file_backup(Some(whole_file.clone()))
        .apply_migrations(18, 19)
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.reached_version, 19);
    assert!(report.steps[0].outcome.is_committed());
    assert!(report.steps[0].table_counts_after.is_empty());
    assert!(!whole_file.exists());
    assert_eq!(get_user_version(&mut conn).unwrap(), 19);
    assert_eq!(load_migration_log(&mut conn).unwrap().len(), 1);
}

#[test]
fn newer_schema_than_the_app_is_refused() {
    let dir = tempdir().unwrap();
    let config = store_config(dir.path());
    seed_baseline_database(&config);
    {
        let mut conn = raw_connection(&config);
        set_user_version(&mut conn, LATEST_VERSION + 6).unwrap();
    }

    let err = open_store(&config).err().unwrap();
    assert!(matches!(
        err,
        Error::Migration(MigrationError::UnsupportedVersion { found, .. }) if found == LATEST_VERSION + 6
    ));
    assert!(err.is_fatal());
    assert!(files_in(config.backup_dir()).is_empty());
}
