//! Versioned schema migrations guarded by layered backups.
//!
//! Startup order: pre-open whole-file backup, migration ledger, baseline for
//! fresh files, then the chain from the file's version to [`LATEST_VERSION`].

mod backup;
mod baseline;
#[cfg(feature = "destructive-fallback")]
mod fallback;
mod ledger;
mod manager;
mod plan;
mod shadow;
mod steps;

pub use backup::{
    create_whole_file_backup, export_tables_json, peek_user_version, pre_open_backup,
    JSON_EXPORT_PREFIX, WHOLE_FILE_BACKUP_PREFIX,
};
pub use baseline::{create_baseline_schema, BASELINE_VERSION};
pub use ledger::{ensure_migration_log, load_migration_log, MigrationLogEntry};
pub use manager::MigrationManager;
pub use plan::{ApplyFn, MigrationPlan, MigrationStep, StepMode};
pub use shadow::{shadow_name, SHADOW_SUFFIX};
pub use steps::{default_steps, LATEST_VERSION};

use diesel::sqlite::SqliteConnection;
use log::info;

use rentdesk_core::errors::{Error, Result};
use rentdesk_core::migrations::MigrationRunReport;

use crate::config::StoreConfig;
use crate::db::establish_connection;
use crate::errors::StorageError;
use crate::sql::{get_user_version, user_tables};

#[cfg(all(feature = "destructive-fallback", not(debug_assertions)))]
compile_error!("the destructive-fallback feature deletes user data and is only allowed in debug builds");

/// Brings the database at `config.database_path()` to the latest version.
///
/// A rolled-back step surfaces as `MigrationError::RolledBack` (retried on the
/// next launch); a failed restoration as `MigrationError::Unrecoverable`.
pub fn run_migrations(config: &StoreConfig) -> Result<MigrationRunReport> {
    let result = migrate_database(config);
    #[cfg(feature = "destructive-fallback")]
    if let Err(Error::Migration(cause)) = &result {
        return fallback::wipe_and_recreate(config, cause);
    }
    result
}

fn migrate_database(config: &StoreConfig) -> Result<MigrationRunReport> {
    let plan = MigrationPlan::new(default_steps())?;
    let db_path = config.database_path();

    let whole_file_backup = pre_open_backup(
        &db_path,
        config.backup_dir(),
        plan.latest_version(),
        config.backups_cancelled(),
    );

    let mut conn = establish_connection(&db_path, config.busy_timeout_ms)?;
    ensure_migration_log(&mut conn)?;

    let mut current = get_user_version(&mut conn)?;
    if current == 0 && is_empty_database(&mut conn)? {
        conn.immediate_transaction::<_, StorageError, _>(|tx| Ok(create_baseline_schema(tx)?))
            .map_err(Error::from)?;
        current = BASELINE_VERSION;
        info!(
            "[Migration] Created baseline schema v{} in {}",
            BASELINE_VERSION,
            db_path.display()
        );
    }

    let report = MigrationManager::new(&mut conn, &plan, config)
        .with_whole_file_backup(whole_file_backup)
        .apply_migrations(current, plan.latest_version())?;
    Ok(report.into_result()?)
}

fn is_empty_database(conn: &mut SqliteConnection) -> Result<bool> {
    Ok(user_tables(conn)?
        .iter()
        .all(|table| table == "migration_log"))
}
