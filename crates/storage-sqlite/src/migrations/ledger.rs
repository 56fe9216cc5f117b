//! `migration_log`: one row per attempted step, kept outside the versioned
//! chain so it survives rollbacks.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::warn;

use rentdesk_core::errors::Result;
use rentdesk_core::migrations::{MigrationOutcome, StepReport};

use crate::errors::StorageError;
use crate::schema::migration_log;

pub fn ensure_migration_log(conn: &mut SqliteConnection) -> Result<()> {
    diesel::sql_query(
        "CREATE TABLE IF NOT EXISTS migration_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            from_version INTEGER NOT NULL,
            to_version INTEGER NOT NULL,
            step_name TEXT NOT NULL,
            outcome TEXT NOT NULL,
            message TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        )",
    )
    .execute(conn)
    .map_err(StorageError::from)?;
    Ok(())
}

#[derive(Insertable)]
#[diesel(table_name = migration_log)]
struct NewMigrationLogDB<'a> {
    run_id: &'a str,
    from_version: i32,
    to_version: i32,
    step_name: &'a str,
    outcome: &'a str,
    message: Option<&'a str>,
    started_at: String,
    finished_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = migration_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MigrationLogEntry {
    pub id: i32,
    pub run_id: String,
    pub from_version: i32,
    pub to_version: i32,
    pub step_name: String,
    pub outcome: String,
    pub message: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

/// Appends the step's outcome. A failure to write the log never changes the
/// outcome of the step itself.
pub fn record_step(
    conn: &mut SqliteConnection,
    run_id: &str,
    report: &StepReport,
    started_at: DateTime<Utc>,
) {
    let outcome = report.outcome.state().as_str();
    let message = match &report.outcome {
        MigrationOutcome::Committed => None,
        MigrationOutcome::RolledBack { error } => Some(error.clone()),
        MigrationOutcome::Unrecoverable {
            error,
            restore_error,
        } => Some(format!("{error}; restore failed: {restore_error}")),
    };
    let row = NewMigrationLogDB {
        run_id,
        from_version: report.from,
        to_version: report.to,
        step_name: &report.name,
        outcome,
        message: message.as_deref(),
        started_at: started_at.to_rfc3339(),
        finished_at: Utc::now().to_rfc3339(),
    };
    if let Err(e) = diesel::insert_into(migration_log::table)
        .values(&row)
        .execute(conn)
    {
        warn!(
            "[Migration] Could not record step {} -> {} in migration_log: {}",
            report.from, report.to, e
        );
    }
}

pub fn load_migration_log(conn: &mut SqliteConnection) -> Result<Vec<MigrationLogEntry>> {
    let rows = migration_log::table
        .order(migration_log::id.asc())
        .select(MigrationLogEntry::as_select())
        .load::<MigrationLogEntry>(conn)
        .map_err(StorageError::from)?;
    Ok(rows)
}
