//! Whole-file backups and JSON exports written to the user-visible backup
//! directory so a person can find the latest one for manual recovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use log::{info, warn};
use rusqlite::OpenFlags;

use rentdesk_core::errors::{Error, Result};

use crate::errors::StorageError;
use crate::sql::{escape_sqlite_str, quote_identifier, table_columns, table_exists};

pub const WHOLE_FILE_BACKUP_PREFIX: &str = "pre_migration_backup_";
pub const JSON_EXPORT_PREFIX: &str = "emergency_migration_backup_";
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

pub fn backup_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `<dir>/<prefix><timestamp>.<ext>`, with a counter appended when a file
/// from the same second already exists.
fn unique_backup_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let stamp = backup_timestamp();
    let mut candidate = dir.join(format!("{prefix}{stamp}.{extension}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{prefix}{stamp}_{counter}.{extension}"));
        counter += 1;
    }
    candidate
}

/// Reads the version marker without opening the store for writing.
pub fn peek_user_version(db_path: &Path) -> Result<Option<i32>> {
    if !db_path.exists() {
        return Ok(None);
    }
    let conn = rusqlite::Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(StorageError::from)?;
    let version = conn
        .pragma_query_value(None, "user_version", |row| row.get::<_, i32>(0))
        .map_err(StorageError::from)?;
    Ok(Some(version))
}

/// Consistent copy of the database file through SQLite's online backup API.
pub fn create_whole_file_backup(db_path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;
    let target = unique_backup_path(backup_dir, WHOLE_FILE_BACKUP_PREFIX, "db");

    let src = rusqlite::Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(StorageError::from)?;
    let mut dst = rusqlite::Connection::open(&target).map_err(StorageError::from)?;
    {
        let backup = rusqlite::backup::Backup::new(&src, &mut dst).map_err(StorageError::from)?;
        backup
            .run_to_completion(64, Duration::from_millis(10), None)
            .map_err(StorageError::from)?;
    }

    let integrity: String = dst
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(StorageError::from)?;
    if integrity != "ok" {
        drop(dst);
        remove_backup_file(&target);
        return Err(Error::Unexpected(format!(
            "backup {} failed integrity check: {}",
            target.display(),
            integrity
        )));
    }

    info!("[Backup] Whole-file backup written to {}", target.display());
    Ok(target)
}

/// Best-effort pre-open backup. Skipped when nothing needs migrating or the
/// caller cancelled; failures are logged and swallowed.
pub fn pre_open_backup(
    db_path: &Path,
    backup_dir: &Path,
    latest_version: i32,
    cancelled: bool,
) -> Option<PathBuf> {
    if cancelled {
        info!("[Backup] Pre-open backup cancelled");
        return None;
    }
    match peek_user_version(db_path) {
        Ok(Some(version)) if version > 0 && version < latest_version => {}
        Ok(_) => return None,
        Err(e) => {
            warn!("[Backup] Could not read schema version before backup: {}", e);
            return None;
        }
    }
    match create_whole_file_backup(db_path, backup_dir) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(
                "[Backup] Pre-open backup of {} failed, continuing without it: {}",
                db_path.display(),
                e
            );
            None
        }
    }
}

#[derive(QueryableByName)]
struct JsonRows {
    #[diesel(sql_type = Text)]
    payload: String,
}

fn table_rows_as_json(conn: &mut SqliteConnection, table: &str) -> Result<serde_json::Value> {
    let columns = table_columns(conn, table)?;
    let pairs = columns
        .iter()
        .map(|c| format!("'{}', {}", escape_sqlite_str(c), quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let row = diesel::sql_query(format!(
        "SELECT COALESCE(json_group_array(json_object({pairs})), '[]') AS payload FROM {}",
        quote_identifier(table)
    ))
    .get_result::<JsonRows>(conn)
    .map_err(StorageError::from)?;
    Ok(serde_json::from_str(&row.payload)?)
}

/// Writes `{"version", "exportedAt", "tables": {...}}` for the given tables.
pub fn export_tables_json(
    conn: &mut SqliteConnection,
    tables: &[&str],
    version: i32,
    backup_dir: &Path,
) -> Result<PathBuf> {
    let mut exported = serde_json::Map::new();
    for table in tables {
        if table_exists(conn, table)? {
            exported.insert(table.to_string(), table_rows_as_json(conn, table)?);
        }
    }
    let document = serde_json::json!({
        "version": version,
        "exportedAt": Utc::now().to_rfc3339(),
        "tables": exported,
    });

    fs::create_dir_all(backup_dir)?;
    let target = unique_backup_path(backup_dir, JSON_EXPORT_PREFIX, "json");
    fs::write(&target, serde_json::to_vec_pretty(&document)?)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644))?;
    }

    info!(
        "[Backup] Exported {} table(s) to {}",
        exported.len(),
        target.display()
    );
    Ok(target)
}

pub fn remove_backup_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[Backup] Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::connection::SimpleConnection;
    use tempfile::tempdir;

    #[test]
    fn json_export_contains_every_row() {
        let dir = tempdir().unwrap();
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        conn.batch_execute(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, first_name TEXT, notes TEXT);
             INSERT INTO customers VALUES (1, 'Maria', NULL), (2, 'Nikos', 'it''s fine');
             CREATE TABLE payments (id INTEGER PRIMARY KEY);",
        )
        .unwrap();

        let path = export_tables_json(&mut conn, &["customers", "payments", "missing"], 25, dir.path())
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(JSON_EXPORT_PREFIX) && name.ends_with(".json"));

        let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc["version"], 25);
        assert_eq!(doc["tables"]["customers"].as_array().unwrap().len(), 2);
        assert_eq!(doc["tables"]["customers"][1]["notes"], "it's fine");
        assert_eq!(doc["tables"]["payments"], serde_json::json!([]));
        assert!(doc["tables"].get("missing").is_none());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn whole_file_backup_is_a_readable_copy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        {
            let mut conn = SqliteConnection::establish(&db_path.to_string_lossy()).unwrap();
            conn.batch_execute(
                "CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1), (2); PRAGMA user_version = 20;",
            )
            .unwrap();
        }

        let backup = pre_open_backup(&db_path, &dir.path().join("backups"), 34, false)
            .expect("backup taken");
        assert_eq!(peek_user_version(&backup).unwrap(), Some(20));

        assert!(pre_open_backup(&db_path, &dir.path().join("backups"), 20, false).is_none());
        assert!(pre_open_backup(&db_path, &dir.path().join("backups"), 34, true).is_none());
    }
}
