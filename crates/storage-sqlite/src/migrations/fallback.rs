//! Debug-only escape hatch: throw the database away and start over.

use std::fs;

use log::error;

use rentdesk_core::errors::{MigrationError, Result};
use rentdesk_core::migrations::MigrationRunReport;

use crate::config::StoreConfig;

pub(super) fn wipe_and_recreate(
    config: &StoreConfig,
    cause: &MigrationError,
) -> Result<MigrationRunReport> {
    let db_path = config.database_path();
    error!(
        "[Migration] Destructive fallback: deleting {} after migration failure: {}",
        db_path.display(),
        cause
    );
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let path = db_path.with_file_name(format!("{}{suffix}", config.database_file));
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    super::migrate_database(config)
}
