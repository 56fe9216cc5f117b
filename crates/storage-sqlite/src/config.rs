//! Local store configuration.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATABASE_FILE: &str = "rentdesk.db";
const DEFAULT_BACKUP_SUBDIR: &str = "backups";

/// Which migration steps get a JSON export of their at-risk tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonExportPolicy {
    #[default]
    HighRiskOnly,
    Always,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    /// User-visible directory for whole-file backups and JSON exports.
    pub backup_dir: PathBuf,
    pub json_export: JsonExportPolicy,
    pub pool_size: u32,
    pub busy_timeout_ms: u32,
    /// Set to abandon the pending whole-file backup and JSON exports.
    /// Never consulted once a step starts applying.
    #[serde(skip)]
    pub backup_cancel: Arc<AtomicBool>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            backup_dir: data_dir.join(DEFAULT_BACKUP_SUBDIR),
            data_dir,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            json_export: JsonExportPolicy::default(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
            backup_cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reads `RENTDESK_DATA_DIR` and `RENTDESK_BACKUP_DIR`, falling back to the
    /// current directory and `<data dir>/backups`.
    pub fn from_env() -> Self {
        let mut config = match std::env::var("RENTDESK_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => Self::new(dir.trim()),
            _ => Self::default(),
        };
        if let Ok(dir) = std::env::var("RENTDESK_BACKUP_DIR") {
            if !dir.trim().is_empty() {
                config.backup_dir = PathBuf::from(dir.trim());
            }
        }
        config
    }

    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = backup_dir.into();
        self
    }

    pub fn with_json_export(mut self, policy: JsonExportPolicy) -> Self {
        self.json_export = policy;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn cancel_backups(&self) {
        self.backup_cancel.store(true, Ordering::SeqCst);
    }

    pub fn backups_cancelled(&self) -> bool {
        self.backup_cancel.load(Ordering::SeqCst)
    }
}
