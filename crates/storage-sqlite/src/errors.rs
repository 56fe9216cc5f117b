//! Storage-level errors and their mapping into the core taxonomy.

use rentdesk_core::errors::{DatabaseError, Error, MigrationError};
use thiserror::Error;

/// Errors raised by the SQLite store before they are mapped into core errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Diesel query or transaction failure
    #[error("Query failed: {0}")]
    QueryFailed(#[from] diesel::result::Error),

    /// Opening a SQLite connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    /// No pooled connection could be checked out
    #[error("Connection pool error: {0}")]
    PoolFailed(#[from] r2d2::Error),

    /// Whole-file backup through the SQLite online backup API
    #[error("SQLite backup failed: {0}")]
    Backup(#[from] rusqlite::Error),

    /// Backup directory or database file access
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by a write job or a migration step
    #[error(transparent)]
    Core(#[from] Error),
}

impl From<MigrationError> for StorageError {
    fn from(err: MigrationError) -> Self {
        StorageError::Core(Error::Migration(err))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::QueryFailed(diesel::result::Error::NotFound) => {
                Error::Database(DatabaseError::NotFound("record not found".to_string()))
            }
            StorageError::QueryFailed(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolFailed(e) => Error::Database(DatabaseError::ConnectionFailed(e.to_string())),
            StorageError::Backup(e) => Error::Database(DatabaseError::Internal(e.to_string())),
            StorageError::Io(e) => Error::Io(e),
            StorageError::Core(e) => e,
        }
    }
}
