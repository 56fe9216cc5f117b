//! Error taxonomy shared by every Rentdesk crate.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Remote store error: {message}")]
    Remote { message: String, retryable: bool },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Pool creation failed: {0}")]
    PoolCreationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("no migration registered for {from} -> {to}")]
    MissingStep { from: i32, to: i32 },

    #[error("migration chain is broken: {0}")]
    BrokenChain(String),

    #[error("schema version {found} is outside the supported range {min}..={max}")]
    UnsupportedVersion { found: i32, min: i32, max: i32 },

    #[error("shadow copy of '{table}' failed verification: expected {expected} rows, found {found}")]
    VerificationFailed {
        table: String,
        expected: i64,
        found: i64,
    },

    #[error("illegal migration state transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("migration {from} -> {to} failed and was rolled back: {message}")]
    RolledBack { from: i32, to: i32, message: String },

    #[error("migration {from} -> {to} failed and could not be restored ({restore_error}): {message}")]
    Unrecoverable {
        from: i32,
        to: i32,
        message: String,
        restore_error: String,
    },
}

impl Error {
    /// Builds a remote error carrying the retry classification of the transport.
    pub fn remote(message: impl Into<String>, retryable: bool) -> Self {
        Self::Remote {
            message: message.into(),
            retryable,
        }
    }

    /// True when the app shell must stop and surface a blocking error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Migration(MigrationError::Unrecoverable { .. })
                | Self::Migration(MigrationError::UnsupportedVersion { .. })
                | Self::Migration(MigrationError::BrokenChain(_))
                | Self::Migration(MigrationError::MissingStep { .. })
        )
    }

    /// True when the same operation may succeed if attempted again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote { retryable, .. } => *retryable,
            Self::Database(DatabaseError::ConnectionFailed(_)) => true,
            Self::Migration(MigrationError::RolledBack { .. }) => true,
            Self::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_migration_is_fatal_and_not_retryable() {
        let err = Error::from(MigrationError::Unrecoverable {
            from: 25,
            to: 26,
            message: "no such column".to_string(),
            restore_error: "shadow table missing".to_string(),
        });
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn rolled_back_migration_is_retryable_on_next_launch() {
        let err = Error::from(MigrationError::RolledBack {
            from: 25,
            to: 26,
            message: "disk I/O error".to_string(),
        });
        assert!(!err.is_fatal());
        assert!(err.is_retryable());
    }

    #[test]
    fn remote_error_keeps_transport_classification() {
        assert!(Error::remote("timeout", true).is_retryable());
        assert!(!Error::remote("bad request", false).is_retryable());
    }
}
