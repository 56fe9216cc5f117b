//! Remote document store clients used by the Rentdesk restore engine.
//!
//! [`HttpRemoteStore`] talks to the per-tenant document API.
//! [`JsonBackupSource`] serves an exported backup file through the same
//! [`RemoteStore`](rentdesk_core::sync::RemoteStore) contract, so importing a
//! backup follows the insert-only restore rules.

pub mod client;
pub mod config;
pub mod error;
pub mod json_backup;

pub use client::HttpRemoteStore;
pub use config::RemoteConfig;
pub use error::{CloudError, Result};
pub use json_backup::JsonBackupSource;
