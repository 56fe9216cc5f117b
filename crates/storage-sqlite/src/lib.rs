//! SQLite implementation of the Rentdesk local store.
//!
//! Opening the store runs the schema migration chain under layered backups
//! (whole-file copy, per-table shadow copies, optional JSON export) before
//! any connection is handed out. Every write goes through a single writer
//! thread; tracked mutations record their outbox marker in the same
//! transaction.

pub mod backfill;
pub mod config;
pub mod customers;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod outbox;
pub mod payments;
pub mod reservations;
pub mod restore;
pub mod schema;
pub mod sql;
pub mod suppliers;

pub use backfill::TenantBackfillRepository;
pub use config::{JsonExportPolicy, StoreConfig};
pub use customers::CustomerRepository;
pub use db::{open_store, LocalStore};
pub use errors::StorageError;
pub use migrations::{run_migrations, MigrationManager, LATEST_VERSION};
pub use outbox::{mark_dirty, OutboxRepository};
pub use payments::PaymentRepository;
pub use reservations::ReservationRepository;
pub use restore::RestoreRepository;
pub use suppliers::SupplierRepository;
