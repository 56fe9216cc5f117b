//! Core domain for the Rentdesk local-first data layer.
//!
//! This crate is storage-agnostic: it defines the tenant-scoped entity
//! models, the sync outbox and restore contracts, the migration outcome
//! types and the services that orchestrate restore and backfill. The SQLite
//! implementation lives in `rentdesk-storage-sqlite`, remote clients in
//! `rentdesk-cloud-sync`.

pub mod entities;
pub mod errors;
pub mod migrations;
pub mod sync;

pub use errors::{Error, Result};
