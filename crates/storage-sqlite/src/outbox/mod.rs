//! Dirty outbox: which tracked rows still need to reach the remote store.

mod model;
mod repository;

pub use model::OutboxEntryDB;
pub use repository::{mark_dirty, OutboxRepository};
