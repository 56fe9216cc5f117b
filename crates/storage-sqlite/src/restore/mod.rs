//! Insert-only restore of remote documents into the local tables.

mod repository;

pub use repository::RestoreRepository;
