//! Sync domain models and services.

mod backfill;
mod post_login;
mod remote;
mod restore_model;
mod restore_service;
mod scheduler;
mod sync_model;

pub use backfill::*;
pub use post_login::*;
pub use remote::*;
pub use restore_model::*;
pub use restore_service::*;
pub use scheduler::*;
pub use sync_model::*;
