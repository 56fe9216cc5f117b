mod model;
mod repository;

pub use model::{NewSupplierDB, SupplierDB};
pub use repository::SupplierRepository;
