mod model;
mod repository;

pub use model::{CustomerDB, NewCustomerDB};
pub use repository::CustomerRepository;
