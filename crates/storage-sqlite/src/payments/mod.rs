mod model;
mod repository;

pub use model::{NewPaymentDB, PaymentDB};
pub use repository::PaymentRepository;
