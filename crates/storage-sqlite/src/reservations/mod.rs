mod model;
mod repository;

pub use model::{NewReservationDB, ReservationDB};
pub use repository::ReservationRepository;
