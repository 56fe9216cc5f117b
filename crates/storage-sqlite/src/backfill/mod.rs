mod repository;

pub use repository::TenantBackfillRepository;
