//! Connection management and the process-wide store handle.

pub mod write_actor;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::{Connection, SqliteConnection};
use log::{info, warn};

use rentdesk_core::errors::{DatabaseError, Error, Result};
use rentdesk_core::migrations::MigrationRunReport;

use crate::backfill::TenantBackfillRepository;
use crate::config::StoreConfig;
use crate::customers::CustomerRepository;
use crate::errors::StorageError;
use crate::migrations::run_migrations;
use crate::outbox::OutboxRepository;
use crate::payments::PaymentRepository;
use crate::reservations::ReservationRepository;
use crate::restore::RestoreRepository;
use crate::sql;
use crate::suppliers::SupplierRepository;

pub use write_actor::{spawn_writer, WriteHandle};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
}

impl ConnectionOptions {
    fn apply(&self, conn: &mut SqliteConnection) -> diesel::QueryResult<()> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))
    }
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        self.apply(conn).map_err(r2d2::Error::QueryError)
    }
}

/// Makes sure the data directory exists and returns the database path.
pub fn init(config: &StoreConfig) -> Result<PathBuf> {
    fs::create_dir_all(&config.data_dir).map_err(|e| {
        Error::Database(DatabaseError::ConnectionFailed(format!(
            "Failed to create data directory {}: {}",
            config.data_dir.display(),
            e
        )))
    })?;
    Ok(config.database_path())
}

/// A single connection outside the pool, used for startup work that has to
/// happen before any other component touches the store.
pub fn establish_connection(db_path: &Path, busy_timeout_ms: u32) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(&db_path.to_string_lossy()).map_err(StorageError::from)?;
    ConnectionOptions { busy_timeout_ms }
        .apply(&mut conn)
        .map_err(StorageError::from)?;
    Ok(conn)
}

pub fn create_pool(db_path: &Path, config: &StoreConfig) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms).max(1_000)))
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::PoolCreationFailed(e.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get().map_err(|e| StorageError::from(e).into())
}

/// The opened, fully migrated local store.
///
/// Construct it through [`open_store`]; everything else receives repositories
/// from it instead of reaching for global state.
pub struct LocalStore {
    db_path: PathBuf,
    pool: Arc<DbPool>,
    writer: WriteHandle,
    migration_report: MigrationRunReport,
}

impl LocalStore {
    fn open(config: &StoreConfig) -> Result<Self> {
        let db_path = init(config)?;
        let migration_report = run_migrations(config)?;
        let pool = create_pool(&db_path, config)?;
        let writer = spawn_writer(pool.as_ref().clone());
        info!(
            "[Store] Opened {} at schema version {}",
            db_path.display(),
            migration_report.reached_version
        );
        Ok(Self {
            db_path,
            pool,
            writer,
            migration_report,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    pub fn writer(&self) -> &WriteHandle {
        &self.writer
    }

    /// What the startup migration run did.
    pub fn migration_report(&self) -> &MigrationRunReport {
        &self.migration_report
    }

    pub fn schema_version(&self) -> Result<i32> {
        let mut conn = get_connection(&self.pool)?;
        sql::get_user_version(&mut conn)
    }

    pub fn outbox_repository(&self) -> OutboxRepository {
        OutboxRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn customer_repository(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn supplier_repository(&self) -> SupplierRepository {
        SupplierRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn reservation_repository(&self) -> ReservationRepository {
        ReservationRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn payment_repository(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn restore_repository(&self) -> RestoreRepository {
        RestoreRepository::new(self.pool.clone(), self.writer.clone())
    }

    pub fn backfill_repository(&self) -> TenantBackfillRepository {
        TenantBackfillRepository::new(self.pool.clone(), self.writer.clone())
    }
}

fn open_stores() -> &'static Mutex<HashMap<PathBuf, Weak<LocalStore>>> {
    static OPEN_STORES: OnceLock<Mutex<HashMap<PathBuf, Weak<LocalStore>>>> = OnceLock::new();
    OPEN_STORES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Opens (and migrates) the store at `config.database_path()`.
///
/// Opens are serialized behind one process-wide lock, so at most one thread
/// ever migrates a given file. While a handle for the same path is alive it
/// is returned instead of opening the file again.
pub fn open_store(config: &StoreConfig) -> Result<Arc<LocalStore>> {
    let mut stores = open_stores().lock().map_err(|_| {
        Error::Database(DatabaseError::Internal("store registry lock poisoned".into()))
    })?;

    let key = config.database_path();
    if let Some(existing) = stores.get(&key).and_then(Weak::upgrade) {
        return Ok(existing);
    }
    stores.retain(|_, store| store.strong_count() > 0);

    match LocalStore::open(config) {
        Ok(store) => {
            let store = Arc::new(store);
            stores.insert(key, Arc::downgrade(&store));
            Ok(store)
        }
        Err(err) => {
            warn!("[Store] Failed to open {}: {}", key.display(), err);
            Err(err)
        }
    }
}
