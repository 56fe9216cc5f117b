//! Single-writer actor.
//!
//! Every mutation runs on one dedicated thread that owns its pooled
//! connection, one `IMMEDIATE` transaction per job. Reads go straight to the
//! pool, so they never wait behind a write lock they do not need.

use std::any::Any;
use std::thread;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use rentdesk_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

type BoxedValue = Box<dyn Any + Send>;
type Job = Box<dyn FnOnce(&mut SqliteConnection) -> Result<BoxedValue> + Send>;

struct WriteRequest {
    job: Job,
    reply: oneshot::Sender<Result<BoxedValue>>,
}

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl WriteHandle {
    /// Runs `job` inside a write transaction on the writer thread.
    ///
    /// An `Err` from the job rolls the whole transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| job(conn).map(|value| Box::new(value) as BoxedValue));
        self.tx
            .send(WriteRequest { job, reply })
            .map_err(|_| Error::Database(DatabaseError::ConnectionFailed("writer stopped".into())))?;

        let value = rx
            .await
            .map_err(|_| Error::Database(DatabaseError::Internal("writer dropped the job".into())))??;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::Unexpected("writer returned an unexpected type".into()))
    }
}

/// Starts the writer thread. It exits once every `WriteHandle` is dropped.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();

    let spawned = thread::Builder::new()
        .name("rentdesk-db-writer".into())
        .spawn(move || {
            while let Some(WriteRequest { job, reply }) = rx.blocking_recv() {
                let result = run_job(&pool, job);
                // The caller may have gone away; the write already happened.
                let _ = reply.send(result);
            }
            debug!("[Store] Writer thread stopped");
        });

    if let Err(e) = spawned {
        // The receiver was moved into the failed closure and dropped, so every
        // exec() call reports the writer as stopped.
        error!("[Store] Failed to spawn writer thread: {}", e);
    }

    WriteHandle { tx }
}

fn run_job(pool: &Pool<ConnectionManager<SqliteConnection>>, job: Job) -> Result<BoxedValue> {
    let mut conn = pool.get().map_err(StorageError::from)?;
    conn.immediate_transaction::<BoxedValue, StorageError, _>(|tx| job(tx).map_err(StorageError::Core))
        .map_err(Error::from)
}
