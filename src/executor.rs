/// Execution Serializer Module
///
/// The underlying connection must never be used from two threads at
/// once, so one worker thread owns it outright. Every public operation
/// is packaged as a closure, sent over a channel, and executed in FIFO
/// order; the caller blocks on a reply channel until its unit of work
/// completes. Batches submitted as one closure run without interleaving
/// from other callers.
use crate::core::{ModeliteError, Result};
use crate::schema::TableSchema;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};
use std::thread;

/// Where the worker opens its store.
#[derive(Debug, Clone)]
pub(crate) enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// State owned by the worker thread: the connection, the per-table
/// schema cache, and the shared debug-logging flag.
pub(crate) struct Core {
    pub conn: Connection,
    pub schema_cache: HashMap<String, TableSchema>,
    pub debug_sql: Arc<AtomicBool>,
}

type Job = Box<dyn FnOnce(&mut Core) + Send>;

/// Single-writer dispatch queue in front of the connection.
pub(crate) struct SerialExecutor {
    sender: Option<mpsc::Sender<Job>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SerialExecutor {
    /// Spawns the worker, which opens the store and applies the given
    /// pragma batch before accepting jobs. Open failures are reported
    /// back through a ready channel so construction stays synchronous.
    pub fn spawn(
        location: StoreLocation,
        pragma_batch: String,
        debug_sql: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let worker = thread::Builder::new()
            .name("modelite-store".to_string())
            .spawn(move || {
                let conn = match open_connection(&location, &pragma_batch) {
                    Ok(conn) => {
                        let _ = ready_tx.send(Ok(()));
                        conn
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let mut core = Core {
                    conn,
                    schema_cache: HashMap::new(),
                    debug_sql,
                };
                while let Ok(job) = job_rx.recv() {
                    job(&mut core);
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(SerialExecutor {
                sender: Some(job_tx),
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(ModeliteError::Execution(
                    "store worker exited before opening the store".to_string(),
                ))
            }
        }
    }

    /// Submits one unit of work and blocks until the worker returns its
    /// result. Jobs run in submission order; no job overlaps another.
    pub fn dispatch<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Core) -> Result<T> + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ModeliteError::Execution("store worker is shut down".to_string()))?;

        let (reply_tx, reply_rx) = mpsc::channel();
        sender
            .send(Box::new(move |core: &mut Core| {
                let _ = reply_tx.send(job(core));
            }))
            .map_err(|_| ModeliteError::Execution("store worker is gone".to_string()))?;

        reply_rx
            .recv()
            .map_err(|_| ModeliteError::Execution("store worker dropped the reply".to_string()))?
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop; joining makes the
        // connection close before drop returns
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn open_connection(location: &StoreLocation, pragma_batch: &str) -> Result<Connection> {
    let conn = match location {
        StoreLocation::File(path) => Connection::open(path)?,
        StoreLocation::Memory => Connection::open_in_memory()?,
    };
    if !pragma_batch.is_empty() {
        conn.execute_batch(pragma_batch)?;
    }
    Ok(conn)
}
