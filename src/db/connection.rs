use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::{Connection, Transaction};
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Messages for the store thread. `Close` is sent once, by the last handle.
enum StoreMessage {
    Run(Job),
    Close,
}

struct StoreThread {
    jobs: mpsc::Sender<StoreMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreThread {
    fn drop(&mut self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(StoreMessage::Close).is_err() {
            error!("Event store thread already gone at close");
        }
        if let Err(err) = handle.join() {
            error!("Event store thread panicked: {err:?}");
        }
    }
}

/// Opens the SQLite file, enables WAL and foreign keys, and brings the schema
/// up to date.
fn open_store(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(mut conn: Connection, jobs: mpsc::Receiver<StoreMessage>) {
    for message in jobs {
        match message {
            StoreMessage::Run(job) => job(&mut conn),
            StoreMessage::Close => break,
        }
    }
    info!("Event store thread stopped");
}

/// Handle to the event store.
///
/// One SQLite connection lives on a dedicated thread and every query is
/// shipped to it as a closure. Appends for all sessions are therefore
/// serialised, which is what makes the per-session ordering check and the
/// one-submission-per-session check atomic.
#[derive(Clone)]
pub struct Database {
    store: Arc<StoreThread>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<StoreMessage>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = db_path.clone();

        let handle = thread::Builder::new()
            .name("workflow-signal-db".into())
            .spawn(move || match open_store(&thread_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, jobs_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn event store thread")?;

        ready_rx
            .recv()
            .context("event store thread exited before it was ready")??;

        info!("Event store ready at {}", db_path.display());

        Ok(Self {
            store: Arc::new(StoreThread {
                jobs: jobs_tx,
                handle: Mutex::new(Some(handle)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Runs `task` on the store thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: Job = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("Event store caller went away before its result arrived");
            }
        });

        self.store
            .jobs
            .send(StoreMessage::Run(job))
            .map_err(|err| anyhow!("event store thread is gone: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("event store thread dropped a query"))?
    }

    /// Like [`Database::execute`], inside one transaction that commits only
    /// when `task` returns `Ok`.
    pub async fn transact<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn.transaction().context("failed to open transaction")?;
            let value = task(&tx)?;
            tx.commit().context("failed to commit transaction")?;
            Ok(value)
        })
        .await
    }
}
