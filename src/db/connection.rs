use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const WORKER_THREAD_NAME: &str = "watchflow-db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A unit of work for the warehouse thread. Owns its reply channel.
type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Owns the job queue and the worker. Dropping it closes the queue, which
/// lets the worker finish pending jobs and exit, then joins it.
struct Worker {
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn submit(&self, job: Job) -> Result<()> {
        let jobs = self
            .jobs
            .lock()
            .map_err(|_| anyhow!("warehouse job queue lock poisoned"))?;
        jobs.as_ref()
            .ok_or_else(|| anyhow!("warehouse is shutting down"))?
            .send(job)
            .map_err(|_| anyhow!("warehouse thread is no longer running"))
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().unwrap_or_else(|p| p.into_inner());
        drop(jobs.take());

        let handle = self.handle.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = handle.take() {
            if handle.join().is_err() {
                error!("Warehouse thread panicked before shutdown");
            }
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path).context("failed to open SQLite warehouse")?;

    // Not fatal: in-memory databases report "memory" instead of "wal".
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;

    let previous = run_migrations(&mut conn).context("failed to run warehouse migrations")?;
    debug!("Warehouse schema was at v{previous} on open");
    Ok(conn)
}

fn serve(mut conn: Connection, jobs: mpsc::Receiver<Job>) {
    let mut served = 0u64;
    for job in jobs {
        job(&mut conn);
        served += 1;
    }
    info!("Warehouse thread exiting after {served} jobs");
}

/// Handle to the SQLite warehouse. Cloning shares the same worker thread.
///
/// Every statement runs on one dedicated thread that owns the connection, so
/// loads from the ETL runner and the streaming loop never interleave.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    /// Open (creating parent directories) and migrate the warehouse file.
    /// Returns once the worker thread is ready to take jobs.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create warehouse directory {}", parent.display())
            })?;
        }

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let thread_path = db_path.clone();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || match open_connection(&thread_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, job_rx);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn warehouse worker thread")?;

        let ready = ready_rx
            .recv()
            .map_err(|_| anyhow!("warehouse worker exited before signaling readiness"))
            .and_then(|ready| ready);
        if let Err(err) = ready {
            let _ = handle.join();
            return Err(err);
        }

        info!("Warehouse initialized at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: Mutex::new(Some(job_tx)),
                handle: Mutex::new(Some(handle)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Run `task` against the connection on the worker thread and await its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.worker.submit(Box::new(move |conn| {
            // A dropped receiver means the caller was cancelled; the result is moot.
            let _ = reply_tx.send(task(conn));
        }))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("warehouse thread dropped the job without replying"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn opens_and_migrates_in_nested_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("warehouse.sqlite3");

        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), path.as_path());

        let version: i32 = db
            .execute(|conn| Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(version, crate::db::migrations::CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn task_errors_are_returned_to_the_caller() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("w.sqlite3")).unwrap();

        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        let clone = db.clone();
        let count: i64 = clone
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM watch_facts", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn reopening_keeps_loaded_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("w.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            db.execute(|conn| {
                conn.execute(
                    "INSERT INTO user_dim (user_id, total_watch_time, avg_watch_time,
                     total_sessions, binge_sessions, is_binge_watcher, created_at, updated_at)
                     VALUES ('u1', 1.0, 1.0, 1, 0, 0, '2024-03-01T00:00:00.000Z',
                     '2024-03-01T00:00:00.000Z')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        }

        let db = Database::new(path).unwrap();
        let users: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM user_dim", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(users, 1);
    }

    #[test]
    fn unopenable_path_fails_fast() {
        let dir = TempDir::new().unwrap();
        assert!(Database::new(dir.path().to_path_buf()).is_err());
    }
}
