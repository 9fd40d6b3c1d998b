use crate::error::{GraphmemError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::task;

pub mod migrate;
mod store;

pub use store::SqliteAdapter;

/// Database connection manager
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(GraphmemError::Database)?;

        // WAL mode for concurrent readers, NORMAL sync for speed, foreign
        // keys so relation rows can never outlive their entities.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA busy_timeout = 5000; \
             PRAGMA temp_store = MEMORY;",
        )?;

        Ok(conn)
    }

    /// Execute a closure with a database connection on a blocking task.
    /// Each call opens a fresh connection with the pragmas applied, so the
    /// handle can be shared freely across concurrent operations.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Db::new(&self.path);
        task::spawn_blocking(move || {
            let mut conn = db.open()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            GraphmemError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("blocking task failed: {e}"),
            ))
        })?
    }
}
