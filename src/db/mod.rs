use crate::error::{RagchatError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;

pub mod migrate;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536; \
     PRAGMA wal_autocheckpoint = 1000;";

/// Handle on the SQLite file backing the chunk, vector and lexical indexes.
///
/// Connections are opened per call inside `spawn_blocking`, so a `Db` is cheap
/// to clone and share between request handlers.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory if needed and apply pending migrations.
    pub async fn open(db_path: &Path, migrations_dir: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Db::new(db_path);
        let migrations_dir = migrations_dir.to_path_buf();
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await?;
        Ok(db)
    }

    /// Open a connection with the index pragmas applied
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(PRAGMAS)?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.open_connection()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RagchatError::Io(std::io::Error::other(format!("blocking task failed: {}", e))))?
    }
}
