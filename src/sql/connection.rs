use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{EngineError, EngineResult, ErrorExt};

/// Shared handle to one SQLite connection
#[derive(Debug, Clone)]
pub struct DbConnection {
    connection: Arc<Mutex<Connection>>,
}

impl DbConnection {
    /// Open a new database connection
    pub fn open(path: Option<impl AsRef<Path>>) -> EngineResult<Self> {
        match path {
            Some(path) => {
                let path_buf = PathBuf::from(path.as_ref());
                debug!("Opening database connection to {}", path_buf.display());

                if let Some(parent) = path_buf.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| EngineError::io_error(e, Some(parent)))?;
                    }
                }

                let conn = Connection::open(&path_buf)
                    .persistence_context("Failed to open database connection")?;
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )
                .persistence_context("Failed to configure database connection")?;

                Ok(Self {
                    connection: Arc::new(Mutex::new(conn)),
                })
            }
            None => {
                debug!("Opening in-memory database connection");

                let conn = Connection::open_in_memory()
                    .persistence_context("Failed to open in-memory database connection")?;

                Ok(Self {
                    connection: Arc::new(Mutex::new(conn)),
                })
            }
        }
    }

    /// Lock the underlying connection
    pub fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| EngineError::persistence("database connection lock poisoned"))
    }

    /// Execute one or more SQL statements without parameters
    pub fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        debug!("Executing SQL: {}", sql);

        let conn = self.lock()?;
        conn.execute_batch(sql)
            .persistence_context(format!("Failed to execute SQL: {}", sql))
    }
}
