//! DuckDB database backend implementation

use crate::error::{classify_open_error, DbError, DbResult};
use crate::traits::Database;
use async_trait::async_trait;
use duckdb::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// DuckDB database backend.
///
/// DuckDB calls block, so each one runs on the blocking thread pool while
/// holding the connection mutex. The mutex is taken before the blocking task
/// is spawned: a caller that stops waiting (for example on a timeout) either
/// never submitted its statement or leaves it queued ahead of anything it
/// issues next, such as a `ROLLBACK`.
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| classify_open_error(e, &path.display().to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open a second connection to the same database.
    ///
    /// The clone has its own transaction state, which is what a concurrent
    /// runner in the same process needs.
    pub async fn try_clone(&self) -> DbResult<Self> {
        let conn = self.conn.lock().await;
        let cloned = conn
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(cloned))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run_blocking<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DbResult<T> + Send + 'static,
    {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        tokio::task::spawn_blocking(move || f(&*guard))
            .await
            .map_err(|e| DbError::Internal(format!("blocking task failed: {e}")))?
    }

    async fn transaction_control(&self, operation: &'static str) -> DbResult<()> {
        self.run_blocking(move |conn| {
            conn.execute_batch(operation)
                .map_err(|e| DbError::TransactionError {
                    operation: operation.to_string(),
                    message: e.to_string(),
                })
        })
        .await
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        let sql = sql.to_string();
        self.run_blocking(move |conn| {
            conn.execute(&sql, [])
                .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
        })
        .await
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let sql = sql.to_string();
        self.run_blocking(move |conn| conn.execute_batch(&sql).map_err(DbError::from))
            .await
    }

    async fn begin(&self) -> DbResult<()> {
        self.transaction_control("BEGIN TRANSACTION").await
    }

    async fn commit(&self) -> DbResult<()> {
        self.transaction_control("COMMIT").await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.transaction_control("ROLLBACK").await
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        // Handle schema-qualified names
        let (schema, table) = match name.rfind('.') {
            Some(pos) => (name[..pos].to_string(), name[pos + 1..].to_string()),
            None => ("main".to_string(), name.to_string()),
        };

        self.run_blocking(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
                    duckdb::params![schema, table],
                    |row| row.get(0),
                )
                .map_err(|e| DbError::ExecutionError(e.to_string()))?;
            Ok(count > 0)
        })
        .await
    }

    async fn query_rows(&self, sql: &str, columns: usize) -> DbResult<Vec<Vec<Option<String>>>> {
        let sql = sql.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                (0..columns)
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?;
            let collected = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(collected)
        })
        .await
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
