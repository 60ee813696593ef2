//! Error types for wm-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Table not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    TableNotFound(String),

    /// Database file is locked by another process (D004)
    #[error("[D004] Database is locked by another process: {0}")]
    Locked(String),

    /// Transaction control error (D005)
    #[error("[D005] Transaction {operation} failed: {message}")]
    TransactionError { operation: String, message: String },

    /// Internal error (D007)
    #[error("[D007] Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Locked(_))
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants for catalog
        // errors, so classification goes by message.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("Table") && msg.contains("not found"))
        {
            DbError::TableNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}

/// Classify an error raised while opening a database file.
pub(crate) fn classify_open_error(err: duckdb::Error, path: &str) -> DbError {
    let msg = err.to_string();
    if msg.contains("Could not set lock on file") || msg.contains("Conflicting lock") {
        DbError::Locked(format!("{path}: {msg}"))
    } else {
        DbError::ConnectionError(format!("{path}: {msg}"))
    }
}
