//! Database trait definition

use crate::error::DbResult;
use async_trait::async_trait;

/// A single database connection as seen by the migration runner.
///
/// Transactions are connection-scoped: `begin` opens one on this connection
/// and every statement until `commit`/`rollback` runs inside it.
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute one SQL statement, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute multiple SQL statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Start a transaction
    async fn begin(&self) -> DbResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DbResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DbResult<()>;

    /// Check if a table or view exists (name may be schema-qualified)
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Run a query and return its rows as text.
    ///
    /// Every row yields exactly `columns` values; callers cast non-text
    /// columns to VARCHAR in the query.
    async fn query_rows(&self, sql: &str, columns: usize) -> DbResult<Vec<Vec<Option<String>>>>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
