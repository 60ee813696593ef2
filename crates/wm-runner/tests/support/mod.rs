//! Shared helpers for runner integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wm_core::{EmbeddedSource, MigrationSet};
use wm_db::{Database, DbError, DbResult, DuckDbBackend};
use wm_runner::{Migrator, MigratorOptions};

/// DuckDB wrapper that remembers every batch it was asked to run, counts
/// rollbacks, and can stall on marked batches or refuse to commit.
pub struct RecordingDb {
    inner: DuckDbBackend,
    batches: Mutex<Vec<String>>,
    stall: Option<(String, Duration)>,
    refuse_commit: bool,
    rollbacks: AtomicUsize,
}

impl RecordingDb {
    pub fn new(inner: DuckDbBackend) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
            stall: None,
            refuse_commit: false,
            rollbacks: AtomicUsize::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(DuckDbBackend::in_memory().unwrap())
    }

    /// Sleep for `delay` before running any batch containing `marker`.
    pub fn stalling_on(mut self, marker: &str, delay: Duration) -> Self {
        self.stall = Some((marker.to_string(), delay));
        self
    }

    /// Fail every COMMIT without sending it, leaving the transaction open.
    pub fn refusing_commit(mut self) -> Self {
        self.refuse_commit = true;
        self
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Batches that mention `needle`, in execution order.
    pub fn batches_containing(&self, needle: &str) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Database for RecordingDb {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.inner.execute(sql).await
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.batches.lock().unwrap().push(sql.to_string());
        if let Some((marker, delay)) = &self.stall {
            if sql.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        self.inner.execute_batch(sql).await
    }

    async fn begin(&self) -> DbResult<()> {
        self.inner.begin().await
    }

    async fn commit(&self) -> DbResult<()> {
        if self.refuse_commit {
            return Err(DbError::TransactionError {
                operation: "COMMIT".to_string(),
                message: "commit refused".to_string(),
            });
        }
        self.inner.commit().await
    }

    async fn rollback(&self) -> DbResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback().await
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.inner.relation_exists(name).await
    }

    async fn query_rows(&self, sql: &str, columns: usize) -> DbResult<Vec<Vec<Option<String>>>> {
        self.inner.query_rows(sql, columns).await
    }

    fn db_type(&self) -> &'static str {
        self.inner.db_type()
    }
}

/// The EZREC schema as an embedded migration set.
pub const EZREC: &[(&str, &str)] = &[
    (
        "001_create_bookings.sql",
        "CREATE TABLE IF NOT EXISTS bookings (
            id VARCHAR,
            date VARCHAR NOT NULL,
            start_time VARCHAR NOT NULL,
            end_time VARCHAR NOT NULL
        );",
    ),
    (
        "002_create_recordings.sql",
        "CREATE TABLE IF NOT EXISTS recordings (
            id VARCHAR,
            booking_id VARCHAR,
            filename VARCHAR NOT NULL
        );",
    ),
    (
        "003_add_camera_id.sql",
        "ALTER TABLE bookings ADD COLUMN IF NOT EXISTS camera_id VARCHAR;",
    ),
];

pub fn set_from(entries: &'static [(&'static str, &'static str)]) -> MigrationSet {
    wm_core::discover(&EmbeddedSource::new(entries)).unwrap()
}

/// Options that keep lock retries fast in tests.
pub fn fast_options() -> MigratorOptions {
    let mut options = MigratorOptions::default();
    options.lock.max_attempts = 200;
    options.lock.backoff_ms = 5;
    options.lock.max_backoff_ms = 50;
    options.lock.lease_secs = 30;
    options
}

pub fn migrator_for(db: Arc<dyn Database>) -> Migrator {
    Migrator::new(db, fast_options())
}
