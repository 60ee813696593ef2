//! Tracking table access.
//!
//! The tracking table holds one row per applied migration and is the single
//! source of truth for what has run against a database.

use crate::error::{MigrateError, MigrateResult};
use crate::record::{AppliedMigrationRecord, AppliedSet};
use chrono::{DateTime, NaiveDateTime, Utc};
use wm_core::sql_utils::{is_simple_qualified_name, quote_ident, quote_literal, quote_qualified};
use wm_core::MigrationUnit;
use wm_db::{Database, DbResult};

/// Reads and writes the tracking table.
#[derive(Debug, Clone)]
pub struct TrackingStore {
    table: String,
}

impl TrackingStore {
    /// Store for the given (possibly schema-qualified) table name.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Name of the lease table backing the run lock.
    pub fn lock_table_name(&self) -> String {
        format!("{}_lock", self.table)
    }

    /// Create the tracking table (and its schema) if missing.
    pub async fn ensure(&self, db: &dyn Database) -> MigrateResult<()> {
        if !is_simple_qualified_name(&self.table) {
            return Err(MigrateError::Tracking(format!(
                "invalid tracking table name '{}'",
                self.table
            )));
        }

        if let Some((schema, _)) = self.table.split_once('.') {
            db.execute_batch(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_ident(schema)
            ))
            .await?;
        }

        db.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version VARCHAR PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL,
                checksum VARCHAR,
                execution_ms BIGINT
            )",
            quote_qualified(&self.table)
        ))
        .await?;
        Ok(())
    }

    /// Whether the tracking table exists yet.
    pub async fn exists(&self, db: &dyn Database) -> MigrateResult<bool> {
        Ok(db.relation_exists(&self.table).await?)
    }

    /// Read every applied record.
    pub async fn load(&self, db: &dyn Database) -> MigrateResult<AppliedSet> {
        let sql = format!(
            "SELECT CAST(version AS VARCHAR), CAST(applied_at AS VARCHAR), checksum, \
             CAST(execution_ms AS VARCHAR) FROM {} ORDER BY version",
            quote_qualified(&self.table)
        );
        let rows = db.query_rows(&sql, 4).await?;

        let mut set = AppliedSet::default();
        for row in rows {
            let mut cols = row.into_iter();
            let Some(version) = cols.next().flatten() else {
                log::warn!("Ignoring tracking row with NULL version in {}", self.table);
                continue;
            };
            let applied_at = cols.next().flatten().as_deref().and_then(parse_timestamp);
            let checksum = cols.next().flatten();
            let execution_ms = cols.next().flatten().and_then(|v| v.parse().ok());
            set.insert(AppliedMigrationRecord {
                version,
                applied_at,
                checksum,
                execution_ms,
            });
        }
        Ok(set)
    }

    /// Record `unit` as applied.
    ///
    /// Conflicting inserts are a no-op, so two runners recording the same
    /// version both succeed. Returns the number of rows written.
    pub async fn record(
        &self,
        db: &dyn Database,
        unit: &MigrationUnit,
        applied_at: DateTime<Utc>,
        execution_ms: i64,
    ) -> DbResult<usize> {
        let sql = format!(
            "INSERT INTO {} (version, applied_at, checksum, execution_ms) \
             VALUES ({}, TIMESTAMPTZ {}, {}, {}) ON CONFLICT (version) DO NOTHING",
            quote_qualified(&self.table),
            quote_literal(unit.version.as_str()),
            quote_literal(&applied_at.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string()),
            quote_literal(&unit.checksum),
            execution_ms
        );
        db.execute(&sql).await
    }
}

/// Parse a timestamp as DuckDB renders it when cast to text.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|ts| ts.and_utc())
}

#[cfg(test)]
#[path = "tracking_test.rs"]
mod tests;
