//! Run lock backed by a single-row lease table.
//!
//! DuckDB has no advisory locks, so concurrent runners coordinate through
//! `<tracking_table>_lock`: whoever owns row `lock_id = 1` holds the lock
//! until it deletes the row or the lease expires.

use crate::error::{MigrateError, MigrateResult};
use crate::tracking::TrackingStore;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use wm_core::sql_utils::{quote_ident, quote_literal, quote_qualified};
use wm_core::LockConfig;
use wm_db::{Database, DbResult};

const RELEASE_ATTEMPTS: u32 = 5;

/// A held run lock. Release it with [`RunLock::release`].
#[derive(Debug)]
pub struct RunLock {
    table: String,
    owner: String,
    lease: Duration,
}

impl RunLock {
    /// Acquire the lock for `store`, retrying with exponential backoff.
    pub async fn acquire(
        db: &dyn Database,
        store: &TrackingStore,
        config: &LockConfig,
    ) -> MigrateResult<Self> {
        let lock = Self {
            table: store.lock_table_name(),
            owner: Uuid::new_v4().to_string(),
            lease: config.lease(),
        };
        let schema = store.table().split_once('.').map(|(schema, _)| schema);
        let attempts = config.max_attempts.max(1);

        let mut last_reason = String::new();
        for attempt in 1..=attempts {
            match lock.try_acquire(db, schema).await {
                Ok(None) => {
                    log::debug!("Acquired migration lock {} as {}", lock.table, lock.owner);
                    return Ok(lock);
                }
                Ok(Some(holder)) => {
                    last_reason = format!("held by {holder}");
                }
                Err(e) => {
                    last_reason = e.to_string();
                }
            }

            if attempt < attempts {
                let delay = config.backoff(attempt);
                log::info!(
                    "Migration lock {} busy ({}), retrying in {}ms ({}/{})",
                    lock.table,
                    last_reason,
                    delay.as_millis(),
                    attempt,
                    attempts
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(MigrateError::Lock {
            table: lock.table,
            attempts,
            message: last_reason,
        })
    }

    /// Identifier written into the lease row.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// One acquisition attempt. Returns the current holder when it is not us.
    async fn try_acquire(&self, db: &dyn Database, schema: Option<&str>) -> DbResult<Option<String>> {
        let table = quote_qualified(&self.table);
        let now = Utc::now().timestamp_millis();

        if let Some(schema) = schema {
            db.execute_batch(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_ident(schema)
            ))
            .await?;
        }
        db.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                lock_id INTEGER PRIMARY KEY,
                owner VARCHAR NOT NULL,
                expires_at_ms BIGINT NOT NULL
            )"
        ))
        .await?;

        let expired = db
            .execute(&format!(
                "DELETE FROM {table} WHERE lock_id = 1 AND expires_at_ms < {now}"
            ))
            .await?;
        if expired > 0 {
            log::warn!("Took over expired migration lease on {}", self.table);
        }

        db.execute(&format!(
            "INSERT INTO {table} (lock_id, owner, expires_at_ms) VALUES (1, {}, {}) \
             ON CONFLICT (lock_id) DO NOTHING",
            quote_literal(&self.owner),
            now + self.lease_ms()
        ))
        .await?;

        let rows = db
            .query_rows(&format!("SELECT owner FROM {table} WHERE lock_id = 1"), 1)
            .await?;
        let holder = rows.into_iter().next().and_then(|r| r.into_iter().next().flatten());
        match holder {
            Some(h) if h == self.owner => Ok(None),
            Some(h) => Ok(Some(h)),
            None => Ok(Some("nobody (lease vanished)".to_string())),
        }
    }

    /// Extend the lease. Fails if the lease was lost to another runner.
    pub async fn renew(&self, db: &dyn Database) -> MigrateResult<()> {
        let expires = Utc::now().timestamp_millis() + self.lease_ms();
        let updated = db
            .execute(&format!(
                "UPDATE {} SET expires_at_ms = {expires} WHERE lock_id = 1 AND owner = {}",
                quote_qualified(&self.table),
                quote_literal(&self.owner)
            ))
            .await?;
        if updated == 0 {
            return Err(MigrateError::Lock {
                table: self.table.clone(),
                attempts: 1,
                message: "lease expired and was taken by another runner".to_string(),
            });
        }
        Ok(())
    }

    /// Give the lock up.
    ///
    /// A release that loses a write conflict is retried a few times; if it
    /// still fails the lease simply expires.
    pub async fn release(self, db: &dyn Database) -> MigrateResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE owner = {}",
            quote_qualified(&self.table),
            quote_literal(&self.owner)
        );
        let mut attempt = 1;
        loop {
            match db.execute(&sql).await {
                Ok(_) => break,
                Err(e) if attempt < RELEASE_ATTEMPTS => {
                    log::debug!("Retrying release of {}: {}", self.table, e);
                    tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        log::debug!("Released migration lock {}", self.table);
        Ok(())
    }

    fn lease_ms(&self) -> i64 {
        i64::try_from(self.lease.as_millis()).unwrap_or(i64::MAX / 2)
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod tests;
