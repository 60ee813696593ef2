//! The migration runner.
//!
//! A [`Migrator`] applies the pending units of a [`MigrationSet`] to one
//! database, one transaction per unit, in ascending version order. A failed
//! unit is rolled back and stops the run; earlier units stay committed.

use crate::cancel::CancelFlag;
use crate::error::{MigrateError, MigrateResult, RunFailure};
use crate::lock::RunLock;
use crate::record::AppliedSet;
use crate::summary::{AppliedSummary, StatusReport};
use crate::tracking::TrackingStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wm_core::config::DEFAULT_TRACKING_TABLE;
use wm_core::{Config, LockConfig, MigrationSet, MigrationUnit};
use wm_db::Database;

/// Knobs for a [`Migrator`].
#[derive(Debug, Clone)]
pub struct MigratorOptions {
    /// Tracking table, optionally schema-qualified
    pub tracking_table: String,
    /// Per-unit time limit; `None` waits forever
    pub unit_timeout: Option<Duration>,
    /// Abort when an applied unit's body changed
    pub verify_checksums: bool,
    /// Apply pending units older than the newest applied one
    pub out_of_order: bool,
    /// Run lock retry and lease settings
    pub lock: LockConfig,
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            tracking_table: DEFAULT_TRACKING_TABLE.to_string(),
            unit_timeout: None,
            verify_checksums: true,
            out_of_order: false,
            lock: LockConfig::default(),
        }
    }
}

impl MigratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tracking_table: config.tracking_table.clone(),
            unit_timeout: Some(config.unit_timeout()),
            verify_checksums: config.verify_checksums,
            out_of_order: config.out_of_order,
            lock: config.lock.clone(),
        }
    }
}

/// Progress notifications emitted while applying.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// A unit is about to run. `index` is 1-based among the pending units.
    Started {
        unit: &'a MigrationUnit,
        index: usize,
        total: usize,
    },
    /// A unit committed.
    Applied {
        unit: &'a MigrationUnit,
        elapsed: Duration,
    },
    /// A unit failed and was rolled back.
    Failed {
        unit: &'a MigrationUnit,
        error: &'a MigrateError,
    },
}

type ProgressCallback = Arc<dyn Fn(&ProgressEvent<'_>) + Send + Sync>;

/// Pending units of `set` in apply order.
pub fn plan<'a>(set: &'a MigrationSet, applied: &AppliedSet) -> Vec<&'a MigrationUnit> {
    set.iter()
        .filter(|u| !applied.contains(u.version.as_str()))
        .collect()
}

/// Applies migrations to a single database.
pub struct Migrator {
    db: Arc<dyn Database>,
    store: TrackingStore,
    options: MigratorOptions,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
}

impl Migrator {
    pub fn new(db: Arc<dyn Database>, options: MigratorOptions) -> Self {
        Self {
            db,
            store: TrackingStore::new(options.tracking_table.clone()),
            options,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    /// Use `cancel` to stop the run between units.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Receive a callback for every [`ProgressEvent`].
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressEvent<'_>) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn options(&self) -> &MigratorOptions {
        &self.options
    }

    /// Read the applied set, creating the tracking table first if missing.
    pub async fn load_applied_versions(&self) -> MigrateResult<AppliedSet> {
        self.store.ensure(self.db.as_ref()).await?;
        self.store.load(self.db.as_ref()).await
    }

    /// Reject runs that would silently diverge from what the database holds.
    ///
    /// Fails on an applied unit whose body changed (when checksums are
    /// verified) and on pending units older than the newest applied one
    /// (unless out-of-order application is allowed). Applied records with no
    /// matching unit only produce warnings.
    pub fn preflight(&self, set: &MigrationSet, applied: &AppliedSet) -> MigrateResult<()> {
        if self.options.verify_checksums {
            for unit in set {
                let Some(recorded) = applied
                    .get(unit.version.as_str())
                    .and_then(|r| r.checksum.as_deref())
                else {
                    continue;
                };
                if recorded != unit.checksum {
                    return Err(MigrateError::ChecksumMismatch {
                        version: unit.version.to_string(),
                        recorded: recorded.to_string(),
                        current: unit.checksum.clone(),
                    });
                }
            }
        }

        if let Some(latest) = applied.latest() {
            for unit in plan(set, applied) {
                if unit.version.number() >= latest.number() {
                    continue;
                }
                if !self.options.out_of_order {
                    return Err(MigrateError::OutOfOrder {
                        version: unit.version.to_string(),
                        latest_applied: latest.to_string(),
                    });
                }
                log::warn!(
                    "Applying {} out of order (newest applied is {})",
                    unit.label(),
                    latest
                );
            }
        }

        for version in applied.versions() {
            if set.get(version).is_none() {
                log::warn!("Applied migration {} has no migration file", version);
            }
        }
        Ok(())
    }

    /// Apply every unit of `set` missing from `applied`.
    ///
    /// On failure the returned [`RunFailure`] carries what was applied before
    /// the failing unit.
    pub async fn apply(
        &self,
        set: &MigrationSet,
        applied: &AppliedSet,
    ) -> Result<AppliedSummary, RunFailure> {
        self.apply_with_lock(set, applied, None).await
    }

    /// Take the run lock, re-read the applied set and apply what is pending.
    ///
    /// This is the entry point for concurrent runners: whoever waits for the
    /// lock sees the other runner's work and skips it.
    pub async fn run(&self, set: &MigrationSet) -> Result<AppliedSummary, RunFailure> {
        let db = self.db.as_ref();
        let lock = RunLock::acquire(db, &self.store, &self.options.lock).await?;

        let result = match self.load_applied_versions().await {
            Ok(applied) => self.apply_with_lock(set, &applied, Some(&lock)).await,
            Err(e) => Err(RunFailure::from(e)),
        };

        if let Err(e) = lock.release(db).await {
            log::warn!("Failed to release migration lock: {}", e);
        }
        result
    }

    async fn apply_with_lock(
        &self,
        set: &MigrationSet,
        applied: &AppliedSet,
        lock: Option<&RunLock>,
    ) -> Result<AppliedSummary, RunFailure> {
        let started = Instant::now();
        self.preflight(set, applied)?;

        let pending = plan(set, applied);
        let total = pending.len();
        let baseline = applied.latest().map(|v| v.to_string());
        let mut summary = AppliedSummary::default();

        if total == 0 {
            log::info!("Database is up to date ({} migrations applied)", applied.len());
        } else {
            log::info!("Applying {} pending migrations", total);
        }

        for unit in set {
            if applied.contains(unit.version.as_str()) {
                summary.skipped.push(unit.version.to_string());
                continue;
            }

            let last_applied = summary
                .last_applied()
                .map(str::to_string)
                .or_else(|| baseline.clone());

            if self.cancel.is_cancelled() {
                summary.elapsed = started.elapsed();
                return Err(RunFailure {
                    summary,
                    error: MigrateError::Cancelled {
                        next: unit.version.to_string(),
                        last_applied,
                    },
                });
            }

            self.emit(&ProgressEvent::Started {
                unit,
                index: summary.applied.len() + 1,
                total,
            });

            let unit_started = Instant::now();
            if let Err(error) = self.apply_unit(unit, last_applied).await {
                self.emit(&ProgressEvent::Failed {
                    unit,
                    error: &error,
                });
                summary.elapsed = started.elapsed();
                return Err(RunFailure { summary, error });
            }

            let elapsed = unit_started.elapsed();
            log::info!("Applied {} in {}ms", unit.label(), elapsed.as_millis());
            summary.applied.push(unit.version.to_string());
            self.emit(&ProgressEvent::Applied { unit, elapsed });

            if let Some(lock) = lock {
                match lock.renew(self.db.as_ref()).await {
                    Ok(()) => {}
                    Err(error @ MigrateError::Lock { .. }) => {
                        summary.elapsed = started.elapsed();
                        return Err(RunFailure { summary, error });
                    }
                    Err(e) => log::warn!("Failed to renew migration lease: {}", e),
                }
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Run one unit in its own transaction.
    async fn apply_unit(
        &self,
        unit: &MigrationUnit,
        last_applied: Option<String>,
    ) -> MigrateResult<()> {
        let db = self.db.as_ref();
        let version = unit.version.to_string();
        let failed = |message: String| MigrateError::Execution {
            version: version.clone(),
            last_applied: last_applied.clone(),
            message,
        };

        log::debug!("Applying {}", unit.label());
        db.begin().await.map_err(|e| failed(e.to_string()))?;

        let work = async {
            let started = Instant::now();
            db.execute_batch(&unit.body)
                .await
                .map_err(|e| failed(e.to_string()))?;
            let execution_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
            self.store
                .record(db, unit, Utc::now(), execution_ms)
                .await
                .map_err(|e| failed(format!("failed to record migration: {e}")))?;
            db.commit().await.map_err(|e| failed(e.to_string()))?;
            Ok::<(), MigrateError>(())
        };

        let outcome = match self.options.unit_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(MigrateError::Timeout {
                    version: version.clone(),
                    last_applied: last_applied.clone(),
                    timeout_secs: limit.as_secs(),
                }),
            },
            None => work.await,
        };

        if outcome.is_err() {
            self.rollback(unit).await;
        }
        outcome
    }

    /// Roll back the open transaction of a failed unit.
    ///
    /// The ROLLBACK runs on its own task: once issued it stays queued on the
    /// connection ahead of anything this runner sends next, even when a
    /// timed-out statement still holds the connection and we stop waiting.
    async fn rollback(&self, unit: &MigrationUnit) {
        let db = Arc::clone(&self.db);
        let rollback = tokio::spawn(async move { db.rollback().await });

        let joined = match self.options.unit_timeout {
            Some(limit) => match tokio::time::timeout(limit, rollback).await {
                Ok(joined) => joined,
                Err(_) => {
                    log::warn!(
                        "Rollback of {} is queued behind a statement still running after {}s",
                        unit.label(),
                        limit.as_secs()
                    );
                    return;
                }
            },
            None => rollback.await,
        };
        match joined {
            Ok(Ok(())) => log::debug!("Rolled back {}", unit.label()),
            Ok(Err(e)) => log::error!("Rollback of {} failed: {}", unit.label(), e),
            Err(e) => log::error!("Rollback task for {} did not finish: {}", unit.label(), e),
        }
    }

    /// Applied vs pending per unit. Never writes to the database.
    pub async fn status(&self, set: &MigrationSet) -> MigrateResult<StatusReport> {
        let db = self.db.as_ref();
        let applied = if self.store.exists(db).await? {
            self.store.load(db).await?
        } else {
            AppliedSet::default()
        };

        Ok(StatusReport::from_applied(set, &applied))
    }

    fn emit(&self, event: &ProgressEvent<'_>) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }
}

#[cfg(test)]
#[path = "migrator_test.rs"]
mod tests;
