//! Error types for wm-runner

use crate::summary::AppliedSummary;
use thiserror::Error;
use wm_core::CoreError;
use wm_db::DbError;

/// Migration run errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// The migration set is malformed (R001)
    #[error("[R001] Migration discovery failed: {0}")]
    Discovery(#[from] CoreError),

    /// The database could not be reached (R002)
    #[error("[R002] Database connection failed: {0}")]
    Connection(String),

    /// A migration body or its tracking record failed (R003)
    #[error(
        "[R003] Migration {version} failed (last applied: {}): {message}",
        .last_applied.as_deref().unwrap_or("none")
    )]
    Execution {
        version: String,
        last_applied: Option<String>,
        message: String,
    },

    /// The run lock could not be acquired (R004)
    #[error("[R004] Could not acquire migration lock '{table}' after {attempts} attempts: {message}")]
    Lock {
        table: String,
        attempts: u32,
        message: String,
    },

    /// A migration exceeded the unit timeout (R005)
    #[error(
        "[R005] Migration {version} timed out after {timeout_secs}s (last applied: {})",
        .last_applied.as_deref().unwrap_or("none")
    )]
    Timeout {
        version: String,
        last_applied: Option<String>,
        timeout_secs: u64,
    },

    /// The run was cancelled between migrations (R006)
    #[error(
        "[R006] Run cancelled before migration {next} (last applied: {})",
        .last_applied.as_deref().unwrap_or("none")
    )]
    Cancelled {
        next: String,
        last_applied: Option<String>,
    },

    /// An applied migration was edited afterwards (R007)
    #[error("[R007] Applied migration {version} was modified: recorded checksum {recorded}, current {current}")]
    ChecksumMismatch {
        version: String,
        recorded: String,
        current: String,
    },

    /// A pending migration sorts below the newest applied one (R008)
    #[error("[R008] Migration {version} is pending but newer migration {latest_applied} is already applied; set `out_of_order: true` to apply it")]
    OutOfOrder {
        version: String,
        latest_applied: String,
    },

    /// Reading or writing the tracking table failed (R009)
    #[error("[R009] Tracking table error: {0}")]
    Tracking(String),
}

impl MigrateError {
    /// Version of the unit that failed, when the error is tied to one.
    pub fn failed_version(&self) -> Option<&str> {
        match self {
            MigrateError::Execution { version, .. } | MigrateError::Timeout { version, .. } => {
                Some(version)
            }
            _ => None,
        }
    }

    /// Last successfully applied version, when the error carries it.
    pub fn last_applied(&self) -> Option<&str> {
        match self {
            MigrateError::Execution { last_applied, .. }
            | MigrateError::Timeout { last_applied, .. }
            | MigrateError::Cancelled { last_applied, .. } => last_applied.as_deref(),
            _ => None,
        }
    }
}

impl From<DbError> for MigrateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionError(msg) | DbError::Locked(msg) => MigrateError::Connection(msg),
            other => MigrateError::Tracking(other.to_string()),
        }
    }
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;

/// A failed run together with what it managed to apply first.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct RunFailure {
    /// Units applied and skipped before the failure
    pub summary: AppliedSummary,
    /// Cause of the failure
    pub error: MigrateError,
}

impl From<MigrateError> for RunFailure {
    fn from(error: MigrateError) -> Self {
        Self {
            summary: AppliedSummary::default(),
            error,
        }
    }
}
