//! Run summaries and status reports.

use crate::record::{AppliedMigrationRecord, AppliedSet};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;
use wm_core::MigrationSet;

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Outcome of an apply run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedSummary {
    /// Versions applied by this run, in order
    pub applied: Vec<String>,
    /// Versions that were already applied and left alone, in order
    pub skipped: Vec<String>,
    /// Wall time of the run
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl AppliedSummary {
    /// Whether the run changed nothing.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }

    /// Last version applied by this run.
    pub fn last_applied(&self) -> Option<&str> {
        self.applied.last().map(String::as_str)
    }
}

/// State of one migration relative to a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    /// Recorded in the tracking table with a matching checksum
    Applied,
    /// Not yet applied
    Pending,
    /// Recorded, but the body changed since it was applied
    Modified,
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationState::Applied => write!(f, "applied"),
            MigrationState::Pending => write!(f, "pending"),
            MigrationState::Modified => write!(f, "modified"),
        }
    }
}

/// One row of a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub version: String,
    pub name: String,
    pub state: MigrationState,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Applied vs pending migrations for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// One entry per known migration, in version order
    pub entries: Vec<StatusEntry>,
    /// Applied records with no matching migration
    pub missing: Vec<AppliedMigrationRecord>,
}

impl StatusReport {
    /// Compare `set` against the applied records.
    pub fn from_applied(set: &MigrationSet, applied: &AppliedSet) -> Self {
        let entries = set
            .iter()
            .map(|unit| {
                let record = applied.get(unit.version.as_str());
                let state = match record {
                    None => MigrationState::Pending,
                    Some(r) => match r.checksum.as_deref() {
                        Some(recorded) if recorded != unit.checksum => MigrationState::Modified,
                        _ => MigrationState::Applied,
                    },
                };
                StatusEntry {
                    version: unit.version.to_string(),
                    name: unit.name.clone(),
                    state,
                    applied_at: record.and_then(|r| r.applied_at),
                }
            })
            .collect();

        let missing = applied
            .records()
            .filter(|r| set.get(&r.version).is_none())
            .cloned()
            .collect();

        Self { entries, missing }
    }

    pub fn pending(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.state == MigrationState::Pending)
    }

    pub fn modified(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.state == MigrationState::Modified)
    }

    pub fn applied_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state != MigrationState::Pending)
            .count()
    }

    /// Whether every known migration is applied and unmodified.
    pub fn is_up_to_date(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.state == MigrationState::Applied)
    }
}
