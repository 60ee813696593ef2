//! Applied-migration records read from the tracking table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use wm_core::MigrationVersion;

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigrationRecord {
    pub version: String,
    pub applied_at: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub execution_ms: Option<i64>,
}

impl AppliedMigrationRecord {
    /// A record carrying only a version, as written by older tooling.
    pub fn bare(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            applied_at: None,
            checksum: None,
            execution_ms: None,
        }
    }
}

/// Identity of an applied version. Numeric versions compare by value, so
/// `"3"` and `"003"` are the same migration; anything else compares as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum VersionKey {
    Number(u64),
    Text(String),
}

impl VersionKey {
    fn of(version: &str) -> Self {
        match MigrationVersion::parse(version) {
            Some(v) => VersionKey::Number(v.number()),
            None => VersionKey::Text(version.to_string()),
        }
    }
}

/// The set of applied versions.
///
/// Lookups go by numeric value, matching how migration units are identified,
/// while each record keeps the text it was stored under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedSet {
    records: BTreeMap<VersionKey, AppliedMigrationRecord>,
}

impl AppliedSet {
    /// Applied set from bare version strings.
    pub fn from_versions<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        versions
            .into_iter()
            .map(|v| AppliedMigrationRecord::bare(v))
            .collect()
    }

    pub fn contains(&self, version: &str) -> bool {
        self.records.contains_key(&VersionKey::of(version))
    }

    pub fn get(&self, version: &str) -> Option<&AppliedMigrationRecord> {
        self.records.get(&VersionKey::of(version))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AppliedMigrationRecord> {
        self.records.values()
    }

    /// Versions as stored, numeric ones first in numeric order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.records.values().map(|r| r.version.as_str())
    }

    /// Highest applied version by numeric value.
    ///
    /// Records whose version is not numeric (written by other tooling) are
    /// ignored.
    pub fn latest(&self) -> Option<MigrationVersion> {
        self.records
            .values()
            .filter_map(|r| MigrationVersion::parse(&r.version))
            .max()
    }

    /// Add a record. A second record for the same numeric version is
    /// dropped; the first one read wins.
    pub(crate) fn insert(&mut self, record: AppliedMigrationRecord) {
        match self.records.entry(VersionKey::of(&record.version)) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(existing) => log::warn!(
                "Tracking table has both '{}' and '{}' for one version; using '{}'",
                existing.get().version,
                record.version,
                existing.get().version
            ),
        }
    }
}

impl FromIterator<AppliedMigrationRecord> for AppliedSet {
    fn from_iter<T: IntoIterator<Item = AppliedMigrationRecord>>(iter: T) -> Self {
        let mut set = AppliedSet::default();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_uses_numeric_order() {
        let set = AppliedSet::from_versions(["9", "10", "002"]);
        assert_eq!(set.latest().unwrap().as_str(), "10");
    }

    #[test]
    fn latest_skips_non_numeric_versions() {
        let set = AppliedSet::from_versions(["20240101_manual", "003"]);
        assert_eq!(set.latest().unwrap().as_str(), "003");
        assert!(AppliedSet::default().latest().is_none());
    }

    #[test]
    fn padding_does_not_change_identity() {
        let set = AppliedSet::from_versions(["003"]);
        assert!(set.contains("3"));
        assert!(set.contains("0003"));
        assert!(!set.contains("30"));
        assert_eq!(set.get("3").unwrap().version, "003");
    }

    #[test]
    fn first_of_equal_versions_wins() {
        let set = AppliedSet::from_versions(["001", "1", "manual"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.versions().collect::<Vec<_>>(), vec!["001", "manual"]);
    }
}
