//! Migration discovery.
//!
//! A [`MigrationSource`] enumerates raw `(file name, body)` entries from some
//! storage medium; [`discover`] validates the names, rejects duplicate
//! versions and empty bodies, and returns a [`MigrationSet`] sorted by
//! version.
//!
//! File names follow `<digits>_<name>.sql` (or bare `<digits>.sql`). Files
//! without the `.sql` extension are ignored by [`DirectorySource`].

use crate::error::{CoreError, CoreResult};
use crate::sql_utils::has_statements;
use crate::unit::MigrationUnit;
use crate::version::MigrationVersion;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Width used for new versions when the set is empty.
pub const DEFAULT_VERSION_WIDTH: usize = 3;

/// A raw migration entry before validation.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// File name, including the `.sql` extension
    pub file_name: String,
    /// SQL body
    pub body: String,
    /// Path on disk, when loaded from a directory
    pub origin: Option<PathBuf>,
}

/// Something that can enumerate migration entries.
pub trait MigrationSource {
    /// Short description used in log and error messages
    fn describe(&self) -> String;

    /// Enumerate all entries, in any order
    fn entries(&self) -> CoreResult<Vec<SourceEntry>>;
}

/// Migrations stored as `.sql` files in a single directory (non-recursive).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for DirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn entries(&self) -> CoreResult<Vec<SourceEntry>> {
        if !self.dir.is_dir() {
            return Err(CoreError::MigrationsDirNotFound {
                path: self.dir.display().to_string(),
            });
        }

        let read_err = |e| CoreError::IoWithPath {
            path: self.dir.display().to_string(),
            source: e,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_dir() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                log::warn!("Skipping non UTF-8 file name: {}", path.display());
                continue;
            };
            if file_name.starts_with('.') || !file_name.ends_with(".sql") {
                log::debug!("Ignoring non-migration file {}", path.display());
                continue;
            }
            let body = std::fs::read_to_string(&path).map_err(|e| CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            })?;
            entries.push(SourceEntry {
                file_name: file_name.to_string(),
                body,
                origin: Some(path.clone()),
            });
        }
        Ok(entries)
    }
}

/// Migrations compiled into the binary, typically with `include_str!`.
///
/// ```
/// use wm_core::discovery::{discover, EmbeddedSource};
///
/// static MIGRATIONS: &[(&str, &str)] = &[
///     ("001_create_bookings.sql", "CREATE TABLE IF NOT EXISTS bookings (id TEXT);"),
/// ];
/// let set = discover(&EmbeddedSource::new(MIGRATIONS)).unwrap();
/// assert_eq!(set.len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    entries: &'static [(&'static str, &'static str)],
}

impl EmbeddedSource {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }
}

impl MigrationSource for EmbeddedSource {
    fn describe(&self) -> String {
        format!("{} embedded migrations", self.entries.len())
    }

    fn entries(&self) -> CoreResult<Vec<SourceEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|(file_name, body)| SourceEntry {
                file_name: (*file_name).to_string(),
                body: (*body).to_string(),
                origin: None,
            })
            .collect())
    }
}

/// Split `<digits>_<name>.sql` into its version and name.
pub fn parse_file_name(file_name: &str) -> CoreResult<(MigrationVersion, String)> {
    let malformed = |reason: &str| CoreError::MalformedName {
        file: file_name.to_string(),
        reason: reason.to_string(),
    };

    let stem = file_name
        .strip_suffix(".sql")
        .ok_or_else(|| malformed("expected a .sql extension"))?;
    let (prefix, name) = match stem.split_once('_') {
        Some((prefix, name)) => (prefix, name),
        None => (stem, ""),
    };
    let version = MigrationVersion::parse(prefix)
        .ok_or_else(|| malformed("expected a numeric version prefix such as 001_"))?;
    if stem.contains('_') && name.is_empty() {
        return Err(malformed("name after the version prefix is empty"));
    }
    Ok((version, name.to_string()))
}

/// Ordered, validated set of migration units.
///
/// Iteration always yields units in ascending version order and may be
/// restarted any number of times.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    units: Vec<MigrationUnit>,
}

impl MigrationSet {
    /// Build a set from already constructed units, enforcing unique versions.
    pub fn from_units(units: Vec<MigrationUnit>) -> CoreResult<Self> {
        let mut seen: BTreeMap<u64, String> = BTreeMap::new();
        for unit in &units {
            if let Some(first) = seen.insert(unit.version.number(), unit.label()) {
                return Err(CoreError::DuplicateVersion {
                    version: unit.version.number(),
                    first,
                    second: unit.label(),
                });
            }
        }
        let mut units = units;
        units.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(Self { units })
    }

    /// Units in ascending version order.
    pub fn iter(&self) -> std::slice::Iter<'_, MigrationUnit> {
        self.units.iter()
    }

    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a unit by version. `"3"` and `"003"` find the same unit.
    pub fn get(&self, version: &str) -> Option<&MigrationUnit> {
        let wanted = MigrationVersion::parse(version)?;
        self.units
            .iter()
            .find(|u| u.version.number() == wanted.number())
    }

    /// Highest-versioned unit.
    pub fn latest(&self) -> Option<&MigrationUnit> {
        self.units.last()
    }

    /// Version to use for the next migration file.
    ///
    /// Keeps the zero padding of the widest existing version.
    pub fn next_version(&self) -> MigrationVersion {
        let width = self
            .units
            .iter()
            .map(|u| u.version.as_str().len())
            .max()
            .unwrap_or(DEFAULT_VERSION_WIDTH);
        let next = self.latest().map(|u| u.version.number() + 1).unwrap_or(1);
        MigrationVersion::formatted(next, width)
    }
}

impl<'a> IntoIterator for &'a MigrationSet {
    type Item = &'a MigrationUnit;
    type IntoIter = std::slice::Iter<'a, MigrationUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Discover and validate all migrations in `source`.
pub fn discover(source: &dyn MigrationSource) -> CoreResult<MigrationSet> {
    let entries = source.entries()?;
    log::debug!(
        "Discovered {} migration files in {}",
        entries.len(),
        source.describe()
    );

    let mut units = Vec::with_capacity(entries.len());
    for entry in entries {
        let (version, name) = parse_file_name(&entry.file_name)?;
        if !has_statements(&entry.body) {
            return Err(CoreError::EmptyMigration {
                file: entry.file_name,
            });
        }
        let unit = MigrationUnit::new(version, name, entry.body);
        units.push(match entry.origin {
            Some(origin) => unit.with_origin(origin),
            None => unit,
        });
    }
    MigrationSet::from_units(units)
}

#[cfg(test)]
#[path = "discovery_test.rs"]
mod tests;
