//! Creating new migration files.

use crate::discovery::{parse_file_name, DirectorySource, MigrationSet, MigrationSource};
use crate::error::{CoreError, CoreResult};
use crate::unit::MigrationUnit;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Turn a free-form description into a file-name-safe migration name.
///
/// Returns `None` when nothing usable is left.
///
/// # Examples
/// ```
/// use wm_core::scaffold::normalize_name;
/// assert_eq!(normalize_name("Add camera-id").as_deref(), Some("add_camera_id"));
/// assert_eq!(normalize_name("  ../  "), None);
/// ```
pub fn normalize_name(raw: &str) -> Option<String> {
    let mut name = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if matches!(c, ' ' | '-' | '_') && !name.ends_with('_') && !name.is_empty() {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_').to_string();
    (!name.is_empty()).then_some(name)
}

/// Create the next numbered migration file in `dir`.
///
/// The directory is created if missing. The next version keeps the padding
/// of existing files; only file names are inspected, so existing migrations
/// that are still empty do not get in the way.
pub fn new_migration(dir: &Path, name: &str) -> CoreResult<PathBuf> {
    let name = normalize_name(name).ok_or_else(|| CoreError::MalformedName {
        file: name.to_string(),
        reason: "migration name must contain letters or digits".to_string(),
    })?;

    std::fs::create_dir_all(dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut units = Vec::new();
    for entry in DirectorySource::new(dir).entries()? {
        let (version, existing) = parse_file_name(&entry.file_name)?;
        units.push(MigrationUnit::new(version, existing, String::new()));
    }
    let version = MigrationSet::from_units(units)?.next_version();

    let path = dir.join(format!("{version}_{name}.sql"));
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => CoreError::MigrationExists {
                path: path.display().to_string(),
            },
            _ => CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            },
        })?;
    write!(
        file,
        "-- {version}_{name}\n-- Guard every structural change (IF NOT EXISTS) so this migration can be re-run.\n\n"
    )
    .map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;

    log::debug!("Created migration {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_migration_is_001() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");

        let path = new_migration(&migrations, "create bookings").unwrap();
        assert_eq!(path.file_name().unwrap(), "001_create_bookings.sql");
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .starts_with("-- 001_create_bookings"));
    }

    #[test]
    fn keeps_existing_padding() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0007_bookings.sql"), "SELECT 1;").unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();

        let path = new_migration(dir.path(), "add_camera_id").unwrap();
        assert_eq!(path.file_name().unwrap(), "0008_add_camera_id.sql");
    }

    #[test]
    fn empty_scaffolds_do_not_block_the_next_one() {
        let dir = tempfile::tempdir().unwrap();
        new_migration(dir.path(), "first").unwrap();
        let second = new_migration(dir.path(), "second").unwrap();
        assert_eq!(second.file_name().unwrap(), "002_second.sql");
    }

    #[test]
    fn rejects_unusable_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = new_migration(dir.path(), "!!!").unwrap_err();
        assert!(matches!(err, CoreError::MalformedName { .. }));
    }

    #[test]
    fn normalizes_separators() {
        assert_eq!(
            normalize_name("Recordings--Index").as_deref(),
            Some("recordings_index")
        );
        assert_eq!(normalize_name("_leading").as_deref(), Some("leading"));
    }
}
