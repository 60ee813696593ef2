//! Migration units: one versioned, ordered schema change.

use crate::checksum::compute_checksum;
use crate::version::MigrationVersion;
use serde::Serialize;
use std::path::PathBuf;

/// A single versioned schema change.
///
/// Units are immutable once constructed; the checksum is computed from the
/// body at construction time.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationUnit {
    /// Ordered identifier taken from the file name prefix
    pub version: MigrationVersion,

    /// Description part of the file name (`add_camera_id`), possibly empty
    pub name: String,

    /// SQL executed when the unit is applied
    #[serde(skip)]
    pub body: String,

    /// SHA-256 of the body
    pub checksum: String,

    /// File the unit was loaded from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<PathBuf>,
}

impl MigrationUnit {
    /// Build a unit from its parts.
    pub fn new(version: MigrationVersion, name: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let checksum = compute_checksum(&body);
        Self {
            version,
            name: name.into(),
            body,
            checksum,
            origin: None,
        }
    }

    /// Attach the file the unit was loaded from.
    pub fn with_origin(mut self, origin: PathBuf) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Human label: `003_add_camera_id`, or just `003` when unnamed.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.version.to_string()
        } else {
            format!("{}_{}", self.version, self.name)
        }
    }
}
