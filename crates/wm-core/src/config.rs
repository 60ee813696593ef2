//! Configuration types and parsing for waymark.yml

use crate::error::{CoreError, CoreResult};
use crate::sql_utils::is_simple_qualified_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directory holding migration files, relative to the project root
pub const DEFAULT_MIGRATIONS_PATH: &str = "migrations";

/// Default tracking table name
pub const DEFAULT_TRACKING_TABLE: &str = "schema_migrations";

/// Default database path, relative to the project root
pub const DEFAULT_DB_PATH: &str = "waymark.duckdb";

/// Config file names probed by [`Config::load_from_dir`]
pub const CONFIG_FILE_NAMES: [&str; 2] = ["waymark.yml", "waymark.yaml"];

/// Project configuration from waymark.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Directory containing `<digits>_<name>.sql` migration files
    #[serde(default = "default_migrations_path")]
    pub migrations_path: String,

    /// Table recording applied migrations (optionally schema-qualified)
    #[serde(default = "default_tracking_table")]
    pub tracking_table: String,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Seconds a single migration may run before it is aborted
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,

    /// Refuse to run when an applied migration's body changed on disk
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    /// Allow applying a pending migration older than the newest applied one
    #[serde(default)]
    pub out_of_order: bool,

    /// Run lock settings
    #[serde(default)]
    pub lock: LockConfig,

    /// Named target configurations (e.g., dev, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Database configuration override
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

/// Run lock configuration.
///
/// Lock acquisition is retried `max_attempts` times, sleeping
/// `backoff_ms * 2^(attempt - 1)` between attempts (capped at
/// `max_backoff_ms`). A lease older than `lease_secs` is considered abandoned
/// and may be taken over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    #[serde(default = "default_lock_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_lock_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_lock_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_lock_lease_secs")]
    pub lease_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_lock_attempts(),
            backoff_ms: default_lock_backoff_ms(),
            max_backoff_ms: default_lock_max_backoff_ms(),
            lease_secs: default_lock_lease_secs(),
        }
    }
}

impl LockConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_migrations_path() -> String {
    DEFAULT_MIGRATIONS_PATH.to_string()
}

fn default_tracking_table() -> String {
    DEFAULT_TRACKING_TABLE.to_string()
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_unit_timeout_secs() -> u64 {
    300
}

fn default_lock_attempts() -> u32 {
    10
}

fn default_lock_backoff_ms() -> u64 {
    200
}

fn default_lock_max_backoff_ms() -> u64 {
    5_000
}

fn default_lock_lease_secs() -> u64 {
    600
}

impl Config {
    /// Configuration with every field defaulted, for a project named `name`.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            migrations_path: default_migrations_path(),
            tracking_table: default_tracking_table(),
            database: DatabaseConfig::default(),
            unit_timeout_secs: default_unit_timeout_secs(),
            verify_checksums: true,
            out_of_order: false,
            lock: LockConfig::default(),
            targets: HashMap::new(),
        }
    }

    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory.
    /// Looks for waymark.yml or waymark.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        Err(CoreError::ConfigNotFound {
            path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: String| Err(CoreError::ConfigInvalid { message });

        if self.name.trim().is_empty() {
            return invalid("Project name cannot be empty".to_string());
        }
        if self.migrations_path.trim().is_empty() {
            return invalid("migrations_path cannot be empty".to_string());
        }
        if !is_simple_qualified_name(&self.tracking_table) {
            return invalid(format!(
                "tracking_table '{}' must be an identifier, optionally qualified by one schema",
                self.tracking_table
            ));
        }
        if self.unit_timeout_secs == 0 {
            return invalid("unit_timeout_secs must be greater than zero".to_string());
        }
        if self.lock.max_attempts == 0 {
            return invalid("lock.max_attempts must be at least 1".to_string());
        }
        if self.lock.lease_secs == 0 {
            return invalid("lock.lease_secs must be greater than zero".to_string());
        }
        // The lease is only renewed between units
        if self.unit_timeout_secs >= self.lock.lease_secs {
            return invalid(format!(
                "unit_timeout_secs ({}) must be shorter than lock.lease_secs ({})",
                self.unit_timeout_secs, self.lock.lease_secs
            ));
        }
        if self.database.path.trim().is_empty() {
            return invalid("database.path cannot be empty".to_string());
        }
        Ok(())
    }

    /// Absolute migrations directory for a project rooted at `root`
    pub fn migrations_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations_path)
    }

    /// Database configuration for an optional named target.
    pub fn database_for_target(&self, target: Option<&str>) -> CoreResult<&DatabaseConfig> {
        let Some(name) = target else {
            return Ok(&self.database);
        };
        let Some(target) = self.targets.get(name) else {
            let mut available: Vec<&str> = self.targets.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CoreError::UnknownTarget {
                name: name.to_string(),
                available: if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                },
            });
        };
        Ok(target.database.as_ref().unwrap_or(&self.database))
    }

    /// Resolve a database path against the project root.
    ///
    /// `:memory:` and absolute paths are returned unchanged.
    pub fn resolve_db_path(root: &Path, path: &str) -> String {
        if path == ":memory:" || Path::new(path).is_absolute() {
            path.to_string()
        } else {
            root.join(path).display().to_string()
        }
    }

    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
