//! Error types for wm-core

use thiserror::Error;

/// Core error type for Waymark
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Named target missing from `targets`
    #[error("[E003] Unknown target '{name}'. Available targets: {available}")]
    UnknownTarget { name: String, available: String },

    /// E004: Migrations directory not found
    #[error("[E004] Migrations directory not found: {path}")]
    MigrationsDirNotFound { path: String },

    /// E005: Migration file name does not follow `<digits>_<name>.sql`
    #[error("[E005] Malformed migration name '{file}': {reason}")]
    MalformedName { file: String, reason: String },

    /// E006: Two migrations share a numeric version
    #[error("[E006] Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: u64,
        first: String,
        second: String,
    },

    /// E007: Migration has no executable SQL
    #[error("[E007] Migration '{file}' contains no SQL statements")]
    EmptyMigration { file: String },

    /// E008: Migration file already exists
    #[error("[E008] Migration file already exists: {path}")]
    MigrationExists { path: String },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E015: YAML parse error
    #[error("[E015] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// E016: IO error with file path context
    #[error("[E016] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

impl CoreError {
    /// Whether this error describes a malformed or ambiguous migration set.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            CoreError::MigrationsDirNotFound { .. }
                | CoreError::MalformedName { .. }
                | CoreError::DuplicateVersion { .. }
                | CoreError::EmptyMigration { .. }
        )
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
