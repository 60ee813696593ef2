//! wm-core - Core library for Waymark
//!
//! Shared types for the migration runner: project configuration, versioned
//! migration units, discovery from directories or embedded sets, checksums,
//! and the overlap lint.

pub mod checksum;
pub mod config;
pub mod discovery;
pub mod error;
pub mod lint;
pub mod scaffold;
pub mod sql_utils;
pub mod unit;
pub mod version;

pub use config::{Config, DatabaseConfig, LockConfig};
pub use discovery::{discover, DirectorySource, EmbeddedSource, MigrationSet, MigrationSource};
pub use error::{CoreError, CoreResult};
pub use lint::{lint, LintFinding};
pub use scaffold::new_migration;
pub use unit::MigrationUnit;
pub use version::MigrationVersion;
