//! wm-runner - Migration runner for Waymark
//!
//! Applies discovered migration units to a database, recording each one in
//! a tracking table, under a run lock so that concurrent runners converge.

pub mod cancel;
pub mod error;
pub mod lock;
pub mod migrator;
pub mod record;
pub mod summary;
pub mod tracking;

pub use cancel::CancelFlag;
pub use error::{MigrateError, MigrateResult, RunFailure};
pub use lock::RunLock;
pub use migrator::{plan, Migrator, MigratorOptions, ProgressEvent};
pub use record::{AppliedMigrationRecord, AppliedSet};
pub use summary::{AppliedSummary, MigrationState, StatusEntry, StatusReport};
pub use tracking::TrackingStore;
