//! Runtime context for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wm_core::{discover, Config, DirectorySource, MigrationSet};
use wm_db::{Database, DuckDbBackend};
use wm_runner::{MigrateError, MigrateResult, MigratorOptions};

use crate::cli::GlobalArgs;

/// Loaded project configuration plus the CLI overrides that apply to it.
pub(crate) struct ProjectContext {
    /// Project root; relative paths in the config resolve against it
    pub root: PathBuf,

    pub config: Config,

    /// Resolved database path (`:memory:` or a filesystem path)
    pub database_path: String,
}

impl ProjectContext {
    /// Load the project config from `--config` or the project directory.
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&global.project_dir);

        let config = match &global.config {
            Some(path) => {
                Config::load(Path::new(path)).context("Failed to load configuration file")?
            }
            None => Config::load_from_dir(&root).context("Failed to load project configuration")?,
        };

        let database_path = match &global.database {
            Some(path) => path.clone(),
            None => {
                let db = config
                    .database_for_target(global.target.as_deref())
                    .context("Failed to resolve target")?;
                Config::resolve_db_path(&root, &db.path)
            }
        };
        log::debug!(
            "Project '{}' at {}, database {}",
            config.name,
            root.display(),
            database_path
        );

        Ok(Self {
            root,
            config,
            database_path,
        })
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.config.migrations_path_absolute(&self.root)
    }

    /// Discover and validate the project's migrations.
    pub fn migrations(&self) -> Result<MigrationSet> {
        let dir = self.migrations_dir();
        discover(&DirectorySource::new(&dir))
            .with_context(|| format!("Failed to load migrations from {}", dir.display()))
    }

    pub fn migrator_options(&self) -> MigratorOptions {
        MigratorOptions::from_config(&self.config)
    }

    /// Whether the database has never been created.
    pub fn database_missing(&self) -> bool {
        self.database_path != ":memory:" && !Path::new(&self.database_path).exists()
    }

    /// Open the database, waiting out a file lock held by another process.
    ///
    /// Uses the same retry budget as the run lock.
    pub async fn connect(&self) -> MigrateResult<Arc<dyn Database>> {
        let lock = &self.config.lock;
        let attempts = lock.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match DuckDbBackend::new(&self.database_path) {
                Ok(db) => return Ok(Arc::new(db)),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = lock.backoff(attempt);
                    log::info!(
                        "Database {} is locked, retrying in {}ms ({}/{})",
                        self.database_path,
                        delay.as_millis(),
                        attempt,
                        attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(MigrateError::Lock {
                        table: self.database_path.clone(),
                        attempts,
                        message: e.to_string(),
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
