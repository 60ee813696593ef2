//! New command implementation - scaffolds the next migration file

use anyhow::{Context, Result};
use wm_core::new_migration;

use crate::cli::{GlobalArgs, NewArgs};
use crate::context::ProjectContext;

/// Execute the new command
pub(crate) async fn execute(args: &NewArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let dir = ctx.migrations_dir();

    let path = new_migration(&dir, &args.name)
        .with_context(|| format!("Failed to create migration in {}", dir.display()))?;

    let shown = path.strip_prefix(&ctx.root).unwrap_or(&path);
    println!("Created {}", shown.display());
    Ok(())
}
