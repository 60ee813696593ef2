//! Status command implementation

use anyhow::Result;
use wm_runner::{AppliedSet, Migrator, StatusReport};

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::{fail, plural, print_json, print_table};
use crate::context::ProjectContext;

/// Execute the status command
pub(crate) async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let set = ctx.migrations()?;

    let report = if ctx.database_missing() {
        log::debug!("Database {} does not exist yet", ctx.database_path);
        StatusReport::from_applied(&set, &AppliedSet::default())
    } else {
        let db = ctx.connect().await.map_err(|e| fail(&e))?;
        Migrator::new(db, ctx.migrator_options())
            .status(&set)
            .await
            .map_err(|e| fail(&e))?
    };

    match args.output {
        StatusOutput::Json => print_json(&report)?,
        StatusOutput::Table => print_report(&ctx, &report),
    }
    Ok(())
}

fn print_report(ctx: &ProjectContext, report: &StatusReport) {
    println!("{} ({})\n", ctx.config.name, ctx.database_path);

    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|e| {
            vec![
                e.version.clone(),
                e.name.clone(),
                e.state.to_string(),
                e.applied_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["VERSION", "NAME", "STATE", "APPLIED_AT"], &rows);

    if !report.missing.is_empty() {
        println!("\nApplied but no longer present in migrations:");
        for record in &report.missing {
            println!("  {}", record.version);
        }
    }

    println!(
        "\n{} applied, {} pending",
        report.applied_count(),
        report.pending().count()
    );
    let modified = report.modified().count();
    if modified > 0 {
        println!(
            "{} changed since being applied",
            plural(modified, "migration")
        );
    }
}
