//! Up command implementation - applies pending migrations

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use wm_core::{lint, MigrationSet};
use wm_runner::{plan, AppliedSet, CancelFlag, MigrationState, Migrator, ProgressEvent, RunFailure};

use crate::cli::{GlobalArgs, OutputFormat, UpArgs};
use crate::commands::common::{exit_code_for, fail, plural, print_json, ExitCode};
use crate::context::ProjectContext;

/// JSON result of `migrate up`
#[derive(Debug, Serialize)]
struct UpReport<'a> {
    status: &'static str,
    applied: &'a [String],
    skipped: &'a [String],
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_applied: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// One pending migration in `--dry-run` JSON output
#[derive(Debug, Serialize)]
struct PendingMigration<'a> {
    version: &'a str,
    name: &'a str,
    checksum: &'a str,
    sql: &'a str,
}

/// Execute the up command
pub(crate) async fn execute(args: &UpArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let set = ctx.migrations()?;

    for finding in lint(&set) {
        log::warn!("{}", finding);
    }

    if args.dry_run {
        return dry_run(&ctx, &set, args.output).await;
    }

    let db = ctx.connect().await.map_err(|e| fail(&e))?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: stopping after the current migration");
            on_interrupt.cancel();
        }
    });

    let mut migrator = Migrator::new(db, ctx.migrator_options()).with_cancel(cancel);
    let progress = (args.output == OutputFormat::Text).then(progress_bar);
    if let Some(pb) = progress.clone() {
        migrator = migrator.with_progress(move |event| match event {
            ProgressEvent::Started { unit, total, .. } => {
                pb.set_length(*total as u64);
                pb.set_message(unit.label());
            }
            ProgressEvent::Applied { unit, elapsed } => {
                pb.println(format!("  ✓ {} ({}ms)", unit.label(), elapsed.as_millis()));
                pb.inc(1);
            }
            ProgressEvent::Failed { unit, .. } => {
                pb.println(format!("  ✗ {}", unit.label()));
            }
        });
    }

    let result = migrator.run(&set).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match result {
        Ok(summary) => {
            match args.output {
                OutputFormat::Json => print_json(&UpReport {
                    status: "success",
                    applied: &summary.applied,
                    skipped: &summary.skipped,
                    elapsed_ms: summary.elapsed.as_millis() as u64,
                    failed_version: None,
                    last_applied: None,
                    error: None,
                })?,
                OutputFormat::Text if summary.is_noop() => {
                    println!(
                        "Database is up to date ({} already applied)",
                        plural(summary.skipped.len(), "migration")
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "Applied {} in {}ms: {}",
                        plural(summary.applied.len(), "migration"),
                        summary.elapsed.as_millis(),
                        summary.applied.join(", ")
                    );
                }
            }
            Ok(())
        }
        Err(failure) => report_failure(&failure, args.output),
    }
}

fn report_failure(failure: &RunFailure, output: OutputFormat) -> Result<()> {
    let RunFailure { summary, error } = failure;
    match output {
        OutputFormat::Json => {
            print_json(&UpReport {
                status: "error",
                applied: &summary.applied,
                skipped: &summary.skipped,
                elapsed_ms: summary.elapsed.as_millis() as u64,
                failed_version: error.failed_version(),
                last_applied: error.last_applied(),
                error: Some(error.to_string()),
            })?;
            Err(ExitCode(exit_code_for(error)).into())
        }
        OutputFormat::Text => {
            if !summary.applied.is_empty() {
                println!(
                    "Applied {} before the failure: {}",
                    plural(summary.applied.len(), "migration"),
                    summary.applied.join(", ")
                );
            }
            Err(fail(error))
        }
    }
}

/// Print pending SQL without executing it.
async fn dry_run(ctx: &ProjectContext, set: &MigrationSet, output: OutputFormat) -> Result<()> {
    let applied = if ctx.database_missing() {
        AppliedSet::default()
    } else {
        let db = ctx.connect().await.map_err(|e| fail(&e))?;
        let migrator = Migrator::new(db, ctx.migrator_options());
        let report = migrator.status(set).await.map_err(|e| fail(&e))?;
        AppliedSet::from_versions(
            report
                .entries
                .iter()
                .filter(|e| e.state != MigrationState::Pending)
                .map(|e| e.version.clone())
                .chain(report.missing.iter().map(|r| r.version.clone())),
        )
    };
    let pending = plan(set, &applied);

    match output {
        OutputFormat::Json => {
            let items: Vec<PendingMigration<'_>> = pending
                .iter()
                .map(|u| PendingMigration {
                    version: u.version.as_str(),
                    name: &u.name,
                    checksum: &u.checksum,
                    sql: &u.body,
                })
                .collect();
            print_json(&items)?;
        }
        OutputFormat::Text if pending.is_empty() => {
            println!("Nothing to apply; database is up to date");
        }
        OutputFormat::Text => {
            println!("-- Dry run: {} pending\n", plural(pending.len(), "migration"));
            for unit in &pending {
                println!("-- {}", unit.label());
                println!("{}\n", unit.body.trim_end());
            }
        }
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}
