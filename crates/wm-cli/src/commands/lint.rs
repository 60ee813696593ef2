//! Lint command implementation

use anyhow::Result;
use wm_core::{lint, LintFinding};

use crate::cli::{GlobalArgs, LintArgs, OutputFormat};
use crate::commands::common::{plural, print_json, ExitCode, EXIT_LINT};
use crate::context::ProjectContext;

/// Execute the lint command
pub(crate) async fn execute(args: &LintArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = ProjectContext::load(global)?;
    let set = ctx.migrations()?;
    let findings = lint(&set);

    match args.output {
        OutputFormat::Json => print_json(&findings)?,
        OutputFormat::Text => print_findings(&findings, set.len()),
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(ExitCode(EXIT_LINT).into())
    }
}

fn print_findings(findings: &[LintFinding], checked: usize) {
    if findings.is_empty() {
        println!("No findings in {}", plural(checked, "migration"));
        return;
    }
    for finding in findings {
        println!("{finding}");
    }
    println!(
        "\n{} in {}",
        plural(findings.len(), "finding"),
        plural(checked, "migration")
    );
}
