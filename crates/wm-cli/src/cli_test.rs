use super::*;
use clap::{CommandFactory, Parser};

#[test]
fn verify_cli_args() {
    // Catches short flag conflicts and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn up_dry_run_with_json_output() {
    let cli = Cli::try_parse_from(["migrate", "up", "--dry-run", "-o", "json"]).unwrap();
    match cli.command {
        Commands::Up(args) => {
            assert!(args.dry_run);
            assert_eq!(args.output, OutputFormat::Json);
        }
        other => panic!("expected up, got {other:?}"),
    }
}

#[test]
fn global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "migrate",
        "status",
        "--project-dir",
        "demos/ezrec",
        "--database",
        ":memory:",
    ])
    .unwrap();
    assert_eq!(cli.global.project_dir, "demos/ezrec");
    assert_eq!(cli.global.database.as_deref(), Some(":memory:"));
    assert!(matches!(
        cli.command,
        Commands::Status(StatusArgs {
            output: StatusOutput::Table
        })
    ));
}

#[test]
fn new_requires_a_name() {
    assert!(Cli::try_parse_from(["migrate", "new"]).is_err());
}
