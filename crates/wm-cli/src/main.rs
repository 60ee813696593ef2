//! Waymark CLI - apply and inspect versioned SQL schema migrations

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod context;

use cli::{Cli, Commands};
use commands::common::ExitCode;
use commands::{lint, new, status, up};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let result: Result<()> = match &cli.command {
        Commands::Up(args) => up::execute(args, &cli.global).await,
        Commands::Status(args) => status::execute(args, &cli.global).await,
        Commands::Lint(args) => lint::execute(args, &cli.global).await,
        Commands::New(args) => new::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ExitCode>() {
            Some(code) => std::process::ExitCode::from(u8::try_from(code.0).unwrap_or(1)),
            None => {
                eprintln!("Error: {err:#}");
                std::process::ExitCode::FAILURE
            }
        },
    }
}

/// `RUST_LOG` wins unless `--verbose` asks for debug output.
fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}
