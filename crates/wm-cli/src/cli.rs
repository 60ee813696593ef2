//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Waymark - apply versioned SQL schema migrations safely
#[derive(Parser, Debug)]
#[command(name = "migrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Named target from the config's `targets` section
    #[arg(short, long, global = true, env = "WAYMARK_TARGET")]
    pub target: Option<String>,

    /// Database path, overriding config and target (`:memory:` allowed)
    #[arg(short, long, global = true, env = "WAYMARK_DATABASE")]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply all pending migrations
    Up(UpArgs),

    /// Show applied and pending migrations
    Status(StatusArgs),

    /// Report migrations that repeat or fail to guard structural changes
    Lint(LintArgs),

    /// Create the next numbered migration file
    New(NewArgs),
}

/// Output formats for `up` and `lint`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON on stdout
    Json,
}

/// Arguments for the up command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Print the pending SQL without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutput {
    /// Aligned table
    Table,
    /// JSON on stdout
    Json,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: StatusOutput,
}

/// Arguments for the lint command
#[derive(Args, Debug)]
pub struct LintArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the new command
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Short description, e.g. "add camera id"
    pub name: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
