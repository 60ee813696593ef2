//! Shared utilities for CLI commands

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use wm_runner::MigrateError;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ExitCode is control flow, not a user-facing message.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// A migration failed to execute, time out or pass pre-flight checks.
pub(crate) const EXIT_EXECUTION: i32 = 1;
/// The database or the run lock could not be obtained.
pub(crate) const EXIT_LOCK: i32 = 2;
/// `lint` found problems.
pub(crate) const EXIT_LINT: i32 = 3;
/// Interrupted with Ctrl-C.
pub(crate) const EXIT_CANCELLED: i32 = 130;

/// Process exit code for a runner error.
pub(crate) fn exit_code_for(err: &MigrateError) -> i32 {
    match err {
        MigrateError::Connection(_) | MigrateError::Lock { .. } => EXIT_LOCK,
        MigrateError::Cancelled { .. } => EXIT_CANCELLED,
        _ => EXIT_EXECUTION,
    }
}

/// Report `err` on stderr and turn it into the matching exit code.
pub(crate) fn fail(err: &MigrateError) -> anyhow::Error {
    eprintln!("Error: {err}");
    ExitCode(exit_code_for(err)).into()
}

/// Calculate column widths for table output.
///
/// For each column, returns the maximum width across the header and all
/// row values so that data aligns when printed with left-padding.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);
    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.to_vec()));
    println!(
        "{}",
        widths
            .iter()
            .map(|&w| "-".repeat(w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }
}

/// Pretty-print `value` as JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `n migration` / `n migrations`.
pub(crate) fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}
