//! wm-db - Database abstraction layer for Waymark
//!
//! This crate provides the `Database` trait the migration runner talks to
//! and its DuckDB implementation.

pub mod duckdb;
pub mod error;
pub mod traits;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::Database;
