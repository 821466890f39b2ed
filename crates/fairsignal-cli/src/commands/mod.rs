//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! fairsignal-core domain logic directly.

pub mod run;
pub mod screen;

use std::sync::Arc;

use fairsignal_core::run::SqliteRunStore;
use fairsignal_core::{Database, WorkflowConfig, WorkflowRunEngine};

/// Build a run engine backed by the SQLite store at the given path.
///
/// Executor mode (simulated vs remote) comes from the environment, same as
/// the server handlers.
pub fn init_engine(db_path: &str) -> WorkflowRunEngine {
    let db = Database::open(db_path).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", db_path, e);
        std::process::exit(1);
    });
    WorkflowRunEngine::new(WorkflowConfig::from_env(), Arc::new(SqliteRunStore::new(db)))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
