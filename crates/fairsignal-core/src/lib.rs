//! FairSignal Core — orchestration logic for candidate-screening actions.
//!
//! This crate contains the resilient text-generation client, structured
//! assessment parsing, and the multi-step workflow-run engine. It has no
//! HTTP framework dependency, making it suitable for use in:
//!
//! - CLI tools (via `fairsignal-cli`)
//! - Server handlers
//! - Desktop apps (direct IPC)

pub mod assess;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod run;

// Convenience re-exports
pub use client::{FeatureRequest, FeatureResponse, ResilientTextClient, StructuredResponse};
pub use config::{ExecutorMode, TextClientConfig, WorkflowConfig};
pub use db::Database;
pub use error::CoreError;
pub use run::{Run, RunStatus, StartRun, StepSpec, WorkflowRunEngine};
