//! Multi-step workflow runs.
//!
//! A run is one execution of an ordered step sequence against an executor:
//! the local simulator or a remote workflow-automation provider. Run status
//! is a pure function of step statuses (see [`reduce_status`]), except right
//! after remote reconciliation, where the provider's reported status is
//! authoritative and gets reflected back onto the steps.

pub mod engine;
pub mod executor;
pub mod store;

pub use engine::{StartRun, WorkflowRunEngine};
pub use executor::{HttpWorkflowExecutor, RemoteRunHandle, RemoteRunState, RemoteWorkflowExecutor};
pub use store::{MemoryRunStore, RunStore, SqliteRunStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ExecutorMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Running,
    NeedsApproval,
    Paused,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

/// Caller-supplied preview of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
    #[serde(default)]
    pub requires_approval: bool,
}

impl StepSpec {
    pub fn new(name: &str, requires_approval: bool) -> Self {
        Self {
            name: name.to_string(),
            details: None,
            requires_approval,
        }
    }
}

/// One unit of work within a run. Steps never carry `Paused`; that status is
/// run-level only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
    pub requires_approval: bool,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
}

impl Step {
    fn mark_success(&mut self) {
        self.status = RunStatus::Success;
        self.finished_at = Some(Utc::now());
    }

    fn mark_failed(&mut self, message: &str) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error_message = Some(message.to_string());
    }
}

/// One execution of a multi-step action. Immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
    pub executor: ExecutorMode,
    pub status: RunStatus,
    pub steps: Vec<Step>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workflow_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remote_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remote_model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_token: Option<String>,
    /// Status to restore on resume; present only while `Paused`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paused_from: Option<RunStatus>,
}

impl Run {
    /// Index of the single active step (`Running` or `NeedsApproval`).
    pub fn active_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| matches!(s.status, RunStatus::Running | RunStatus::NeedsApproval))
    }
}

/// Reduce step statuses to a run status.
///
/// Priority: any `Failed` wins; then all-`Success`; then any
/// `NeedsApproval`; then any `Running`; otherwise `Queued`.
pub fn reduce_status(steps: &[Step]) -> RunStatus {
    if steps.is_empty() {
        return RunStatus::Queued;
    }
    if steps.iter().any(|s| s.status == RunStatus::Failed) {
        return RunStatus::Failed;
    }
    if steps.iter().all(|s| s.status == RunStatus::Success) {
        return RunStatus::Success;
    }
    if steps.iter().any(|s| s.status == RunStatus::NeedsApproval) {
        return RunStatus::NeedsApproval;
    }
    if steps.iter().any(|s| s.status == RunStatus::Running) {
        return RunStatus::Running;
    }
    RunStatus::Queued
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(status: RunStatus) -> Step {
        Step {
            name: "s".to_string(),
            details: None,
            requires_approval: false,
            status,
            started_at: None,
            finished_at: None,
            error_message: None,
        }
    }

    #[test]
    fn reduction_table() {
        use RunStatus::*;
        let cases: &[(&[RunStatus], RunStatus)] = &[
            (&[Success, Failed, Queued], Failed),
            (&[Success, Success], Success),
            (&[Success, NeedsApproval], NeedsApproval),
            (&[Success, Running, Queued], Running),
            (&[Queued, Queued], Queued),
            (&[NeedsApproval, Failed], Failed),
            (&[], Queued),
        ];
        for (statuses, expected) in cases {
            let steps: Vec<Step> = statuses.iter().map(|s| step(*s)).collect();
            assert_eq!(reduce_status(&steps), *expected, "steps: {statuses:?}");
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
        assert!(!RunStatus::NeedsApproval.is_terminal());
    }

    #[test]
    fn run_round_trips_through_json() {
        let run = Run {
            run_id: "r1".to_string(),
            executor: ExecutorMode::Simulated,
            status: RunStatus::Running,
            steps: vec![step(RunStatus::Running)],
            started_at: Utc::now(),
            finished_at: None,
            input: serde_json::json!({"kind": "outreach"}),
            output: None,
            error_message: None,
            workflow_name: None,
            remote_status: None,
            remote_model_id: None,
            client_token: None,
            paused_from: None,
        };
        let encoded = serde_json::to_string(&run).unwrap();
        let decoded: Run = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.run_id, run.run_id);
        assert_eq!(decoded.status, RunStatus::Running);
    }
}
