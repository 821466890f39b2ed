//! Workflow-run lifecycle engine.
//!
//! Owns the lifecycle of a single multi-step run. Simulated runs are driven
//! locally through `advance` and live in the injected `RunStore`; remote runs
//! are created against a `RemoteWorkflowExecutor` and synced via `reconcile`,
//! with the provider as the source of truth. The engine holds no background
//! threads: callers drive progress explicitly, which keeps the state machine
//! testable without timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{ExecutorMode, WorkflowConfig};
use crate::error::CoreError;
use crate::run::executor::{map_remote_status, HttpWorkflowExecutor, RemoteWorkflowExecutor};
use crate::run::store::RunStore;
use crate::run::{reduce_status, Run, RunStatus, Step, StepSpec};

pub const DEFAULT_MAX_POLLS: u32 = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Arguments for starting a run.
#[derive(Debug, Clone)]
pub struct StartRun {
    pub input: serde_json::Value,
    pub steps: Vec<StepSpec>,
    /// Simulated only: synchronously advance until terminal or blocked on
    /// approval.
    pub auto_advance: bool,
    /// Simulated only: approve approval-gated steps without waiting.
    pub auto_approve: bool,
    /// Remote only: idempotency token; generated when absent. Retrying
    /// `start` with the same token must not create a duplicate remote run.
    pub client_token: Option<String>,
}

impl StartRun {
    pub fn new(input: serde_json::Value, steps: Vec<StepSpec>) -> Self {
        Self {
            input,
            steps,
            auto_advance: true,
            auto_approve: false,
            client_token: None,
        }
    }
}

pub struct WorkflowRunEngine {
    config: WorkflowConfig,
    store: Arc<dyn RunStore>,
    remote: Option<Arc<dyn RemoteWorkflowExecutor>>,
    /// Per-run mutation locks: concurrent `advance` calls on one run are
    /// serialized; distinct runs proceed independently. Entries are dropped
    /// once a run reaches a terminal status, so the map does not grow with
    /// every run ever touched.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowRunEngine {
    pub fn new(config: WorkflowConfig, store: Arc<dyn RunStore>) -> Self {
        let remote: Option<Arc<dyn RemoteWorkflowExecutor>> =
            if config.mode == ExecutorMode::Remote && !config.endpoint.is_empty() {
                Some(Arc::new(HttpWorkflowExecutor::new(
                    &config.endpoint,
                    config.request_timeout,
                )))
            } else {
                None
            };
        Self {
            config,
            store,
            remote,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Construct with an explicit executor (tests inject fakes).
    pub fn with_executor(
        config: WorkflowConfig,
        store: Arc<dyn RunStore>,
        executor: Arc<dyn RemoteWorkflowExecutor>,
    ) -> Self {
        Self {
            config,
            store,
            remote: Some(executor),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a run against the configured executor.
    pub async fn start(&self, args: StartRun) -> Result<Run, CoreError> {
        if args.steps.is_empty() {
            return Err(CoreError::BadRequest(
                "a run requires at least one step".to_string(),
            ));
        }
        match self.config.mode {
            ExecutorMode::Remote => self.start_remote(args).await,
            ExecutorMode::Simulated => self.start_simulated(args).await,
        }
    }

    /// Advance the active step of a simulated run.
    ///
    /// If the active step needs approval and `approve_current` is false the
    /// call is a no-op. Otherwise the step runs to completion and the next
    /// step is activated; finishing the last step completes the run.
    pub async fn advance(&self, run_id: &str, approve_current: bool) -> Result<Run, CoreError> {
        self.advance_internal(run_id, approve_current, None).await
    }

    /// `advance` with an injected failure at the given step index.
    pub async fn advance_with_fault(
        &self,
        run_id: &str,
        approve_current: bool,
        fail_at_step: Option<usize>,
    ) -> Result<Run, CoreError> {
        self.advance_internal(run_id, approve_current, fail_at_step)
            .await
    }

    /// Fetch a run. Simulated runs come from the store; unknown ids fall
    /// through to the remote provider (reconciling on the way) when a remote
    /// executor is configured.
    pub async fn get(&self, run_id: &str) -> Result<Run, CoreError> {
        if let Some(run) = self.store.get(run_id).await? {
            return Ok(run);
        }
        if self.config.mode == ExecutorMode::Remote && self.remote.is_some() {
            let base = Run {
                run_id: run_id.to_string(),
                executor: ExecutorMode::Remote,
                status: RunStatus::Running,
                steps: Vec::new(),
                started_at: Utc::now(),
                finished_at: None,
                input: serde_json::Value::Null,
                output: None,
                error_message: None,
                workflow_name: some_nonempty(&self.config.workflow_name),
                remote_status: None,
                remote_model_id: some_nonempty(&self.config.model_id),
                client_token: None,
                paused_from: None,
            };
            return self.reconcile(&base).await;
        }
        Err(CoreError::NotFound(format!("run {run_id}")))
    }

    /// Poll the remote provider and map its status onto local step state.
    ///
    /// The provider reports run-level status only, so step granularity is
    /// approximated: remote success completes every step, remote failure
    /// lands on the active step, and remote running keeps exactly one step
    /// in flight.
    pub async fn reconcile(&self, run: &Run) -> Result<Run, CoreError> {
        let executor = self
            .remote
            .as_ref()
            .ok_or_else(|| CoreError::BadRequest("no remote executor configured".to_string()))?;
        let workflow_name = run
            .workflow_name
            .clone()
            .or_else(|| some_nonempty(&self.config.workflow_name))
            .ok_or_else(|| {
                CoreError::BadRequest("missing workflow name for reconciliation".to_string())
            })?;

        let state = executor.get_run(&workflow_name, &run.run_id).await?;

        let mut next = run.clone();
        next.remote_status = Some(state.status.clone());
        if let Some(started) = state.started_at {
            next.started_at = started;
        }
        if let Some(ended) = state.ended_at {
            next.finished_at = Some(ended);
        }

        match map_remote_status(&state.status) {
            RunStatus::Success => {
                let run_started = next.started_at;
                for step in &mut next.steps {
                    step.status = RunStatus::Success;
                    step.started_at.get_or_insert(run_started);
                    step.finished_at.get_or_insert_with(Utc::now);
                }
                next.status = RunStatus::Success;
                next.finished_at.get_or_insert_with(Utc::now);
            }
            RunStatus::Failed => {
                let message = state
                    .error_message
                    .clone()
                    .or_else(|| run.error_message.clone())
                    .unwrap_or_else(|| "Remote workflow run failed.".to_string());
                let target = next
                    .steps
                    .iter()
                    .position(|s| s.status == RunStatus::Running)
                    .or(if next.steps.is_empty() { None } else { Some(0) });
                if let Some(idx) = target {
                    next.steps[idx].status = RunStatus::Failed;
                    next.steps[idx].finished_at = Some(Utc::now());
                    next.steps[idx].error_message = Some(message.clone());
                }
                next.status = RunStatus::Failed;
                next.error_message = Some(message);
                next.finished_at.get_or_insert_with(Utc::now);
            }
            _ => {
                let running = next.steps.iter().any(|s| s.status == RunStatus::Running);
                if !running {
                    if let Some(queued) = next
                        .steps
                        .iter_mut()
                        .find(|s| s.status == RunStatus::Queued)
                    {
                        queued.status = RunStatus::Running;
                        queued.started_at.get_or_insert_with(Utc::now);
                    }
                }
                next.status = RunStatus::Running;
            }
        }

        let remote_meta = serde_json::json!({
            "status": state.status,
            "startedAt": state.started_at,
            "endedAt": state.ended_at,
        });
        match next.output.as_mut().and_then(|o| o.as_object_mut()) {
            Some(obj) => {
                obj.insert("remote".to_string(), remote_meta);
            }
            None => next.output = Some(serde_json::json!({ "remote": remote_meta })),
        }

        Ok(next)
    }

    /// Drive a run to a terminal status within a bounded poll budget.
    pub async fn run_to_completion(
        &self,
        args: StartRun,
        max_polls: u32,
        poll_interval: Duration,
    ) -> Result<Run, CoreError> {
        match self.config.mode {
            ExecutorMode::Remote => {
                let mut run = self.start(args).await?;
                for _ in 0..max_polls {
                    if run.status.is_terminal() {
                        break;
                    }
                    tokio::time::sleep(poll_interval).await;
                    run = self.reconcile(&run).await?;
                }
                // May still be Running after the budget; that is the
                // caller's signal to keep polling via `get`.
                Ok(run)
            }
            ExecutorMode::Simulated => {
                let auto_approve = args.auto_approve;
                let run = self
                    .start(StartRun {
                        auto_advance: false,
                        ..args
                    })
                    .await?;
                let run_id = run.run_id.clone();
                let mut current = run;
                while !current.status.is_terminal() {
                    let needs_approval = current
                        .steps
                        .iter()
                        .any(|s| s.status == RunStatus::NeedsApproval);
                    if needs_approval && !auto_approve {
                        break;
                    }
                    current = self.advance(&run_id, needs_approval).await?;
                }
                Ok(current)
            }
        }
    }

    /// Pause a `Queued`/`Running` simulated run; `resume` restores the prior
    /// status. Pausing a terminal or approval-blocked run is a caller error.
    pub async fn pause(&self, run_id: &str) -> Result<Run, CoreError> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut run = self.load(run_id).await?;
        match run.status {
            RunStatus::Running | RunStatus::Queued => {
                run.paused_from = Some(run.status);
                run.status = RunStatus::Paused;
                self.store.put(&run).await?;
                Ok(run)
            }
            RunStatus::Paused => Ok(run),
            other => Err(CoreError::BadRequest(format!(
                "cannot pause a run in status {other:?}"
            ))),
        }
    }

    pub async fn resume(&self, run_id: &str) -> Result<Run, CoreError> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut run = self.load(run_id).await?;
        if run.status == RunStatus::Paused {
            run.status = run.paused_from.take().unwrap_or_else(|| reduce_status(&run.steps));
            self.store.put(&run).await?;
        }
        Ok(run)
    }

    // ------------------------------------------------------------------
    // Simulated path
    // ------------------------------------------------------------------

    async fn start_simulated(&self, args: StartRun) -> Result<Run, CoreError> {
        let run_id = format!("run_{}", Uuid::new_v4().simple());
        let steps = initialize_steps(&args.steps, args.auto_approve);
        let mut run = Run {
            run_id: run_id.clone(),
            executor: ExecutorMode::Simulated,
            status: RunStatus::Queued,
            steps,
            started_at: Utc::now(),
            finished_at: None,
            input: args.input,
            output: None,
            error_message: None,
            workflow_name: some_nonempty(&self.config.workflow_name),
            remote_status: None,
            remote_model_id: some_nonempty(&self.config.model_id),
            client_token: None,
            paused_from: None,
        };
        run.status = reduce_status(&run.steps);
        self.store.put(&run).await?;

        tracing::info!(run_id = %run.run_id, steps = run.steps.len(), "simulated run started");

        if !args.auto_advance {
            return Ok(run);
        }
        loop {
            let advanced = self.advance(&run_id, args.auto_approve).await?;
            if advanced.status.is_terminal()
                || (advanced.status == RunStatus::NeedsApproval && !args.auto_approve)
            {
                return Ok(advanced);
            }
        }
    }

    async fn advance_internal(
        &self,
        run_id: &str,
        approve_current: bool,
        fail_at_step: Option<usize>,
    ) -> Result<Run, CoreError> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut run = self.load(run_id).await?;
        if run.status.is_terminal() {
            self.locks.lock().await.remove(run_id);
            return Ok(run);
        }
        if run.status == RunStatus::Paused {
            return Ok(run);
        }

        let active = match run.active_step() {
            Some(idx) => idx,
            None => {
                // Nothing in flight: activate the first queued step, or
                // settle the run if there is none.
                match run.steps.iter().position(|s| s.status == RunStatus::Queued) {
                    Some(idx) => {
                        activate_step(&mut run.steps[idx]);
                        idx
                    }
                    None => {
                        run.status = reduce_status(&run.steps);
                        if run.status == RunStatus::Success {
                            run.finished_at.get_or_insert_with(Utc::now);
                        }
                        self.persist(&run).await?;
                        return Ok(run);
                    }
                }
            }
        };

        if run.steps[active].status == RunStatus::NeedsApproval {
            if !approve_current {
                // Approval gate holds: no side effects at all.
                return Ok(run);
            }
            let step = &mut run.steps[active];
            step.status = RunStatus::Running;
            step.started_at.get_or_insert_with(Utc::now);
        }

        if run.steps[active].status == RunStatus::Running {
            if fail_at_step == Some(active) {
                run.steps[active].mark_failed("Simulated step failure for testing.");
                run.status = RunStatus::Failed;
                run.error_message = run.steps[active].error_message.clone();
                run.finished_at = Some(Utc::now());
                self.persist(&run).await?;
                tracing::warn!(run_id = %run.run_id, step = active, "run failed at injected fault");
                return Ok(run);
            }

            run.steps[active].mark_success();
            if let Some(next) = run.steps.get_mut(active + 1) {
                activate_step(next);
            }
        }

        run.status = reduce_status(&run.steps);
        if run.status == RunStatus::Success {
            run.finished_at.get_or_insert_with(Utc::now);
            run.output = Some(serde_json::json!({
                "message": "Simulated run completed successfully.",
                "completedSteps": run.steps.len(),
                "runType": run_kind(&run.input),
            }));
        }

        self.persist(&run).await?;
        Ok(run)
    }

    // ------------------------------------------------------------------
    // Remote path
    // ------------------------------------------------------------------

    async fn start_remote(&self, args: StartRun) -> Result<Run, CoreError> {
        let workflow_name = some_nonempty(&self.config.workflow_name).ok_or_else(|| {
            CoreError::BadRequest(
                "missing workflow name; set it in the workflow configuration".to_string(),
            )
        })?;
        let model_id = some_nonempty(&self.config.model_id).ok_or_else(|| {
            CoreError::BadRequest("missing model id for the remote executor".to_string())
        })?;
        let executor = self
            .remote
            .as_ref()
            .ok_or_else(|| CoreError::BadRequest("no remote executor configured".to_string()))?;

        let client_token = args
            .client_token
            .unwrap_or_else(|| format!("fairsignal-{}", Uuid::new_v4()));

        let handle = executor
            .create_run(&workflow_name, &model_id, &client_token)
            .await?;

        tracing::info!(run_id = %handle.run_id, workflow = %workflow_name, "remote run created");

        // The remote provider is authoritative; the run is returned as a
        // handle and never persisted locally.
        Ok(Run {
            run_id: handle.run_id,
            executor: ExecutorMode::Remote,
            status: map_remote_status(&handle.status),
            steps: initialize_remote_steps(&args.steps),
            started_at: Utc::now(),
            finished_at: None,
            input: args.input,
            output: None,
            error_message: None,
            workflow_name: Some(workflow_name),
            remote_status: Some(handle.status),
            remote_model_id: Some(model_id),
            client_token: Some(client_token),
            paused_from: None,
        })
    }

    // ------------------------------------------------------------------

    /// Persist a run and, once it is terminal, drop its mutation lock.
    async fn persist(&self, run: &Run) -> Result<(), CoreError> {
        self.store.put(run).await?;
        if run.status.is_terminal() {
            self.locks.lock().await.remove(&run.run_id);
        }
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Run, CoreError> {
        self.store
            .get(run_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("run {run_id}")))
    }

    async fn run_lock(&self, run_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Activate a queued step: approval-gated steps wait, others start running.
fn activate_step(step: &mut Step) {
    if step.requires_approval {
        step.status = RunStatus::NeedsApproval;
    } else {
        step.status = RunStatus::Running;
        step.started_at.get_or_insert_with(Utc::now);
    }
}

fn initialize_steps(specs: &[StepSpec], auto_approve: bool) -> Vec<Step> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let mut status = RunStatus::Queued;
            let mut started_at = None;
            if index == 0 {
                if spec.requires_approval && !auto_approve {
                    status = RunStatus::NeedsApproval;
                } else {
                    status = RunStatus::Running;
                    started_at = Some(Utc::now());
                }
            }
            Step {
                name: spec.name.clone(),
                details: spec.details.clone(),
                requires_approval: spec.requires_approval,
                status,
                started_at,
                finished_at: None,
                error_message: None,
            }
        })
        .collect()
}

/// Remote providers run unattended; approval flags are preserved for display
/// but the first step starts immediately.
fn initialize_remote_steps(specs: &[StepSpec]) -> Vec<Step> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| Step {
            name: spec.name.clone(),
            details: spec.details.clone(),
            requires_approval: spec.requires_approval,
            status: if index == 0 {
                RunStatus::Running
            } else {
                RunStatus::Queued
            },
            started_at: if index == 0 { Some(Utc::now()) } else { None },
            finished_at: None,
            error_message: None,
        })
        .collect()
}

fn run_kind(input: &serde_json::Value) -> String {
    input
        .get("kind")
        .or_else(|| input.get("type"))
        .and_then(|v| v.as_str())
        .unwrap_or("generic_action_run")
        .to_string()
}

fn some_nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
