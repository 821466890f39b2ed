//! `fairsignal run` — workflow-run management commands.

use fairsignal_core::run::engine::{DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};
use fairsignal_core::{Run, StartRun, StepSpec, WorkflowRunEngine};

use super::print_json;

fn print_run(run: &Run) {
    print_json(&serde_json::to_value(run).unwrap_or(serde_json::Value::Null));
}

#[allow(clippy::too_many_arguments)]
pub async fn start(
    engine: &WorkflowRunEngine,
    steps: Vec<String>,
    approval_steps: &[usize],
    input: &str,
    auto_approve: bool,
    no_advance: bool,
    wait: bool,
    client_token: Option<String>,
) -> Result<(), String> {
    let input: serde_json::Value =
        serde_json::from_str(input).map_err(|e| format!("invalid --input JSON: {e}"))?;

    let specs: Vec<StepSpec> = steps
        .iter()
        .enumerate()
        .map(|(i, name)| StepSpec::new(name, approval_steps.contains(&i)))
        .collect();

    let args = StartRun {
        input,
        steps: specs,
        auto_advance: !no_advance,
        auto_approve,
        client_token,
    };

    let run = if wait {
        engine
            .run_to_completion(args, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL)
            .await
    } else {
        engine.start(args).await
    }
    .map_err(|e| e.to_string())?;

    print_run(&run);
    Ok(())
}

pub async fn advance(
    engine: &WorkflowRunEngine,
    run_id: &str,
    approve: bool,
    fail_at: Option<usize>,
) -> Result<(), String> {
    let run = engine
        .advance_with_fault(run_id, approve, fail_at)
        .await
        .map_err(|e| e.to_string())?;
    print_run(&run);
    Ok(())
}

pub async fn get(engine: &WorkflowRunEngine, run_id: &str) -> Result<(), String> {
    let run = engine.get(run_id).await.map_err(|e| e.to_string())?;
    print_run(&run);
    Ok(())
}

pub async fn pause(engine: &WorkflowRunEngine, run_id: &str) -> Result<(), String> {
    let run = engine.pause(run_id).await.map_err(|e| e.to_string())?;
    print_run(&run);
    Ok(())
}

pub async fn resume(engine: &WorkflowRunEngine, run_id: &str) -> Result<(), String> {
    let run = engine.resume(run_id).await.map_err(|e| e.to_string())?;
    print_run(&run);
    Ok(())
}
