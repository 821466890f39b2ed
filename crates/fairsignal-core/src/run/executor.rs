//! Remote workflow-automation provider interface.
//!
//! The engine only needs two operations from the provider: create a run
//! (idempotent on a client token) and poll its status. The provider does not
//! expose per-step granularity; the engine approximates it during
//! reconciliation (see `engine`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::CoreError;
use crate::run::RunStatus;

/// Handle returned by a successful create-run call.
#[derive(Debug, Clone)]
pub struct RemoteRunHandle {
    pub run_id: String,
    pub status: String,
}

/// Snapshot of a remote run's state.
#[derive(Debug, Clone)]
pub struct RemoteRunState {
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait RemoteWorkflowExecutor: Send + Sync {
    /// Create a run. The provider deduplicates on `client_token`, so
    /// retrying with the same token must not create a second run.
    async fn create_run(
        &self,
        workflow_name: &str,
        model_id: &str,
        client_token: &str,
    ) -> Result<RemoteRunHandle, CoreError>;

    async fn get_run(&self, workflow_name: &str, run_id: &str)
        -> Result<RemoteRunState, CoreError>;
}

/// Map a provider status string onto the local run status.
/// Unknown statuses are treated as still running.
pub fn map_remote_status(remote: &str) -> RunStatus {
    match remote {
        "SUCCEEDED" => RunStatus::Success,
        "FAILED" | "TIMED_OUT" => RunStatus::Failed,
        _ => RunStatus::Running,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRunResponse {
    run_id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRunResponse {
    status: String,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

/// HTTP implementation of the provider contract.
///
/// POST {endpoint}/workflows/{name}/runs
/// GET  {endpoint}/workflows/{name}/runs/{id}
pub struct HttpWorkflowExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWorkflowExecutor {
    pub fn new(endpoint: &str, request_timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RemoteWorkflowExecutor for HttpWorkflowExecutor {
    async fn create_run(
        &self,
        workflow_name: &str,
        model_id: &str,
        client_token: &str,
    ) -> Result<RemoteRunHandle, CoreError> {
        let url = format!("{}/workflows/{}/runs", self.endpoint, workflow_name);
        let body = serde_json::json!({
            "modelId": model_id,
            "clientToken": client_token,
        });

        tracing::info!(workflow = workflow_name, "creating remote workflow run");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Provider(format!("create run request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "create run returned {status}: {text}"
            )));
        }

        let decoded: CreateRunResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Provider(format!("create run decode failed: {e}")))?;

        Ok(RemoteRunHandle {
            run_id: decoded.run_id,
            status: decoded.status.unwrap_or_else(|| "RUNNING".to_string()),
        })
    }

    async fn get_run(
        &self,
        workflow_name: &str,
        run_id: &str,
    ) -> Result<RemoteRunState, CoreError> {
        let url = format!(
            "{}/workflows/{}/runs/{}",
            self.endpoint, workflow_name, run_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Provider(format!("get run request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(CoreError::NotFound(format!("remote run {run_id}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "get run returned {status}: {text}"
            )));
        }

        let decoded: GetRunResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Provider(format!("get run decode failed: {e}")))?;

        Ok(RemoteRunState {
            status: decoded.status,
            started_at: decoded.started_at,
            ended_at: decoded.ended_at,
            error_message: decoded.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_mapping() {
        assert_eq!(map_remote_status("SUCCEEDED"), RunStatus::Success);
        assert_eq!(map_remote_status("FAILED"), RunStatus::Failed);
        assert_eq!(map_remote_status("TIMED_OUT"), RunStatus::Failed);
        assert_eq!(map_remote_status("RUNNING"), RunStatus::Running);
        assert_eq!(map_remote_status("SOMETHING_NEW"), RunStatus::Running);
    }
}
