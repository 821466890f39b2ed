//! Explicit configuration for the text client and the workflow engine.
//!
//! All ambient environment reads happen here, once, at the boundary
//! (`from_env`). The core modules only ever see resolved structs and never
//! touch `std::env` mid-call.

use std::time::Duration;

fn truthy(v: Option<String>) -> bool {
    matches!(v.as_deref(), Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("on"))
}

/// Which provider tiers the text client tries, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    /// Preferred structured-call tier (messages-style API).
    Messages,
    /// Legacy invoke tier (chat-completions-style API).
    ChatCompletions,
    /// Deterministic offline tier; always succeeds.
    Offline,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Messages => "messages",
            TierKind::ChatCompletions => "chat-completions",
            TierKind::Offline => "offline",
        }
    }
}

/// Retry/backoff/timeout policy applied within each remote tier.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(600),
            max_backoff: Duration::from_millis(4000),
            attempt_timeout: Duration::from_secs(25),
        }
    }
}

/// Configuration for the generative-text provider client.
#[derive(Debug, Clone)]
pub struct TextClientConfig {
    /// Base URL of the provider endpoint.
    pub endpoint: String,
    /// API key / auth token. May be empty in offline mode.
    pub api_key: String,
    /// Model identifier sent to remote tiers.
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Ordered tier list. The offline tier is appended automatically by the
    /// client if missing, so the chain always terminates.
    pub tiers: Vec<TierKind>,
    pub retry: RetryOptions,
}

impl Default for TextClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model_id: "fairsignal-text-v1".to_string(),
            max_tokens: 400,
            temperature: 0.2,
            tiers: vec![TierKind::Messages, TierKind::ChatCompletions, TierKind::Offline],
            retry: RetryOptions::default(),
        }
    }
}

impl TextClientConfig {
    /// Resolve from the environment once. `FAIRSIGNAL_OFFLINE=true` pins the
    /// deterministic offline tier (fast demos, no credentials needed).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("FAIRSIGNAL_TEXT_ENDPOINT") {
            cfg.endpoint = v;
        }
        if let Ok(v) = std::env::var("FAIRSIGNAL_API_KEY") {
            cfg.api_key = v;
        }
        if let Ok(v) = std::env::var("FAIRSIGNAL_MODEL_ID") {
            cfg.model_id = v;
        }
        if truthy(std::env::var("FAIRSIGNAL_OFFLINE").ok()) {
            cfg.tiers = vec![TierKind::Offline];
        }
        cfg
    }

    /// Offline-only configuration (deterministic stub tier).
    pub fn offline() -> Self {
        Self {
            tiers: vec![TierKind::Offline],
            ..Self::default()
        }
    }
}

/// Which executor a run is driven against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    Simulated,
    Remote,
}

/// Configuration for the remote workflow-automation provider.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub mode: ExecutorMode,
    /// Base URL of the workflow provider endpoint (remote mode).
    pub endpoint: String,
    /// Workflow definition name; required in remote mode.
    pub workflow_name: String,
    /// Model identifier the remote provider should run; required in remote mode.
    pub model_id: String,
    pub request_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::Simulated,
            endpoint: String::new(),
            workflow_name: String::new(),
            model_id: "act-preview".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkflowConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if truthy(std::env::var("FAIRSIGNAL_USE_REMOTE_WORKFLOWS").ok()) {
            cfg.mode = ExecutorMode::Remote;
        }
        if let Ok(v) = std::env::var("FAIRSIGNAL_WORKFLOW_ENDPOINT") {
            cfg.endpoint = v;
        }
        if let Ok(v) = std::env::var("FAIRSIGNAL_WORKFLOW_NAME") {
            cfg.workflow_name = v;
        }
        if let Ok(v) = std::env::var("FAIRSIGNAL_WORKFLOW_MODEL_ID") {
            cfg.model_id = v;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let cfg = TextClientConfig::default();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.initial_backoff, Duration::from_millis(600));
        assert_eq!(cfg.tiers.last(), Some(&TierKind::Offline));
    }

    #[test]
    fn offline_config_pins_stub_tier() {
        let cfg = TextClientConfig::offline();
        assert_eq!(cfg.tiers, vec![TierKind::Offline]);
    }
}
