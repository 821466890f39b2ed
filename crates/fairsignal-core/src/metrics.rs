//! Per-call model metrics.
//!
//! One record per terminal outcome of a `generate` call. Purely
//! observational: emitted as a structured tracing event and returned to the
//! caller, never read back by the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCallMetrics {
    /// Product feature that issued the call (e.g. "screen", "summary").
    pub feature: String,
    /// Tier that produced the final response.
    pub provider_tier: String,
    pub model_id: String,
    /// Attempts made on the tier that produced the response.
    pub attempts: u32,
    pub latency_ms: u64,
    pub used_fallback: bool,
    pub degraded: bool,
    pub input_tokens_estimated: u64,
    pub output_tokens_estimated: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ModelCallMetrics {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Emit this record as a structured log event.
    pub fn emit(&self) {
        tracing::info!(
            target: "fairsignal::model_metrics",
            feature = %self.feature,
            tier = %self.provider_tier,
            model = %self.model_id,
            attempts = self.attempts,
            latency_ms = self.latency_ms,
            used_fallback = self.used_fallback,
            degraded = self.degraded,
            input_tokens = self.input_tokens_estimated,
            output_tokens = self.output_tokens_estimated,
            error = self.error_message.as_deref().unwrap_or(""),
            "model call completed"
        );
    }
}
