//! Resilient text-generation client.
//!
//! Wraps an ordered list of provider tiers with per-tier retry, bounded
//! attempt timeouts, and tier fallthrough. The chain terminates in the
//! deterministic offline tier, so `generate` is infallible: every failure
//! mode degrades to a best-effort response flagged `degraded=true` rather
//! than surfacing an error to the caller.

use std::time::{Duration, Instant};

use crate::assess::{AssessmentSchema, ParseOutcome};
use crate::config::{RetryOptions, TextClientConfig, TierKind};
use crate::metrics::ModelCallMetrics;
use crate::provider::{
    is_retryable_error, ChatCompletionsProvider, MessagesApiProvider, OfflineProvider,
    ProviderReply, TextProvider, TextRequest,
};

/// One feature-level generation request.
#[derive(Debug, Clone)]
pub struct FeatureRequest {
    /// Product feature issuing the call (used for metrics only).
    pub feature: String,
    pub system: Option<String>,
    pub prompt: String,
    /// Optional output-format hint appended to the prompt.
    pub schema_hint: Option<String>,
}

/// Response shape shared by healthy and degraded outcomes. A degraded
/// response differs only in `degraded`/`used_fallback`/`metrics`.
#[derive(Debug, Clone)]
pub struct FeatureResponse {
    pub text: String,
    pub provider_tier: String,
    pub degraded: bool,
    pub used_fallback: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub raw: Option<serde_json::Value>,
    pub metrics: ModelCallMetrics,
}

/// `generate_structured` result: raw response plus the validated value.
#[derive(Debug, Clone)]
pub struct StructuredResponse {
    pub response: FeatureResponse,
    pub parsed: ParseOutcome,
}

pub struct ResilientTextClient {
    tiers: Vec<Box<dyn TextProvider>>,
    model_id: String,
    max_tokens: u32,
    temperature: f64,
    retry: RetryOptions,
}

impl ResilientTextClient {
    pub fn new(config: &TextClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.retry.attempt_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mut tiers: Vec<Box<dyn TextProvider>> = Vec::new();
        for kind in &config.tiers {
            match kind {
                TierKind::Messages => tiers.push(Box::new(MessagesApiProvider::new(
                    http.clone(),
                    &config.endpoint,
                    &config.api_key,
                    &config.model_id,
                ))),
                TierKind::ChatCompletions => tiers.push(Box::new(ChatCompletionsProvider::new(
                    http.clone(),
                    &config.endpoint,
                    &config.api_key,
                    &config.model_id,
                ))),
                TierKind::Offline => tiers.push(Box::new(OfflineProvider)),
            }
        }

        Self::with_providers(config, tiers)
    }

    /// Construct with explicit tier implementations (tests inject fakes).
    /// The offline tier is appended if absent so the chain always terminates.
    pub fn with_providers(config: &TextClientConfig, mut tiers: Vec<Box<dyn TextProvider>>) -> Self {
        if !tiers.iter().any(|t| t.name() == "offline") {
            tiers.push(Box::new(OfflineProvider));
        }
        Self {
            tiers,
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: config.retry.clone(),
        }
    }

    /// Generate text. Infallible: the offline tier is the terminal fallback.
    pub async fn generate(&self, req: &FeatureRequest) -> FeatureResponse {
        let request = TextRequest {
            system: req.system.clone(),
            prompt: build_prompt(req),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let start = Instant::now();
        let mut last_error: Option<String> = None;
        let mut preferred_tier_attempts = 0u32;

        for (tier_index, tier) in self.tiers.iter().enumerate() {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                if tier_index == 0 {
                    preferred_tier_attempts = attempt;
                }

                let outcome =
                    match tokio::time::timeout(self.retry.attempt_timeout, tier.invoke(&request))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(format!(
                            "request timed out after {}ms",
                            self.retry.attempt_timeout.as_millis()
                        )),
                    };

                match outcome {
                    Ok(reply) => {
                        let fell_back = tier_index > 0;
                        // On fallback, `attempts` reports the spend on the
                        // preferred tier, which is what an operator wants to
                        // see when alerting on exhaustion.
                        let attempts = if fell_back { preferred_tier_attempts } else { attempt };
                        return self.respond(
                            req,
                            tier.name(),
                            reply,
                            attempts,
                            fell_back,
                            start,
                            if fell_back { last_error.clone() } else { None },
                        );
                    }
                    Err(message) => {
                        tracing::warn!(
                            tier = tier.name(),
                            attempt,
                            error = %message,
                            "provider attempt failed"
                        );
                        let retryable = is_retryable_error(&message);
                        last_error = Some(message);
                        if retryable && attempt < self.retry.max_attempts {
                            tokio::time::sleep(self.backoff_delay(attempt)).await;
                            continue;
                        }
                        break;
                    }
                }
            }
        }

        // Unreachable in practice: the offline tier never errors. Kept as a
        // hard guarantee rather than a panic path.
        let reply = offline_reply_of_last_resort(&request).await;
        self.respond(
            req,
            "offline",
            reply,
            preferred_tier_attempts.max(1),
            true,
            start,
            last_error,
        )
    }

    /// Generate text and validate it against an assessment schema.
    pub async fn generate_structured(
        &self,
        req: &FeatureRequest,
        schema: &AssessmentSchema,
    ) -> StructuredResponse {
        let response = self.generate(req).await;
        let parsed = schema.parse(&response.text);
        StructuredResponse { response, parsed }
    }

    /// Convenience: short factual summary with a clamped sentence budget.
    pub async fn summarize(&self, feature: &str, text: &str, max_sentences: u8) -> FeatureResponse {
        let sentences = max_sentences.clamp(1, 5);
        self.generate(&FeatureRequest {
            feature: feature.to_string(),
            system: Some(format!(
                "You are a concise assistant. Return a factual summary in no more than {sentences} sentences."
            )),
            prompt: text.to_string(),
            schema_hint: None,
        })
        .await
    }

    /// `min(max_backoff, initial * 2^(attempt-1) + jitter[0,150ms))`
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self
            .retry
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(exp));
        let jitter = Duration::from_millis(fastrand::u64(0..150));
        std::cmp::min(self.retry.max_backoff, base + jitter)
    }

    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        req: &FeatureRequest,
        tier_name: &str,
        reply: ProviderReply,
        attempts: u32,
        used_fallback: bool,
        start: Instant,
        error_message: Option<String>,
    ) -> FeatureResponse {
        let metrics = ModelCallMetrics {
            feature: req.feature.clone(),
            provider_tier: tier_name.to_string(),
            model_id: self.model_id.clone(),
            attempts,
            latency_ms: start.elapsed().as_millis() as u64,
            used_fallback,
            degraded: used_fallback,
            input_tokens_estimated: reply.input_tokens,
            output_tokens_estimated: reply.output_tokens,
            timestamp: chrono::Utc::now(),
            error_message,
        };
        metrics.emit();

        FeatureResponse {
            text: reply.text,
            provider_tier: tier_name.to_string(),
            degraded: used_fallback,
            used_fallback,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            raw: reply.raw,
            metrics,
        }
    }
}

fn build_prompt(req: &FeatureRequest) -> String {
    match &req.schema_hint {
        Some(hint) => format!("{}\n\nOutput format:\n{}", req.prompt, hint),
        None => req.prompt.clone(),
    }
}

async fn offline_reply_of_last_resort(request: &TextRequest) -> ProviderReply {
    OfflineProvider
        .invoke(request)
        .await
        .unwrap_or_else(|_| ProviderReply {
            text: String::new(),
            input_tokens: 1,
            output_tokens: 1,
            raw: None,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    struct FailingProvider {
        name: &'static str,
        message: &'static str,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl TextProvider for FailingProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn invoke(&self, _req: &TextRequest) -> Result<ProviderReply, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.message.to_string())
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl TextProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "messages"
        }

        async fn invoke(&self, _req: &TextRequest) -> Result<ProviderReply, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            unreachable!("the attempt timeout fires first")
        }
    }

    fn fast_config() -> TextClientConfig {
        let mut cfg = TextClientConfig::default();
        cfg.retry.initial_backoff = Duration::from_millis(1);
        cfg.retry.max_backoff = Duration::from_millis(2);
        cfg.retry.attempt_timeout = Duration::from_millis(40);
        cfg
    }

    fn req(prompt: &str) -> FeatureRequest {
        FeatureRequest {
            feature: "screen".to_string(),
            system: Some("sys".to_string()),
            prompt: prompt.to_string(),
            schema_hint: None,
        }
    }

    #[tokio::test]
    async fn monotonic_tier_fallback() {
        let cfg = fast_config();
        let tier1_calls = Arc::new(AtomicU32::new(0));
        let tier2_calls = Arc::new(AtomicU32::new(0));
        let client = ResilientTextClient::with_providers(
            &cfg,
            vec![
                Box::new(FailingProvider {
                    name: "messages",
                    message: "ThrottlingException: too many requests",
                    calls: tier1_calls.clone(),
                }),
                Box::new(FailingProvider {
                    name: "chat-completions",
                    message: "unknown model id",
                    calls: tier2_calls.clone(),
                }),
            ],
        );

        let response = client.generate(&req("hello")).await;

        assert_eq!(response.provider_tier, "offline");
        assert!(response.degraded);
        assert!(response.used_fallback);
        // Retryable errors exhaust the preferred tier's budget...
        assert_eq!(tier1_calls.load(Ordering::SeqCst), cfg.retry.max_attempts);
        assert_eq!(response.metrics.attempts, cfg.retry.max_attempts);
        // ...while a non-retryable error escalates immediately.
        assert_eq!(tier2_calls.load(Ordering::SeqCst), 1);
        assert!(response.metrics.error_message.is_some());
    }

    #[tokio::test]
    async fn deterministic_offline_responses() {
        let cfg = TextClientConfig::offline();
        let client = ResilientTextClient::new(&cfg);
        let a = client.generate(&req("same prompt")).await;
        let b = client.generate(&req("same prompt")).await;
        assert_eq!(a.text, b.text);
        // Offline as the configured (first) tier is not a fallback.
        assert!(!a.degraded);
        assert!(!a.used_fallback);
    }

    #[tokio::test]
    async fn attempt_timeout_is_retryable() {
        let cfg = fast_config();
        let client = ResilientTextClient::with_providers(&cfg, vec![Box::new(SlowProvider)]);
        let response = client.generate(&req("anything")).await;
        assert_eq!(response.provider_tier, "offline");
        assert_eq!(response.metrics.attempts, cfg.retry.max_attempts);
        assert!(response
            .metrics
            .error_message
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn schema_hint_is_appended_to_prompt() {
        struct Capture {
            seen: Arc<std::sync::Mutex<String>>,
        }

        #[async_trait]
        impl TextProvider for Capture {
            fn name(&self) -> &'static str {
                "messages"
            }
            async fn invoke(&self, req: &TextRequest) -> Result<ProviderReply, String> {
                *self.seen.lock().unwrap() = req.prompt.clone();
                Ok(ProviderReply {
                    text: "ok".to_string(),
                    input_tokens: 1,
                    output_tokens: 1,
                    raw: None,
                })
            }
        }

        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let client = ResilientTextClient::with_providers(
            &fast_config(),
            vec![Box::new(Capture { seen: seen.clone() })],
        );
        let mut r = req("score this");
        r.schema_hint = Some("{\"score\": number}".to_string());
        let response = client.generate(&r).await;

        assert_eq!(response.text, "ok");
        assert!(!response.degraded);
        assert_eq!(response.metrics.attempts, 1);
        assert!(seen.lock().unwrap().contains("Output format:"));
    }

    #[tokio::test]
    async fn structured_generation_always_returns_schema_valid_value() {
        let cfg = TextClientConfig::offline();
        let client = ResilientTextClient::new(&cfg);
        let out = client
            .generate_structured(&req("score the candidate against the rubric"), &AssessmentSchema::default())
            .await;
        // Offline replies are prose, so parsing falls back to defaults, but
        // the value is still fully populated.
        assert!(out.parsed.value.score >= 0 && out.parsed.value.score <= 100);
        assert!(!out.parsed.value.summary.is_empty());
    }

    #[tokio::test]
    async fn risk_prompt_hits_risk_bucket_through_client() {
        let cfg = TextClientConfig::offline();
        let client = ResilientTextClient::new(&cfg);
        let response = client.generate(&req("verify this risk signal")).await;
        assert!(response.text.to_lowercase().contains("risk") || response.text.contains("clarification"));
    }
}
