//! HTTP provider tiers.
//!
//! Two wire shapes are supported, mirroring the APIs the product actually
//! talks to: a messages-style API (preferred structured-call tier) and an
//! OpenAI-compatible chat-completions API (legacy invoke tier). Both decode
//! to an opaque document and hand it to the extractor list; neither assumes
//! more than "the response decodes to text".

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::{estimate_tokens, extract, ProviderReply, TextProvider, TextRequest};

/// Preferred structured-call tier.
///
/// POST {endpoint}/v1/messages
/// Headers: x-api-key, anthropic-version, content-type
pub struct MessagesApiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
}

impl MessagesApiProvider {
    pub fn new(client: reqwest::Client, endpoint: &str, api_key: &str, model_id: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model_id: model_id.to_string(),
        }
    }
}

#[async_trait]
impl TextProvider for MessagesApiProvider {
    fn name(&self) -> &'static str {
        "messages"
    }

    async fn invoke(&self, req: &TextRequest) -> Result<ProviderReply, String> {
        let url = format!("{}/v1/messages", self.endpoint);

        let mut body = serde_json::json!({
            "model": self.model_id,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "messages": [
                { "role": "user", "content": req.prompt }
            ]
        });
        if let Some(ref system) = req.system {
            body["system"] = Value::String(system.clone());
        }

        tracing::debug!(url = %url, model = %self.model_id, "messages tier request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {e}"))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {e}"))?;

        if !status.is_success() {
            return Err(format!("API returned {status}: {response_text}"));
        }

        let doc: Value = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response JSON: {e}"))?;

        let text = extract::text_from_document(&doc);
        let usage = doc.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or_else(|| estimate_tokens(&req.prompt));
        let output_tokens = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(ProviderReply {
            text,
            input_tokens,
            output_tokens,
            raw: Some(doc),
        })
    }
}

/// Legacy invoke tier (OpenAI-compatible wire shape).
///
/// POST {endpoint}/chat/completions
/// Headers: Authorization: Bearer, content-type
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
}

impl ChatCompletionsProvider {
    pub fn new(client: reqwest::Client, endpoint: &str, api_key: &str, model_id: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model_id: model_id.to_string(),
        }
    }
}

#[async_trait]
impl TextProvider for ChatCompletionsProvider {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn invoke(&self, req: &TextRequest) -> Result<ProviderReply, String> {
        let url = format!("{}/chat/completions", self.endpoint);

        let mut messages = Vec::new();
        if let Some(ref system) = req.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": req.prompt }));

        let body = serde_json::json!({
            "model": self.model_id,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "messages": messages
        });

        tracing::debug!(url = %url, model = %self.model_id, "chat-completions tier request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {e}"))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {e}"))?;

        if !status.is_success() {
            return Err(format!("API returned {status}: {response_text}"));
        }

        let doc: Value = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response JSON: {e}"))?;

        let text = extract::text_from_document(&doc);
        let usage = doc.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("prompt_tokens").or_else(|| u.get("input_tokens")))
            .and_then(Value::as_u64)
            .unwrap_or_else(|| estimate_tokens(&req.prompt));
        let output_tokens = usage
            .and_then(|u| u.get("completion_tokens").or_else(|| u.get("output_tokens")))
            .and_then(Value::as_u64)
            .unwrap_or_else(|| estimate_tokens(&text));

        Ok(ProviderReply {
            text,
            input_tokens,
            output_tokens,
            raw: Some(doc),
        })
    }
}
