//! Generative-text provider tiers.
//!
//! Each tier is one configured way of reaching a text provider. The client
//! (`crate::client`) tries tiers in order, retrying transient failures within
//! a tier before falling through to the next one. Provider errors are plain
//! strings; retryability is classified by substring match over that text
//! (see `is_retryable_error`), which keeps the contract provider-agnostic.

pub mod extract;
pub mod http;
pub mod offline;

pub use http::{ChatCompletionsProvider, MessagesApiProvider};
pub use offline::OfflineProvider;

use async_trait::async_trait;

/// One text-generation request, fully resolved (no ambient config reads).
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Raw reply from a provider tier.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Decoded response document, kept for debugging.
    pub raw: Option<serde_json::Value>,
}

/// A single way of reaching a generative-text provider.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Stable tier name used in metrics.
    fn name(&self) -> &'static str;

    async fn invoke(&self, req: &TextRequest) -> Result<ProviderReply, String>;
}

/// Classify an error message as transient (retry within the tier) or
/// permanent (escalate to the next tier immediately).
pub fn is_retryable_error(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("throttl")
        || m.contains("timeout")
        || m.contains("timed out")
        || m.contains("temporar")
        || m.contains("internal")
        || m.contains("too many requests")
        || m.contains("service unavailable")
}

/// Rough token estimate for prompts and replies when the provider reports no
/// usage: one token per four characters, minimum one.
pub fn estimate_tokens(text: &str) -> u64 {
    let len = text.trim().len() as u64;
    (len.div_ceil(4)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_errors() {
        assert!(is_retryable_error("ThrottlingException: slow down"));
        assert!(is_retryable_error("request timed out after 25000ms"));
        assert!(is_retryable_error("503 Service Unavailable"));
        assert!(is_retryable_error("Internal server error"));
        assert!(!is_retryable_error("401 unauthorized"));
        assert!(!is_retryable_error("unknown model id"));
    }

    #[test]
    fn token_estimate_floors_at_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh!"), 3);
    }
}
