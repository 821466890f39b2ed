//! `fairsignal screen` / `fairsignal summarize` — text-generation commands.

use fairsignal_core::assess::AssessmentSchema;
use fairsignal_core::{FeatureRequest, ResilientTextClient, TextClientConfig};

use super::print_json;

const SCHEMA_HINT: &str = r#"{"score": <integer 0-100>, "strengths": ["..."], "concerns": ["..."], "summary": "...", "recommendation": "INTERVIEW" | "SCREEN" | "HOLD" | "REJECT"}"#;

fn client(offline: bool) -> ResilientTextClient {
    let config = if offline {
        TextClientConfig::offline()
    } else {
        TextClientConfig::from_env()
    };
    ResilientTextClient::new(&config)
}

pub async fn run(offline: bool, prompt: &str, role: Option<&str>) -> Result<(), String> {
    let system = match role {
        Some(role) => format!(
            "You are a fair, structured recruiting screener evaluating a candidate for the role: {role}. \
             Judge only job-relevant evidence."
        ),
        None => "You are a fair, structured recruiting screener. Judge only job-relevant evidence."
            .to_string(),
    };

    let out = client(offline)
        .generate_structured(
            &FeatureRequest {
                feature: "candidate_screening".to_string(),
                system: Some(system),
                prompt: prompt.to_string(),
                schema_hint: Some(SCHEMA_HINT.to_string()),
            },
            &AssessmentSchema::default(),
        )
        .await;

    print_json(&serde_json::json!({
        "assessment": out.parsed.value,
        "ok": out.parsed.ok,
        "parseError": out.parsed.parse_error,
        "validationErrors": out.parsed.validation_errors,
        "providerTier": out.response.provider_tier,
        "degraded": out.response.degraded,
        "metrics": out.response.metrics,
    }));
    Ok(())
}

pub async fn summarize(offline: bool, text: &str, max_sentences: u8) -> Result<(), String> {
    let response = client(offline)
        .summarize("notes_summary", text, max_sentences)
        .await;

    print_json(&serde_json::json!({
        "summary": response.text,
        "providerTier": response.provider_tier,
        "degraded": response.degraded,
        "metrics": response.metrics,
    }));
    Ok(())
}
