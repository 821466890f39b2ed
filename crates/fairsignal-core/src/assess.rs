//! Structured-output validation for model-generated assessments.
//!
//! Models return free-form text that usually contains a JSON object, often
//! wrapped in prose or markdown fences, and sometimes malformed. This module
//! turns that text into a stable internal shape for the rest of the app:
//! callers always get a fully populated, schema-valid `Assessment`, even on
//! total parse failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hiring recommendation emitted by a screening assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Interview,
    Screen,
    Hold,
    Reject,
}

impl Recommendation {
    fn from_loose(value: &Value) -> Option<Self> {
        let s = match value {
            Value::String(s) => s.trim().to_uppercase(),
            _ => return None,
        };
        match s.as_str() {
            "INTERVIEW" => Some(Recommendation::Interview),
            "SCREEN" => Some(Recommendation::Screen),
            "HOLD" => Some(Recommendation::Hold),
            "REJECT" => Some(Recommendation::Reject),
            _ => None,
        }
    }
}

/// Declarative constraints for one assessment shape.
#[derive(Debug, Clone)]
pub struct AssessmentSchema {
    pub score_min: i64,
    pub score_max: i64,
    pub default_score: i64,
    pub default_recommendation: Recommendation,
    pub default_summary: &'static str,
}

impl Default for AssessmentSchema {
    fn default() -> Self {
        Self {
            score_min: 0,
            score_max: 100,
            default_score: 75,
            default_recommendation: Recommendation::Screen,
            default_summary: "Candidate screening completed.",
        }
    }
}

/// Normalized assessment value. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub score: i64,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub summary: String,
    pub recommendation: Recommendation,
}

/// Result of parsing raw model text against a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    pub ok: bool,
    pub value: Assessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub validation_errors: Vec<String>,
}

impl AssessmentSchema {
    pub fn default_value(&self) -> Assessment {
        Assessment {
            score: self.default_score,
            strengths: Vec::new(),
            concerns: Vec::new(),
            summary: self.default_summary.to_string(),
            recommendation: self.default_recommendation,
        }
    }

    /// Parse arbitrary model output into a schema-valid assessment.
    ///
    /// Never fails: on malformed input the schema defaults are returned with
    /// `ok=false` and a descriptive `parse_error`.
    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let Some(candidate) = extract_json_block(raw) else {
            return ParseOutcome {
                ok: false,
                value: self.default_value(),
                parse_error: Some("No JSON object found in model output.".to_string()),
                validation_errors: Vec::new(),
            };
        };

        let doc: Value = match serde_json::from_str(&candidate) {
            Ok(v) => v,
            Err(e) => {
                return ParseOutcome {
                    ok: false,
                    value: self.default_value(),
                    parse_error: Some(format!("JSON parse failed: {e}")),
                    validation_errors: Vec::new(),
                };
            }
        };

        let Some(obj) = doc.as_object() else {
            return ParseOutcome {
                ok: false,
                value: self.default_value(),
                parse_error: Some("Parsed value is not an object.".to_string()),
                validation_errors: Vec::new(),
            };
        };

        let mut notes = Vec::new();

        let score = match obj.get("score") {
            Some(v) => match coerce_number(v) {
                Some(n) => {
                    let clamped = n.round() as i64;
                    let clamped = clamped.clamp(self.score_min, self.score_max);
                    if (clamped as f64 - n).abs() > 0.5 {
                        notes.push(format!("score {n} clamped to {clamped}"));
                    }
                    clamped
                }
                None => {
                    notes.push("score is not numeric; defaulted".to_string());
                    self.default_score
                }
            },
            None => {
                notes.push("score missing; defaulted".to_string());
                self.default_score
            }
        };

        let strengths = string_list(obj.get("strengths"));
        let concerns = string_list(obj.get("concerns"));

        let summary = match obj.get("summary").and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                notes.push("summary missing or empty; defaulted".to_string());
                self.default_summary.to_string()
            }
        };

        let recommendation = match obj.get("recommendation") {
            Some(v) => Recommendation::from_loose(v).unwrap_or_else(|| {
                notes.push(format!("recommendation {v} not in allowed set; defaulted"));
                self.default_recommendation
            }),
            None => {
                notes.push("recommendation missing; defaulted".to_string());
                self.default_recommendation
            }
        };

        ParseOutcome {
            ok: true,
            value: Assessment {
                score,
                strengths,
                concerns,
                summary,
                recommendation,
            },
            parse_error: None,
            validation_errors: notes,
        }
    }
}

fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Trim, drop empties, and de-duplicate preserving first occurrence.
fn string_list(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if let Value::String(s) = item {
            let s = s.trim();
            if !s.is_empty() && !out.iter().any(|existing| existing == s) {
                out.push(s.to_string());
            }
        }
    }
    out
}

/// Pull the best JSON candidate out of raw model text.
///
/// Prefers a fenced ```json block; otherwise scans for the first *balanced*
/// `{...}` span. The scanner is string-aware so braces inside JSON string
/// values cannot truncate or over-extend the match.
fn extract_json_block(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let fence = regex::Regex::new(r"(?is)```(?:json)?\s*(.*?)\s*```").unwrap();
    if let Some(caps) = fence.captures(trimmed) {
        let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
    }

    first_balanced_object(trimmed)
}

fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AssessmentSchema {
        AssessmentSchema::default()
    }

    #[test]
    fn parses_clean_json() {
        let raw = r#"{"score": 82, "strengths": ["rust", "rust", " distributed systems "],
            "concerns": [""], "summary": "Solid fit.", "recommendation": "interview"}"#;
        let out = schema().parse(raw);
        assert!(out.ok);
        assert_eq!(out.value.score, 82);
        assert_eq!(out.value.strengths, vec!["rust", "distributed systems"]);
        assert!(out.value.concerns.is_empty());
        assert_eq!(out.value.recommendation, Recommendation::Interview);
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "Here you go:\n```json\n{\"score\": 55, \"summary\": \"ok\", \"recommendation\": \"HOLD\"}\n```";
        let out = schema().parse(raw);
        assert!(out.ok);
        assert_eq!(out.value.score, 55);
        assert_eq!(out.value.recommendation, Recommendation::Hold);
    }

    #[test]
    fn balanced_scan_survives_braces_in_strings() {
        let raw = r#"Prelude {not json} real: {"score": 90, "summary": "uses {braces} inside", "recommendation": "INTERVIEW"} trailing {"score": 1}"#;
        // First balanced span is the prose "{not json}" which fails to decode;
        // the defaulting contract still holds.
        let out = schema().parse(raw);
        assert!(!out.ok);
        assert_eq!(out.value, schema().default_value());
    }

    #[test]
    fn nested_objects_are_brace_matched() {
        let raw = r#"{"score": 64, "summary": "x", "recommendation": "SCREEN", "extra": {"nested": {"deep": "}"}}} {"score": 2}"#;
        let out = schema().parse(raw);
        assert!(out.ok);
        assert_eq!(out.value.score, 64);
    }

    #[test]
    fn total_garbage_yields_defaults_not_panic() {
        let out = schema().parse("no json here at all");
        assert!(!out.ok);
        assert_eq!(out.value, schema().default_value());
        assert!(out.parse_error.is_some());
    }

    #[test]
    fn clamps_and_rounds_score() {
        let out = schema().parse(r#"{"score": 140.7}"#);
        assert!(out.ok);
        assert_eq!(out.value.score, 100);
        let out = schema().parse(r#"{"score": -3}"#);
        assert_eq!(out.value.score, 0);
        let out = schema().parse(r#"{"score": "61.4"}"#);
        assert_eq!(out.value.score, 61);
    }

    #[test]
    fn unknown_recommendation_falls_back() {
        let out = schema().parse(r#"{"score": 50, "recommendation": "MAYBE"}"#);
        assert!(out.ok);
        assert_eq!(out.value.recommendation, Recommendation::Screen);
        assert!(out
            .validation_errors
            .iter()
            .any(|n| n.contains("recommendation")));
    }

    #[test]
    fn parse_is_idempotent() {
        let first = schema().parse(r#"{"score": 250, "strengths": [" a ", "a"], "recommendation": "hold"}"#);
        let reserialized = serde_json::to_string(&first.value).unwrap();
        let second = schema().parse(&reserialized);
        assert!(second.ok);
        assert_eq!(first.value, second.value);
    }
}
