//! Response-text extraction.
//!
//! Providers wrap generated text in different envelopes. Rather than ad hoc
//! shape-sniffing branches, the known envelopes are an explicit ordered list
//! of named extractors tried in sequence against the decoded document; the
//! first non-empty match wins.

use serde_json::Value;

type Extractor = fn(&Value) -> Option<String>;

/// Envelope extractors in priority order.
const EXTRACTORS: &[(&str, Extractor)] = &[
    ("output.message.content[].text", output_message_content),
    ("content[].text", content_blocks),
    ("choices[0].message.content", chat_choice),
    ("outputText", output_text),
    ("results[0].outputText", results_output_text),
    ("text", top_level_text),
];

/// Extract generated text from a decoded provider response.
///
/// Falls back to the compact JSON rendering of the whole document when no
/// envelope matches, so callers always get *something* inspectable.
pub fn text_from_document(doc: &Value) -> String {
    if let Value::String(s) = doc {
        return clean(s);
    }
    for (_, extractor) in EXTRACTORS {
        if let Some(text) = extractor(doc) {
            let text = clean(&text);
            if !text.is_empty() {
                return text;
            }
        }
    }
    clean(&doc.to_string())
}

/// Collapse internal whitespace runs and trim.
pub fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text_block(blocks: &Value) -> Option<String> {
    blocks.as_array()?.iter().find_map(|block| {
        block
            .get("text")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
    })
}

fn output_message_content(doc: &Value) -> Option<String> {
    first_text_block(doc.get("output")?.get("message")?.get("content")?)
}

fn content_blocks(doc: &Value) -> Option<String> {
    first_text_block(doc.get("content")?)
}

fn chat_choice(doc: &Value) -> Option<String> {
    doc.get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn output_text(doc: &Value) -> Option<String> {
    doc.get("outputText")?.as_str().map(|s| s.to_string())
}

fn results_output_text(doc: &Value) -> Option<String> {
    doc.get("results")?
        .as_array()?
        .first()?
        .get("outputText")?
        .as_str()
        .map(|s| s.to_string())
}

fn top_level_text(doc: &Value) -> Option<String> {
    doc.get("text")?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_envelope_wins() {
        let doc = json!({
            "output": {"message": {"content": [{"type": "text", "text": "hello  world"}]}},
            "text": "should not be used"
        });
        assert_eq!(text_from_document(&doc), "hello world");
    }

    #[test]
    fn content_blocks_envelope() {
        let doc = json!({"content": [{"type": "text", "text": " from blocks "}]});
        assert_eq!(text_from_document(&doc), "from blocks");
    }

    #[test]
    fn chat_completions_envelope() {
        let doc = json!({"choices": [{"message": {"role": "assistant", "content": "chat reply"}}]});
        assert_eq!(text_from_document(&doc), "chat reply");
    }

    #[test]
    fn legacy_output_text_fields() {
        assert_eq!(text_from_document(&json!({"outputText": "a"})), "a");
        assert_eq!(
            text_from_document(&json!({"results": [{"outputText": "b"}]})),
            "b"
        );
        assert_eq!(text_from_document(&json!({"text": "c"})), "c");
    }

    #[test]
    fn unknown_envelope_falls_back_to_json() {
        let doc = json!({"weird": 1});
        assert_eq!(text_from_document(&doc), "{\"weird\":1}");
    }

    #[test]
    fn empty_match_falls_through_to_next_extractor() {
        let doc = json!({"content": [{"text": "   "}], "text": "fallback"});
        assert_eq!(text_from_document(&doc), "fallback");
    }
}
