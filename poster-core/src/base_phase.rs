//! Primitives shared by every phase: defensive parsing of the vision model's
//! JSON-in-text response, field normalizers, and the uniform error envelope
//! that keeps a thrown error from ever escaping `execute`.

use crate::error::CoreError;
use crate::external::{VisionProvider, VisionResponse};
use crate::phases::{PhaseName, PhaseResult};
use serde_json::{Map, Value};
use std::future::Future;
use std::path::Path;
use std::time::Instant;

/// Parse a vision response into a JSON object. Tries, in order:
/// 1. The first balanced `{...}` block in the text.
/// 2. The same, after stripping Markdown code fences (```json ... ``` or ``` ... ```).
/// 3. An empty object, with a warning recorded for the caller.
///
/// Never panics and never returns an `Err` — a parse failure is data, not an
/// exceptional condition.
pub fn parse_model_json(text: &str) -> (Map<String, Value>, Option<String>) {
    if let Some(obj) = try_parse_balanced(text) {
        return (obj, None);
    }

    let stripped = strip_code_fences(text);
    if let Some(obj) = try_parse_balanced(&stripped) {
        return (obj, None);
    }

    (
        Map::new(),
        Some("could not parse a JSON object out of the model response".to_string()),
    )
}

/// Find the first balanced `{...}` substring and parse it as a JSON object.
fn try_parse_balanced(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        let ch = byte as char;
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
                    end = Some(offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = end?;
    let candidate = &text[start..end];
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Trim a string field; absent if the result is empty.
pub fn normalize_string(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accept either a JSON array or a single string and return the trimmed,
/// non-empty entries in order.
pub fn normalize_string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => normalize_string(Some(s)).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Normalize a confidence value reported by the model into `[0, 1]`,
/// accepting either a unit fraction or a 0-100 percentage.
pub fn normalize_confidence(raw: f64) -> f64 {
    if raw > 1.0 {
        (raw / 100.0).clamp(0.0, 1.0)
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// A phrase bank a list entry must not equal, used to reject "headliner:
/// none" / "not specified" style non-answers from the model.
pub fn looks_like_non_answer(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    matches!(
        lower.as_str(),
        "none" | "n/a" | "na" | "not specified" | "not applicable" | "unknown" | "tbd" | "tba" | ""
    )
}

/// Reject a list entry that is implausibly long for a single name — almost
/// always a concatenation of several entries the model failed to split.
pub fn looks_concatenated(text: &str) -> bool {
    const MAX_LEN: usize = 80;
    text.len() > MAX_LEN && !text.contains(',') && !text.contains('&') && !text.contains('/')
}

/// Call the vision provider, tagging any failure as `CoreError::VisionProvider`
/// so the underlying cause (network, provider-side refusal, …) is
/// distinguishable from every other reason a phase can fail.
pub async fn call_vision(vision: &dyn VisionProvider, image_path: &Path, prompt: &str) -> anyhow::Result<VisionResponse> {
    vision
        .extract(image_path, prompt)
        .await
        .map_err(|error| anyhow::Error::new(CoreError::VisionProvider(error.to_string())))
}

/// Run a phase body, catching any error and turning it into the uniform
/// `failed` envelope instead of propagating. Every concrete phase's
/// `execute` is implemented as a thin wrapper around this.
pub async fn run_phase<F, Fut>(
    poster_id: &str,
    image_path: &str,
    phase: PhaseName,
    body: F,
) -> PhaseResult
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<PhaseResult>>,
{
    let start = Instant::now();
    match body().await {
        Ok(result) => result,
        Err(error) => {
            tracing::warn!(phase = phase.as_str(), poster_id, error = %error, "phase failed");
            PhaseResult::failed(
                poster_id,
                image_path,
                phase,
                start.elapsed().as_millis() as u64,
                error.to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_balanced_object() {
        let (obj, warning) = parse_model_json(r#"Sure! Here is the data: {"poster_type": "concert", "confidence": 90}"#);
        assert!(warning.is_none());
        assert_eq!(obj.get("poster_type"), Some(&json!("concert")));
    }

    #[test]
    fn parses_after_stripping_code_fences() {
        let text = "```json\n{\"a\": 1}\n```";
        let (obj, warning) = parse_model_json(text);
        assert!(warning.is_none());
        assert_eq!(obj.get("a"), Some(&json!(1)));
    }

    #[test]
    fn falls_back_to_empty_on_garbage() {
        let (obj, warning) = parse_model_json("not json at all, sorry");
        assert!(obj.is_empty());
        assert!(warning.is_some());
    }

    #[test]
    fn normalize_string_array_accepts_array_or_scalar() {
        assert_eq!(
            normalize_string_array(Some(&json!(["A", " ", "B "]))),
            vec!["A".to_string(), "B".to_string()]
        );
        assert_eq!(normalize_string_array(Some(&json!("Solo"))), vec!["Solo".to_string()]);
        assert_eq!(normalize_string_array(None), Vec::<String>::new());
    }

    #[test]
    fn normalize_confidence_accepts_percentages() {
        assert_eq!(normalize_confidence(90.0), 0.9);
        assert_eq!(normalize_confidence(0.45), 0.45);
        assert_eq!(normalize_confidence(150.0), 1.0);
    }

    #[test]
    fn rejects_non_answers_and_concatenations() {
        assert!(looks_like_non_answer("None"));
        assert!(looks_like_non_answer("not applicable"));
        assert!(!looks_like_non_answer("Radiohead"));
        assert!(looks_concatenated(&"x".repeat(90)));
        assert!(!looks_concatenated("Band One, Band Two"));
    }
}
