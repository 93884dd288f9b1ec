//! Turns raw provider text into fixed-shape records.
//!
//! Two readers exist: the labeled-line reader for the remediation task and the
//! JSON reader for everything else. Neither fails on malformed text; they
//! degrade to empty/default records and log why.

use aho_corasick::{AhoCorasick, Anchored, Input, MatchKind, StartKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::CopilotError;
use crate::records::{FullAnalysisResult, RemediationResult, DEFAULT_CONFIDENCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Remediation,
    Explanation,
    Action,
    Confidence,
}

const LABELS: [(&str, Field); 8] = [
    ("remediation steps:", Field::Remediation),
    ("remediation:", Field::Remediation),
    ("why:", Field::Explanation),
    ("explanation:", Field::Explanation),
    ("recommended action:", Field::Action),
    ("recommendation:", Field::Action),
    ("confidence score:", Field::Confidence),
    ("confidence:", Field::Confidence),
];

static LABEL_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .start_kind(StartKind::Anchored)
        .build(LABELS.iter().map(|(label, _)| label))
        .expect("label patterns are static and valid")
});

static LINE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•>]+\s*|\d+[.)]\s*)?").expect("line marker pattern is valid")
});

/// Read the `Remediation:` / `Why:` / `Recommended Action:` / `Confidence:` format.
///
/// Labels match case-insensitively at the start of a line, after optional list
/// markers and bold emphasis. Unlabeled lines are dropped and a repeated label
/// keeps its last value.
pub fn parse_labeled(text: &str) -> RemediationResult {
    let mut result = RemediationResult::default();
    let mut confidence = None;
    for raw_line in text.lines() {
        let line = raw_line.replace("**", "");
        let stripped = LINE_MARKER.replace(&line, "");
        let body: &str = &stripped;
        let Some(found) = LABEL_MATCHER.find(Input::new(body).anchored(Anchored::Yes)) else {
            continue;
        };
        let value = body[found.end()..].trim().to_string();
        match LABELS[found.pattern().as_usize()].1 {
            Field::Remediation => result.remediation_steps = value,
            Field::Explanation => result.explanation = value,
            Field::Action => result.recommended_action = value,
            Field::Confidence => confidence = Some(parse_confidence_text(&value)),
        }
    }
    result.confidence_score = confidence.unwrap_or(DEFAULT_CONFIDENCE);
    result
}

/// Read the full-analysis JSON object; any structural failure yields an empty record.
pub fn parse_full_analysis(text: &str) -> FullAnalysisResult {
    let object = match parse_json_object(text, '{') {
        Ok(object) => object,
        Err(err) => {
            warn!(error = %err, "discarding unparseable analysis response");
            return FullAnalysisResult::default();
        }
    };
    FullAnalysisResult {
        checklist: string_list(&object, &["checklist"]),
        broker_questions: string_list(&object, &["broker_questions", "questions"]),
        risk_mitigation: string_list(&object, &["risk_mitigation", "suggestions"]),
        remediation_steps: text_field(&object, &["remediation", "remediation_steps"]),
        recommended_action: text_field(&object, &["recommendation", "recommended_action"]),
        confidence_score: confidence_field(&object, &["confidence", "confidence_score"]),
        broker_summary: text_field(&object, &["broker_summary"]),
        explanation: text_field(&object, &["explanation", "why"]),
    }
}

/// Read a list of strings from either an object holding `key` or a bare JSON array.
///
/// The object reading is tried first: keyed answers carry their list inside an
/// array, so slicing on `[` would drop the key check. A broken answer that opens
/// as an object is not salvaged through its inner arrays.
pub fn parse_string_list(text: &str, key: &str) -> Vec<String> {
    let object_err = match parse_json_object(text, '{') {
        Ok(object) => return string_list(&object, &[key]),
        Err(err) => err,
    };
    let opens_as_object = match (text.find('{'), text.find('[')) {
        (Some(brace), Some(bracket)) => brace < bracket,
        (Some(_), None) => true,
        _ => false,
    };
    if opens_as_object {
        warn!(error = %object_err, key, "discarding unparseable list response");
        return Vec::new();
    }
    match parse_json(text, '[') {
        Ok(Value::Array(items)) => collect_strings(&items),
        Ok(other) => {
            debug!(key, found = kind_of(&other), "list response was neither array nor object");
            Vec::new()
        }
        Err(err) => {
            warn!(error = %err, key, "discarding unparseable list response");
            Vec::new()
        }
    }
}

/// Clamp a provider confidence into `0.0..=1.0`; non-finite values fall back to the default.
pub fn bounded_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        warn!(raw, "non-finite confidence replaced with default");
        return DEFAULT_CONFIDENCE;
    }
    if !(0.0..=1.0).contains(&raw) {
        warn!(raw, "confidence outside 0..=1 clamped");
    }
    raw.clamp(0.0, 1.0)
}

fn parse_confidence_text(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(parsed) => bounded_confidence(parsed),
        Err(_) => {
            debug!(value, "non-numeric confidence; using default");
            DEFAULT_CONFIDENCE
        }
    }
}

fn parse_json_object(text: &str, open: char) -> Result<Map<String, Value>, CopilotError> {
    match parse_json(text, open)? {
        Value::Object(object) => Ok(object),
        other => Err(CopilotError::MalformedResponse(format!(
            "expected a JSON object, found {}",
            kind_of(&other)
        ))),
    }
}

/// Strict parse, then one retry with single quotes normalized to double quotes.
/// Nothing else is repaired: unquoted keys, trailing commas, raw newlines in
/// strings and truncated payloads all fail.
fn parse_json(text: &str, open: char) -> Result<Value, CopilotError> {
    let payload = extract_json_payload(text, open);
    if payload.is_empty() {
        return Err(CopilotError::MalformedResponse("empty response".into()));
    }
    let strict_err = match serde_json::from_str::<Value>(&payload) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    if !payload.contains('\'') {
        return Err(CopilotError::MalformedResponse(strict_err.to_string()));
    }
    let requoted = payload.replace('\'', "\"");
    serde_json::from_str::<Value>(&requoted).map_err(|err| {
        debug!(payload = %payload, "quote-normalized JSON parse failed");
        CopilotError::MalformedResponse(err.to_string())
    })
}

fn extract_json_payload(raw: &str, open: char) -> String {
    let trimmed = raw.trim();
    let body = strip_code_fence(trimmed).unwrap_or_else(|| trimmed.to_string());
    embedded_json(&body, open).unwrap_or(body)
}

fn strip_code_fence(input: &str) -> Option<String> {
    let start = input.find("```")?;
    let mut rest = input[start + 3..].trim_start_matches(|c: char| c.is_ascii_whitespace());
    if let Some(after_tag) = rest.strip_prefix("json") {
        rest = after_tag.trim_start_matches(|c: char| c.is_ascii_whitespace());
    }
    let end = rest.find("```").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

/// Slice from the first `open` delimiter to the last matching close out of surrounding prose.
fn embedded_json(body: &str, open: char) -> Option<String> {
    let close = if open == '{' { '}' } else { ']' };
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    (end > start).then(|| body[start..=end].to_string())
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn string_list(object: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    match lookup(object, keys) {
        Some(Value::Array(items)) => collect_strings(items),
        Some(Value::String(single)) => non_blank(single).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn collect_strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => non_blank(text),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .collect()
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> String {
    match lookup(object, keys) {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(items)) => collect_strings(items).join("\n"),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn confidence_field(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match lookup(object, keys)? {
        Value::Number(number) => number.as_f64().map(bounded_confidence),
        Value::String(text) => Some(parse_confidence_text(text)),
        _ => Some(DEFAULT_CONFIDENCE),
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
