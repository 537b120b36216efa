//! Reply decoding: turn the raw model text into a [`CandidateRecord`].
//!
//! Small local models often ignore "no fences" and wrap the object in
//! ```` ```json ```` or add a sentence before it. Decoding therefore takes the
//! outermost `{ … }` span of the reply before parsing.

use crate::config::PromptStyle;
use crate::date::MonthYear;
use crate::error::ExtractError;
use crate::output::{Advisory, CandidateRecord};
use crate::schema::{validate, CANDIDATE_SCHEMA};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```(?:json|JSON)?[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Strip code fences and surrounding prose, returning the JSON object span.
///
/// Returns the trimmed input unchanged when no `{ … }` span exists, so the
/// parser can report a meaningful error.
pub fn json_span(raw: &str) -> &str {
    let body = match RE_OUTER_FENCES.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => raw,
    };
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body.trim(),
    }
}

/// Parse the reply as a JSON object without interpreting it.
pub fn parse_object(raw: &str) -> Result<Value, ExtractError> {
    let span = json_span(raw);
    let value: Value =
        serde_json::from_str(span).map_err(|e| ExtractError::InvalidResponseFormat {
            detail: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(ExtractError::InvalidResponseFormat {
            detail: format!("expected a JSON object, got {}", type_name(&value)),
        });
    }
    Ok(value)
}

/// Decode a model reply.
///
/// [`PromptStyle::FieldSchema`] replies are validated against
/// [`CANDIDATE_SCHEMA`]; [`PromptStyle::ExampleShape`] replies only need to be
/// a JSON object and mistyped fields degrade to empty. Duplicate skills are
/// dropped in both cases.
pub fn decode_response(raw: &str, style: PromptStyle) -> Result<CandidateRecord, ExtractError> {
    let value = parse_object(raw)?;

    if style == PromptStyle::FieldSchema {
        validate(&value, CANDIDATE_SCHEMA)
            .map_err(|violations| ExtractError::SchemaValidationFailed { violations })?;
    }

    let mut record: CandidateRecord =
        serde_json::from_value(value).map_err(|e| ExtractError::InvalidResponseFormat {
            detail: e.to_string(),
        })?;
    record.dedup_skills();
    debug!("Decoded record with {} filled fields", record.filled_fields());
    Ok(record)
}

/// Check a decoded record against the date and employment rules, logging
/// each advisory. The record is left as the model produced it.
pub fn lint_record(record: &CandidateRecord, sentinel: MonthYear) -> Vec<Advisory> {
    let advisories = record.lint(sentinel);
    for advisory in &advisories {
        warn!("Advisory: {}", advisory);
    }
    advisories
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
