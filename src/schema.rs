//! The canonical candidate schema and everything derived from it.
//!
//! [`CANDIDATE_SCHEMA`] is a declarative, field-by-field description of the
//! JSON object the model must return. Three consumers read it:
//!
//! * [`render_example_shape`]: a hand-readable example object, used by
//!   [`crate::config::PromptStyle::ExampleShape`] prompts;
//! * [`render_format_instructions`]: a JSON-Schema block with per-field
//!   descriptions, used by [`crate::config::PromptStyle::FieldSchema`] prompts;
//! * [`validate`]: structural validation of a decoded reply.
//!
//! The serde field names of [`crate::output::CandidateRecord`] must match the
//! keys declared here; a unit test keeps them in sync.

use crate::date::MonthYear;
use crate::error::SchemaViolation;
use serde_json::{json, Map, Value};

/// Placeholder replaced by the sentinel date when descriptions are rendered.
const CURRENT_DATE_PLACEHOLDER: &str = "{current_date}";

/// Value type of a schema field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Text,
    /// A `MM-YYYY` string. The format is requested, not enforced.
    MonthYear,
    Boolean,
    TextList,
    ObjectList(&'static [FieldSpec]),
}

/// One field of the schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub ty: FieldType,
    pub description: &'static str,
    /// Whether `null` is an acceptable value. Absent keys are always accepted.
    pub nullable: bool,
}

const fn field(
    key: &'static str,
    ty: FieldType,
    description: &'static str,
    nullable: bool,
) -> FieldSpec {
    FieldSpec {
        key,
        ty,
        description,
        nullable,
    }
}

pub const EXPERIENCE_FIELDS: &[FieldSpec] = &[
    field("title", FieldType::Text, "Job title", true),
    field("company", FieldType::Text, "Company name", true),
    field(
        "start_date",
        FieldType::MonthYear,
        "MM-YYYY. If only a year is given, use 01-YYYY.",
        true,
    ),
    field(
        "end_date",
        FieldType::MonthYear,
        "MM-YYYY. If Present/Actual/Current, use {current_date}.",
        true,
    ),
    field(
        "activities",
        FieldType::TextList,
        "Every explicitly stated activity, one bullet per item.",
        false,
    ),
    field(
        "tech_stack",
        FieldType::TextList,
        "Tools and technologies for this role.",
        true,
    ),
];

pub const EDUCATION_FIELDS: &[FieldSpec] = &[
    field("institution", FieldType::Text, "University or school name", true),
    field("degree", FieldType::Text, "Degree or certificate name", true),
    field("date", FieldType::Text, "MM-YYYY or date range", true),
];

pub const CANDIDATE_SCHEMA: &[FieldSpec] = &[
    field("name", FieldType::Text, "Full name of the candidate", true),
    field("email", FieldType::Text, "Email address", true),
    field(
        "phone",
        FieldType::Text,
        "Phone number without spaces if possible",
        true,
    ),
    field(
        "description",
        FieldType::Text,
        "Profile description from the top of the text",
        true,
    ),
    field(
        "experience",
        FieldType::ObjectList(EXPERIENCE_FIELDS),
        "Work history, in document order",
        false,
    ),
    field(
        "education",
        FieldType::ObjectList(EDUCATION_FIELDS),
        "Academic history, in document order",
        false,
    ),
    field(
        "skills",
        FieldType::TextList,
        "Explicit list of skills found in the Skills/Tools section",
        false,
    ),
    field(
        "employed",
        FieldType::Boolean,
        "True if any experience end_date is {current_date}, else false",
        true,
    ),
    field(
        "languages",
        FieldType::TextList,
        "Spoken (non-programming) languages",
        false,
    ),
    field(
        "certifications",
        FieldType::TextList,
        "Certifications obtained",
        false,
    ),
    field("linkedin", FieldType::Text, "LinkedIn URL", true),
    field("github", FieldType::Text, "GitHub URL", true),
    field("current_location", FieldType::Text, "City/Country", true),
];

fn describe(spec: &FieldSpec, current_date: MonthYear) -> String {
    spec.description
        .replace(CURRENT_DATE_PLACEHOLDER, &current_date.to_string())
}

// ── Example shape ─────────────────────────────────────────────────────────

/// Render the schema as an indented example JSON object.
///
/// Leaves are placeholders such as `"string or null"` or `"MM-YYYY"`, the way
/// a person would sketch the expected shape.
pub fn render_example_shape(fields: &[FieldSpec]) -> String {
    let mut out = String::new();
    write_example_object(&mut out, fields, 0);
    out
}

fn write_example_object(out: &mut String, fields: &[FieldSpec], depth: usize) {
    let pad = "    ".repeat(depth + 1);
    out.push_str("{\n");
    for (i, spec) in fields.iter().enumerate() {
        out.push_str(&pad);
        out.push_str(&format!("\"{}\": ", spec.key));
        match spec.ty {
            FieldType::ObjectList(inner) => {
                out.push_str("[\n");
                out.push_str(&"    ".repeat(depth + 2));
                write_example_object(out, inner, depth + 2);
                out.push('\n');
                out.push_str(&pad);
                out.push(']');
            }
            _ => out.push_str(&example_leaf(spec)),
        }
        if i + 1 < fields.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&"    ".repeat(depth));
    out.push('}');
}

fn example_leaf(spec: &FieldSpec) -> String {
    let base = match spec.ty {
        FieldType::Text => "string",
        FieldType::MonthYear => "MM-YYYY",
        FieldType::Boolean => "boolean",
        FieldType::TextList => return "[\"string\"]".to_string(),
        FieldType::ObjectList(_) => unreachable!("object lists are written by the caller"),
    };
    if spec.nullable {
        format!("\"{base} or null\"")
    } else {
        format!("\"{base}\"")
    }
}

// ── Format instructions ──────────────────────────────────────────────────

/// Build the JSON Schema document for `fields`.
pub fn json_schema(fields: &[FieldSpec], current_date: MonthYear) -> Value {
    let mut properties = Map::new();
    for spec in fields {
        properties.insert(spec.key.to_string(), field_schema(spec, current_date));
    }
    json!({
        "title": "CandidateRecord",
        "type": "object",
        "properties": properties,
    })
}

fn field_schema(spec: &FieldSpec, current_date: MonthYear) -> Value {
    let mut schema = match spec.ty {
        FieldType::Text => json!({ "type": nullable_type("string", spec.nullable) }),
        FieldType::MonthYear => json!({
            "type": nullable_type("string", spec.nullable),
            "pattern": "^(0[1-9]|1[0-2])-\\d{4}$",
        }),
        FieldType::Boolean => json!({ "type": nullable_type("boolean", spec.nullable) }),
        FieldType::TextList => json!({
            "type": nullable_type("array", spec.nullable),
            "items": { "type": "string" },
        }),
        FieldType::ObjectList(inner) => {
            let mut properties = Map::new();
            for f in inner {
                properties.insert(f.key.to_string(), field_schema(f, current_date));
            }
            json!({
                "type": nullable_type("array", spec.nullable),
                "items": { "type": "object", "properties": properties },
            })
        }
    };
    if let Value::Object(ref mut map) = schema {
        map.insert(
            "description".to_string(),
            Value::String(describe(spec, current_date)),
        );
    }
    schema
}

fn nullable_type(name: &str, nullable: bool) -> Value {
    if nullable {
        json!([name, "null"])
    } else {
        json!(name)
    }
}

/// Render the format-instructions block for schema-driven prompts.
pub fn render_format_instructions(fields: &[FieldSpec], current_date: MonthYear) -> String {
    let schema = json_schema(fields, current_date);
    // Serialising a `Value` cannot fail.
    let pretty = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "The output must be a single JSON object that conforms to the JSON schema below.\n\
Use exactly the property names shown. Use null for missing scalar values and [] for missing lists.\n\n\
{pretty}"
    )
}

// ── Validation ────────────────────────────────────────────────────────────

/// Check `value` against `fields`.
///
/// Absent keys are accepted; unknown keys are ignored. Returns every
/// violation found, in document order.
pub fn validate(value: &Value, fields: &[FieldSpec]) -> Result<(), Vec<SchemaViolation>> {
    let mut violations = Vec::new();
    match value {
        Value::Object(map) => validate_object(map, fields, "", &mut violations),
        other => violations.push(SchemaViolation {
            path: "$".to_string(),
            message: format!("expected object, got {}", type_name(other)),
        }),
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn validate_object(
    map: &Map<String, Value>,
    fields: &[FieldSpec],
    prefix: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    for spec in fields {
        let Some(v) = map.get(spec.key) else {
            continue;
        };
        let path = if prefix.is_empty() {
            spec.key.to_string()
        } else {
            format!("{prefix}.{}", spec.key)
        };
        validate_value(v, spec, &path, violations);
    }
}

fn validate_value(v: &Value, spec: &FieldSpec, path: &str, violations: &mut Vec<SchemaViolation>) {
    if v.is_null() {
        if !spec.nullable {
            violations.push(mismatch(path, expected_name(spec.ty), v));
        }
        return;
    }
    match spec.ty {
        FieldType::Text | FieldType::MonthYear => {
            if !v.is_string() {
                violations.push(mismatch(path, "string", v));
            }
        }
        FieldType::Boolean => {
            if !v.is_boolean() {
                violations.push(mismatch(path, "boolean", v));
            }
        }
        FieldType::TextList => match v.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        violations.push(mismatch(&format!("{path}[{i}]"), "string", item));
                    }
                }
            }
            None => violations.push(mismatch(path, "array", v)),
        },
        FieldType::ObjectList(inner) => match v.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    match item.as_object() {
                        Some(obj) => validate_object(obj, inner, &item_path, violations),
                        None => violations.push(mismatch(&item_path, "object", item)),
                    }
                }
            }
            None => violations.push(mismatch(path, "array", v)),
        },
    }
}

fn expected_name(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Text | FieldType::MonthYear => "string",
        FieldType::Boolean => "boolean",
        FieldType::TextList | FieldType::ObjectList(_) => "array",
    }
}

fn mismatch(path: &str, expected: &str, got: &Value) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message: format!("expected {expected}, got {}", type_name(got)),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
