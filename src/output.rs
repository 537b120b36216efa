//! Output types: the extracted candidate record and run metadata.
//!
//! Every record field tolerates absence. The model is asked for evidence
//! only, so any key may be missing or `null`; [`CandidateRecord`] maps both to
//! `None` or an empty list instead of failing the whole document.

use crate::date::{is_month_year, MonthYear};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ── Candidate record ─────────────────────────────────────────────────────

/// Structured data extracted from one CV.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::object_list")]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default, deserialize_with = "lenient::object_list")]
    pub education: Vec<EducationEntry>,
    /// A set in meaning; first-occurrence order is kept.
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub employed: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub languages: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub certifications: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub linkedin: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub github: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub current_location: Option<String>,
}

/// One role in the work history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub company: Option<String>,
    /// `MM-YYYY` when the model followed the date rules.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub start_date: Option<String>,
    /// `MM-YYYY`, or the sentinel for open-ended roles.
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub activities: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub tech_stack: Option<Vec<String>>,
}

/// One entry of the academic history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub institution: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub degree: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub date: Option<String>,
}

impl CandidateRecord {
    /// Drop repeated skills, keeping the first occurrence.
    pub fn dedup_skills(&mut self) {
        let mut seen = HashSet::new();
        self.skills.retain(|s| seen.insert(s.clone()));
    }

    /// Number of top-level fields carrying a value.
    pub fn filled_fields(&self) -> usize {
        let scalars = [
            &self.name,
            &self.email,
            &self.phone,
            &self.description,
            &self.linkedin,
            &self.github,
            &self.current_location,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count();
        let lists = [
            self.skills.is_empty(),
            self.languages.is_empty(),
            self.certifications.is_empty(),
            self.experience.is_empty(),
            self.education.is_empty(),
        ]
        .iter()
        .filter(|empty| !**empty)
        .count();
        scalars + lists + usize::from(self.employed.is_some())
    }

    /// True when at least one role ends on `sentinel`.
    pub fn has_open_role(&self, sentinel: MonthYear) -> bool {
        let sentinel = sentinel.to_string();
        self.experience
            .iter()
            .any(|e| e.end_date.as_deref() == Some(sentinel.as_str()))
    }

    /// Check the record against the date and employment rules given to the
    /// model. Advisory only: the record is never modified.
    pub fn lint(&self, sentinel: MonthYear) -> Vec<Advisory> {
        let mut advisories = Vec::new();

        for (i, entry) in self.experience.iter().enumerate() {
            for (field, value) in [("start_date", &entry.start_date), ("end_date", &entry.end_date)] {
                if let Some(v) = value {
                    if !is_month_year(v) {
                        advisories.push(Advisory::DateNotNormalised {
                            path: format!("experience[{i}].{field}"),
                            value: v.clone(),
                        });
                    }
                }
            }
        }

        let expected = self.has_open_role(sentinel);
        if self.employed.unwrap_or(false) != expected {
            advisories.push(Advisory::EmploymentMismatch {
                employed: self.employed,
                expected,
            });
        }

        advisories
    }
}

/// A non-fatal observation about a decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// A work-history date is not in `MM-YYYY` form.
    DateNotNormalised { path: String, value: String },
    /// `employed` disagrees with the open-role rule.
    EmploymentMismatch {
        employed: Option<bool>,
        expected: bool,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::DateNotNormalised { path, value } => {
                write!(f, "{path} is '{value}', expected MM-YYYY")
            }
            Advisory::EmploymentMismatch { employed, expected } => write!(
                f,
                "employed is {employed:?} but the open-role rule gives {expected}"
            ),
        }
    }
}

// ── Run metadata ─────────────────────────────────────────────────────────

/// Container format detected by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    /// Plain text or Markdown, passed through unchanged.
    Text,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Text => "text",
        };
        f.write_str(s)
    }
}

/// What the loader learned about the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// The input as given by the caller (path or URL).
    pub source: String,
    pub format: DocumentFormat,
    /// Page count, for paginated formats.
    pub page_count: Option<usize>,
    pub title: Option<String>,
    /// Length of the Markdown handed to the model, in characters.
    pub markdown_chars: usize,
}

/// A converted document, before any model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub info: DocumentInfo,
    pub markdown: String,
}

/// Timing and token accounting for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub conversion_ms: u64,
    pub inference_ms: u64,
    pub total_ms: u64,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Extra attempts made after transient provider failures.
    pub retries: u32,
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub record: CandidateRecord,
    /// `None` when the caller supplied Markdown directly.
    pub document: Option<DocumentInfo>,
    pub advisories: Vec<Advisory>,
    pub stats: ExtractionStats,
}

// ── Lenient field decoding ───────────────────────────────────────────────

/// Deserializers that degrade a mistyped field to empty instead of failing.
///
/// Schema-checked replies never reach the fallback arms; example-shape
/// replies are only required to be a JSON object.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    fn strings(v: Value) -> Vec<String> {
        match v {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Value::String(s) if !s.trim().is_empty() => vec![s],
            _ => Vec::new(),
        }
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(strings(Value::deserialize(d)?))
    }

    pub fn opt_string_list<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Vec<String>>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            other => Some(strings(other)),
        })
    }

    pub fn object_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CANDIDATE_SCHEMA;
    use serde_json::json;

    fn sentinel() -> MonthYear {
        MonthYear::new(10, 2026).unwrap()
    }

    #[test]
    fn serialized_keys_match_schema() {
        let value = serde_json::to_value(CandidateRecord::default()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        let schema_keys: Vec<&str> = CANDIDATE_SCHEMA.iter().map(|f| f.key).collect();
        assert_eq!(keys, schema_keys);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let record: CandidateRecord = serde_json::from_value(json!({ "name": "Ada" })).unwrap();
        assert_eq!(record.name.as_deref(), Some("Ada"));
        assert!(record.experience.is_empty());
        assert_eq!(record.employed, None);
    }

    #[test]
    fn mistyped_fields_degrade_instead_of_failing() {
        let record: CandidateRecord = serde_json::from_value(json!({
            "phone": 5551234,
            "skills": "Rust",
            "employed": "true",
            "experience": [{ "title": "Dev", "activities": "one" }, 42],
            "languages": { "es": "native" }
        }))
        .unwrap();
        assert_eq!(record.phone.as_deref(), Some("5551234"));
        assert_eq!(record.skills, vec!["Rust"]);
        assert_eq!(record.employed, Some(true));
        assert_eq!(record.experience.len(), 1);
        assert_eq!(record.experience[0].activities, vec!["one"]);
        assert!(record.languages.is_empty());
    }

    #[test]
    fn dedup_skills_keeps_first_occurrence() {
        let mut record = CandidateRecord {
            skills: vec!["Rust".into(), "SQL".into(), "Rust".into(), "Go".into()],
            ..Default::default()
        };
        record.dedup_skills();
        assert_eq!(record.skills, vec!["Rust", "SQL", "Go"]);
    }

    #[test]
    fn lint_flags_employment_mismatch_for_open_role() {
        let record = CandidateRecord {
            employed: Some(false),
            experience: vec![ExperienceEntry {
                start_date: Some("01-2020".into()),
                end_date: Some("10-2026".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(record.has_open_role(sentinel()));
        assert_eq!(
            record.lint(sentinel()),
            vec![Advisory::EmploymentMismatch {
                employed: Some(false),
                expected: true
            }]
        );
    }

    #[test]
    fn lint_accepts_consistent_record() {
        let record = CandidateRecord {
            employed: Some(true),
            experience: vec![ExperienceEntry {
                start_date: Some("03-2021".into()),
                end_date: Some("10-2026".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(record.lint(sentinel()).is_empty());
    }

    #[test]
    fn lint_flags_unnormalised_dates() {
        let record = CandidateRecord {
            experience: vec![ExperienceEntry {
                start_date: Some("2020".into()),
                end_date: Some("Present".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let advisories = record.lint(sentinel());
        assert_eq!(advisories.len(), 2);
        assert_eq!(
            advisories[0].to_string(),
            "experience[0].start_date is '2020', expected MM-YYYY"
        );
    }

    #[test]
    fn filled_fields_counts_present_values() {
        assert_eq!(CandidateRecord::default().filled_fields(), 0);
        let record = CandidateRecord {
            name: Some("Ada".into()),
            skills: vec!["Rust".into()],
            employed: Some(false),
            ..Default::default()
        };
        assert_eq!(record.filled_fields(), 3);
    }

    #[test]
    fn tech_stack_is_omitted_when_absent() {
        let value = serde_json::to_value(ExperienceEntry::default()).unwrap();
        assert!(value.get("tech_stack").is_none());
    }
}
