//! Prompt composition for CV extraction.
//!
//! Centralising every prompt here keeps prompt regressions testable without
//! a model: unit tests inspect the composed strings directly.
//!
//! Composition is pure. The "current date" sentinel arrives through
//! [`PromptInputs`]; nothing here reads the clock.

use crate::config::{ExtractionConfig, PromptStyle, TechStackPolicy};
use crate::date::MonthYear;
use crate::schema::{render_example_shape, render_format_instructions, CANDIDATE_SCHEMA};

/// Default rules block. `{current_date}` is replaced by the sentinel.
pub const DEFAULT_RULES: &str = r#"You are a strict Resume Extraction Engine. Your task is to parse a Markdown CV and extract its data into a precise JSON format.

CRITICAL RULES (ZERO HALLUCINATION):
1. EVIDENCE ONLY: Extract ONLY information explicitly written in the text. If a value is missing, use null.
2. NO INFERENCE: Do not guess locations or any value that is not written down.
3. NO DERIVED FACTS: Never compute ages, durations or totals.
4. LANGUAGE: Keep values in the original language of the CV.

DATE FORMATTING RULES (STRICT):
- Format every work date as "MM-YYYY" (string).
- If only a year is given (e.g. "2020"), return "01-2020".
- If a date says "Present", "Actual", "Current", "Actualidad", "Presente" or the equivalent in ANY language, you MUST return {current_date}.

ACTIVITY EXTRACTION:
- Extract EVERY bullet point under each job as a separate list item.
- Do NOT summarize or combine activities.

SKILL EXTRACTION:
- Skills are the explicit entries of the Skills/Tools section, without duplicates.

EMPLOYMENT STATUS:
- Set "employed" to true if any experience "end_date" is {current_date}; otherwise set it to false."#;

/// Appended after a rules override so the sentinel is always present.
const SENTINEL_RULE: &str = r#"CURRENT DATE:
- If a date says "Present", "Actual", "Current" or the equivalent in ANY language, return {current_date}.
- Set "employed" to true if any experience "end_date" is {current_date}; otherwise set it to false."#;

const TECH_STACK_EVIDENCE_RULE: &str = r#"TECH STACK:
- "tech_stack" lists only tools and technologies explicitly named for that role. Use [] if none are named."#;

const TECH_STACK_INFERRED_RULE: &str = r#"TECH STACK:
- "tech_stack" lists the tools and technologies used in that role. You MAY infer them from the described activities."#;

const OUTPUT_RULE: &str = r#"OUTPUT FORMAT:
- Output ONLY one JSON object.
- Do NOT wrap it in ``` fences.
- Do NOT add commentary or explanations."#;

/// Everything prompt composition depends on.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub style: PromptStyle,
    pub tech_stack: TechStackPolicy,
    pub current_date: MonthYear,
    pub context_tags: &'a [String],
    /// Replacement for [`DEFAULT_RULES`].
    pub rules_override: Option<&'a str>,
}

impl<'a> From<&'a ExtractionConfig> for PromptInputs<'a> {
    fn from(config: &'a ExtractionConfig) -> Self {
        Self {
            style: config.prompt_style,
            tech_stack: config.tech_stack,
            current_date: config.current_date,
            context_tags: &config.context_tags,
            rules_override: config.system_prompt.as_deref(),
        }
    }
}

/// Build the system message for one extraction.
///
/// Layout: rules (an override is followed by the current-date rule), tech-stack rule, schema section (example shape or format
/// instructions), output rule, then `Context Focus:` when tags are present.
pub fn compose_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let sentinel = inputs.current_date.to_string();
    let rules = match inputs.rules_override {
        Some(custom) => format!("{custom}\n\n{SENTINEL_RULE}"),
        None => DEFAULT_RULES.to_string(),
    }
    .replace("{current_date}", &sentinel);

    let tech_rule = match inputs.tech_stack {
        TechStackPolicy::EvidenceOnly => TECH_STACK_EVIDENCE_RULE,
        TechStackPolicy::Inferred => TECH_STACK_INFERRED_RULE,
    };

    let schema_section = match inputs.style {
        PromptStyle::ExampleShape => format!(
            "REQUIRED JSON STRUCTURE:\n{}",
            render_example_shape(CANDIDATE_SCHEMA)
        ),
        PromptStyle::FieldSchema => format!(
            "FORMAT INSTRUCTIONS:\n{}",
            render_format_instructions(CANDIDATE_SCHEMA, inputs.current_date)
        ),
    };

    let mut prompt = format!("{rules}\n\n{tech_rule}\n\n{schema_section}\n\n{OUTPUT_RULE}");

    if !inputs.context_tags.is_empty() {
        prompt.push_str("\n\nContext Focus: ");
        prompt.push_str(&inputs.context_tags.join(" "));
    }

    prompt
}

/// Build the user message carrying the CV text.
pub fn compose_user_message(style: PromptStyle, markdown: &str) -> String {
    match style {
        PromptStyle::ExampleShape => format!("Extract data from:\n\n{markdown}"),
        PromptStyle::FieldSchema => format!("INPUT CV (MARKDOWN):\n{markdown}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(style: PromptStyle, tags: &[String]) -> PromptInputs<'_> {
        PromptInputs {
            style,
            tech_stack: TechStackPolicy::EvidenceOnly,
            current_date: MonthYear::new(12, 2025).unwrap(),
            context_tags: tags,
            rules_override: None,
        }
    }

    #[test]
    fn prompt_contains_tags_and_sentinel() {
        let tags = vec!["Data Science".to_string(), "Management".to_string()];
        for style in [PromptStyle::ExampleShape, PromptStyle::FieldSchema] {
            let prompt = compose_system_prompt(&inputs(style, &tags));
            assert!(prompt.contains("Data Science"), "{style:?}");
            assert!(prompt.contains("Management"), "{style:?}");
            assert!(prompt.contains("Context Focus: Data Science Management"));
            assert!(prompt.contains("12-2025"), "{style:?}");
            assert!(!prompt.contains("{current_date}"), "{style:?}");
        }
    }

    #[test]
    fn prompt_requests_single_year_default() {
        let prompt = compose_system_prompt(&inputs(PromptStyle::ExampleShape, &[]));
        assert!(prompt.contains(r#"If only a year is given (e.g. "2020"), return "01-2020"."#));
        assert!(prompt.contains(r#"Format every work date as "MM-YYYY""#));
    }

    #[test]
    fn prompt_requests_employment_rule_verbatim() {
        let prompt = compose_system_prompt(&inputs(PromptStyle::FieldSchema, &[]));
        assert!(prompt.contains(
            r#"Set "employed" to true if any experience "end_date" is 12-2025; otherwise set it to false."#
        ));
    }

    #[test]
    fn no_context_line_without_tags() {
        let prompt = compose_system_prompt(&inputs(PromptStyle::ExampleShape, &[]));
        assert!(!prompt.contains("Context Focus"));
    }

    #[test]
    fn styles_embed_different_schema_sections() {
        let shape = compose_system_prompt(&inputs(PromptStyle::ExampleShape, &[]));
        assert!(shape.contains("REQUIRED JSON STRUCTURE:"));
        assert!(shape.contains("\"end_date\": \"MM-YYYY or null\""));

        let schema = compose_system_prompt(&inputs(PromptStyle::FieldSchema, &[]));
        assert!(schema.contains("FORMAT INSTRUCTIONS:"));
        assert!(schema.contains("\"properties\""));
    }

    #[test]
    fn tech_stack_policy_switches_rule() {
        let mut i = inputs(PromptStyle::ExampleShape, &[]);
        assert!(compose_system_prompt(&i).contains("explicitly named for that role"));
        i.tech_stack = TechStackPolicy::Inferred;
        assert!(compose_system_prompt(&i).contains("You MAY infer them"));
    }

    #[test]
    fn rules_override_keeps_schema_and_sentinel() {
        let mut i = inputs(PromptStyle::ExampleShape, &[]);
        i.rules_override = Some("Custom rules. Open roles end on {current_date}.");
        let prompt = compose_system_prompt(&i);
        assert!(prompt.starts_with("Custom rules. Open roles end on 12-2025."));
        assert!(prompt.contains("REQUIRED JSON STRUCTURE:"));
        assert!(!prompt.contains("ZERO HALLUCINATION"));
    }

    #[test]
    fn rules_override_without_placeholder_still_carries_sentinel() {
        for style in [PromptStyle::ExampleShape, PromptStyle::FieldSchema] {
            let mut i = inputs(style, &[]);
            i.rules_override = Some("Extract the CV as JSON.");
            let prompt = compose_system_prompt(&i);
            assert!(prompt.starts_with("Extract the CV as JSON."), "{style:?}");
            assert!(prompt.contains("12-2025"), "{style:?}");
            assert!(prompt.contains(
                r#"Set "employed" to true if any experience "end_date" is 12-2025; otherwise set it to false."#
            ));
            assert!(!prompt.contains("{current_date}"), "{style:?}");
        }
    }

    #[test]
    fn user_message_carries_markdown() {
        let md = "# Ada Lovelace\n- Analyst";
        assert!(compose_user_message(PromptStyle::ExampleShape, md).ends_with(md));
        assert!(compose_user_message(PromptStyle::FieldSchema, md).ends_with(md));
    }
}
