//! Configuration types for CV extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The configuration is created once and
//! read-only afterwards; in particular the "current date" sentinel is frozen
//! here rather than read from the clock while composing prompts.

use crate::date::MonthYear;
use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Provider used when neither the config nor the environment names one.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Configuration for a CV extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use cv_extract::{ExtractionConfig, MonthYear, PromptStyle};
///
/// let config = ExtractionConfig::builder()
///     .model("llama3.2")
///     .prompt_style(PromptStyle::FieldSchema)
///     .context_tag("Data Science")
///     .current_date(MonthYear::new(12, 2025).unwrap())
///     .build()
///     .unwrap();
/// assert_eq!(config.current_date.to_string(), "12-2025");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// LLM model identifier, e.g. "llama3.2", "qwen2.5:7b".
    /// If None, [`DEFAULT_MODEL`] is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "ollama", "openai").
    /// If None, `EDGEQUAKE_LLM_PROVIDER` or [`DEFAULT_PROVIDER`] is used.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (most probable output).
    pub temperature: f32,

    /// Maximum tokens the model may generate for the record. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts after a transport failure. Default: 0.
    ///
    /// Only [`ExtractError::is_retryable`] failures are retried; a reply that
    /// is not valid JSON will not improve at temperature 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the model request. Default: None (wait forever).
    pub api_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Replacement for the built-in rules block. The schema, date sentinel
    /// and context focus are still appended.
    pub system_prompt: Option<String>,

    /// How the schema is presented to the model. Default: [`PromptStyle::ExampleShape`].
    pub prompt_style: PromptStyle,

    /// Whether per-role technology lists may be inferred. Default: evidence only.
    pub tech_stack: TechStackPolicy,

    /// Free-text domain tags that bias extraction (e.g. "Data Science").
    pub context_tags: Vec<String>,

    /// Value substituted for "Present"/"Current" end dates. Default: the
    /// local month at the time the config was built.
    pub current_date: MonthYear,

    /// Optional stage-transition callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: None,
            download_timeout_secs: 120,
            password: None,
            system_prompt: None,
            prompt_style: PromptStyle::default(),
            tech_stack: TechStackPolicy::default(),
            context_tags: Vec::new(),
            current_date: MonthYear::current(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt_style", &self.prompt_style)
            .field("tech_stack", &self.tech_stack)
            .field("context_tags", &self.context_tags)
            .field("current_date", &self.current_date.to_string())
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model name that will be requested.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn prompt_style(mut self, style: PromptStyle) -> Self {
        self.config.prompt_style = style;
        self
    }

    pub fn tech_stack(mut self, policy: TechStackPolicy) -> Self {
        self.config.tech_stack = policy;
        self
    }

    /// Add one context-focus tag. Blank tags are ignored.
    pub fn context_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() {
            self.config.context_tags.push(tag.to_string());
        }
        self
    }

    pub fn context_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        tags.into_iter().fold(self, |b, t| b.context_tag(t))
    }

    pub fn current_date(mut self, date: MonthYear) -> Self {
        self.config.current_date = date;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(ExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        if c.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ExtractError::InvalidConfig("model name is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the candidate schema is presented to the model.
///
/// Both styles are rendered from [`crate::schema::CANDIDATE_SCHEMA`]; they
/// differ in prompt layout and in how strictly the reply is checked.
///
/// | Style | Prompt carries | Reply check | Degraded mapping |
/// |-------|----------------|-------------|------------------|
/// | `ExampleShape` | example JSON object | must be a JSON object | `{}` / "Failed to parse PDF" |
/// | `FieldSchema`  | JSON Schema with descriptions | full schema validation | `{"error": …}` / "Failed to convert file" |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// Inline example shape, lenient decoding. (default)
    #[default]
    ExampleShape,
    /// Schema-derived format instructions, validated decoding.
    FieldSchema,
}

impl PromptStyle {
    /// Message reported by [`crate::extract::extract_mapping`] when the
    /// document could not be converted.
    pub fn conversion_failure_message(&self) -> &'static str {
        match self {
            PromptStyle::ExampleShape => "Failed to parse PDF",
            PromptStyle::FieldSchema => "Failed to convert file",
        }
    }
}

/// Policy for the per-role `tech_stack` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechStackPolicy {
    /// Only technologies named in the document. (default)
    #[default]
    EvidenceOnly,
    /// Technologies may be inferred from the described activities.
    Inferred,
}
