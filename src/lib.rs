//! # cv-extract
//!
//! Extract structured candidate data from CVs with a local LLM.
//!
//! ## Why this crate?
//!
//! Recruiting pipelines receive CVs as PDF or DOCX files in every layout
//! imaginable. This crate reads the text of the document, normalises it to
//! Markdown and asks a model (by default a local Ollama instance) to fill
//! one fixed JSON schema: contact details, work history with `MM-YYYY`
//! dates, education, skills and employment status. Inference runs at
//! temperature 0 and the prompt forbids inventing values.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CV (path or URL)
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Load     PDF text layer / DOCX body / plain text → Markdown
//!  ├─ 3. Clean    deterministic text cleanup
//!  ├─ 4. Compose  rules + schema + date sentinel + context focus
//!  ├─ 5. Infer    one chat call, JSON-only reply
//!  └─ 6. Decode   fence stripping, schema validation, advisories
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cv_extract::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider defaults to ollama/llama3.2; EDGEQUAKE_LLM_PROVIDER overrides.
//!     let config = ExtractionConfig::builder()
//!         .context_tag("Data Science")
//!         .build()?;
//!     let output = extract("cv.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.record)?);
//!     for advisory in &output.advisories {
//!         eprintln!("note: {advisory}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cv2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cv-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod date;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, PromptStyle, TechStackPolicy, DEFAULT_MODEL,
    DEFAULT_PROVIDER,
};
pub use date::{MonthYear, ParseMonthYearError};
pub use error::{ExtractError, FailureKind, SchemaViolation};
pub use extract::{
    degraded_mapping, extract, extract_mapping, extract_markdown, extract_sync, extract_to_file,
    load_document, record_to_value, write_atomic,
};
pub use output::{
    Advisory, CandidateRecord, DocumentFormat, DocumentInfo, EducationEntry, ExperienceEntry,
    ExtractionOutput, ExtractionStats, LoadedDocument,
};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
