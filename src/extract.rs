//! Extraction entry points.
//!
//! [`extract`] is the typed API: it returns the record or an
//! [`ExtractError`] saying which stage failed. [`extract_mapping`] keeps the
//! never-failing contract of the first scripts, where any failure becomes a
//! small JSON object instead of an error.
//!
//! Per document the work is strictly sequential: load, compose, one model
//! call, decode. Conversion runs before the provider is resolved, so a
//! missing or unreadable file never needs a configured model.

use crate::config::{ExtractionConfig, PromptStyle, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{ExtractError, FailureKind};
use crate::output::{ExtractionOutput, ExtractionStats, LoadedDocument};
use crate::pipeline::{decode, input, llm, loader, postprocess};
use crate::progress::Stage;
use crate::prompts::{compose_system_prompt, compose_user_message, PromptInputs};
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Source label reported for text passed to [`extract_markdown`].
pub const MARKDOWN_SOURCE: &str = "<markdown>";

/// Extract a candidate record from a CV file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`: Local path or HTTP/HTTPS URL to a PDF, DOCX, TXT or MD file
/// * `config`: Extraction configuration
///
/// # Errors
/// Every failure is fatal for the document; see [`ExtractError::kind`] for
/// the stage it belongs to.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let source = input_str.as_ref();
    info!("Starting extraction: {}", source);
    let result = run_document(source, config).await;
    report(config, source, &result);
    result
}

/// Extract a candidate record from text that is already Markdown.
///
/// The text goes through the same cleanup as converted documents.
/// `output.document` is `None`.
pub async fn extract_markdown(
    markdown: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let result: Result<ExtractionOutput, ExtractError> = async {
        let cleaned = postprocess::clean_markdown(markdown);
        if cleaned.trim().is_empty() {
            return Err(ExtractError::EmptyDocument {
                path: PathBuf::from(MARKDOWN_SOURCE),
            });
        }
        let mut output = infer(MARKDOWN_SOURCE, &cleaned, config).await?;
        output.stats.total_ms = total_start.elapsed().as_millis() as u64;
        Ok(output)
    }
    .await;
    report(config, MARKDOWN_SOURCE, &result);
    result
}

/// Extract a record and write it to a file as pretty-printed JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(input_str, config).await?;
    let json = serde_json::to_string_pretty(&output.record)
        .map_err(|e| ExtractError::Internal(format!("Failed to serialise record: {}", e)))?;
    write_atomic(output_path.as_ref(), format!("{json}\n").as_bytes()).await?;
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Convert a document to Markdown without calling a model.
///
/// Does not require an LLM provider.
pub async fn load_document(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<LoadedDocument, ExtractError> {
    let source = input_str.as_ref();
    let resolved = input::resolve_input(source, config.download_timeout_secs).await?;
    loader::load_markdown(resolved.path(), source, config.password.as_deref()).await
}

/// Extract a record, degrading every failure to a small JSON object.
///
/// | Failure | `ExampleShape` | `FieldSchema` |
/// |---------|----------------|---------------|
/// | conversion | `{"error": "Failed to parse PDF"}` | `{"error": "Failed to convert file"}` |
/// | anything else | `{}` | `{"error": "<message>"}` |
///
/// On success the record is returned as a JSON object. Never panics.
pub async fn extract_mapping(input_str: impl AsRef<str>, config: &ExtractionConfig) -> Value {
    let source = input_str.as_ref();
    match extract(source, config).await {
        Ok(output) => record_to_value(&output),
        Err(e) => {
            error!("Extraction of '{}' failed: {}", source, e);
            degraded_mapping(&e, config.prompt_style)
        }
    }
}

/// The record of a successful extraction as a JSON object.
pub fn record_to_value(output: &ExtractionOutput) -> Value {
    serde_json::to_value(&output.record).unwrap_or_else(|e| json!({ "error": e.to_string() }))
}

/// The JSON object reported in place of a record when `err` occurred.
pub fn degraded_mapping(err: &ExtractError, style: PromptStyle) -> Value {
    match (err.kind(), style) {
        (FailureKind::Conversion, style) => json!({ "error": style.conversion_failure_message() }),
        (_, PromptStyle::ExampleShape) => json!({}),
        (_, PromptStyle::FieldSchema) => json!({ "error": err.to_string() }),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_document(
    source: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();

    // ── Step 1: Convert ──────────────────────────────────────────────────
    notify(config, source, Stage::Converting);
    let conversion_start = Instant::now();
    let document = load_document(source, config).await?;
    let conversion_ms = conversion_start.elapsed().as_millis() as u64;
    info!(
        "Converted {} ({}) to {} chars of Markdown in {}ms",
        source, document.info.format, document.info.markdown_chars, conversion_ms
    );

    // ── Steps 2–4: Compose, infer, decode ────────────────────────────────
    let mut output = infer(source, &document.markdown, config).await?;
    output.document = Some(document.info);
    output.stats.conversion_ms = conversion_ms;
    output.stats.total_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} fields, {}ms total",
        output.record.filled_fields(),
        output.stats.total_ms
    );
    Ok(output)
}

async fn infer(
    source: &str,
    markdown: &str,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    notify(config, source, Stage::Composing);
    let inputs = PromptInputs::from(config);
    let system_prompt = compose_system_prompt(&inputs);
    let user_message = compose_user_message(config.prompt_style, markdown);
    debug!(
        "Prompt: {} system chars, {} user chars, sentinel {}",
        system_prompt.len(),
        user_message.len(),
        config.current_date
    );

    let (provider, provider_label) = resolve_provider(config)?;

    notify(config, source, Stage::Inferring);
    info!(
        "Calling {} ({})",
        provider_label,
        config.model_or_default()
    );
    let completion =
        llm::request_completion(&provider, &provider_label, &system_prompt, &user_message, config)
            .await?;

    let record = decode::decode_response(&completion.content, config.prompt_style)?;
    let advisories = decode::lint_record(&record, config.current_date);

    Ok(ExtractionOutput {
        record,
        document: None,
        advisories,
        stats: ExtractionStats {
            conversion_ms: 0,
            inference_ms: completion.duration_ms,
            total_ms: completion.duration_ms,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            retries: completion.retries,
        },
    })
}

fn notify(config: &ExtractionConfig, source: &str, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(source, stage);
    }
}

fn report(
    config: &ExtractionConfig,
    source: &str,
    result: &Result<ExtractionOutput, ExtractError>,
) {
    if let Some(ref cb) = config.progress_callback {
        match result {
            Ok(output) => cb.on_done(source, output.record.filled_fields()),
            Err(e) => cb.on_failed(source, &e.to_string()),
        }
    }
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with the configured model.
/// 3. **Environment** (`EDGEQUAKE_LLM_PROVIDER`, optionally with
///    `EDGEQUAKE_MODEL` when no model is configured).
/// 4. **Local default**: [`DEFAULT_PROVIDER`] with the configured model or
///    [`DEFAULT_MODEL`].
///
/// Returns the provider and the label used in errors and logs.
fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<(Arc<dyn LLMProvider>, String), ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom".to_string()));
    }

    if let Some(ref name) = config.provider_name {
        let provider = create_provider(name, config.model_or_default())?;
        return Ok((provider, name.clone()));
    }

    if let Ok(name) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !name.is_empty() {
            let model = match config.model {
                Some(ref m) => m.clone(),
                None => std::env::var("EDGEQUAKE_MODEL")
                    .ok()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            };
            let provider = create_provider(&name, &model)?;
            return Ok((provider, name));
        }
    }

    let provider = create_provider(DEFAULT_PROVIDER, config.model_or_default())?;
    Ok((provider, DEFAULT_PROVIDER.to_string()))
}

/// Write `bytes` to `path` via a sibling `.tmp` file and a rename, creating
/// parent directories. A failed write never leaves a truncated `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let write_failed = |e: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;
    Ok(())
}
