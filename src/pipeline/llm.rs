//! LLM interaction: send the composed prompt and return the raw reply.
//!
//! This module is thin on purpose. Prompt text lives in [`crate::prompts`]
//! and reply decoding in [`crate::pipeline::decode`], so both can be tested
//! without a running model.
//!
//! ## Retry Strategy
//!
//! Only transport failures are retried ([`ExtractError::is_retryable`]).
//! Backoff is exponential (`retry_backoff_ms * 2^attempt`): with the 500 ms
//! base and 3 retries the waits are 500 ms → 1 s → 2 s. The default of zero
//! retries keeps a single-shot call.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

const JSON_RESPONSE_FORMAT: &str = "json_object";

/// Raw model reply plus accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Extra attempts made before this reply arrived.
    pub retries: u32,
    pub duration_ms: u64,
}

/// Send one system + user exchange to the provider.
///
/// ## Message Layout
///
/// 1. **System message**: rules, schema section and context focus
/// 2. **User message**: the CV Markdown
///
/// Fails with [`ExtractError::InferenceTimeout`] when `api_timeout_secs` is
/// set and exceeded, and with [`ExtractError::InferenceUnreachable`] for any
/// provider error, after retries are exhausted.
pub async fn request_completion(
    provider: &Arc<dyn LLMProvider>,
    provider_label: &str,
    system_prompt: &str,
    user_message: &str,
    config: &ExtractionConfig,
) -> Result<Completion, ExtractError> {
    let start = Instant::now();
    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_message),
    ];
    let options = build_options(config);

    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let backoff = backoff_ms(config, attempt);
            warn!(
                "LLM retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match call_once(provider, provider_label, &messages, &options, config).await {
            Ok((content, input_tokens, output_tokens)) => {
                let duration = start.elapsed();
                debug!(
                    "LLM reply: {} input tokens, {} output tokens, {:?}",
                    input_tokens, output_tokens, duration
                );
                return Ok(Completion {
                    content,
                    input_tokens,
                    output_tokens,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                warn!("LLM attempt {} failed: {}", attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn call_once(
    provider: &Arc<dyn LLMProvider>,
    provider_label: &str,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    config: &ExtractionConfig,
) -> Result<(String, usize, usize), ExtractError> {
    let unreachable = |e: String| ExtractError::InferenceUnreachable {
        provider: provider_label.to_string(),
        detail: e,
    };

    let response = match config.api_timeout_secs {
        Some(secs) => timeout(
            Duration::from_secs(secs),
            provider.chat(messages, Some(options)),
        )
        .await
        .map_err(|_| ExtractError::InferenceTimeout { secs })?
        .map_err(|e| unreachable(e.to_string()))?,
        None => provider
            .chat(messages, Some(options))
            .await
            .map_err(|e| unreachable(e.to_string()))?,
    };

    Ok((
        response.content,
        response.prompt_tokens,
        response.completion_tokens,
    ))
}

/// Wait before retry number `attempt` (1-based), saturating at `u64::MAX`.
fn backoff_ms(config: &ExtractionConfig, attempt: u32) -> u64 {
    config
        .retry_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Build `CompletionOptions` from the extraction config.
///
/// JSON output mode is always requested; providers without it ignore the hint
/// and rely on the prompt's output rule.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        response_format: Some(JSON_RESPONSE_FORMAT.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
        assert_eq!(opts.response_format.as_deref(), Some("json_object"));
    }

    #[test]
    fn build_options_follow_builder() {
        let config = ExtractionConfig::builder()
            .temperature(0.7)
            .max_tokens(1024)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(1024));
        assert_eq!(opts.response_format.as_deref(), Some("json_object"));
    }

    #[test]
    fn backoff_saturates_for_large_attempts() {
        let config = ExtractionConfig::builder()
            .max_retries(100)
            .retry_backoff_ms(500)
            .build()
            .unwrap();
        assert_eq!(backoff_ms(&config, 1), 500);
        assert_eq!(backoff_ms(&config, 3), 2000);
        assert_eq!(backoff_ms(&config, 80), u64::MAX);
    }
}
