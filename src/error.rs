//! Error types for the cv-extract library.
//!
//! [`ExtractError`] is the single fatal error type returned by every
//! `extract*` entry point. Its variants fall into four families, exposed via
//! [`ExtractError::kind`]:
//!
//! * [`FailureKind::Conversion`]: the document could not be turned into
//!   Markdown (missing file, unsupported container, empty text layer).
//! * [`FailureKind::Inference`]: the model could not be reached or did not
//!   answer in time. These are the only retryable failures.
//! * [`FailureKind::Response`]: the model answered, but the reply is not a
//!   JSON object or does not satisfy the candidate schema.
//! * [`FailureKind::Local`]: configuration and I/O problems on our side.
//!
//! Callers that must never fail use [`crate::extract::extract_mapping`],
//! which degrades any error to an `{"error": ...}` or empty mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the cv-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input / conversion errors ─────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The container format is not one the loader understands.
    #[error("Unsupported document format for '{path}' (supported: pdf, docx, txt, md)")]
    UnsupportedFormat { path: PathBuf },

    /// The converter recognised the format but could not read the content.
    #[error("Failed to convert '{path}' to Markdown: {detail}")]
    ConversionFailed { path: PathBuf, detail: String },

    /// Conversion succeeded but produced no text (e.g. a scanned PDF without
    /// a text layer).
    #[error("Document '{path}' contains no extractable text")]
    EmptyDocument { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium, or install pdfium\n\
system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Inference errors ──────────────────────────────────────────────────
    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider call failed (backend down, connection refused, HTTP error).
    #[error("LLM provider '{provider}' unreachable: {detail}")]
    InferenceUnreachable { provider: String, detail: String },

    /// The provider call exceeded `api_timeout_secs`.
    #[error("LLM call timed out after {secs}s")]
    InferenceTimeout { secs: u64 },

    // ── Response errors ───────────────────────────────────────────────────
    /// The model reply is not a JSON object.
    #[error("Model failed to produce valid JSON: {detail}")]
    InvalidResponseFormat { detail: String },

    /// The reply is JSON but breaks the candidate schema.
    #[error("Model output failed schema validation ({} violation(s)): {}", .violations.len(), first_violation(.violations))]
    SchemaValidationFailed { violations: Vec<SchemaViolation> },

    // ── Local errors ──────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn first_violation(violations: &[SchemaViolation]) -> String {
    violations
        .first()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Coarse classification of an [`ExtractError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Conversion,
    Inference,
    Response,
    Local,
}

impl ExtractError {
    /// Which pipeline stage the failure belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::FileNotFound { .. }
            | ExtractError::PermissionDenied { .. }
            | ExtractError::InvalidInput { .. }
            | ExtractError::DownloadFailed { .. }
            | ExtractError::DownloadTimeout { .. }
            | ExtractError::UnsupportedFormat { .. }
            | ExtractError::ConversionFailed { .. }
            | ExtractError::EmptyDocument { .. }
            | ExtractError::PdfiumBindingFailed(_) => FailureKind::Conversion,
            ExtractError::ProviderNotConfigured { .. }
            | ExtractError::InferenceUnreachable { .. }
            | ExtractError::InferenceTimeout { .. } => FailureKind::Inference,
            ExtractError::InvalidResponseFormat { .. }
            | ExtractError::SchemaValidationFailed { .. } => FailureKind::Response,
            ExtractError::InvalidConfig(_)
            | ExtractError::OutputWriteFailed { .. }
            | ExtractError::Internal(_) => FailureKind::Local,
        }
    }

    /// True for transport failures where repeating the same request may
    /// succeed. Content failures (bad JSON, schema violations) are permanent
    /// for a zero-temperature model.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExtractError::InferenceUnreachable { .. } | ExtractError::InferenceTimeout { .. }
        )
    }
}

/// One schema violation found in a model reply.
///
/// `path` is a JSON-pointer-like location such as `experience[2].end_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_errors_are_not_retryable() {
        let e = ExtractError::FileNotFound {
            path: PathBuf::from("missing.pdf"),
        };
        assert_eq!(e.kind(), FailureKind::Conversion);
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("missing.pdf"));
    }

    #[test]
    fn transport_errors_are_retryable() {
        let e = ExtractError::InferenceUnreachable {
            provider: "ollama".into(),
            detail: "connection refused".into(),
        };
        assert_eq!(e.kind(), FailureKind::Inference);
        assert!(e.is_retryable());
        assert!(ExtractError::InferenceTimeout { secs: 30 }.is_retryable());
    }

    #[test]
    fn schema_failure_display_names_first_violation() {
        let e = ExtractError::SchemaValidationFailed {
            violations: vec![
                SchemaViolation {
                    path: "employed".into(),
                    message: "expected boolean, got string".into(),
                },
                SchemaViolation {
                    path: "skills[0]".into(),
                    message: "expected string, got number".into(),
                },
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("2 violation(s)"), "got: {msg}");
        assert!(msg.contains("employed: expected boolean"), "got: {msg}");
        assert_eq!(e.kind(), FailureKind::Response);
        assert!(!e.is_retryable());
    }

    #[test]
    fn invalid_json_display() {
        let e = ExtractError::InvalidResponseFormat {
            detail: "expected value at line 1 column 1".into(),
        };
        assert!(e.to_string().starts_with("Model failed to produce valid JSON"));
    }
}
