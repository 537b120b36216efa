//! Progress-callback trait for extraction stage events.
//!
//! An extraction walks a fixed, linear state machine:
//!
//! ```text
//! Idle ──▶ Converting ──▶ Composing ──▶ Inferring ──▶ Done
//!              │              │             │
//!              └──────────────┴─────────────┴──────▶ Failed
//! ```
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe
//! the transitions, e.g. to drive a terminal spinner.
//!
//! # Example
//!
//! ```rust
//! use cv_extract::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintStages;
//!
//! impl ExtractionProgressCallback for PrintStages {
//!     fn on_stage(&self, source: &str, stage: Stage) {
//!         eprintln!("{source}: {stage}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PrintStages))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// A non-terminal pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Document → Markdown.
    Converting,
    /// Building the instruction prompt.
    Composing,
    /// Waiting for the model reply.
    Inferring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Converting => "converting",
            Stage::Composing => "composing prompt",
            Stage::Inferring => "inferring",
        };
        f.write_str(s)
    }
}

/// Called by the extraction pipeline as it moves between stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `source` is the input string (path or URL), or
/// `"<markdown>"` when text was supplied directly.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called on entry to each stage.
    fn on_stage(&self, source: &str, stage: Stage) {
        let _ = (source, stage);
    }

    /// Called once when a record was produced.
    ///
    /// # Arguments
    /// * `fields_found`: number of top-level record fields that are non-empty
    fn on_done(&self, source: &str, fields_found: usize) {
        let _ = (source, fields_found);
    }

    /// Called once when the extraction failed.
    fn on_failed(&self, source: &str, error: &str) {
        let _ = (source, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for RecordingCallback {
        fn on_stage(&self, _source: &str, stage: Stage) {
            self.events.lock().unwrap().push(stage.to_string());
        }

        fn on_done(&self, _source: &str, fields_found: usize) {
            self.events.lock().unwrap().push(format!("done:{fields_found}"));
        }

        fn on_failed(&self, _source: &str, error: &str) {
            self.events.lock().unwrap().push(format!("failed:{error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage("cv.pdf", Stage::Converting);
        cb.on_done("cv.pdf", 7);
        cb.on_failed("cv.pdf", "boom");
    }

    #[test]
    fn recording_callback_sees_linear_sequence() {
        let cb = RecordingCallback::default();
        cb.on_stage("cv.pdf", Stage::Converting);
        cb.on_stage("cv.pdf", Stage::Composing);
        cb.on_stage("cv.pdf", Stage::Inferring);
        cb.on_done("cv.pdf", 9);
        assert_eq!(
            *cb.events.lock().unwrap(),
            vec!["converting", "composing prompt", "inferring", "done:9"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage("cv.docx", Stage::Inferring);
        cb.on_failed("cv.docx", "unreachable");
    }
}
