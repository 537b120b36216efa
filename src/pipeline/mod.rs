//! Pipeline stages for CV extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and only [`llm`] needs a running model.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ loader ──▶ postprocess ──▶ llm ──▶ decode
//! (URL/path) (pdf/docx/text) (cleanup)  (chat)  (JSON → record)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`loader`]: detect the container and convert it to Markdown via
//!    [`pdf`] or [`docx`]; runs in `spawn_blocking`
//! 3. [`postprocess`]: deterministic cleanup of the converted text
//! 4. [`llm`]: one chat call; the only stage with model I/O
//! 5. [`decode`]: fence stripping, JSON parsing, schema validation

pub mod decode;
pub mod docx;
pub mod input;
pub mod llm;
pub mod loader;
pub mod pdf;
pub mod postprocess;
