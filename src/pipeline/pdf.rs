//! PDF text extraction via pdfium.
//!
//! pdfium wraps a C++ library with thread-local state, so every call here is
//! blocking and runs inside `tokio::task::spawn_blocking` (see
//! [`crate::pipeline::loader`]). Only the embedded text layer is read; a
//! scanned PDF without one yields empty text and is rejected upstream as
//! [`ExtractError::EmptyDocument`].

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Text and metadata pulled from a PDF.
#[derive(Debug, Clone)]
pub struct PdfText {
    /// One entry per page, in page order.
    pub pages: Vec<String>,
    pub title: Option<String>,
}

/// Bind to a pdfium shared library.
///
/// Resolution order: `PDFIUM_LIB_PATH` (a directory or the library file
/// itself), the current working directory, then the system loader path.
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(p);
        if p.is_dir() {
            candidates.push(p.join(Pdfium::pdfium_platform_library_name()));
        } else {
            candidates.push(p);
        }
    }
    candidates.push(PathBuf::from(".").join(Pdfium::pdfium_platform_library_name()));

    for candidate in candidates.iter().filter(|c| c.exists()) {
        let candidate_str = candidate.to_string_lossy().to_string();
        match Pdfium::bind_to_library(&candidate_str) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => warn!("Could not bind pdfium at {}: {:?}", candidate.display(), e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// Read the text layer of every page. Blocking.
pub fn extract_text_blocking(pdf_path: &Path, password: Option<&str>) -> Result<PdfText, ExtractError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                "wrong password".to_string()
            } else {
                "the PDF is encrypted and requires a password".to_string()
            }
        } else {
            err_str
        };
        ExtractError::ConversionFailed {
            path: pdf_path.to_path_buf(),
            detail,
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut texts = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ExtractError::ConversionFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {} → {} chars", idx + 1, text.len());
        texts.push(text);
    }

    let title = document
        .metadata()
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().trim().to_string())
        .filter(|v| !v.is_empty());

    Ok(PdfText {
        pages: texts,
        title,
    })
}

/// Join page texts into one Markdown body, pages separated by a blank line.
pub fn pages_to_markdown(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_join_with_blank_line_and_skip_empty() {
        let pages = vec![
            "Ada Lovelace\n".to_string(),
            "   ".to_string(),
            "Experience".to_string(),
        ];
        assert_eq!(pages_to_markdown(&pages), "Ada Lovelace\n\nExperience");
    }

    #[test]
    fn no_pages_is_empty_markdown() {
        assert_eq!(pages_to_markdown(&[]), "");
    }
}
