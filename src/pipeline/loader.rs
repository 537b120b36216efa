//! Document loading: detect the container format and convert it to Markdown.
//!
//! ## Why spawn_blocking?
//!
//! pdfium keeps thread-local state and zip decompression is CPU-bound, so
//! conversion runs on Tokio's blocking pool instead of a worker thread.
//! Text files take the same path to keep one code path for all formats.

use crate::error::ExtractError;
use crate::output::{DocumentFormat, DocumentInfo, LoadedDocument};
use crate::pipeline::{docx, pdf, postprocess};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Detect the container format of `path`.
///
/// Magic bytes win over the extension: a `%PDF` header is a PDF whatever the
/// file is called. A zip container must carry a `.docx` extension, since
/// other Office and archive formats share the header.
pub fn detect_format(path: &Path) -> Result<DocumentFormat, ExtractError> {
    let mut header = [0u8; 8];
    let read = std::fs::File::open(path)
        .and_then(|mut f| f.read(&mut header))
        .map_err(|e| ExtractError::ConversionFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    let header = &header[..read];

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if header.starts_with(PDF_MAGIC) {
        return Ok(DocumentFormat::Pdf);
    }
    if header.starts_with(ZIP_MAGIC) {
        return match ext.as_str() {
            "docx" => Ok(DocumentFormat::Docx),
            _ => Err(ExtractError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        };
    }

    match ext.as_str() {
        // Leave damaged files to the converter so the error names the cause.
        "pdf" => Ok(DocumentFormat::Pdf),
        "docx" => Ok(DocumentFormat::Docx),
        "txt" | "md" | "markdown" => Ok(DocumentFormat::Text),
        _ => Err(ExtractError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Convert the document at `path` to cleaned Markdown.
///
/// `source` is the caller's original input (path or URL) and is recorded in
/// [`DocumentInfo`]. Fails with [`ExtractError::EmptyDocument`] when the
/// converted text is blank.
pub async fn load_markdown(
    path: &Path,
    source: &str,
    password: Option<&str>,
) -> Result<LoadedDocument, ExtractError> {
    let path_buf = path.to_path_buf();
    let password = password.map(str::to_string);
    let source = source.to_string();

    tokio::task::spawn_blocking(move || load_blocking(&path_buf, source, password.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Conversion task panicked: {}", e)))?
}

fn load_blocking(
    path: &Path,
    source: String,
    password: Option<&str>,
) -> Result<LoadedDocument, ExtractError> {
    let format = detect_format(path)?;
    info!("Converting {} as {}", path.display(), format);

    let (raw, page_count, title) = match format {
        DocumentFormat::Pdf => {
            let text = pdf::extract_text_blocking(path, password)?;
            let page_count = text.pages.len();
            (pdf::pages_to_markdown(&text.pages), Some(page_count), text.title)
        }
        DocumentFormat::Docx => (docx::docx_to_markdown_blocking(path)?, None, None),
        DocumentFormat::Text => (read_text(path)?, None, None),
    };

    let markdown = postprocess::clean_markdown(&raw);
    if markdown.trim().is_empty() {
        return Err(ExtractError::EmptyDocument {
            path: PathBuf::from(path),
        });
    }

    let markdown_chars = markdown.chars().count();
    debug!("Markdown: {} chars", markdown_chars);

    Ok(LoadedDocument {
        info: DocumentInfo {
            source,
            format,
            page_count,
            title,
            markdown_chars,
        },
        markdown,
    })
}

/// Text and Markdown files are passed through; invalid UTF-8 is replaced
/// rather than rejected.
fn read_text(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::ConversionFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_with(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn detects_by_magic_before_extension() {
        let f = temp_with(".txt", b"%PDF-1.7\n");
        assert_eq!(detect_format(f.path()).unwrap(), DocumentFormat::Pdf);
    }

    #[test]
    fn detects_text_extensions() {
        for suffix in [".txt", ".md", ".MARKDOWN"] {
            let f = temp_with(suffix, b"# Ada");
            assert_eq!(detect_format(f.path()).unwrap(), DocumentFormat::Text, "{suffix}");
        }
    }

    #[test]
    fn zip_needs_docx_extension() {
        let f = temp_with(".xlsx", b"PK\x03\x04rest");
        assert!(matches!(
            detect_format(f.path()).unwrap_err(),
            ExtractError::UnsupportedFormat { .. }
        ));
        let f = temp_with(".docx", b"PK\x03\x04rest");
        assert_eq!(detect_format(f.path()).unwrap(), DocumentFormat::Docx);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let f = temp_with(".png", b"\x89PNG");
        assert!(matches!(
            detect_format(f.path()).unwrap_err(),
            ExtractError::UnsupportedFormat { .. }
        ));
    }

    #[tokio::test]
    async fn loads_markdown_verbatim_after_cleanup() {
        let f = temp_with(".md", b"# Ada Lovelace\r\n\r\n\xE2\x80\xA2 Analyst  \r\n");
        let doc = load_markdown(f.path(), "cv.md", None).await.unwrap();
        assert_eq!(doc.markdown, "# Ada Lovelace\n\n- Analyst\n");
        assert_eq!(doc.info.format, DocumentFormat::Text);
        assert_eq!(doc.info.source, "cv.md");
        assert_eq!(doc.info.page_count, None);
        assert_eq!(doc.info.markdown_chars, doc.markdown.chars().count());
    }

    #[tokio::test]
    async fn blank_text_is_empty_document() {
        let f = temp_with(".txt", b"  \n\n\t\n");
        let err = load_markdown(f.path(), "blank.txt", None).await.unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument { .. }));
    }

    #[tokio::test]
    async fn broken_docx_is_conversion_failure() {
        let f = temp_with(".docx", b"not a zip");
        let err = load_markdown(f.path(), "cv.docx", None).await.unwrap_err();
        assert!(matches!(err, ExtractError::ConversionFailed { .. }));
    }
}
