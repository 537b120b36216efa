//! DOCX → Markdown.
//!
//! A DOCX file is a zip container; the body lives in `word/document.xml`.
//! We only need reading order and a little structure, so paragraphs are
//! scanned with regexes rather than a full XML model:
//!
//! * `Heading N` / `Title` paragraph styles become `#`-headings,
//! * numbered or bulleted paragraphs (`<w:numPr>`) become `- ` items,
//! * everything else is a plain paragraph.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::path::Path;
use tracing::debug;

static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").unwrap());

static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<w:pStyle\s+w:val="([^"]+)""#).unwrap());

static RE_HEADING_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:heading|titulo|título|berschrift)\s*(\d)$").unwrap());

static RE_RUN_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|<w:cr\s*/>").unwrap()
});

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#[xX][0-9a-fA-F]+);").unwrap());

/// Convert a DOCX file to Markdown. Blocking.
pub fn docx_to_markdown_blocking(path: &Path) -> Result<String, ExtractError> {
    let conversion_failed = |detail: String| ExtractError::ConversionFailed {
        path: path.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(path).map_err(|e| conversion_failed(e.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| conversion_failed(format!("not a zip container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| conversion_failed(format!("missing word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| conversion_failed(e.to_string()))?;

    debug!("word/document.xml: {} bytes", xml.len());
    Ok(document_xml_to_markdown(&xml))
}

/// Convert the body XML of a DOCX document to Markdown.
pub fn document_xml_to_markdown(xml: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();

    for caps in RE_PARAGRAPH.captures_iter(xml) {
        let inner = &caps[1];
        let text = paragraph_text(inner);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let style = RE_STYLE.captures(inner).map(|c| c[1].to_string());
        let block = match style.as_deref().and_then(heading_level) {
            Some(level) => format!("{} {}", "#".repeat(level), text),
            None if inner.contains("<w:numPr") => format!("- {}", text),
            None => text.to_string(),
        };
        blocks.push(block);
    }

    // List items stay on consecutive lines; other blocks get a blank line.
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            let tight = block.starts_with("- ") && blocks[i - 1].starts_with("- ");
            out.push_str(if tight { "\n" } else { "\n\n" });
        }
        out.push_str(block);
    }
    out
}

fn heading_level(style: &str) -> Option<usize> {
    if style.eq_ignore_ascii_case("title") {
        return Some(1);
    }
    RE_HEADING_LEVEL
        .captures(style)
        .and_then(|c| c[1].parse::<usize>().ok())
        .map(|n| n.clamp(1, 6))
}

fn paragraph_text(inner: &str) -> String {
    let mut text = String::new();
    for caps in RE_RUN_TOKEN.captures_iter(inner) {
        match caps.get(1) {
            Some(t) => text.push_str(&unescape_xml(t.as_str())),
            None if caps[0].starts_with("<w:tab") => text.push('\t'),
            None => text.push('\n'),
        }
    }
    text
}

/// Decode named and numeric entities in one pass, so `&amp;#233;` stays literal.
fn unescape_xml(s: &str) -> String {
    RE_ENTITY
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => {
                    let hex = entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"));
                    let code = match hex {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
