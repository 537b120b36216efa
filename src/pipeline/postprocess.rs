//! Post-processing: deterministic cleanup of converted document text.
//!
//! Text layers of PDFs and DOCX runs carry artefacts that cost tokens and
//! confuse the model without adding evidence: Windows line endings, bullet
//! glyphs instead of list markers, zero-width characters, long runs of blank
//! lines. Each rule below is a pure `&str → String` pass.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can split on `\n`;
//! bullet rewriting runs before trailing-whitespace trimming so an item made
//! only of a glyph collapses to an empty line that the blank-line rule can
//! then merge.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to converted text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode and turn non-breaking spaces into spaces
/// 3. Rewrite bullet glyphs (`•`, `●`, `▪`, …) as `- ` list markers
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Ensure the text ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = normalise_bullets(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .replace(
            [
                '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
            ],
            "",
        )
        .replace(['\u{00A0}', '\u{202F}'], " ")
}

// ── Rule 3: Bullet glyphs → list markers ─────────────────────────────────────

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[•●▪◦■‣∙·○➢►][ \t]*").unwrap());

fn normalise_bullets(input: &str) -> String {
    RE_BULLET.replace_all(input, "- ").to_string()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Ensure text ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
