//! Post-processing: deterministic cleanup of OCR output and model summaries.
//!
//! Tesseract output carries page-break form feeds, trailing blanks and runs
//! of empty lines; models occasionally wrap a plain-text answer in a code
//! fence despite being asked not to. These rules are cheap, pure and safe to
//! run on any input. Each is a `&str → String` function, testable on its own.
//!
//! Rule order matters: line endings are normalised before per-line trimming,
//! and trimming happens before blank-line collapsing so whitespace-only lines
//! count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean raw OCR engine output.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Remove form feeds and invisible Unicode
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines to one
/// 5. Trim leading/trailing blank space of the whole text
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Clean the final summary returned by the model.
///
/// Strips an outer markdown fence, normalises line endings and trims
/// trailing whitespace. Inner content is never altered.
pub fn clean_summary(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    s.trim().to_string()
}

// ── Rule: strip outer fences ─────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text|plaintext|json)?[ \t]*\r?\n(.*?)\r?\n```\s*$")
        .expect("static regex")
});

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule: line endings ───────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: form feeds and invisible characters ────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{000C}', '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: trailing whitespace ────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: blank lines ────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}
