//! Content pattern scanning for text-like uploads.
//!
//! Only runs for declared text-like MIME types; binary formats are covered
//! by the signature tables instead. Patterns are compiled once.

use regex::Regex;
use std::sync::LazyLock;

/// A labelled pattern; the label becomes the threat message on a match.
struct ContentPattern {
    label: &'static str,
    regex: Regex,
}

static CONTENT_PATTERNS: LazyLock<Vec<ContentPattern>> = LazyLock::new(|| {
    [
        ("Embedded script tag", r"(?i)<\s*script[\s>/]"),
        ("Embedded iframe tag", r"(?i)<\s*iframe[\s>/]"),
        ("javascript: URI", r"(?i)javascript\s*:"),
        ("vbscript: URI", r"(?i)vbscript\s*:"),
        ("Dynamic code evaluation", r"(?i)\beval\s*\("),
        (
            "Shell invocation",
            r"(?i)(cmd\.exe|powershell(\.exe)?|/bin/(?:ba)?sh)",
        ),
        (
            "Phishing phrase",
            r"(?i)(verify\s+your\s+account|confirm\s+your\s+password|account\s+(?:has\s+been\s+)?suspended)",
        ),
    ]
    .into_iter()
    .map(|(label, pattern)| ContentPattern {
        label,
        regex: Regex::new(pattern).expect("content pattern must compile"),
    })
    .collect()
});

/// Declared MIME types whose content gets pattern-scanned.
pub(super) fn is_text_like(mime_type: &str) -> bool {
    let mime = mime_type.to_ascii_lowercase();
    mime.starts_with("text/")
        || matches!(
            mime.as_str(),
            "application/json"
                | "application/xml"
                | "application/javascript"
                | "application/x-javascript"
                | "image/svg+xml"
        )
}

/// Scans text content for risky patterns; one message per matched pattern.
pub(super) fn scan_content(bytes: &[u8]) -> Vec<&'static str> {
    let text = String::from_utf8_lossy(bytes);
    CONTENT_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(&text))
        .map(|p| p.label)
        .collect()
}
