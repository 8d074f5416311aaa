//! Local signature and heuristic pre-screening.
//!
//! Inspects raw bytes before any external call: magic-byte consistency with
//! the declared MIME type, known-dangerous binary signatures, risky
//! extensions, text content patterns, and size plausibility. Pure and
//! synchronous; never touches the network.
//!
//! All checks run and all findings accumulate; the pre-screener reports,
//! callers decide disposition.

mod patterns;
mod signatures;

pub use signatures::RiskLevel;

use serde::{Deserialize, Serialize};

/// Classification of a pre-screen finding.
///
/// Hard findings identify content that is dangerous by itself; soft
/// findings are inconsistencies worth recording but not conclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Header bytes do not match any signature registered for the
    /// declared MIME type.
    SignatureMismatch,
    /// Header bytes match a known-dangerous binary signature.
    MaliciousSignature,
    /// The file extension is classified high-risk.
    RiskyExtension,
    /// Text content matched a risky pattern.
    ContentPattern,
    /// The file is implausibly small for its declared type.
    ImplausibleSize,
}

impl FindingKind {
    /// Hard findings justify rejecting the file without consulting the
    /// external scanner.
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::MaliciousSignature | Self::RiskyExtension)
    }
}

/// One pre-screen finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// What class of check fired.
    pub kind: FindingKind,
    /// Human-readable threat description.
    pub message: String,
}

impl Finding {
    fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The accumulated result of pre-screening one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreScreenReport {
    /// All findings, in check order.
    pub findings: Vec<Finding>,
}

impl PreScreenReport {
    /// Returns `true` when no check fired.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Returns `true` if any hard finding is present.
    pub fn has_hard_findings(&self) -> bool {
        self.findings.iter().any(|f| f.kind.is_hard())
    }

    /// Messages of all findings.
    pub fn threat_strings(&self) -> Vec<String> {
        self.findings.iter().map(|f| f.message.clone()).collect()
    }

    /// Messages of hard findings only.
    pub fn hard_threat_strings(&self) -> Vec<String> {
        self.findings
            .iter()
            .filter(|f| f.kind.is_hard())
            .map(|f| f.message.clone())
            .collect()
    }
}

/// Pre-screens raw file bytes against the declared MIME type and file name.
///
/// Checks run in order and never short-circuit:
///
/// 1. signature/MIME consistency
/// 2. known-dangerous binary signatures
/// 3. extension risk
/// 4. content patterns (text-like types only)
/// 5. size plausibility
///
/// An empty report means locally clean. This is a local heuristic only; the
/// external scanner remains authoritative for release decisions.
pub fn pre_screen(bytes: &[u8], declared_mime: &str, file_name: &str) -> PreScreenReport {
    let mut findings = Vec::new();
    let header = signatures::header_hex(bytes);

    // 1. Declared type vs. actual header bytes
    if let Some(false) = signatures::signature_matches(&header, declared_mime) {
        findings.push(Finding::new(
            FindingKind::SignatureMismatch,
            format!("File signature does not match declared type {declared_mime}"),
        ));
    }

    // 2. Dangerous signatures, regardless of declared type
    if let Some(description) = signatures::malicious_signature(&header) {
        findings.push(Finding::new(
            FindingKind::MaliciousSignature,
            format!("Malicious file signature detected: {description}"),
        ));
    }

    // 3. Extension risk
    if let Some(ext) = extension_of(file_name) {
        if signatures::extension_risk(ext) == Some(RiskLevel::High) {
            findings.push(Finding::new(
                FindingKind::RiskyExtension,
                format!("High-risk file extension: .{}", ext.to_ascii_lowercase()),
            ));
        }
    }

    // 4. Content patterns, text-like declared types only
    if patterns::is_text_like(declared_mime) {
        for label in patterns::scan_content(bytes) {
            findings.push(Finding::new(
                FindingKind::ContentPattern,
                format!("Suspicious content pattern: {label}"),
            ));
        }
    }

    // 5. Size plausibility
    if let Some(minimum) = minimum_plausible_size(declared_mime) {
        if (bytes.len() as u64) < minimum {
            findings.push(Finding::new(
                FindingKind::ImplausibleSize,
                format!(
                    "File implausibly small for {declared_mime} ({} bytes, expected at least {minimum})",
                    bytes.len()
                ),
            ));
        }
    }

    PreScreenReport { findings }
}

/// Minimum plausible payload size for a declared type, if one applies.
fn minimum_plausible_size(declared_mime: &str) -> Option<u64> {
    let mime = declared_mime.to_ascii_lowercase();
    if mime.starts_with("image/") {
        Some(100)
    } else if mime.starts_with("video/") {
        Some(1000)
    } else if mime == "application/pdf" {
        Some(50)
    } else {
        None
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}
