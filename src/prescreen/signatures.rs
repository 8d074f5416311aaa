//! Magic-byte signature tables.
//!
//! Two tables drive the byte-level checks: expected signatures per declared
//! MIME type, and known-dangerous signatures that are a threat regardless of
//! what the upload claims to be. Prefixes are lowercase hex, compared
//! against the hex encoding of the first [`MAX_SIGNATURE_BYTES`] of the file.

/// How many leading bytes participate in signature comparison.
pub(super) const MAX_SIGNATURE_BYTES: usize = 16;

/// Risk classification for a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    /// Directly executable or installer content; a threat on its own.
    High,
    /// Containers and macro-capable formats; noted but not a threat.
    Medium,
}

/// Expected magic-byte prefixes per registered MIME type.
///
/// Types with no fixed signature (plain text, CSV, TAR) are simply absent
/// and always pass the consistency check.
const MIME_SIGNATURES: &[(&str, &[&str])] = &[
    ("image/jpeg", &["ffd8ff"]),
    ("image/png", &["89504e47"]),
    ("image/gif", &["47494638"]),
    ("image/webp", &["52494646"]),
    ("image/bmp", &["424d"]),
    ("image/tiff", &["49492a00", "4d4d002a"]),
    ("application/pdf", &["25504446"]),
    ("application/zip", &["504b0304", "504b0506", "504b0708"]),
    ("application/gzip", &["1f8b"]),
    (
        "video/mp4",
        &["0000001866747970", "0000001c66747970", "0000002066747970"],
    ),
    ("video/webm", &["1a45dfa3"]),
    ("video/quicktime", &["0000001466747970", "0000002066747970"]),
    ("audio/mpeg", &["494433", "fffb", "fff3", "fff2"]),
    ("audio/wav", &["52494646"]),
    ("audio/flac", &["664c6143"]),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        &["504b0304"],
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        &["504b0304"],
    ),
];

/// Known-dangerous binary prefixes: a match is a threat no matter the
/// declared MIME type.
const MALICIOUS_SIGNATURES: &[(&str, &str)] = &[
    ("4d5a", "Windows executable (PE)"),
    ("7f454c46", "Linux executable (ELF)"),
    ("feedface", "Mach-O executable (32-bit)"),
    ("feedfacf", "Mach-O executable (64-bit)"),
    ("cafebabe", "Mach-O universal binary / Java class"),
    ("23212f", "Script with shebang"),
    ("406563686f206f6666", "Batch file (@echo off)"),
    ("d0cf11e0a1b11ae1", "OLE compound document (legacy Office/installer)"),
    ("4d534346", "Windows cabinet archive"),
];

/// Extension risk table. `High` entries are a threat on their own.
const EXTENSION_RISK: &[(&str, RiskLevel)] = &[
    // Directly executable
    ("exe", RiskLevel::High),
    ("dll", RiskLevel::High),
    ("scr", RiskLevel::High),
    ("com", RiskLevel::High),
    ("pif", RiskLevel::High),
    ("bat", RiskLevel::High),
    ("cmd", RiskLevel::High),
    ("sh", RiskLevel::High),
    ("bash", RiskLevel::High),
    ("ps1", RiskLevel::High),
    ("psm1", RiskLevel::High),
    ("vbs", RiskLevel::High),
    ("vbe", RiskLevel::High),
    ("wsf", RiskLevel::High),
    ("hta", RiskLevel::High),
    ("cpl", RiskLevel::High),
    ("jar", RiskLevel::High),
    ("lnk", RiskLevel::High),
    // OS installers
    ("msi", RiskLevel::High),
    ("msix", RiskLevel::High),
    ("dmg", RiskLevel::High),
    ("pkg", RiskLevel::High),
    ("deb", RiskLevel::High),
    ("rpm", RiskLevel::High),
    ("apk", RiskLevel::High),
    // Containers and macro carriers
    ("zip", RiskLevel::Medium),
    ("rar", RiskLevel::Medium),
    ("7z", RiskLevel::Medium),
    ("iso", RiskLevel::Medium),
    ("docm", RiskLevel::Medium),
    ("xlsm", RiskLevel::Medium),
    ("pptm", RiskLevel::Medium),
    ("svg", RiskLevel::Medium),
];

/// Hex-encodes the signature window of a file header.
pub(super) fn header_hex(bytes: &[u8]) -> String {
    let window = &bytes[..bytes.len().min(MAX_SIGNATURE_BYTES)];
    hex::encode(window)
}

/// Looks up the expected signature prefixes for a MIME type.
///
/// Returns `None` for types with no registered signature.
pub(super) fn expected_signatures(mime_type: &str) -> Option<&'static [&'static str]> {
    MIME_SIGNATURES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(mime_type))
        .map(|(_, sigs)| *sigs)
}

/// Checks the header against the declared type's signature table.
///
/// `None` means the type has no registered signature (always passes);
/// `Some(true)` means the header matches one of the expected prefixes.
pub(super) fn signature_matches(header_hex: &str, mime_type: &str) -> Option<bool> {
    expected_signatures(mime_type)
        .map(|sigs| sigs.iter().any(|sig| header_hex.starts_with(sig)))
}

/// Returns the description of a known-dangerous signature the header
/// matches, if any.
pub(super) fn malicious_signature(header_hex: &str) -> Option<&'static str> {
    MALICIOUS_SIGNATURES
        .iter()
        .find(|(sig, _)| header_hex.starts_with(sig))
        .map(|(_, desc)| *desc)
}

/// Looks up the risk level of a file extension (without the dot).
pub(super) fn extension_risk(extension: &str) -> Option<RiskLevel> {
    let ext = extension.to_ascii_lowercase();
    EXTENSION_RISK
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, level)| *level)
}

/// Iterates every extension classified `High`. Used by the risk check and
/// by tests asserting table completeness.
pub(super) fn high_risk_extensions() -> impl Iterator<Item = &'static str> {
    EXTENSION_RISK
        .iter()
        .filter(|(_, level)| *level == RiskLevel::High)
        .map(|(ext, _)| *ext)
}

/// Iterates every MIME type that has a registered signature.
pub(super) fn signed_mime_types() -> impl Iterator<Item = (&'static str, &'static [&'static str])> {
    MIME_SIGNATURES.iter().copied()
}
