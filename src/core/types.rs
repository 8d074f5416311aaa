//! Core types used throughout the vaultscan library.
//!
//! This module defines the fundamental data structures for representing
//! vault items, their storage locations, scan verdicts, and cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Synthetic threat recorded when the external scanner cannot be reached.
///
/// Uncertainty about file safety must never resolve to "safe", so a failed
/// scan produces a verdict carrying exactly this threat.
pub const SCAN_FAILED_THREAT: &str =
    "External virus scan failed - file rejected for safety";

/// The scan lifecycle state of a vault item.
///
/// Items are created `Pending` in staging by the upload flow, claimed into
/// `Scanning` by the batch processor, and driven to a terminal state
/// (`Clean`, `Infected`, or `Error`) exclusively by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Awaiting a scan; the object lives in staging.
    Pending,
    /// Claimed by a scan run; no other run may process this item.
    Scanning,
    /// Scan passed; the object has been released to permanent storage.
    Clean,
    /// Threats found; the object has been moved to the quarantine bucket.
    Infected,
    /// The scan pipeline failed for this item; see `scan_results.error`.
    Error,
}

impl ScanStatus {
    /// Returns `true` for states the orchestrator never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Clean | Self::Infected | Self::Error)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Scanning => write!(f, "scanning"),
            Self::Clean => write!(f, "clean"),
            Self::Infected => write!(f, "infected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Storage backend holding a vault object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageProvider {
    /// The staging area new uploads land in before scanning.
    R2Staging,
    /// Cold permanent storage for released files.
    B2,
    /// Hot object storage; also hosts the quarantine bucket.
    R2,
}

impl StorageProvider {
    /// Returns `true` if this is the staging provider.
    pub fn is_staging(&self) -> bool {
        matches!(self, Self::R2Staging)
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R2Staging => write!(f, "r2_staging"),
            Self::B2 => write!(f, "b2"),
            Self::R2 => write!(f, "r2"),
        }
    }
}

/// The single storage location of a vault object.
///
/// A vault item points at exactly one of staging, final, or quarantine
/// storage at any time; the orchestrator swaps the whole location in one
/// update so observers never see two valid locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocation {
    /// Backend holding the object.
    pub provider: StorageProvider,
    /// Bucket name within the provider.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

impl StorageLocation {
    /// Creates a new location.
    pub fn new(
        provider: StorageProvider,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.provider, self.bucket, self.key)
    }
}

/// A user-owned file record moving through the scan pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    /// Opaque item ID, owned by the domain collaborator.
    pub id: String,

    /// Owning user.
    pub user_id: String,

    /// Original file name as uploaded.
    pub file_name: String,

    /// Declared MIME type from the upload.
    pub mime_type: String,

    /// File size in bytes.
    pub size: u64,

    /// Current scan lifecycle state.
    pub scan_status: ScanStatus,

    /// Where the object currently lives (staging, final, or quarantine).
    pub location: StorageLocation,

    /// Outcome of the most recent scan, once one has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_results: Option<ScanRecord>,

    /// Populated only for infected items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_info: Option<QuarantineInfo>,

    /// When the item was created by the upload flow.
    pub created_at: DateTime<Utc>,
}

impl VaultItem {
    /// Creates a new item in `Pending` state pointing at staging storage.
    pub fn new_staged(
        id: impl Into<String>,
        user_id: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        location: StorageLocation,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size,
            scan_status: ScanStatus::Pending,
            location,
            scan_results: None,
            quarantine_info: None,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if the object is still in the staging area.
    pub fn is_staged(&self) -> bool {
        self.location.provider.is_staging()
    }
}

/// Persisted outcome of a scan, embedded in the vault item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    /// When the scan completed.
    pub scanned_at: DateTime<Utc>,

    /// Detected threats, empty for a clean result.
    pub threats: Vec<String>,

    /// Provider tag of the verdict origin (e.g. `cloudmersive`, `internal`).
    pub provider: String,

    /// Error text when the pipeline failed for this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanRecord {
    /// Builds a record describing a pipeline failure.
    pub fn from_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scanned_at: Utc::now(),
            threats: Vec::new(),
            provider: provider.into(),
            error: Some(message.into()),
        }
    }
}

impl From<&ScanVerdict> for ScanRecord {
    fn from(verdict: &ScanVerdict) -> Self {
        Self {
            scanned_at: verdict.scanned_at,
            threats: verdict.threats.clone(),
            provider: verdict.provider.clone(),
            error: None,
        }
    }
}

/// Quarantine placement details embedded in an infected vault item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineInfo {
    /// When the object was quarantined.
    pub quarantined_at: DateTime<Utc>,

    /// Human-readable reason, derived from the threat list.
    pub reason: String,

    /// Quarantine bucket name.
    pub bucket: String,

    /// Object key within the quarantine bucket.
    pub key: String,
}

/// The normalized outcome of scanning one file.
///
/// Construct through [`ScanVerdict::clean`], [`ScanVerdict::from_threats`],
/// or [`ScanVerdict::failed_closed`]; all three maintain the invariant that
/// `safe` is `true` exactly when `threats` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanVerdict {
    /// Whether the file may be released to permanent storage.
    pub safe: bool,

    /// Detected threats, in detection order.
    pub threats: Vec<String>,

    /// When the verdict was produced.
    pub scanned_at: DateTime<Utc>,

    /// SHA-256 content hash of the scanned bytes (hex).
    pub file_hash: String,

    /// Origin tag: `cloudmersive`, `cloudmersive_error`,
    /// `cloudmersive_skipped_size`, `internal`, ...
    pub provider: String,
}

impl ScanVerdict {
    /// A clean verdict with no threats.
    pub fn clean(file_hash: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            safe: true,
            threats: Vec::new(),
            scanned_at: Utc::now(),
            file_hash: file_hash.into(),
            provider: provider.into(),
        }
    }

    /// A verdict derived from a threat list; safe exactly when it is empty.
    pub fn from_threats(
        file_hash: impl Into<String>,
        provider: impl Into<String>,
        threats: Vec<String>,
    ) -> Self {
        Self {
            safe: threats.is_empty(),
            threats,
            scanned_at: Utc::now(),
            file_hash: file_hash.into(),
            provider: provider.into(),
        }
    }

    /// The fail-closed verdict used when the external scanner is unreachable
    /// or returns garbage. Tagged `{provider}_error` so callers can tell a
    /// detection from an outage.
    pub fn failed_closed(file_hash: impl Into<String>, provider: &str) -> Self {
        Self {
            safe: false,
            threats: vec![SCAN_FAILED_THREAT.to_string()],
            scanned_at: Utc::now(),
            file_hash: file_hash.into(),
            provider: format!("{provider}_error"),
        }
    }

    /// A verdict for a file too large to submit externally. Pre-screening
    /// still ran, so skipping the upload is policy, not a gap.
    pub fn skipped_size(file_hash: impl Into<String>, provider: &str) -> Self {
        Self {
            safe: true,
            threats: Vec::new(),
            scanned_at: Utc::now(),
            file_hash: file_hash.into(),
            provider: format!("{provider}_skipped_size"),
        }
    }

    /// Returns `true` if this verdict came out of a scanner failure rather
    /// than an actual detection.
    pub fn is_scan_failure(&self) -> bool {
        self.provider.ends_with("_error")
    }
}

/// Content-hash-keyed cache entry avoiding re-scans of identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCacheEntry {
    /// SHA-256 content hash (hex), the cache key.
    pub file_hash: String,

    /// The cached verdict.
    pub verdict: ScanVerdict,

    /// File name at the time of the original scan.
    pub file_name: String,

    /// Size of the original file in bytes.
    pub size: u64,

    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
}

impl ScanCacheEntry {
    /// Creates a cache entry for a verdict.
    pub fn new(verdict: ScanVerdict, file_name: impl Into<String>, size: u64) -> Self {
        Self {
            file_hash: verdict.file_hash.clone(),
            verdict,
            file_name: file_name.into(),
            size,
            cached_at: Utc::now(),
        }
    }

    /// Returns `true` while the entry is within its TTL.
    pub fn is_fresh(&self, ttl: chrono::Duration) -> bool {
        Utc::now() - self.cached_at < ttl
    }
}
