//! Quarantine record types.

use crate::core::ScanVerdict;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a quarantined object and its record are retained before the
/// cleanup sweep removes both.
pub const QUARANTINE_RETENTION_DAYS: i64 = 30;

/// Append-only audit entry created when a file is quarantined.
///
/// Created exactly once per quarantine event; deleted by the retention
/// sweep once `retention_expiry` has passed, together with the underlying
/// quarantined object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineRecord {
    /// Unique identifier for this record.
    pub id: String,

    /// The vault item that was quarantined.
    pub item_id: String,

    /// Owning user.
    pub user_id: String,

    /// Original file name.
    pub file_name: String,

    /// File size in bytes.
    pub file_size: u64,

    /// When the file was quarantined.
    pub quarantined_at: DateTime<Utc>,

    /// Human-readable reason for quarantine.
    pub reason: String,

    /// Threats that triggered the quarantine.
    pub threats: Vec<String>,

    /// Provider tag of the verdict that triggered the quarantine.
    pub scan_provider: String,

    /// Staging key the object was moved from, for forensic traceability
    /// after the staging object is deleted.
    pub staging_key: String,

    /// Quarantine bucket holding the object.
    pub quarantine_bucket: String,

    /// Object key within the quarantine bucket.
    pub quarantine_key: String,

    /// When the record (and object) become eligible for cleanup.
    pub retention_expiry: DateTime<Utc>,
}

impl QuarantineRecord {
    /// Creates a record for a quarantine event, with the standard 30-day
    /// retention window.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        item_id: impl Into<String>,
        user_id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        verdict: &ScanVerdict,
        staging_key: impl Into<String>,
        quarantine_bucket: impl Into<String>,
        quarantine_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.into(),
            user_id: user_id.into(),
            file_name: file_name.into(),
            file_size,
            quarantined_at: now,
            reason: format!("Threats detected: {}", verdict.threats.join("; ")),
            threats: verdict.threats.clone(),
            scan_provider: verdict.provider.clone(),
            staging_key: staging_key.into(),
            quarantine_bucket: quarantine_bucket.into(),
            quarantine_key: quarantine_key.into(),
            retention_expiry: now + Duration::days(QUARANTINE_RETENTION_DAYS),
        }
    }

    /// Returns `true` once the retention window has passed.
    pub fn is_expired(&self, as_of: DateTime<Utc>) -> bool {
        self.retention_expiry <= as_of
    }
}
