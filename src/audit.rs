//! Structured audit event emission.
//!
//! Security-relevant transitions are emitted as structured `tracing` events
//! under the `vaultscan::audit` target so they can be routed to an audit
//! sink independently of operational logs.

use crate::core::{ScanStatus, ScanVerdict};
use crate::vault::record::QuarantineRecord;

/// Emits an audit event for a scan starting on an item.
pub fn emit_scan_started(item_id: &str, file_hash: &str, provider: &str) {
    tracing::info!(
        target: "vaultscan::audit",
        event_type = "scan_started",
        item_id = %item_id,
        file_hash = %file_hash,
        provider = %provider,
        "Scan started"
    );
}

/// Emits an audit event for a completed scan verdict.
pub fn emit_scan_verdict(item_id: &str, verdict: &ScanVerdict) {
    tracing::info!(
        target: "vaultscan::audit",
        event_type = "scan_verdict",
        item_id = %item_id,
        file_hash = %verdict.file_hash,
        safe = verdict.safe,
        provider = %verdict.provider,
        threats = ?verdict.threats,
        threat_count = verdict.threats.len(),
        "Scan verdict produced"
    );
}

/// Emits an audit event for a clean file released to permanent storage.
pub fn emit_release(item_id: &str, user_id: &str, final_key: &str) {
    tracing::info!(
        target: "vaultscan::audit",
        event_type = "file_released",
        item_id = %item_id,
        user_id = %user_id,
        final_key = %final_key,
        "Clean file released to permanent storage"
    );
}

/// Emits an audit event for a file moved to quarantine.
pub fn emit_quarantine(record: &QuarantineRecord) {
    tracing::warn!(
        target: "vaultscan::audit",
        event_type = "file_quarantined",
        record_id = %record.id,
        item_id = %record.item_id,
        user_id = %record.user_id,
        file_name = %record.file_name,
        reason = %record.reason,
        threats = ?record.threats,
        scan_provider = %record.scan_provider,
        staging_key = %record.staging_key,
        quarantine_key = %record.quarantine_key,
        "File quarantined"
    );
}

/// Emits an audit event for a retention-sweep run.
pub fn emit_retention_sweep(deleted: usize, errors: usize) {
    tracing::info!(
        target: "vaultscan::audit",
        event_type = "retention_sweep",
        deleted = deleted,
        errors = errors,
        "Quarantine retention sweep completed"
    );
}

/// Emits an audit event for a webhook-applied status update.
pub fn emit_webhook_applied(item_id: &str, status: ScanStatus) {
    tracing::info!(
        target: "vaultscan::audit",
        event_type = "webhook_applied",
        item_id = %item_id,
        status = %status,
        "Webhook scan result applied"
    );
}
