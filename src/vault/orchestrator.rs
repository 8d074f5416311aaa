//! The quarantine/release orchestrator.
//!
//! Given a scan verdict for a staged object, atomically relocates it either
//! to permanent storage (clean) or to the quarantine bucket (infected),
//! records provenance, and updates the owning vault item. The ordering
//! invariant throughout is "write destination, then delete source": a
//! staging object is only ever deleted after a confirmed write to its
//! destination, accepting transient duplication over permanent loss.

use crate::audit;
use crate::core::{
    QuarantineInfo, ScanRecord, ScanStatus, ScanVerdict, StorageLocation, StorageProvider,
    VaultError, VaultItem, VaultResult,
};
use crate::repository::{ArcRepository, VaultRepository};
use crate::storage::{DownloadUrlRequest, ObjectTransfer, StorageRouter, UploadUrlRequest};
use crate::vault::record::QuarantineRecord;

use chrono::Utc;
use std::sync::Arc;

/// Page size for the retention sweep.
const CLEANUP_PAGE_SIZE: usize = 100;

/// Bucket layout and destination choices for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Provider clean files are released to.
    pub final_provider: StorageProvider,
    /// Bucket clean files are released to.
    pub final_bucket: String,
    /// Provider hosting the quarantine bucket.
    pub quarantine_provider: StorageProvider,
    /// Bucket infected files are moved to.
    pub quarantine_bucket: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            final_provider: StorageProvider::B2,
            final_bucket: "vault".to_string(),
            quarantine_provider: StorageProvider::R2,
            quarantine_bucket: "quarantine".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the final-storage destination.
    pub fn with_final_storage(
        mut self,
        provider: StorageProvider,
        bucket: impl Into<String>,
    ) -> Self {
        self.final_provider = provider;
        self.final_bucket = bucket.into();
        self
    }

    /// Sets the quarantine destination.
    pub fn with_quarantine_storage(
        mut self,
        provider: StorageProvider,
        bucket: impl Into<String>,
    ) -> Self {
        self.quarantine_provider = provider;
        self.quarantine_bucket = bucket.into();
        self
    }
}

/// What `process_scan_result` did with the item.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The file was clean and released to permanent storage.
    Released {
        /// Key of the released object in final storage.
        final_key: String,
    },
    /// The file was infected and quarantined.
    Quarantined {
        /// ID of the created quarantine record.
        record_id: String,
    },
    /// The item was already in a terminal state; nothing was touched.
    /// Makes retried webhooks and duplicate claims harmless.
    AlreadyFinalized,
}

/// Report of one retention-sweep run.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Quarantined objects (and records) deleted.
    pub deleted: usize,
    /// Per-record failures; the sweep continues past them.
    pub errors: Vec<String>,
}

/// Drives the `Scanning → {Clean, Infected}` transitions.
#[derive(Debug)]
pub struct VaultScanOrchestrator {
    repository: ArcRepository,
    storage: Arc<dyn StorageRouter>,
    transfer: Arc<dyn ObjectTransfer>,
    config: OrchestratorConfig,
}

impl VaultScanOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    pub fn new(
        repository: ArcRepository,
        storage: Arc<dyn StorageRouter>,
        transfer: Arc<dyn ObjectTransfer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            repository,
            storage,
            transfer,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Applies a scan verdict to a staged item.
    ///
    /// This is the only path that advances an item past `Scanning`. If the
    /// item is already terminal the call is an observable no-op
    /// ([`ProcessOutcome::AlreadyFinalized`]); a failure anywhere else
    /// surfaces the error and leaves the item in `Scanning` for the caller
    /// to mark errored or retry.
    pub async fn process_scan_result(
        &self,
        item_id: &str,
        staging_key: &str,
        verdict: &ScanVerdict,
    ) -> VaultResult<ProcessOutcome> {
        let item = self
            .repository
            .get_item(item_id)
            .await?
            .ok_or_else(|| VaultError::item_not_found(item_id))?;

        if item.scan_status.is_terminal() {
            tracing::info!(
                item_id = %item_id,
                status = %item.scan_status,
                "Scan result for already-finalized item ignored"
            );
            return Ok(ProcessOutcome::AlreadyFinalized);
        }

        audit::emit_scan_verdict(item_id, verdict);

        if verdict.safe {
            let final_key = self.move_to_final_storage(&item, staging_key, verdict).await?;
            Ok(ProcessOutcome::Released { final_key })
        } else {
            let record_id = self.move_to_quarantine(&item, staging_key, verdict).await?;
            Ok(ProcessOutcome::Quarantined { record_id })
        }
    }

    /// Relocates a clean staged object to permanent storage.
    async fn move_to_final_storage(
        &self,
        item: &VaultItem,
        staging_key: &str,
        verdict: &ScanVerdict,
    ) -> VaultResult<String> {
        let final_key = format!(
            "vault/{}/{}_{}",
            item.user_id,
            Utc::now().timestamp_millis(),
            item.file_name
        );
        let destination = StorageLocation::new(
            self.config.final_provider,
            self.config.final_bucket.clone(),
            final_key.clone(),
        );

        let data = self.fetch_staged(item, staging_key).await?;

        let upload = self
            .storage
            .generate_upload_url(
                &UploadUrlRequest::new(destination.clone())
                    .with_content_type(item.mime_type.clone()),
            )
            .await?;
        self.transfer
            .put(&upload, &final_key, data, &item.mime_type)
            .await?;

        self.delete_staged(item, staging_key).await?;

        // Only now, with the destination written and staging gone, does the
        // item flip to its final location.
        let mut updated = item.clone();
        updated.location = destination;
        updated.scan_status = ScanStatus::Clean;
        updated.scan_results = Some(ScanRecord::from(verdict));
        updated.quarantine_info = None;
        self.repository.update_item(&updated).await?;

        audit::emit_release(&item.id, &item.user_id, &final_key);
        Ok(final_key)
    }

    /// Relocates an infected staged object to the quarantine bucket and
    /// creates its audit record.
    async fn move_to_quarantine(
        &self,
        item: &VaultItem,
        staging_key: &str,
        verdict: &ScanVerdict,
    ) -> VaultResult<String> {
        let quarantine_key = format!(
            "quarantine/{}/{}_{}",
            item.user_id,
            Utc::now().timestamp_millis(),
            item.file_name
        );
        let destination = StorageLocation::new(
            self.config.quarantine_provider,
            self.config.quarantine_bucket.clone(),
            quarantine_key.clone(),
        );

        let data = self.fetch_staged(item, staging_key).await?;

        // Provenance travels on the object itself so the trail survives
        // even if the record is lost.
        let upload = self
            .storage
            .generate_upload_url(
                &UploadUrlRequest::new(destination.clone())
                    .with_content_type(item.mime_type.clone())
                    .with_metadata("quarantined-at", Utc::now().to_rfc3339())
                    .with_metadata("item-id", item.id.clone())
                    .with_metadata("user-id", item.user_id.clone())
                    .with_metadata("threats", verdict.threats.join(";"))
                    .with_metadata("staging-key", staging_key.to_string()),
            )
            .await?;
        self.transfer
            .put(&upload, &quarantine_key, data, &item.mime_type)
            .await?;

        self.delete_staged(item, staging_key).await?;

        let record = QuarantineRecord::new(
            item.id.clone(),
            item.user_id.clone(),
            item.file_name.clone(),
            item.size,
            verdict,
            staging_key,
            self.config.quarantine_bucket.clone(),
            quarantine_key.clone(),
        );
        self.repository.create_quarantine_record(&record).await?;

        let mut updated = item.clone();
        updated.location = destination;
        updated.scan_status = ScanStatus::Infected;
        updated.scan_results = Some(ScanRecord::from(verdict));
        updated.quarantine_info = Some(QuarantineInfo {
            quarantined_at: record.quarantined_at,
            reason: record.reason.clone(),
            bucket: self.config.quarantine_bucket.clone(),
            key: quarantine_key,
        });
        self.repository.update_item(&updated).await?;

        audit::emit_quarantine(&record);
        Ok(record.id)
    }

    async fn fetch_staged(&self, item: &VaultItem, staging_key: &str) -> VaultResult<Vec<u8>> {
        let source = StorageLocation::new(
            item.location.provider,
            item.location.bucket.clone(),
            staging_key.to_string(),
        );
        let download = self
            .storage
            .generate_download_url(&DownloadUrlRequest::new(source))
            .await?;
        Ok(self.transfer.fetch(&download, staging_key).await?)
    }

    async fn delete_staged(&self, item: &VaultItem, staging_key: &str) -> VaultResult<()> {
        let staged = StorageLocation::new(
            item.location.provider,
            item.location.bucket.clone(),
            staging_key.to_string(),
        );
        Ok(self.storage.delete_file(&staged).await?)
    }

    /// Deletes quarantined objects and records whose retention has expired.
    ///
    /// Processes records in pages; a per-record failure is collected and
    /// the sweep moves on. Running the sweep again with nothing newly
    /// expired deletes nothing.
    pub async fn cleanup_expired_quarantined_files(&self) -> VaultResult<CleanupReport> {
        let mut report = CleanupReport::default();
        let mut attempted = std::collections::HashSet::new();
        let now = Utc::now();

        loop {
            let page = self
                .repository
                .expired_quarantine_records(now, CLEANUP_PAGE_SIZE)
                .await?;

            // Records whose deletion failed earlier keep showing up; only
            // fresh ones represent progress.
            let fresh: Vec<_> = page
                .into_iter()
                .filter(|r| attempted.insert(r.id.clone()))
                .collect();
            if fresh.is_empty() {
                break;
            }

            for record in fresh {
                let object = StorageLocation::new(
                    self.config.quarantine_provider,
                    record.quarantine_bucket.clone(),
                    record.quarantine_key.clone(),
                );

                if let Err(e) = self.storage.delete_file(&object).await {
                    report
                        .errors
                        .push(format!("record {}: object delete failed: {e}", record.id));
                    continue;
                }
                if let Err(e) = self.repository.delete_quarantine_record(&record.id).await {
                    report
                        .errors
                        .push(format!("record {}: record delete failed: {e}", record.id));
                    continue;
                }
                report.deleted += 1;
            }
        }

        audit::emit_retention_sweep(report.deleted, report.errors.len());
        Ok(report)
    }
}
