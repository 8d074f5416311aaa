//! The scan pipeline: selection, claiming, and per-item processing.

use crate::audit;
use crate::backends::{ArcScanner, Scanner};
use crate::core::{
    FileHasher, ScanCacheEntry, ScanRecord, ScanStatus, ScanVerdict, VaultError, VaultItem,
    VaultResult,
};
use crate::pipeline::Notifier;
use crate::prescreen;
use crate::repository::{ArcRepository, QuarantineStatus, VaultRepository};
use crate::storage::{DownloadUrlRequest, ObjectTransfer, StorageRouter};
use crate::vault::{ProcessOutcome, VaultScanOrchestrator};

use std::sync::Arc;

/// Batch size used by the scheduled processor (runs every 5 minutes).
pub const SCHEDULED_BATCH_SIZE: usize = 20;

/// Provider tag for verdicts produced by local pre-screening alone.
const INTERNAL_PROVIDER: &str = "internal";

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct ScanPipelineConfig {
    /// Scan-cache TTL; identical bytes re-uploaded within this window skip
    /// the external call.
    pub cache_ttl: chrono::Duration,

    /// Batch size for the manual entry point when none is given.
    pub default_batch_size: usize,
}

impl Default for ScanPipelineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: chrono::Duration::hours(24),
            default_batch_size: 50,
        }
    }
}

/// One item's failure inside a batch.
#[derive(Debug, Clone)]
pub struct BatchItemError {
    /// The item that failed.
    pub item_id: String,
    /// What went wrong.
    pub message: String,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Items the run claimed and processed.
    pub processed: usize,
    /// Items that reached a terminal verdict.
    pub succeeded: usize,
    /// Items marked `Error`.
    pub failed: usize,
    /// Per-item failure details.
    pub errors: Vec<BatchItemError>,
}

/// Builder for [`ScanPipeline`].
#[derive(Debug, Default)]
pub struct ScanPipelineBuilder {
    repository: Option<ArcRepository>,
    storage: Option<Arc<dyn StorageRouter>>,
    transfer: Option<Arc<dyn ObjectTransfer>>,
    scanner: Option<ArcScanner>,
    orchestrator: Option<Arc<VaultScanOrchestrator>>,
    notifier: Option<Arc<dyn Notifier>>,
    config: Option<ScanPipelineConfig>,
}

impl ScanPipelineBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the repository.
    pub fn with_repository(mut self, repository: ArcRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Sets the storage router.
    pub fn with_storage(mut self, storage: Arc<dyn StorageRouter>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the object transfer client.
    pub fn with_transfer(mut self, transfer: Arc<dyn ObjectTransfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// Sets the external scanner.
    pub fn with_scanner(mut self, scanner: ArcScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Sets the orchestrator.
    pub fn with_orchestrator(mut self, orchestrator: Arc<VaultScanOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    /// Sets the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ScanPipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the pipeline; every collaborator except the notifier and the
    /// configuration is required.
    pub fn build(self) -> VaultResult<ScanPipeline> {
        let missing = |what: &str| VaultError::repository(format!("pipeline requires {what}"));
        Ok(ScanPipeline {
            repository: self.repository.ok_or_else(|| missing("a repository"))?,
            storage: self.storage.ok_or_else(|| missing("a storage router"))?,
            transfer: self.transfer.ok_or_else(|| missing("a transfer client"))?,
            scanner: self.scanner.ok_or_else(|| missing("a scanner"))?,
            orchestrator: self.orchestrator.ok_or_else(|| missing("an orchestrator"))?,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(crate::pipeline::NoopNotifier::new())),
            hasher: FileHasher::new(),
            config: self.config.unwrap_or_default(),
        })
    }
}

/// Processes staged vault items through the scan pipeline.
///
/// All collaborators are injected; nothing here is a process-wide
/// singleton, so concurrent invocations share no hidden state.
#[derive(Debug)]
pub struct ScanPipeline {
    repository: ArcRepository,
    storage: Arc<dyn StorageRouter>,
    transfer: Arc<dyn ObjectTransfer>,
    scanner: ArcScanner,
    orchestrator: Arc<VaultScanOrchestrator>,
    notifier: Arc<dyn Notifier>,
    hasher: FileHasher,
    config: ScanPipelineConfig,
}

impl ScanPipeline {
    /// Creates a builder.
    pub fn builder() -> ScanPipelineBuilder {
        ScanPipelineBuilder::new()
    }

    /// Scans a batch of staged items.
    ///
    /// Selection failures abort the batch; everything after that is
    /// isolated per item. An item whose pipeline fails is marked `Error`
    /// with the message embedded and the batch moves on. Items lost to a
    /// concurrent claimer are skipped without counting as processed.
    pub async fn process_vault_item_scans(
        &self,
        batch_size: usize,
        force_rescan: bool,
    ) -> VaultResult<BatchReport> {
        let items = self
            .repository
            .select_pending_scans(batch_size, force_rescan)
            .await?;

        tracing::info!(
            selected = items.len(),
            batch_size = batch_size,
            force_rescan = force_rescan,
            "Starting scan batch"
        );

        let mut report = BatchReport::default();
        for item in items {
            if !self
                .repository
                .claim_for_scanning(&item.id, force_rescan)
                .await?
            {
                tracing::debug!(item_id = %item.id, "Item claimed elsewhere, skipping");
                continue;
            }
            report.processed += 1;

            match self.scan_staged_item(&item).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(
                        item_id = %item.id,
                        error = %message,
                        "Item scan failed, continuing batch"
                    );
                    self.mark_item_error(&item.id, &message).await;
                    report.failed += 1;
                    report.errors.push(BatchItemError {
                        item_id: item.id.clone(),
                        message,
                    });
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Scan batch completed"
        );
        Ok(report)
    }

    /// Manual admin entry point; authentication happens upstream.
    pub async fn process_pending_scans(
        &self,
        batch_size: Option<usize>,
        force_rescan: bool,
    ) -> VaultResult<BatchReport> {
        let size = batch_size.unwrap_or(self.config.default_batch_size);
        self.process_vault_item_scans(size, force_rescan).await
    }

    /// Scheduled entry point, invoked every 5 minutes.
    pub async fn scheduled_scan_processor(&self) -> VaultResult<BatchReport> {
        self.process_vault_item_scans(SCHEDULED_BATCH_SIZE, false).await
    }

    /// Scans one item synchronously on behalf of its owner.
    ///
    /// Ownership is enforced here before any forced rescan; the item must
    /// still be staged.
    pub async fn scan_vault_item(
        &self,
        item_id: &str,
        caller_user_id: &str,
        force_rescan: bool,
    ) -> VaultResult<ProcessOutcome> {
        let item = self
            .repository
            .get_item(item_id)
            .await?
            .ok_or_else(|| VaultError::item_not_found(item_id))?;

        if item.user_id != caller_user_id {
            return Err(VaultError::NotOwner {
                user_id: caller_user_id.to_string(),
                item_id: item_id.to_string(),
            });
        }
        if !item.is_staged() {
            return Err(VaultError::invalid_state(
                item_id,
                item.scan_status,
                "item is no longer in staging",
            ));
        }

        if !self
            .repository
            .claim_for_scanning(item_id, force_rescan)
            .await?
        {
            return Err(VaultError::invalid_state(
                item_id,
                item.scan_status,
                "item could not be claimed for scanning",
            ));
        }

        match self.scan_staged_item(&item).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.mark_item_error(item_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// The caller's quarantined files plus pending-scan count.
    pub async fn get_quarantine_status(&self, user_id: &str) -> VaultResult<QuarantineStatus> {
        self.repository.quarantine_status(user_id).await
    }

    /// Runs one claimed item through the full pipeline.
    async fn scan_staged_item(&self, item: &VaultItem) -> VaultResult<ProcessOutcome> {
        let staging_key = item.location.key.clone();

        // Download the staged bytes
        let download = self
            .storage
            .generate_download_url(&DownloadUrlRequest::new(item.location.clone()))
            .await?;
        let data = self.transfer.fetch(&download, &staging_key).await?;

        let file_hash = self.hasher.hash_bytes(&data).sha256;
        audit::emit_scan_started(&item.id, &file_hash, self.scanner.name());

        let verdict = self.resolve_verdict(item, &data, &file_hash).await?;

        let outcome = self
            .orchestrator
            .process_scan_result(&item.id, &staging_key, &verdict)
            .await?;

        if !verdict.safe {
            // Best-effort: a failed notification never fails the scan
            if let Err(e) = self
                .notifier
                .notify_infection(&item.user_id, item, &verdict.threats)
                .await
            {
                tracing::warn!(
                    item_id = %item.id,
                    error = %e,
                    "Infection notification failed"
                );
            }
        }

        Ok(outcome)
    }

    /// Pre-screen, cache lookup, and external scan, in that order.
    async fn resolve_verdict(
        &self,
        item: &VaultItem,
        data: &[u8],
        file_hash: &str,
    ) -> VaultResult<ScanVerdict> {
        let report = prescreen::pre_screen(data, &item.mime_type, &item.file_name);

        // Hard local findings reject without spending an external call,
        // even over a cached clean verdict.
        if report.has_hard_findings() {
            tracing::warn!(
                item_id = %item.id,
                findings = ?report.findings,
                "Pre-screen rejected file locally"
            );
            return Ok(ScanVerdict::from_threats(
                file_hash,
                INTERNAL_PROVIDER,
                report.threat_strings(),
            ));
        }

        // Soft findings are advisory; the external verdict stays
        // authoritative.
        if !report.is_clean() {
            tracing::info!(
                item_id = %item.id,
                findings = ?report.findings,
                "Pre-screen advisory findings"
            );
        }

        if let Some(entry) = self
            .repository
            .cached_verdict(file_hash, self.config.cache_ttl)
            .await?
        {
            tracing::debug!(
                item_id = %item.id,
                file_hash = %file_hash,
                "Scan cache hit, skipping external call"
            );
            return Ok(entry.verdict);
        }

        let verdict = self
            .scanner
            .scan(data, &item.file_name, file_hash)
            .await;

        // Best-effort cache write; failed-closed verdicts are outages, not
        // facts about the bytes, and must not be cached.
        if !verdict.is_scan_failure() {
            let entry = ScanCacheEntry::new(verdict.clone(), item.file_name.clone(), item.size);
            if let Err(e) = self.repository.cache_verdict(&entry).await {
                tracing::warn!(
                    file_hash = %file_hash,
                    error = %e,
                    "Scan cache write failed"
                );
            }
        }

        Ok(verdict)
    }

    /// Marks an item `Error` with the failure message. Itself best-effort:
    /// if even this write fails there is nothing left to do but log.
    async fn mark_item_error(&self, item_id: &str, message: &str) {
        let result = async {
            let Some(mut item) = self.repository.get_item(item_id).await? else {
                return Ok(());
            };
            item.scan_status = ScanStatus::Error;
            item.scan_results = Some(ScanRecord::from_error(self.scanner.name(), message));
            self.repository.update_item(&item).await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                item_id = %item_id,
                error = %e,
                "Failed to mark item as errored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockOutcome, MockScanner};
    use crate::core::{StorageLocation, StorageProvider};
    use crate::repository::MemoryRepository;
    use crate::storage::MemoryStorage;
    use crate::vault::OrchestratorConfig;

    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        notifications: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn count(&self) -> usize {
            self.notifications.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_infection(
            &self,
            user_id: &str,
            item: &VaultItem,
            _threats: &[String],
        ) -> VaultResult<()> {
            if self.fail {
                return Err(VaultError::repository("notification channel down"));
            }
            self.notifications
                .lock()
                .unwrap()
                .push((user_id.to_string(), item.id.clone()));
            Ok(())
        }
    }

    struct Fixture {
        repo: Arc<MemoryRepository>,
        storage: Arc<MemoryStorage>,
        scanner: Arc<MockScanner>,
        notifier: Arc<RecordingNotifier>,
        pipeline: ScanPipeline,
    }

    fn fixture_with(scanner: MockScanner, notifier: RecordingNotifier) -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let storage = Arc::new(MemoryStorage::new());
        let scanner = Arc::new(scanner);
        let notifier = Arc::new(notifier);
        let orchestrator = Arc::new(VaultScanOrchestrator::new(
            repo.clone(),
            storage.clone(),
            storage.clone(),
            OrchestratorConfig::default(),
        ));
        let pipeline = ScanPipeline::builder()
            .with_repository(repo.clone())
            .with_storage(storage.clone())
            .with_transfer(storage.clone())
            .with_scanner(scanner.clone())
            .with_orchestrator(orchestrator)
            .with_notifier(notifier.clone())
            .build()
            .unwrap();

        Fixture {
            repo,
            storage,
            scanner,
            notifier,
            pipeline,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockScanner::new_clean(), RecordingNotifier::default())
    }

    /// Stages an item with JPEG-looking bytes unique to the item ID.
    fn stage_item(fx: &Fixture, id: &str, user: &str) -> VaultItem {
        let file_name = format!("{id}.jpg");
        let key = format!("staging/{file_name}");
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(id.as_bytes());
        data.extend(std::iter::repeat(0u8).take(200));

        fx.storage
            .insert_object("staging", key.clone(), data, "image/jpeg");
        let item = VaultItem::new_staged(
            id,
            user,
            file_name,
            "image/jpeg",
            204,
            StorageLocation::new(StorageProvider::R2Staging, "staging", key),
        );
        fx.repo.insert_item(item.clone());
        item
    }

    #[tokio::test]
    async fn batch_processes_clean_items() {
        let fx = fixture();
        stage_item(&fx, "a", "u1");
        stage_item(&fx, "b", "u1");

        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);

        for id in ["a", "b"] {
            let item = fx.repo.get_item(id).await.unwrap().unwrap();
            assert_eq!(item.scan_status, ScanStatus::Clean);
        }
        assert!(fx.storage.keys_in_bucket("staging").is_empty());
    }

    #[tokio::test]
    async fn one_bad_item_does_not_abort_the_batch() {
        let fx = fixture();
        stage_item(&fx, "good", "u1");

        // An item whose staged bytes are missing: download fails
        let orphan = VaultItem::new_staged(
            "orphan",
            "u1",
            "orphan.jpg",
            "image/jpeg",
            10,
            StorageLocation::new(StorageProvider::R2Staging, "staging", "staging/orphan.jpg"),
        );
        fx.repo.insert_item(orphan);

        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].item_id, "orphan");

        let errored = fx.repo.get_item("orphan").await.unwrap().unwrap();
        assert_eq!(errored.scan_status, ScanStatus::Error);
        assert!(errored.scan_results.unwrap().error.is_some());

        let good = fx.repo.get_item("good").await.unwrap().unwrap();
        assert_eq!(good.scan_status, ScanStatus::Clean);
    }

    #[tokio::test]
    async fn infected_item_quarantines_and_notifies() {
        let fx = fixture_with(
            MockScanner::new_infected(vec!["Virus: EICAR-Test (engineA)".into()]),
            RecordingNotifier::default(),
        );
        stage_item(&fx, "bad", "u1");

        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);

        let item = fx.repo.get_item("bad").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Infected);
        assert_eq!(fx.notifier.count(), 1);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_scan() {
        let fx = fixture_with(
            MockScanner::new_infected(vec!["Virus: X".into()]),
            RecordingNotifier::failing(),
        );
        stage_item(&fx, "bad", "u1");

        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_external_call() {
        let fx = fixture();
        stage_item(&fx, "first", "u1");
        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(fx.scanner.scan_count(), 1);

        // Same bytes under a new item: cache supplies the verdict
        let first_key = "staging/first.jpg";
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(b"first");
        data.extend(std::iter::repeat(0u8).take(200));
        fx.storage
            .insert_object("staging", first_key, data, "image/jpeg");
        let mut duplicate = VaultItem::new_staged(
            "second",
            "u2",
            "first.jpg",
            "image/jpeg",
            204,
            StorageLocation::new(StorageProvider::R2Staging, "staging", first_key),
        );
        duplicate.created_at = chrono::Utc::now();
        fx.repo.insert_item(duplicate);

        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(fx.scanner.scan_count(), 1, "external call should be skipped");
    }

    #[tokio::test]
    async fn failed_closed_verdict_is_not_cached() {
        let fx = fixture_with(MockScanner::new_unreachable(), RecordingNotifier::default());
        stage_item(&fx, "a", "u1");

        fx.pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();

        // The verdict failed closed; the hash must not be in the cache
        let item = fx.repo.get_item("a").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Infected);
        let hash = item.scan_results.unwrap();
        assert_eq!(hash.provider, "mock_error");

        // Re-stage the same bytes: the scanner is consulted again
        let before = fx.scanner.scan_count();
        let key = "staging/retry.jpg";
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(b"a");
        data.extend(std::iter::repeat(0u8).take(200));
        fx.storage.insert_object("staging", key, data, "image/jpeg");
        fx.repo.insert_item(VaultItem::new_staged(
            "retry",
            "u1",
            "retry.jpg",
            "image/jpeg",
            204,
            StorageLocation::new(StorageProvider::R2Staging, "staging", key),
        ));
        fx.pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(fx.scanner.scan_count(), before + 1);
    }

    #[tokio::test]
    async fn hard_prescreen_finding_short_circuits_to_internal_verdict() {
        let fx = fixture();

        // A PE executable disguised as an image
        let mut pe = vec![0x4D, 0x5A, 0x90, 0x00];
        pe.extend(std::iter::repeat(0u8).take(500));
        fx.storage
            .insert_object("staging", "staging/evil.jpg", pe, "image/jpeg");
        fx.repo.insert_item(VaultItem::new_staged(
            "evil",
            "u1",
            "evil.jpg",
            "image/jpeg",
            504,
            StorageLocation::new(StorageProvider::R2Staging, "staging", "staging/evil.jpg"),
        ));

        let report = fx
            .pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(fx.scanner.scan_count(), 0, "no external call for hard findings");

        let item = fx.repo.get_item("evil").await.unwrap().unwrap();
        assert_eq!(item.scan_status, ScanStatus::Infected);
        assert_eq!(item.scan_results.unwrap().provider, "internal");
    }

    #[tokio::test]
    async fn owner_check_gates_single_item_rescan() {
        let fx = fixture();
        stage_item(&fx, "mine", "u1");

        let err = fx
            .pipeline
            .scan_vault_item("mine", "u2", true)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::NotOwner { .. }));

        // Owner succeeds
        let outcome = fx.pipeline.scan_vault_item("mine", "u1", false).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Released { .. }));
    }

    #[tokio::test]
    async fn single_item_rescan_requires_claimable_state() {
        let fx = fixture();
        stage_item(&fx, "done", "u1");

        // Finalize it first
        fx.pipeline.scan_vault_item("done", "u1", false).await.unwrap();
        let finalized = fx.repo.get_item("done").await.unwrap().unwrap();
        assert_eq!(finalized.scan_status, ScanStatus::Clean);

        // Released items are no longer staged
        let err = fx
            .pipeline
            .scan_vault_item("done", "u1", true)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn quarantine_status_reports_user_view() {
        let fx = fixture_with(
            MockScanner::new_infected(vec!["Virus: X".into()]),
            RecordingNotifier::default(),
        );
        stage_item(&fx, "bad", "u1");
        fx.pipeline
            .process_vault_item_scans(10, false)
            .await
            .unwrap();

        let status = fx.pipeline.get_quarantine_status("u1").await.unwrap();
        assert_eq!(status.quarantined.len(), 1);
        assert_eq!(status.pending_scans, 0);

        let other = fx.pipeline.get_quarantine_status("u2").await.unwrap();
        assert!(other.quarantined.is_empty());
    }

    #[tokio::test]
    async fn builder_requires_collaborators() {
        assert!(ScanPipeline::builder().build().is_err());
    }
}
