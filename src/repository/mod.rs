//! Document-store collaborator boundary.
//!
//! The backing store is document-shaped (collections of vault items,
//! quarantine records, and scan-cache entries); this trait describes it
//! structurally so the pipeline can be tested against an in-memory double.

pub mod memory;

pub use memory::MemoryRepository;

use crate::core::{ScanCacheEntry, VaultItem, VaultResult};
use crate::vault::record::QuarantineRecord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Per-user quarantine summary returned to callers.
#[derive(Debug, Clone)]
pub struct QuarantineStatus {
    /// The caller's quarantined files.
    pub quarantined: Vec<QuarantineRecord>,
    /// How many of the caller's items still await scanning.
    pub pending_scans: usize,
}

/// The document-store operations the scan pipeline needs.
#[async_trait]
pub trait VaultRepository: Send + Sync + Debug {
    /// Fetches a vault item by ID.
    async fn get_item(&self, item_id: &str) -> VaultResult<Option<VaultItem>>;

    /// Overwrites a vault item.
    async fn update_item(&self, item: &VaultItem) -> VaultResult<()>;

    /// Atomically claims an item for scanning: `Pending → Scanning` as one
    /// compare-and-swap, so only one of two concurrent batch runs wins.
    ///
    /// With `force`, the precondition is relaxed to any non-`Scanning`
    /// state (a forced rescan of an errored item). Returns `false` when the
    /// claim is lost or the item is gone.
    async fn claim_for_scanning(&self, item_id: &str, force: bool) -> VaultResult<bool>;

    /// Selects staged items awaiting a scan, oldest first, capped at
    /// `batch_size`. Unless `force_rescan`, only `Pending` items qualify.
    async fn select_pending_scans(
        &self,
        batch_size: usize,
        force_rescan: bool,
    ) -> VaultResult<Vec<VaultItem>>;

    /// Appends a quarantine record.
    async fn create_quarantine_record(&self, record: &QuarantineRecord) -> VaultResult<()>;

    /// Returns up to `limit` records whose retention has expired as of the
    /// given instant.
    async fn expired_quarantine_records(
        &self,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> VaultResult<Vec<QuarantineRecord>>;

    /// Deletes a quarantine record by ID.
    async fn delete_quarantine_record(&self, record_id: &str) -> VaultResult<()>;

    /// All quarantine records belonging to a user.
    async fn quarantine_records_for_user(
        &self,
        user_id: &str,
    ) -> VaultResult<Vec<QuarantineRecord>>;

    /// Looks up a fresh cache entry by content hash; entries older than
    /// `ttl` are treated as absent.
    async fn cached_verdict(
        &self,
        file_hash: &str,
        ttl: chrono::Duration,
    ) -> VaultResult<Option<ScanCacheEntry>>;

    /// Writes a cache entry, replacing any previous entry for the hash.
    async fn cache_verdict(&self, entry: &ScanCacheEntry) -> VaultResult<()>;

    /// Per-user quarantine summary: quarantined files plus pending count.
    async fn quarantine_status(&self, user_id: &str) -> VaultResult<QuarantineStatus>;
}

/// An arc-wrapped repository for shared ownership.
pub type ArcRepository = std::sync::Arc<dyn VaultRepository>;
