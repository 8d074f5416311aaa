//! In-memory repository double for tests.

use crate::core::{ScanCacheEntry, ScanStatus, VaultError, VaultItem, VaultResult};
use crate::repository::{QuarantineStatus, VaultRepository};
use crate::vault::record::QuarantineRecord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory implementation of [`VaultRepository`].
///
/// The claim operation takes the same write lock as every other mutation,
/// which is what makes it an honest compare-and-swap double.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    items: RwLock<HashMap<String, VaultItem>>,
    quarantine: RwLock<HashMap<String, QuarantineRecord>>,
    cache: RwLock<HashMap<String, ScanCacheEntry>>,
    fail_updates: RwLock<bool>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a vault item.
    pub fn insert_item(&self, item: VaultItem) {
        self.items
            .write()
            .expect("items lock")
            .insert(item.id.clone(), item);
    }

    /// Number of quarantine records currently stored.
    pub fn quarantine_record_count(&self) -> usize {
        self.quarantine.read().expect("quarantine lock").len()
    }

    /// Makes every subsequent item update fail, for error-path tests.
    pub fn set_fail_updates(&self, fail: bool) {
        *self.fail_updates.write().expect("flag lock") = fail;
    }

    fn check_update_allowed(&self) -> VaultResult<()> {
        if *self.fail_updates.read().expect("flag lock") {
            return Err(VaultError::repository("simulated update failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl VaultRepository for MemoryRepository {
    async fn get_item(&self, item_id: &str) -> VaultResult<Option<VaultItem>> {
        Ok(self.items.read().expect("items lock").get(item_id).cloned())
    }

    async fn update_item(&self, item: &VaultItem) -> VaultResult<()> {
        self.check_update_allowed()?;
        self.items
            .write()
            .expect("items lock")
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn claim_for_scanning(&self, item_id: &str, force: bool) -> VaultResult<bool> {
        let mut items = self.items.write().expect("items lock");
        let Some(item) = items.get_mut(item_id) else {
            return Ok(false);
        };

        let claimable = if force {
            item.scan_status != ScanStatus::Scanning
        } else {
            item.scan_status == ScanStatus::Pending
        };

        if claimable {
            item.scan_status = ScanStatus::Scanning;
        }
        Ok(claimable)
    }

    async fn select_pending_scans(
        &self,
        batch_size: usize,
        force_rescan: bool,
    ) -> VaultResult<Vec<VaultItem>> {
        let items = self.items.read().expect("items lock");
        let mut selected: Vec<VaultItem> = items
            .values()
            .filter(|item| item.is_staged())
            .filter(|item| force_rescan || item.scan_status == ScanStatus::Pending)
            .cloned()
            .collect();

        selected.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        selected.truncate(batch_size);
        Ok(selected)
    }

    async fn create_quarantine_record(&self, record: &QuarantineRecord) -> VaultResult<()> {
        self.quarantine
            .write()
            .expect("quarantine lock")
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn expired_quarantine_records(
        &self,
        as_of: DateTime<Utc>,
        limit: usize,
    ) -> VaultResult<Vec<QuarantineRecord>> {
        let records = self.quarantine.read().expect("quarantine lock");
        let mut expired: Vec<QuarantineRecord> = records
            .values()
            .filter(|r| r.is_expired(as_of))
            .cloned()
            .collect();

        expired.sort_by(|a, b| a.retention_expiry.cmp(&b.retention_expiry));
        expired.truncate(limit);
        Ok(expired)
    }

    async fn delete_quarantine_record(&self, record_id: &str) -> VaultResult<()> {
        let removed = self
            .quarantine
            .write()
            .expect("quarantine lock")
            .remove(record_id);
        match removed {
            Some(_) => Ok(()),
            None => Err(VaultError::repository(format!(
                "quarantine record not found: {record_id}"
            ))),
        }
    }

    async fn quarantine_records_for_user(
        &self,
        user_id: &str,
    ) -> VaultResult<Vec<QuarantineRecord>> {
        let records = self.quarantine.read().expect("quarantine lock");
        let mut found: Vec<QuarantineRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.quarantined_at.cmp(&a.quarantined_at));
        Ok(found)
    }

    async fn cached_verdict(
        &self,
        file_hash: &str,
        ttl: chrono::Duration,
    ) -> VaultResult<Option<ScanCacheEntry>> {
        let cache = self.cache.read().expect("cache lock");
        Ok(cache
            .get(file_hash)
            .filter(|entry| entry.is_fresh(ttl))
            .cloned())
    }

    async fn cache_verdict(&self, entry: &ScanCacheEntry) -> VaultResult<()> {
        self.cache
            .write()
            .expect("cache lock")
            .insert(entry.file_hash.clone(), entry.clone());
        Ok(())
    }

    async fn quarantine_status(&self, user_id: &str) -> VaultResult<QuarantineStatus> {
        let quarantined = self.quarantine_records_for_user(user_id).await?;
        let pending_scans = self
            .items
            .read()
            .expect("items lock")
            .values()
            .filter(|item| item.user_id == user_id)
            .filter(|item| {
                matches!(item.scan_status, ScanStatus::Pending | ScanStatus::Scanning)
            })
            .count();

        Ok(QuarantineStatus {
            quarantined,
            pending_scans,
        })
    }
}
