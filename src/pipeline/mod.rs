//! The scan batch processor and its entry points.
//!
//! Drives staged items through download → hash → cache → pre-screen →
//! external scan → orchestrator, with per-item failure isolation.

pub mod processor;

pub use processor::{
    BatchItemError, BatchReport, ScanPipeline, ScanPipelineBuilder, ScanPipelineConfig,
    SCHEDULED_BATCH_SIZE,
};

use crate::core::{VaultItem, VaultResult};

use async_trait::async_trait;
use std::fmt::Debug;

/// Best-effort user notification on infection.
///
/// Failures are logged and swallowed by callers; notification never gates
/// the scan pipeline's primary work.
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Tells the owning user their file was quarantined.
    async fn notify_infection(
        &self,
        user_id: &str,
        item: &VaultItem,
        threats: &[String],
    ) -> VaultResult<()>;
}

/// A notifier that does nothing. Useful when the notification collaborator
/// is not wired up.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl NoopNotifier {
    /// Creates a new no-op notifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_infection(
        &self,
        user_id: &str,
        item: &VaultItem,
        _threats: &[String],
    ) -> VaultResult<()> {
        tracing::debug!(
            user_id = %user_id,
            item_id = %item.id,
            "No-op notifier: infection notification dropped"
        );
        Ok(())
    }
}
