//! # Vaultscan
//!
//! The staging → scan → quarantine/release pipeline behind a user file
//! vault: uploads land in a staging bucket, get pre-screened locally,
//! scanned by an external threat-detection API, and are then atomically
//! released to permanent storage or moved to quarantine.
//!
//! ## Overview
//!
//! Vaultscan lets you:
//!
//! - Pre-screen raw bytes locally (magic-byte consistency, dangerous
//!   signatures, risky extensions, content patterns) before spending an
//!   external API call
//! - Scan files through an external engine that fails closed on any
//!   transport or API error
//! - Drive the `pending → scanning → {clean, infected, error}` state
//!   machine with a "write destination, then delete source" guarantee
//! - Batch-process staged items with per-item failure isolation and a
//!   content-hash scan cache
//! - Ingest scan results pushed by a trusted edge worker over an
//!   authenticated webhook
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vaultscan::backends::MockScanner;
//! use vaultscan::pipeline::ScanPipeline;
//! use vaultscan::repository::MemoryRepository;
//! use vaultscan::storage::MemoryStorage;
//! use vaultscan::vault::{OrchestratorConfig, VaultScanOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Arc::new(MemoryRepository::new());
//!     let storage = Arc::new(MemoryStorage::new());
//!     let orchestrator = Arc::new(VaultScanOrchestrator::new(
//!         repository.clone(),
//!         storage.clone(),
//!         storage.clone(),
//!         OrchestratorConfig::default(),
//!     ));
//!
//!     let pipeline = ScanPipeline::builder()
//!         .with_repository(repository)
//!         .with_storage(storage.clone())
//!         .with_transfer(storage)
//!         .with_scanner(Arc::new(MockScanner::new_clean()))
//!         .with_orchestrator(orchestrator)
//!         .build()?;
//!
//!     let report = pipeline.process_pending_scans(None, false).await?;
//!     println!("scanned {} items", report.processed);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: fundamental types, errors, hashing, retry
//! - **Prescreen**: pure local signature/heuristic checks
//! - **Backends**: external scanner implementations behind one trait
//! - **Storage / Repository**: collaborator boundaries with in-memory doubles
//! - **Vault**: the quarantine/release orchestrator and retention sweep
//! - **Pipeline**: batch processing and callable entry points
//! - **Webhook**: authenticated ingestion of pushed scan results

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod core;
pub mod pipeline;
pub mod prescreen;
pub mod repository;
pub mod storage;
pub mod vault;
pub mod webhook;

// Re-export commonly used types at the crate root
pub use crate::core::{
    FileHash, FileHasher, QuarantineInfo, ScanCacheEntry, ScanError, ScanRecord, ScanStatus,
    ScanVerdict, StorageLocation, StorageProvider, TransferError, VaultError, VaultItem,
    SCAN_FAILED_THREAT,
};

pub use crate::backends::{ArcScanner, Scanner};
pub use crate::pipeline::{BatchReport, Notifier, ScanPipeline};
pub use crate::prescreen::{pre_screen, PreScreenReport};
pub use crate::repository::{QuarantineStatus, VaultRepository};
pub use crate::storage::{ObjectTransfer, StorageRouter};
pub use crate::vault::{ProcessOutcome, QuarantineRecord, VaultScanOrchestrator};

/// Prelude module for convenient imports.
///
/// ```rust
/// use vaultscan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backends::{ArcScanner, Scanner};
    pub use crate::core::{
        FileHasher, ScanError, ScanStatus, ScanVerdict, StorageLocation, StorageProvider,
        TransferError, VaultError, VaultItem,
    };
    pub use crate::pipeline::{BatchReport, Notifier, ScanPipeline};
    pub use crate::prescreen::{pre_screen, PreScreenReport};
    pub use crate::repository::{QuarantineStatus, VaultRepository};
    pub use crate::storage::{ObjectTransfer, StorageRouter};
    pub use crate::vault::{ProcessOutcome, QuarantineRecord, VaultScanOrchestrator};
}
