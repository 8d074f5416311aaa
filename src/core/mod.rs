//! Core types and building blocks for the vaultscan library.
//!
//! - [`types`] - Domain types like `VaultItem`, `ScanVerdict`, `ScanStatus`
//! - [`error`] - Structured error types
//! - [`hasher`] - SHA-256 content hashing
//! - [`retry`] - Retry configuration for transient failures

pub mod error;
pub mod hasher;
pub mod retry;
pub mod types;

// Re-export commonly used types at the core level
pub use error::{ScanError, ScanResult, TransferError, TransferResult, VaultError, VaultResult};
pub use hasher::{FileHash, FileHasher};
pub use retry::{retry_async, RetryConfig};
pub use types::{
    QuarantineInfo, ScanCacheEntry, ScanRecord, ScanStatus, ScanVerdict, StorageLocation,
    StorageProvider, VaultItem, SCAN_FAILED_THREAT,
};
