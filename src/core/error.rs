//! Error types for the vaultscan library.
//!
//! Structured, typed errors for every failure scenario. The library never
//! panics in non-test code; all errors are returned as `Result` values.

use crate::core::types::ScanStatus;

use std::time::Duration;
use thiserror::Error;

/// Errors from the external scan adapter layer.
///
/// These never reach the pipeline's verdict path directly: the adapter
/// converts them into a fail-closed [`ScanVerdict`](crate::ScanVerdict)
/// before returning. They surface only from the out-of-band operations
/// (quota query, configuration self-test).
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanning engine is unavailable or not responding.
    #[error("engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable {
        /// Name of the engine that is unavailable.
        engine: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// The scan operation timed out.
    #[error("scan timed out after {elapsed:?} on engine '{engine}'")]
    Timeout {
        /// Name of the engine that timed out.
        engine: String,
        /// How long the operation ran before timing out.
        elapsed: Duration,
    },

    /// Failed to connect to the scanning engine.
    #[error("connection to engine '{engine}' failed: {message}")]
    ConnectionFailed {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The engine returned an ambiguous or unparseable response.
    #[error("invalid response from engine '{engine}': {details}")]
    InvalidResponse {
        /// Name of the engine.
        engine: String,
        /// Details about what could not be parsed.
        details: String,
    },

    /// Rate limit exceeded for the engine.
    #[error("rate limit exceeded for engine '{engine}'")]
    RateLimited {
        /// Name of the engine.
        engine: String,
        /// Suggested wait time before retry, if the engine provided one.
        retry_after: Option<Duration>,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Returns `true` if this error is worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionFailed { .. } | Self::RateLimited { .. }
        )
    }

    /// Creates an `EngineUnavailable` error.
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidResponse` error.
    pub fn invalid_response(engine: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidResponse {
            engine: engine.into(),
            details: details.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors from the storage adapter layer (signed URLs, object transfer).
#[derive(Debug, Error)]
pub enum TransferError {
    /// Signing a URL for the given operation failed.
    #[error("failed to sign {operation} URL for '{key}': {reason}")]
    SignFailed {
        /// The operation being signed ("upload" or "download").
        operation: String,
        /// Object key involved.
        key: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Fetching an object through its signed URL failed.
    #[error("download of '{key}' failed: {reason}")]
    DownloadFailed {
        /// Object key involved.
        key: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Writing an object through its signed URL failed.
    #[error("upload of '{key}' failed: {reason}")]
    UploadFailed {
        /// Object key involved.
        key: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Deleting an object failed.
    #[error("delete of '{key}' failed: {reason}")]
    DeleteFailed {
        /// Object key involved.
        key: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The object does not exist at the given key.
    #[error("object not found: '{key}'")]
    ObjectMissing {
        /// The missing key.
        key: String,
    },

    /// The signed URL has already expired.
    #[error("signed URL for '{key}' expired")]
    UrlExpired {
        /// Object key the URL pointed at.
        key: String,
    },
}

impl TransferError {
    /// Creates a `DownloadFailed` error.
    pub fn download_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DownloadFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `UploadFailed` error.
    pub fn upload_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UploadFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the orchestrator, pipeline, and repository layers.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No vault item exists with the given ID.
    #[error("vault item not found: '{item_id}'")]
    ItemNotFound {
        /// The missing item ID.
        item_id: String,
    },

    /// The caller does not own the item it is operating on.
    #[error("user '{user_id}' does not own vault item '{item_id}'")]
    NotOwner {
        /// The calling user.
        user_id: String,
        /// The item being accessed.
        item_id: String,
    },

    /// The item is not in a state the requested operation accepts.
    #[error("vault item '{item_id}' is in state '{status}': {message}")]
    InvalidState {
        /// The item involved.
        item_id: String,
        /// Its current scan status.
        status: ScanStatus,
        /// What the operation needed instead.
        message: String,
    },

    /// The backing document store failed.
    #[error("repository error: {message}")]
    Repository {
        /// Description of the failure.
        message: String,
    },

    /// A storage transfer step failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// An external-scanner operation failed.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl VaultError {
    /// Creates an `ItemNotFound` error.
    pub fn item_not_found(item_id: impl Into<String>) -> Self {
        Self::ItemNotFound {
            item_id: item_id.into(),
        }
    }

    /// Creates a `Repository` error.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(
        item_id: impl Into<String>,
        status: ScanStatus,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            item_id: item_id.into(),
            status,
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for scan-adapter operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// A specialized `Result` type for storage-transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// A specialized `Result` type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_recoverable() {
        let timeout = ScanError::Timeout {
            engine: "cloudmersive".into(),
            elapsed: Duration::from_secs(30),
        };
        assert!(timeout.is_recoverable());

        let config = ScanError::configuration("missing api key");
        assert!(!config.is_recoverable());
    }

    #[test]
    fn vault_error_from_transfer() {
        let err: VaultError = TransferError::ObjectMissing {
            key: "staging/abc.jpg".into(),
        }
        .into();
        assert!(err.to_string().contains("staging/abc.jpg"));
    }

    #[test]
    fn invalid_state_display() {
        let err = VaultError::invalid_state("item-1", ScanStatus::Clean, "already finalized");
        assert!(err.to_string().contains("clean"));
        assert!(err.to_string().contains("item-1"));
    }
}
