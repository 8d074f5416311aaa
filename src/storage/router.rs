//! Storage adapter trait and signed-URL request types.

use crate::core::{StorageLocation, TransferError, TransferResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

/// Signed-URL lifetime used for intra-pipeline transfers. Bounds how long a
/// stalled transfer can keep a staging object reachable.
pub const TRANSFER_URL_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// A short-lived signed URL for one object operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedUrl {
    /// The URL itself.
    pub url: String,
    /// When the URL stops working.
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    /// Creates a signed URL expiring after `expires_in`.
    pub fn new(url: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            url: url.into(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::zero()),
        }
    }

    /// Returns `true` once the URL has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Request for a signed upload URL.
#[derive(Debug, Clone)]
pub struct UploadUrlRequest {
    /// Where the object will be written.
    pub target: StorageLocation,
    /// URL lifetime.
    pub expires_in: Duration,
    /// Content type the upload must carry.
    pub content_type: Option<String>,
    /// Object metadata to attach on write (provenance, threat lists).
    pub metadata: HashMap<String, String>,
}

impl UploadUrlRequest {
    /// Creates a request with the default transfer expiry and no metadata.
    pub fn new(target: StorageLocation) -> Self {
        Self {
            target,
            expires_in: TRANSFER_URL_EXPIRY,
            content_type: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attaches one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Request for a signed download URL.
#[derive(Debug, Clone)]
pub struct DownloadUrlRequest {
    /// The object to read.
    pub source: StorageLocation,
    /// URL lifetime.
    pub expires_in: Duration,
}

impl DownloadUrlRequest {
    /// Creates a request with the default transfer expiry.
    pub fn new(source: StorageLocation) -> Self {
        Self {
            source,
            expires_in: TRANSFER_URL_EXPIRY,
        }
    }
}

/// The storage-adapter collaborator boundary.
///
/// Providers (staging, cold storage, quarantine) are all addressed through
/// this one interface; the orchestrator treats them uniformly.
#[async_trait]
pub trait StorageRouter: Send + Sync + Debug {
    /// Generates a short-lived signed URL for writing an object.
    async fn generate_upload_url(&self, request: &UploadUrlRequest) -> TransferResult<SignedUrl>;

    /// Generates a short-lived signed URL for reading an object.
    async fn generate_download_url(
        &self,
        request: &DownloadUrlRequest,
    ) -> TransferResult<SignedUrl>;

    /// Deletes an object. Deleting a missing object is an error so callers
    /// notice double-finalization attempts.
    async fn delete_file(&self, target: &StorageLocation) -> TransferResult<()>;
}

/// Moves bytes through signed URLs.
///
/// Split from [`StorageRouter`] so the two-step protocol (sign, then
/// transfer) stays observable and each side can be doubled independently.
#[async_trait]
pub trait ObjectTransfer: Send + Sync + Debug {
    /// Fetches an object's bytes through its signed download URL.
    async fn fetch(&self, signed: &SignedUrl, key: &str) -> TransferResult<Vec<u8>>;

    /// Writes bytes through a signed upload URL.
    async fn put(
        &self,
        signed: &SignedUrl,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> TransferResult<()>;
}

/// Guards against using a signed URL past its expiry.
pub(crate) fn check_not_expired(signed: &SignedUrl, key: &str) -> TransferResult<()> {
    if signed.is_expired() {
        return Err(TransferError::UrlExpired {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StorageProvider;

    #[test]
    fn signed_url_expiry() {
        let url = SignedUrl::new("https://example.com/x", Duration::from_secs(300));
        assert!(!url.is_expired());

        let expired = SignedUrl {
            url: "https://example.com/x".into(),
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        };
        assert!(expired.is_expired());
    }

    #[test]
    fn upload_request_builder() {
        let target = StorageLocation::new(StorageProvider::B2, "vault", "vault/u1/1_a.jpg");
        let request = UploadUrlRequest::new(target)
            .with_content_type("image/jpeg")
            .with_metadata("item-id", "item-1");

        assert_eq!(request.expires_in, TRANSFER_URL_EXPIRY);
        assert_eq!(request.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(request.metadata.get("item-id").unwrap(), "item-1");
    }
}
