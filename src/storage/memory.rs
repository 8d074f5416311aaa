//! In-memory storage double for tests.
//!
//! Implements both sides of the storage boundary: it signs `memory://`
//! URLs and serves transfers against its own object map, so the pipeline
//! exercises the full sign-then-transfer protocol without a network.

use crate::core::{StorageLocation, TransferError, TransferResult};
use crate::storage::router::{
    check_not_expired, DownloadUrlRequest, ObjectTransfer, SignedUrl, StorageRouter,
    UploadUrlRequest,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// One stored object with its write-time attributes.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// The object bytes.
    pub data: Vec<u8>,
    /// Content type recorded at write time.
    pub content_type: String,
    /// Metadata attached through the signed upload URL.
    pub metadata: HashMap<String, String>,
}

/// In-memory storage keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    /// Metadata from pending upload URLs, applied at PUT time.
    pending_metadata: RwLock<HashMap<(String, String), HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object directly, as the upload collaborator would.
    pub fn insert_object(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        data: Vec<u8>,
        content_type: impl Into<String>,
    ) {
        self.objects.write().expect("objects lock").insert(
            (bucket.into(), key.into()),
            StoredObject {
                data,
                content_type: content_type.into(),
                metadata: HashMap::new(),
            },
        );
    }

    /// Returns a stored object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .expect("objects lock")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Returns `true` if an object exists at the location.
    pub fn has_object(&self, bucket: &str, key: &str) -> bool {
        self.object(bucket, key).is_some()
    }

    /// Total number of stored objects across buckets.
    pub fn object_count(&self) -> usize {
        self.objects.read().expect("objects lock").len()
    }

    /// Keys currently stored in a bucket.
    pub fn keys_in_bucket(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .expect("objects lock")
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    fn memory_url(operation: &str, location: &StorageLocation) -> String {
        format!("memory://{}/{}/{}", operation, location.bucket, location.key)
    }

    /// Parses `memory://{op}/{bucket}/{key...}` back into its parts.
    fn parse_url(url: &str) -> Option<(String, String, String)> {
        let rest = url.strip_prefix("memory://")?;
        let (operation, rest) = rest.split_once('/')?;
        let (bucket, key) = rest.split_once('/')?;
        Some((operation.to_string(), bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl StorageRouter for MemoryStorage {
    async fn generate_upload_url(&self, request: &UploadUrlRequest) -> TransferResult<SignedUrl> {
        if !request.metadata.is_empty() {
            self.pending_metadata.write().expect("metadata lock").insert(
                (request.target.bucket.clone(), request.target.key.clone()),
                request.metadata.clone(),
            );
        }
        Ok(SignedUrl::new(
            Self::memory_url("upload", &request.target),
            request.expires_in,
        ))
    }

    async fn generate_download_url(
        &self,
        request: &DownloadUrlRequest,
    ) -> TransferResult<SignedUrl> {
        Ok(SignedUrl::new(
            Self::memory_url("download", &request.source),
            request.expires_in,
        ))
    }

    async fn delete_file(&self, target: &StorageLocation) -> TransferResult<()> {
        let removed = self
            .objects
            .write()
            .expect("objects lock")
            .remove(&(target.bucket.clone(), target.key.clone()));

        match removed {
            Some(_) => Ok(()),
            None => Err(TransferError::ObjectMissing {
                key: target.key.clone(),
            }),
        }
    }
}

#[async_trait]
impl ObjectTransfer for MemoryStorage {
    async fn fetch(&self, signed: &SignedUrl, key: &str) -> TransferResult<Vec<u8>> {
        check_not_expired(signed, key)?;

        let (operation, bucket, url_key) = Self::parse_url(&signed.url)
            .ok_or_else(|| TransferError::download_failed(key, "malformed memory URL"))?;
        if operation != "download" {
            return Err(TransferError::download_failed(
                key,
                "URL was not signed for download",
            ));
        }

        self.object(&bucket, &url_key)
            .map(|o| o.data)
            .ok_or(TransferError::ObjectMissing {
                key: url_key.clone(),
            })
    }

    async fn put(
        &self,
        signed: &SignedUrl,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> TransferResult<()> {
        check_not_expired(signed, key)?;

        let (operation, bucket, url_key) = Self::parse_url(&signed.url)
            .ok_or_else(|| TransferError::upload_failed(key, "malformed memory URL"))?;
        if operation != "upload" {
            return Err(TransferError::upload_failed(
                key,
                "URL was not signed for upload",
            ));
        }

        let metadata = self
            .pending_metadata
            .write()
            .expect("metadata lock")
            .remove(&(bucket.clone(), url_key.clone()))
            .unwrap_or_default();

        self.objects.write().expect("objects lock").insert(
            (bucket, url_key),
            StoredObject {
                data: body,
                content_type: content_type.to_string(),
                metadata,
            },
        );
        Ok(())
    }
}
