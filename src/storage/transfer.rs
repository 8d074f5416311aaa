//! HTTP object transfer through signed URLs.

use crate::core::{TransferError, TransferResult};
use crate::storage::router::{check_not_expired, ObjectTransfer, SignedUrl};

use async_trait::async_trait;
use std::time::Duration;

/// Transfers object bytes over HTTP using signed URLs.
#[derive(Debug)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    /// Creates a transfer client with the given per-request timeout.
    pub fn new(timeout: Duration) -> TransferResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransferError::DownloadFailed {
                key: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectTransfer for HttpTransfer {
    async fn fetch(&self, signed: &SignedUrl, key: &str) -> TransferResult<Vec<u8>> {
        check_not_expired(signed, key)?;

        let response = self
            .client
            .get(&signed.url)
            .send()
            .await
            .map_err(|e| TransferError::download_failed(key, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransferError::ObjectMissing {
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            return Err(TransferError::download_failed(
                key,
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransferError::download_failed(key, e.to_string()))?;
        Ok(body.to_vec())
    }

    async fn put(
        &self,
        signed: &SignedUrl,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> TransferResult<()> {
        check_not_expired(signed, key)?;

        let response = self
            .client
            .put(&signed.url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| TransferError::upload_failed(key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::upload_failed(key, format!("HTTP {status}")));
        }
        Ok(())
    }
}
