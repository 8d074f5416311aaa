//! Cloudmersive advanced-threat-detection backend.
//!
//! Submits file content (or a fetchable URL) to the Cloudmersive advanced
//! virus scan API with strict flags disallowing executables, invalid files,
//! scripts, password-protected containers, and macros, and normalizes the
//! heterogeneous response into the flat [`ScanVerdict`] contract.
//!
//! The security-critical property of this module is that it fails closed:
//! any transport error, non-2xx status, or unparseable body yields
//! `safe: false` with provider tag `cloudmersive_error`.

use crate::backends::{QuotaStatus, Scanner};
use crate::core::{retry_async, RetryConfig, ScanError, ScanResult, ScanVerdict};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

const ENGINE: &str = "cloudmersive";

/// Cloudmersive scanner configuration.
#[derive(Debug, Clone)]
pub struct CloudmersiveConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Files larger than this skip external scanning entirely
    /// (pre-screening still runs). Default 2 GiB.
    pub max_scan_size: u64,

    /// Extensions the API is told to accept; everything else is flagged
    /// as a restricted file format by the provider.
    pub allowed_extensions: Vec<String>,

    /// Retry policy for transient transport failures, applied before the
    /// verdict fails closed.
    pub retry: RetryConfig,
}

impl CloudmersiveConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into().into()),
            base_url: "https://api.cloudmersive.com".to_string(),
            timeout: Duration::from_secs(120),
            max_scan_size: 2 * 1024 * 1024 * 1024, // 2 GiB
            allowed_extensions: [
                "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "heic", "mp4", "mov",
                "webm", "mp3", "wav", "flac", "pdf", "txt", "csv", "doc", "docx", "xls",
                "xlsx", "ppt", "pptx", "zip",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum size submitted for external scanning.
    pub fn with_max_scan_size(mut self, size: u64) -> Self {
        self.max_scan_size = size;
        self
    }

    /// Sets the allowed-extension list sent to the API.
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Raw response shape of the advanced scan endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AdvancedScanResponse {
    clean_result: bool,
    #[serde(default)]
    found_viruses: Option<Vec<FoundVirus>>,
    #[serde(default)]
    contains_executable: bool,
    #[serde(default)]
    contains_invalid_file: bool,
    #[serde(default)]
    contains_script: bool,
    #[serde(default)]
    contains_password_protected_file: bool,
    #[serde(default)]
    contains_restricted_file_format: bool,
    #[serde(default)]
    contains_macros: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FoundVirus {
    #[serde(default)]
    file_name: Option<String>,
    virus_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaResponse {
    remaining: u64,
    #[serde(default)]
    resets_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Cloudmersive scanner implementation.
///
/// # Example
///
/// ```rust,ignore
/// use vaultscan::backends::{CloudmersiveConfig, CloudmersiveScanner};
///
/// let config = CloudmersiveConfig::new("your-api-key");
/// let scanner = CloudmersiveScanner::new(config)?;
/// ```
#[derive(Debug)]
pub struct CloudmersiveScanner {
    config: CloudmersiveConfig,
    client: reqwest::Client,
}

impl CloudmersiveScanner {
    /// Creates a new Cloudmersive scanner with the given configuration.
    pub fn new(config: CloudmersiveConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ScanError::configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    /// The fallible inner scan; `scan` wraps this with retry and collapses
    /// the final error into a fail-closed verdict.
    async fn submit_bytes(&self, data: &[u8], file_name: &str) -> ScanResult<Vec<String>> {
        let url = format!("{}/virus/scan/file/advanced", self.config.base_url);

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ScanError::invalid_response(ENGINE, e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("inputFile", part);

        let response = self
            .strict_flags(self.client.post(&url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))?;

        self.parse_response(response).await
    }

    async fn submit_url(&self, target_url: &str) -> ScanResult<Vec<String>> {
        let url = format!("{}/virus/scan/website", self.config.base_url);

        let response = self
            .strict_flags(self.client.post(&url))
            .form(&[("Url", target_url)])
            .send()
            .await
            .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))?;

        self.parse_response(response).await
    }

    /// Attaches the API key and the strict content-restriction flags.
    fn strict_flags(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Apikey", self.config.api_key.expose_secret())
            .header("allowExecutables", "false")
            .header("allowInvalidFiles", "false")
            .header("allowScripts", "false")
            .header("allowPasswordProtectedFiles", "false")
            .header("allowMacros", "false")
            .header("restrictFileTypes", self.config.allowed_extensions.join(","))
    }

    /// Normalizes the heterogeneous response into a flat threat list.
    /// An empty list means the API reported the content clean.
    async fn parse_response(&self, response: reqwest::Response) -> ScanResult<Vec<String>> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScanError::RateLimited {
                engine: ENGINE.to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if !status.is_success() {
            return Err(ScanError::engine_unavailable(
                ENGINE,
                format!("API returned {status}"),
            ));
        }

        let body: AdvancedScanResponse = response
            .json()
            .await
            .map_err(|e| ScanError::invalid_response(ENGINE, e.to_string()))?;

        let mut threats = Vec::new();

        for virus in body.found_viruses.unwrap_or_default() {
            match virus.file_name {
                Some(name) => threats.push(format!("Virus: {} ({name})", virus.virus_name)),
                None => threats.push(format!("Virus: {}", virus.virus_name)),
            }
        }

        let content_risks = [
            (body.contains_executable, "Contains executable content"),
            (body.contains_invalid_file, "Contains invalid file data"),
            (body.contains_script, "Contains script content"),
            (
                body.contains_password_protected_file,
                "Contains password-protected content",
            ),
            (
                body.contains_restricted_file_format,
                "Contains restricted file format",
            ),
            (body.contains_macros, "Contains macros"),
        ];
        for (flagged, message) in content_risks {
            if flagged {
                threats.push(message.to_string());
            }
        }

        // The overall clean flag is authoritative: a "clean" response with
        // an unexplained risk flag still fails the scan.
        if !body.clean_result && threats.is_empty() {
            threats.push("Scan provider reported content not clean".to_string());
        }

        Ok(threats)
    }
}

#[async_trait]
impl Scanner for CloudmersiveScanner {
    fn name(&self) -> &str {
        ENGINE
    }

    async fn scan(&self, data: &[u8], file_name: &str, file_hash: &str) -> ScanVerdict {
        // Size-skip policy: very large media is not submitted externally.
        if data.len() as u64 > self.config.max_scan_size {
            tracing::info!(
                file_hash = %file_hash,
                size = data.len(),
                max = self.config.max_scan_size,
                "File exceeds external scan size limit, skipping submission"
            );
            return ScanVerdict::skipped_size(file_hash, ENGINE);
        }

        let attempt =
            retry_async(&self.config.retry, || self.submit_bytes(data, file_name)).await;

        match attempt {
            Ok(threats) => ScanVerdict::from_threats(file_hash, ENGINE, threats),
            Err(e) => {
                tracing::warn!(
                    file_hash = %file_hash,
                    error = %e,
                    "External scan failed, failing closed"
                );
                ScanVerdict::failed_closed(file_hash, ENGINE)
            }
        }
    }

    async fn scan_url(&self, url: &str, file_hash: &str) -> ScanVerdict {
        let attempt = retry_async(&self.config.retry, || self.submit_url(url)).await;

        match attempt {
            Ok(threats) => ScanVerdict::from_threats(file_hash, ENGINE, threats),
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    "External URL scan failed, failing closed"
                );
                ScanVerdict::failed_closed(file_hash, ENGINE)
            }
        }
    }

    async fn quota_status(&self) -> ScanResult<QuotaStatus> {
        let url = format!("{}/virus/scan/quota", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .header("Apikey", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::engine_unavailable(
                ENGINE,
                format!("quota endpoint returned {}", response.status()),
            ));
        }

        let body: QuotaResponse = response
            .json()
            .await
            .map_err(|e| ScanError::invalid_response(ENGINE, e.to_string()))?;

        Ok(QuotaStatus {
            remaining: body.remaining,
            resets_at: body.resets_at,
        })
    }

    fn max_scan_size(&self) -> Option<u64> {
        Some(self.config.max_scan_size)
    }
}
