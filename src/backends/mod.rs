//! External scanning backend implementations.
//!
//! This module contains the [`Scanner`] trait and its implementations:
//!
//! - [`cloudmersive`] - The Cloudmersive advanced-threat-detection API
//! - [`mock`] - A programmable scanner for testing
//!
//! A scanner's `scan` is infallible by design: transport failures, bad
//! responses, and timeouts all collapse into a fail-closed
//! [`ScanVerdict`](crate::ScanVerdict) so uncertainty never reads as safe.

pub mod cloudmersive;
pub mod mock;

pub use cloudmersive::{CloudmersiveConfig, CloudmersiveScanner};
pub use mock::{MockOutcome, MockScanner};

use crate::core::{ScanResult, ScanVerdict};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Remaining quota reported by a scanning provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    /// Scans remaining in the current window.
    pub remaining: u64,
    /// When the window resets.
    pub resets_at: Option<DateTime<Utc>>,
}

/// The trait external scanning engines implement.
///
/// # Implementation notes
///
/// - `scan` must fail closed: an unreachable or misbehaving engine yields
///   `safe: false` with a `{name}_error` provider tag, never an `Err`.
/// - `quota_status` and `validate_configuration` are out-of-band health
///   operations and may return errors normally.
#[async_trait]
pub trait Scanner: Send + Sync + Debug {
    /// Stable provider tag, e.g. `"cloudmersive"`. Becomes the verdict's
    /// `provider` (possibly suffixed `_error` / `_skipped_size`).
    fn name(&self) -> &str;

    /// Scans raw file bytes. Never errors; fails closed instead.
    async fn scan(&self, data: &[u8], file_name: &str, file_hash: &str) -> ScanVerdict;

    /// Scans content behind a fetchable URL. Never errors; fails closed.
    async fn scan_url(&self, url: &str, file_hash: &str) -> ScanVerdict;

    /// Best-effort query of remaining provider quota.
    async fn quota_status(&self) -> ScanResult<QuotaStatus>;

    /// Submits a trivial payload and checks the API is reachable with the
    /// configured credentials. For startup health checks, not the hot path.
    async fn validate_configuration(&self) -> ScanResult<()> {
        let verdict = self.scan(b"configuration probe", "probe.txt", "probe").await;
        if verdict.is_scan_failure() {
            return Err(crate::core::ScanError::engine_unavailable(
                self.name(),
                "self-test scan failed",
            ));
        }
        Ok(())
    }

    /// Maximum size this scanner will submit externally, if bounded.
    fn max_scan_size(&self) -> Option<u64> {
        None
    }
}

/// An arc-wrapped scanner for shared ownership.
pub type ArcScanner = std::sync::Arc<dyn Scanner>;
