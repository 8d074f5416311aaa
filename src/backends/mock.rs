//! Mock scanner for testing.
//!
//! A configurable scanner that simulates verdicts without a real engine:
//! per-hash programmed outcomes, a default outcome, simulated latency, and
//! simulated transport failures (which fail closed like the real adapter).

use crate::backends::{QuotaStatus, Scanner};
use crate::core::{ScanError, ScanResult, ScanVerdict};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Programmed outcome for a mock scan.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Report the file clean.
    Clean,
    /// Report the file infected with the given threats.
    Infected(Vec<String>),
    /// Simulate an unreachable engine; the verdict fails closed.
    TransportFailure,
}

/// A mock scanner for testing purposes.
///
/// # Examples
///
/// ```rust
/// use vaultscan::backends::{MockOutcome, MockScanner};
///
/// // Reports every file clean
/// let scanner = MockScanner::new_clean();
///
/// // Reports every file infected
/// let scanner = MockScanner::new_infected(vec!["Virus: EICAR-Test (engineA)".into()]);
///
/// // Per-hash outcomes
/// let scanner = MockScanner::new()
///     .with_response("known-bad-hash", MockOutcome::Infected(vec!["Virus: X".into()]));
/// ```
#[derive(Debug)]
pub struct MockScanner {
    name: String,
    responses: RwLock<HashMap<String, MockOutcome>>,
    default_outcome: MockOutcome,
    latency: Option<Duration>,
    scan_count: AtomicU64,
}

impl MockScanner {
    /// Creates a mock scanner whose default outcome is clean.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: RwLock::new(HashMap::new()),
            default_outcome: MockOutcome::Clean,
            latency: None,
            scan_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock scanner that always reports clean.
    pub fn new_clean() -> Self {
        Self::new()
    }

    /// Creates a mock scanner that always reports the given threats.
    pub fn new_infected(threats: Vec<String>) -> Self {
        Self {
            default_outcome: MockOutcome::Infected(threats),
            ..Self::new()
        }
    }

    /// Creates a mock scanner whose every scan fails closed.
    pub fn new_unreachable() -> Self {
        Self {
            default_outcome: MockOutcome::TransportFailure,
            ..Self::new()
        }
    }

    /// Sets the scanner name / provider tag.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the default outcome for hashes not in the response map.
    pub fn with_default_outcome(mut self, outcome: MockOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Adds an outcome for a specific file hash.
    pub fn with_response(self, hash: impl Into<String>, outcome: MockOutcome) -> Self {
        self.responses
            .write()
            .expect("mock responses lock")
            .insert(hash.into(), outcome);
        self
    }

    /// Sets the simulated latency for scans.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds an outcome after construction.
    pub fn add_response(&self, hash: impl Into<String>, outcome: MockOutcome) {
        self.responses
            .write()
            .expect("mock responses lock")
            .insert(hash.into(), outcome);
    }

    /// Returns the number of scans performed.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    fn outcome_for(&self, file_hash: &str) -> MockOutcome {
        self.responses
            .read()
            .expect("mock responses lock")
            .get(file_hash)
            .cloned()
            .unwrap_or_else(|| self.default_outcome.clone())
    }

    async fn resolve(&self, file_hash: &str) -> ScanVerdict {
        self.scan_count.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.outcome_for(file_hash) {
            MockOutcome::Clean => ScanVerdict::clean(file_hash, self.name.clone()),
            MockOutcome::Infected(threats) => {
                ScanVerdict::from_threats(file_hash, self.name.clone(), threats)
            }
            MockOutcome::TransportFailure => ScanVerdict::failed_closed(file_hash, &self.name),
        }
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for MockScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, _data: &[u8], _file_name: &str, file_hash: &str) -> ScanVerdict {
        self.resolve(file_hash).await
    }

    async fn scan_url(&self, _url: &str, file_hash: &str) -> ScanVerdict {
        self.resolve(file_hash).await
    }

    async fn quota_status(&self) -> ScanResult<QuotaStatus> {
        if self.default_outcome == MockOutcome::TransportFailure {
            return Err(ScanError::engine_unavailable(&self.name, "mock unreachable"));
        }
        Ok(QuotaStatus {
            remaining: u64::MAX,
            resets_at: None,
        })
    }
}
