//! Quarantine/release orchestration.
//!
//! - [`orchestrator`] - The staging → {release, quarantine} state machine
//! - [`record`] - Quarantine audit records and retention

pub mod orchestrator;
pub mod record;

pub use orchestrator::{
    CleanupReport, OrchestratorConfig, ProcessOutcome, VaultScanOrchestrator,
};
pub use record::{QuarantineRecord, QUARANTINE_RETENTION_DAYS};
