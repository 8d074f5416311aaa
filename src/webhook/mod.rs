//! Webhook ingestion for externally pushed scan results.
//!
//! An edge worker scans some uploads out-of-band and pushes results here.
//! The endpoint authenticates with a shared secret compared in constant
//! time, validates the payload at the boundary, and applies the same
//! terminal-state update shape the orchestrator uses.

mod handler;

pub use handler::{router, WebhookState};

use subtle::ConstantTimeEq;

/// Compares a provided secret against the expected one.
///
/// Equal-length inputs are compared over their full length without
/// short-circuiting on the first mismatch (via `subtle`), keeping the
/// comparison timing-independent of where the secrets differ.
pub fn secret_matches(provided: &[u8], expected: &[u8]) -> bool {
    provided.ct_eq(expected).into()
}
