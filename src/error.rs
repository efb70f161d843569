//! Typed error surface for the engine (spec §7).
//!
//! Four kinds, matching the four failure classes a BFM engine can produce:
//! bad configuration, calling things out of order, a verifier-caught
//! invariant violation, and an underlying compute-device failure. None of
//! these are ever encoded as a sentinel return value.

use std::fmt;

/// Everything that can go wrong while driving a [`crate::engine::BfmEngine`].
#[derive(Debug)]
#[non_exhaustive]
pub enum BfmError {
    /// Bad input to a staging call: non-power-of-two box, wrong
    /// allowed-bond count, neighbor overflow, periodicity mismatch,
    /// out-of-range coordinate. Raised synchronously; engine state is left
    /// valid for retry.
    Configuration(String),
    /// A lifecycle call happened out of order (`initialize` called twice
    /// without `cleanup`, staging called after `initialize`, `runSweeps`
    /// before `initialize`, ...). Fatal to the call; no state change.
    StateOrder(String),
    /// The verifier detected a broken invariant: a bond out of range, an
    /// occupancy collision, or an adjacency mismatch. Indicates an
    /// implementation bug; fatal to the run.
    Invariant {
        /// Index of the offending monomer or edge, in original (un-sorted)
        /// numbering.
        index: usize,
        /// Human-readable description of what was found.
        detail: String,
    },
    /// The underlying compute backend failed during kernel dispatch. This
    /// reimplementation runs kernels on the host thread pool (see
    /// DESIGN.md), so this variant is reserved for a future device backend
    /// and surfaced verbatim from whatever that backend reports.
    Device(String),
}

impl fmt::Display for BfmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BfmError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            BfmError::StateOrder(msg) => write!(f, "state-order error: {msg}"),
            BfmError::Invariant { index, detail } => {
                write!(f, "invariant violation at index {index}: {detail}")
            }
            BfmError::Device(msg) => write!(f, "device error: {msg}"),
        }
    }
}

impl std::error::Error for BfmError {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BfmError>;
