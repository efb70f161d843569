//! Concurrency primitives used by the parallel move engine.
//!
//! Important: ghost-branded types enforce *aliasing discipline*, not
//! synchronization. The brand on [`atomic::GhostAtomicBool`] and friends
//! exists purely to stop state from two different [`crate::engine::BfmEngine`]
//! sessions (two different `initialize()` calls) from being mixed at the
//! type level; the actual thread-safety comes from the hardware atomics
//! underneath, same as in any other Rust codebase.

/// Branded, lock-free atomic primitives (the lattice occupancy cells and
/// cross-substep counters are built on these).
pub mod atomic;
/// Cache-line padding to avoid false sharing between per-species counters.
pub mod cache_padded;

pub use cache_padded::CachePadded;
