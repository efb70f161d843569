//! # `bfm_engine` — a data-parallel bond-fluctuation-model Monte-Carlo engine
//!
//! Simulates dense lattice polymers under the bond-fluctuation model (BFM):
//! each monomer occupies a 2³ cube of a periodic (or bounded) cubic
//! lattice, bonds are drawn from a fixed 108-vector allowed set, and moves
//! are proposed and resolved thousands at a time through a lock-free,
//! three-phase kernel pipeline built on ghost-branded session types.
//!
//! ## Architecture
//!
//! - [`bond`] — the allowed/forbidden bond-difference table and the six
//!   unit move directions.
//! - [`lattice`] — the committed + scratch occupancy grids and the
//!   branch-free 3×3 face test.
//! - [`monomer`] — staging-time monomer storage (positions, attributes,
//!   original-order adjacency).
//! - [`color`] — the host-side graph colorer that partitions monomers into
//!   conflict-free species.
//! - [`layout`] — the sorted, alignment-padded per-species columnar layout.
//! - [`engine`] — [`engine::BfmEngine`], the embeddable lifecycle API, and
//!   the three-phase (propose/commit/settle) move engine it drives.
//! - [`verifier`] — the optional O(N) bond and occupancy invariant checker.
//! - [`rng`] — the Wang/Jenkins direction hash and the substep seed stream.
//! - [`token`] — the `GhostToken`/`InvariantLifetime` session-branding
//!   primitives the engine is built on.
//!
//! ## Example
//!
//! ```rust
//! use bfm_engine::engine::BfmEngine;
//! use bfm_engine::bond::standard_108_bond_set;
//!
//! BfmEngine::with_session(|engine| {
//!     engine.set_box_size(8, 8, 8).unwrap();
//!     engine.set_periodicity(true, true, true).unwrap();
//!     engine.set_num_monomers(2).unwrap();
//!     engine.set_position(0, 2, 2, 2).unwrap();
//!     engine.set_position(1, 4, 2, 2).unwrap();
//!     engine.add_bond(0, 1).unwrap();
//!     for (dx, dy, dz) in standard_108_bond_set() {
//!         engine.set_allowed_bond(dx, dy, dz, true).unwrap();
//!     }
//!     engine.initialize(1).unwrap();
//!
//!     engine.run_sweeps(100).unwrap();
//!     assert!(engine.verify().unwrap().passed());
//! });
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

/// The allowed/forbidden bond-difference table and unit move directions.
pub mod bond;
/// The host-side graph colorer.
pub mod color;
/// Ghost-branded concurrency primitives (atomics, cache-line padding).
pub mod concurrency;
/// Engine-wide configuration and compile-time constants.
pub mod config;
/// The embeddable lifecycle API and the three-phase move engine.
pub mod engine;
/// The typed error surface.
pub mod error;
/// The committed/scratch occupancy lattice.
pub mod lattice;
/// The sorted, alignment-padded per-species layout.
pub mod layout;
mod logging;
/// Staging-time monomer storage.
pub mod monomer;
/// The direction hash and substep seed stream.
pub mod rng;
/// The `GhostToken`/`InvariantLifetime` session-branding primitives.
pub mod token;
/// The optional bond/occupancy invariant checker.
pub mod verifier;

pub use engine::BfmEngine;
pub use error::{BfmError, Result};
pub use token::GhostToken;

// Tokens remain zero-sized regardless of what they brand.
const _: () = {
    use core::mem;
    assert!(mem::size_of::<GhostToken<'static>>() == 0);
};
