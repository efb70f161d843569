//! Optional O(N) invariant checker: bond validity and excluded volume
//! (spec §4.7, §8 "Invariants").
//!
//! Runs independently of the move engine and touches none of its internal
//! state beyond what's already public on [`SortedMonomers`] and [`Lattice`];
//! a host can call it between sweeps, after `cleanup`-adjacent debugging, or
//! in a test, without perturbing the run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bond::BondTable;
use crate::lattice::Lattice;
use crate::layout::SortedMonomers;

/// First bond-invariant violation found, with enough context to locate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondFailure {
    /// Original (caller) index of the first endpoint.
    pub i: usize,
    /// Original (caller) index of the second endpoint.
    pub j: usize,
    /// `pos(j) - pos(i)`, the vector the bond table was tested against.
    pub delta: (i32, i32, i32),
    /// Human-readable description of which test failed.
    pub reason: String,
}

/// Result of one verifier pass (spec §4.7).
///
/// `passed()` is the single yes/no a caller usually wants; the individual
/// fields let a host log or serialize the full picture of what was checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Whether every edge satisfied the bond-length and allowed-vector test.
    pub bonds_ok: bool,
    /// Whether every monomer's 8 cube corners landed on distinct cells.
    pub occupancy_ok: bool,
    /// Whether the scratch lattice was all-zero at the time of the check.
    pub scratch_zero: bool,
    /// Number of distinct occupied cells found across all monomer cubes.
    pub occupied_cells: usize,
    /// Expected distinct occupied cells if there were no collisions (`8*N`).
    pub expected_cells: usize,
    /// The first bond failure encountered, if any.
    pub first_bond_failure: Option<BondFailure>,
}

impl VerificationReport {
    /// Whether every invariant checked held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.bonds_ok && self.occupancy_ok && self.scratch_zero
    }
}

/// Runs the full verifier pass over `monomers` and `lattice` using `bonds`
/// as the allowed-vector table.
#[must_use]
pub fn verify<'brand>(monomers: &SortedMonomers<'brand>, lattice: &Lattice<'brand>, bonds: &BondTable) -> VerificationReport {
    let first_bond_failure = check_bonds(monomers, bonds);
    let (occupied_cells, expected_cells) = check_occupancy(monomers, lattice);

    VerificationReport {
        bonds_ok: first_bond_failure.is_none(),
        occupancy_ok: occupied_cells == expected_cells,
        scratch_zero: lattice.scratch_is_zero(),
        occupied_cells,
        expected_cells,
        first_bond_failure,
    }
}

/// For every edge `(i,j)`, requires `|delta|_inf <= 3` and
/// `bonds.is_allowed(delta)`. Stops at the first violation, per spec §4.7
/// ("reports the first failing edge with context").
fn check_bonds<'brand>(monomers: &SortedMonomers<'brand>, bonds: &BondTable) -> Option<BondFailure> {
    for c in 0..monomers.species_count() {
        let off = monomers.species_off(c);
        let n = monomers.species_len(c);
        for local in 0..n {
            let idx = off + local;
            let k = monomers.neighbor_count(idx);
            for s in 0..k {
                let Some(nb) = monomers.neighbor(c, local, s) else {
                    continue;
                };
                let (xi, yi, zi) = monomers.position(idx);
                let (xj, yj, zj) = monomers.position(nb);
                let dx = (xj - xi) as i32;
                let dy = (yj - yi) as i32;
                let dz = (zj - zi) as i32;

                let i_old = monomers.to_old(idx).expect("real monomer has an original index");
                let j_old = monomers.to_old(nb).expect("real monomer has an original index");

                if dx.abs().max(dy.abs()).max(dz.abs()) > 3 {
                    return Some(BondFailure {
                        i: i_old,
                        j: j_old,
                        delta: (dx, dy, dz),
                        reason: "bond length exceeds the representable range".into(),
                    });
                }
                if !bonds.is_allowed(dx, dy, dz) {
                    return Some(BondFailure {
                        i: i_old,
                        j: j_old,
                        delta: (dx, dy, dz),
                        reason: "bond vector not in the allowed set".into(),
                    });
                }
            }
        }
    }
    None
}

/// Counts the distinct lattice cells covered by every monomer's 8-cell cube
/// (spec §4.7: "assert the total count equals 8*N; any collision reduces
/// the count").
fn check_occupancy<'brand>(monomers: &SortedMonomers<'brand>, lattice: &Lattice<'brand>) -> (usize, usize) {
    let geometry = lattice.geometry();
    let mut seen: HashMap<usize, u32> = HashMap::new();
    let mut n = 0usize;

    for (_, idx) in monomers.iter_real() {
        n += 1;
        let (x, y, z) = monomers.position(idx);
        for dx in 0..2i64 {
            for dy in 0..2i64 {
                for dz in 0..2i64 {
                    let cell = geometry.linearize(x as i64 + dx, y as i64 + dy, z as i64 + dz);
                    *seen.entry(cell).or_insert(0) += 1;
                }
            }
        }
    }

    (seen.len(), n * 8)
}
