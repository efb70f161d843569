//! The three-phase per-species kernel pipeline: propose, commit, settle
//! (spec §4.5).

use rayon::prelude::*;
use std::sync::atomic::Ordering;

use crate::bond::{BondTable, DIRECTIONS};
use crate::concurrency::atomic::GhostAtomicU64;
use crate::config::{BoxGeometry, Coord, Periodicity};
use crate::lattice::{Grid, Lattice};
use crate::layout::{SortedMonomers, NO_NEIGHBOR};
use crate::rng::direction_index;

const ACCEPTED_A: u8 = 0b0001;
const ACCEPTED_B: u8 = 0b0010;
const DIRECTION_SHIFT: u8 = 2;
const DIRECTION_MASK: u8 = 0b111;

/// Counters updated across the three phases of one substep, for logging
/// and for the `total_accepted` statistic exposed by the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstepStats {
    /// Monomers accepted by phase A (proposed, no bond/boundary/volume
    /// conflict against the committed lattice).
    pub proposed: usize,
    /// Monomers accepted by phase B (survived the scratch-lattice re-test).
    pub committed: usize,
}

/// Runs one substep (the three-phase pipeline) over species `species` of
/// `monomers`, using `sigma` as this substep's 32-bit seed.
///
/// `total_accepted` is updated with a relaxed fetch-add after phase B. The
/// three phases run one after another on the calling thread, each blocking
/// until its own data-parallel sweep (via rayon) finishes, which is exactly
/// the device-wide barrier spec §5 requires between phases A, B and C.
pub fn run_substep<'brand>(
    monomers: &mut SortedMonomers<'brand>,
    lattice: &Lattice<'brand>,
    bonds: &BondTable,
    geometry: &BoxGeometry,
    periodicity: Periodicity,
    species: usize,
    sigma: u32,
    total_accepted: &GhostAtomicU64<'brand>,
) -> SubstepStats {
    let off = monomers.species_off(species);
    let n = monomers.species_len(species);
    if n == 0 {
        return SubstepStats::default();
    }

    let proposed = phase_a_propose(monomers, lattice, bonds, geometry, periodicity, species, off, sigma);
    let committed = phase_b_commit(monomers, lattice, species, n);
    phase_c_settle(monomers, lattice, species, n);

    if committed > 0 {
        total_accepted.fetch_add(committed as u64, Ordering::Relaxed);
    }

    SubstepStats { proposed, committed }
}

/// Phase A (check-kernel, spec §4.5): for each monomer of `species`, draw a
/// move direction from the Wang hash, reject on boundary/bond/excluded-
/// volume conflict against the *committed* lattice, and otherwise
/// idempotently mark the destination cell in *scratch*. Returns the number
/// of monomers accepted.
#[allow(clippy::too_many_arguments)]
fn phase_a_propose<'brand>(
    monomers: &mut SortedMonomers<'brand>,
    lattice: &Lattice<'brand>,
    bonds: &BondTable,
    geometry: &BoxGeometry,
    periodicity: Periodicity,
    species: usize,
    off: usize,
    sigma: u32,
) -> usize {
    let view = monomers.phase_a_view(species);
    let pos_x = view.pos_x;
    let pos_y = view.pos_y;
    let pos_z = view.pos_z;
    let tags = view.tags;
    let neighbors = view.neighbors;
    let neighbor_off = view.neighbor_off;
    let pitch = view.pitch;
    let flags = view.flags;

    // `flags` is this species' exclusive, disjoint slice: one worker per
    // local monomer index `m`, no atomics needed for it. The shared
    // lattice (read committed, write scratch) is the only cross-worker
    // traffic, and it goes through `Lattice`'s branded atomics.
    flags.par_iter_mut().enumerate().for_each(|(m, flag)| {
        *flag = 0;
        let global = (off + m) as u32;
        let x = pos_x[off + m] as i64;
        let y = pos_y[off + m] as i64;
        let z = pos_z[off + m] as i64;
        let k = (tags[m] >> 5) as usize;

        let d = direction_index(global, sigma) as usize;
        let (dx, dy, dz) = DIRECTIONS[d];
        let (nx, ny, nz) = (x + dx as i64, y + dy as i64, z + dz as i64);

        if !periodicity.x && !(0..geometry.bx() as i64).contains(&nx) {
            return;
        }
        if !periodicity.y && !(0..geometry.by() as i64).contains(&ny) {
            return;
        }
        if !periodicity.z && !(0..geometry.bz() as i64).contains(&nz) {
            return;
        }

        for s in 0..k {
            let raw = neighbors[neighbor_off + s * pitch + m];
            if raw == NO_NEIGHBOR {
                continue;
            }
            let nb = raw as usize;
            let ddx = pos_x[nb] as i64 - nx;
            let ddy = pos_y[nb] as i64 - ny;
            let ddz = pos_z[nb] as i64 - nz;
            if !bonds.is_allowed(ddx as i32, ddy as i32, ddz as i32) {
                return;
            }
        }

        if lattice.face_occupied(x, y, z, d, Grid::Committed) {
            return;
        }

        *flag = ACCEPTED_A | ((d as u8) << DIRECTION_SHIFT);
        lattice.mark_scratch(nx, ny, nz);
    });

    flags.iter().filter(|&&f| f & ACCEPTED_A != 0).count()
}

/// Phase B (perform-kernel, spec §4.5): re-tests each phase-A-accepted
/// monomer's destination against the *scratch* lattice (which now reflects
/// every phase-A acceptance of this species) and, if still clear, commits
/// the move into the committed lattice. Returns the number committed.
fn phase_b_commit<'brand>(monomers: &mut SortedMonomers<'brand>, lattice: &Lattice<'brand>, species: usize, n: usize) -> usize {
    let view = monomers.phase_b_view(species);
    let pos_x = view.pos_x;
    let pos_y = view.pos_y;
    let pos_z = view.pos_z;
    let flags = view.flags;

    let accepted: Vec<bool> = (0..n)
        .into_par_iter()
        .map(|m| {
            let flag = flags[m];
            if flag & ACCEPTED_A == 0 {
                return false;
            }
            let d = ((flag >> DIRECTION_SHIFT) & DIRECTION_MASK) as usize;
            let x = pos_x[m] as i64;
            let y = pos_y[m] as i64;
            let z = pos_z[m] as i64;
            !lattice.face_occupied(x, y, z, d, Grid::Scratch)
        })
        .collect();

    // Sequential: phase B's decisions are already finalized by the parallel
    // scratch re-test above, so these committed-lattice writes need no
    // particular order between monomers of the same species (the coloring
    // invariant already rules out two of them sharing a bond, and the
    // scratch re-test already ruled out two of them landing within each
    // other's 3x3 face).
    let mut committed = 0usize;
    for (m, &accept) in accepted.iter().enumerate() {
        if !accept {
            continue;
        }
        flags[m] |= ACCEPTED_B;
        committed += 1;
        let flag = flags[m];
        let d = ((flag >> DIRECTION_SHIFT) & DIRECTION_MASK) as usize;
        let (dx, dy, dz) = DIRECTIONS[d];
        let x = pos_x[m] as i64;
        let y = pos_y[m] as i64;
        let z = pos_z[m] as i64;
        lattice.set_committed(x, y, z, false);
        lattice.set_committed(x + dx as i64, y + dy as i64, z + dz as i64, true);
    }
    committed
}

/// Phase C (zero-kernel, spec §4.5): clears this substep's scratch marks
/// and, for monomers accepted in both A and B, advances the stored
/// position. Leaves scratch all-zero for the next substep.
fn phase_c_settle<'brand>(monomers: &mut SortedMonomers<'brand>, lattice: &Lattice<'brand>, species: usize, n: usize) {
    let view = monomers.phase_c_view(species);
    let pos_x = view.pos_x;
    let pos_y = view.pos_y;
    let pos_z = view.pos_z;
    let flags = view.flags;

    for m in 0..n {
        let flag = flags[m];
        if flag & ACCEPTED_A == 0 {
            continue;
        }
        let d = ((flag >> DIRECTION_SHIFT) & DIRECTION_MASK) as usize;
        let (dx, dy, dz) = DIRECTIONS[d];
        let x = pos_x[m] as i64;
        let y = pos_y[m] as i64;
        let z = pos_z[m] as i64;
        lattice.clear_scratch(x + dx as i64, y + dy as i64, z + dz as i64);

        if flag & (ACCEPTED_A | ACCEPTED_B) == (ACCEPTED_A | ACCEPTED_B) {
            pos_x[m] += dx as Coord;
            pos_y[m] += dy as Coord;
            pos_z[m] += dz as Coord;
        }
    }
}
