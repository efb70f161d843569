//! The lattice store: two occupancy grids (committed + scratch) plus the
//! branch-free 3×3 face test (spec §3 "Lattice", §4.4, §4.6).

use crate::concurrency::atomic::GhostAtomicBool;
use crate::config::BoxGeometry;
use std::sync::atomic::Ordering;

/// Two occupancy grids over the same [`BoxGeometry`]: the committed lattice
/// (read during phase A, written by phase B) and the scratch lattice
/// (written idempotently by phase A, read by phase B, zeroed by phase C).
///
/// Branded to the simulation session that created it, so a `Lattice` from
/// one `initialize()` call cannot be passed to move-engine code operating
/// on a `MonomerStore` from a different call.
pub struct Lattice<'brand> {
    geometry: BoxGeometry,
    committed: Vec<GhostAtomicBool<'brand>>,
    scratch: Vec<GhostAtomicBool<'brand>>,
}

impl<'brand> Lattice<'brand> {
    /// Allocates both grids, all-zero, for the given geometry.
    #[must_use]
    pub fn new(geometry: BoxGeometry) -> Self {
        let volume = geometry.volume();
        Self {
            geometry,
            committed: (0..volume).map(|_| GhostAtomicBool::new(false)).collect(),
            scratch: (0..volume).map(|_| GhostAtomicBool::new(false)).collect(),
        }
    }

    /// The box geometry this lattice was allocated for.
    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &BoxGeometry {
        &self.geometry
    }

    /// Clears both grids and then sets the cell of every monomer's current
    /// corner in the committed lattice (spec §4.4, "lattice priming").
    /// Scratch is left all-zero, as required before the first sweep.
    pub fn prime<I>(&self, corners: I)
    where
        I: IntoIterator<Item = (i64, i64, i64)>,
    {
        for cell in &self.committed {
            cell.store(false, Ordering::Relaxed);
        }
        for cell in &self.scratch {
            cell.store(false, Ordering::Relaxed);
        }
        for (x, y, z) in corners {
            let idx = self.geometry.linearize(x, y, z);
            self.committed[idx].store(true, Ordering::Relaxed);
        }
    }

    /// Sets a cell of the committed lattice.
    #[inline]
    pub fn set_committed(&self, x: i64, y: i64, z: i64, occupied: bool) {
        let idx = self.geometry.linearize(x, y, z);
        self.committed[idx].store(occupied, Ordering::Relaxed);
    }

    /// Reads a cell of the committed lattice.
    #[inline]
    #[must_use]
    pub fn is_committed(&self, x: i64, y: i64, z: i64) -> bool {
        self.committed[self.geometry.linearize(x, y, z)].load(Ordering::Relaxed)
    }

    /// Idempotently marks a cell of the scratch lattice as occupied. Safe
    /// for any number of workers to call concurrently on the same cell
    /// (spec §4.5 phase A, "atomicity note").
    #[inline]
    pub fn mark_scratch(&self, x: i64, y: i64, z: i64) {
        self.scratch[self.geometry.linearize(x, y, z)].store(true, Ordering::Relaxed);
    }

    /// Clears a cell of the scratch lattice (phase C settle).
    #[inline]
    pub fn clear_scratch(&self, x: i64, y: i64, z: i64) {
        self.scratch[self.geometry.linearize(x, y, z)].store(false, Ordering::Relaxed);
    }

    /// Reads a cell of the scratch lattice.
    #[inline]
    #[must_use]
    pub fn is_scratch(&self, x: i64, y: i64, z: i64) -> bool {
        self.scratch[self.geometry.linearize(x, y, z)].load(Ordering::Relaxed)
    }

    /// Returns whether the entire scratch lattice is zero (spec §8,
    /// "scratch cleanup" invariant).
    #[must_use]
    pub fn scratch_is_zero(&self) -> bool {
        self.scratch.iter().all(|c| !c.load(Ordering::Relaxed))
    }

    /// The branch-free 3×3 face test of spec §4.6.
    ///
    /// Given origin `(x, y, z)` and direction id `d ∈ [0, 6)`, tests the
    /// nine cells of the plane one lattice unit beyond the destination
    /// cube's face opposite the motion direction, OR-reducing their
    /// occupancy. `read` selects which grid to read (committed in phase A,
    /// scratch in phase B).
    #[inline]
    pub fn face_occupied(&self, x: i64, y: i64, z: i64, direction: usize, read: Grid) -> bool {
        let axis = direction >> 1;
        let sign: i64 = if direction & 1 == 1 { 1 } else { -1 };
        let mut base = [x, y, z];
        base[axis] += 2 * sign;

        let (a1, a2) = match axis {
            0 => (1usize, 2usize),
            1 => (0usize, 2usize),
            _ => (0usize, 1usize),
        };

        for d1 in [-1i64, 0, 1] {
            for d2 in [-1i64, 0, 1] {
                let mut coord = base;
                coord[a1] += d1;
                coord[a2] += d2;
                let occupied = match read {
                    Grid::Committed => self.is_committed(coord[0], coord[1], coord[2]),
                    Grid::Scratch => self.is_scratch(coord[0], coord[1], coord[2]),
                };
                if occupied {
                    return true;
                }
            }
        }
        false
    }
}

/// Which of the two grids a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    /// The committed (accepted-move) lattice.
    Committed,
    /// The ephemeral, per-substep scratch lattice.
    Scratch,
}
