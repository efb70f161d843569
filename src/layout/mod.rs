//! The layout planner: per-species offsets, alignment padding, and the
//! old↔new index permutation (spec §3 "Sorted layout", §4.2).

use std::marker::PhantomData;

use crate::color::Coloring;
use crate::config::{Coord, ALIGNMENT, MAX_CONNECTIVITY};
use crate::monomer::MonomerStaging;
use crate::token::invariant::InvariantLifetime;

/// Rounds `n` up to the next multiple of [`ALIGNMENT`].
#[inline]
#[must_use]
pub fn padded_len(n: usize) -> usize {
    ((n + ALIGNMENT - 1) / ALIGNMENT) * ALIGNMENT
}

/// Sentinel neighbor-slot value meaning "no neighbor here" (a real index
/// never reaches `u32::MAX` for any system this engine can represent).
pub const NO_NEIGHBOR: u32 = u32::MAX;

/// Monomer data permuted into species-sorted, alignment-padded columnar
/// arrays, ready for the move engine (spec §3 "Sorted layout").
///
/// Branded to the simulation session it was built for, same as
/// [`crate::lattice::Lattice`].
pub struct SortedMonomers<'brand> {
    species_count: usize,
    n: Vec<usize>,
    off: Vec<usize>,
    pitch: Vec<usize>,
    neighbor_off: Vec<usize>,
    total_padded: usize,

    pos_x: Vec<Coord>,
    pos_y: Vec<Coord>,
    pos_z: Vec<Coord>,
    tag: Vec<u8>,
    flags: Vec<u8>,
    neighbors: Vec<u32>,
    attribute: Vec<u8>,

    i_to_new: Vec<u32>,
    i_new_to_old: Vec<Option<u32>>,

    _brand: PhantomData<InvariantLifetime<'brand>>,
}

impl<'brand> SortedMonomers<'brand> {
    /// Builds the sorted layout from staged monomers and a coloring.
    ///
    /// Guarantees (spec §4.2): species regions are strictly contiguous and
    /// aligned; original-order neighbor lists are rewritten into the new
    /// numbering so cross-species edges stay consistent.
    #[must_use]
    pub fn build(staging: &MonomerStaging, coloring: &Coloring) -> Self {
        let n_total = staging.len();
        let species_count = coloring.species_count();

        let mut n = vec![0usize; species_count];
        for &c in coloring.colors() {
            n[c as usize] += 1;
        }

        let pitch: Vec<usize> = n.iter().map(|&nc| padded_len(nc)).collect();
        let mut off = vec![0usize; species_count];
        let mut neighbor_off = vec![0usize; species_count];
        let mut running = 0usize;
        let mut running_nbr = 0usize;
        for c in 0..species_count {
            off[c] = running;
            running += pitch[c];
            neighbor_off[c] = running_nbr;
            running_nbr += pitch[c] * MAX_CONNECTIVITY;
        }
        let total_padded = running;
        let total_neighbor_slots = running_nbr;

        // Assign each original index a new sorted index: walk monomers in
        // original order, placing each into the next free slot of its
        // species' region.
        let mut cursor = off.clone();
        let mut i_to_new = vec![0u32; n_total];
        let mut i_new_to_old: Vec<Option<u32>> = vec![None; total_padded];
        for i in 0..n_total {
            let c = coloring.color_of(i) as usize;
            let new_idx = cursor[c];
            cursor[c] += 1;
            i_to_new[i] = new_idx as u32;
            i_new_to_old[new_idx] = Some(i as u32);
        }

        let mut pos_x = vec![0 as Coord; total_padded];
        let mut pos_y = vec![0 as Coord; total_padded];
        let mut pos_z = vec![0 as Coord; total_padded];
        let mut tag = vec![0u8; total_padded];
        let flags = vec![0u8; total_padded];
        let mut neighbors = vec![NO_NEIGHBOR; total_neighbor_slots];
        let mut attribute = vec![0u8; total_padded];

        for i in 0..n_total {
            let new_idx = i_to_new[i] as usize;
            let [x, y, z] = staging.position(i);
            pos_x[new_idx] = x;
            pos_y[new_idx] = y;
            pos_z[new_idx] = z;
            attribute[new_idx] = staging.attribute(i);

            let adjacency = &staging.adjacency()[i];
            let k = adjacency.len() as u8;
            tag[new_idx] = k << 5;

            let c = coloring.color_of(i) as usize;
            let local = new_idx - off[c];
            for (s, &nb_old) in adjacency.iter().enumerate() {
                let nb_new = i_to_new[nb_old as usize];
                neighbors[neighbor_off[c] + s * pitch[c] + local] = nb_new;
            }
        }

        Self {
            species_count,
            n,
            off,
            pitch,
            neighbor_off,
            total_padded,
            pos_x,
            pos_y,
            pos_z,
            tag,
            flags,
            neighbors,
            attribute,
            i_to_new,
            i_new_to_old,
            _brand: PhantomData,
        }
    }

    /// Number of species (colors).
    #[inline]
    #[must_use]
    pub fn species_count(&self) -> usize {
        self.species_count
    }

    /// Number of real (non-padding) monomers in species `c`.
    #[inline]
    #[must_use]
    pub fn species_len(&self, c: usize) -> usize {
        self.n[c]
    }

    /// Sorted-index offset of species `c`'s region.
    #[inline]
    #[must_use]
    pub fn species_off(&self, c: usize) -> usize {
        self.off[c]
    }

    /// Total padded length of all species regions combined.
    #[inline]
    #[must_use]
    pub fn total_padded(&self) -> usize {
        self.total_padded
    }

    /// Maps an original (caller) index to its sorted index.
    #[inline]
    #[must_use]
    pub fn to_new(&self, original: usize) -> usize {
        self.i_to_new[original] as usize
    }

    /// Maps a sorted index back to the original (caller) index, or `None`
    /// if it is a padding slot.
    #[inline]
    #[must_use]
    pub fn to_old(&self, sorted: usize) -> Option<usize> {
        self.i_new_to_old[sorted].map(|v| v as usize)
    }

    /// Position `(x, y, z)` at sorted index `idx`.
    #[inline]
    #[must_use]
    pub fn position(&self, idx: usize) -> (Coord, Coord, Coord) {
        (self.pos_x[idx], self.pos_y[idx], self.pos_z[idx])
    }

    /// Sets the position at sorted index `idx`.
    #[inline]
    pub fn set_position(&mut self, idx: usize, x: Coord, y: Coord, z: Coord) {
        self.pos_x[idx] = x;
        self.pos_y[idx] = y;
        self.pos_z[idx] = z;
    }

    /// Attribute byte staged via
    /// [`crate::monomer::MonomerStaging::set_attribute`] for sorted index
    /// `idx`, carried through the species-sorted permutation unchanged.
    #[inline]
    #[must_use]
    pub fn attribute(&self, idx: usize) -> u8 {
        self.attribute[idx]
    }

    /// Neighbor count `k` packed in the tag byte at sorted index `idx`.
    #[inline]
    #[must_use]
    pub fn neighbor_count(&self, idx: usize) -> usize {
        (self.tag[idx] >> 5) as usize
    }

    /// The sorted index of neighbor slot `s` (0-based) of the monomer at
    /// sorted index `idx`, or `None` if that slot is unused.
    #[inline]
    #[must_use]
    pub fn neighbor(&self, c: usize, local: usize, s: usize) -> Option<usize> {
        let raw = self.neighbors[self.neighbor_off[c] + s * self.pitch[c] + local];
        if raw == NO_NEIGHBOR {
            None
        } else {
            Some(raw as usize)
        }
    }

    /// Mutable access to the per-substep flag byte at sorted index `idx`.
    #[inline]
    pub fn flag(&self, idx: usize) -> u8 {
        self.flags[idx]
    }

    /// Sets the per-substep flag byte at sorted index `idx`.
    #[inline]
    pub fn set_flag(&mut self, idx: usize, value: u8) {
        self.flags[idx] = value;
    }

    /// Tag byte slice for species `c`'s real region.
    #[inline]
    #[must_use]
    pub fn tags_for_species(&self, c: usize) -> &[u8] {
        let off = self.off[c];
        &self.tag[off..off + self.n[c]]
    }

    /// Pitch (padded row count) of species `c`'s neighbor-matrix columns.
    #[inline]
    #[must_use]
    pub fn pitch(&self, c: usize) -> usize {
        self.pitch[c]
    }

    /// Everything phase A needs for species `c` in one disjoint borrow:
    /// whole-array read-only positions and neighbor matrix (a proposing
    /// monomer must be able to read any other species' positions, since its
    /// bonded neighbors are never same-species after coloring), this
    /// species' tags (read-only), and this species' flags (mutable, one
    /// slot per worker). Built via direct field destructuring so the
    /// borrow checker can see the `pos_*`/`neighbors`/`tag` reads and the
    /// `flags` write are disjoint.
    pub fn phase_a_view(&mut self, c: usize) -> PhaseAView<'_> {
        let off = self.off[c];
        let n = self.n[c];
        PhaseAView {
            pos_x: &self.pos_x,
            pos_y: &self.pos_y,
            pos_z: &self.pos_z,
            tags: &self.tag[off..off + n],
            neighbors: &self.neighbors,
            neighbor_off: self.neighbor_off[c],
            pitch: self.pitch[c],
            flags: &mut self.flags[off..off + n],
        }
    }

    /// Everything phase B needs for species `c`: this species' positions
    /// (read-only, to recompute the destination) and flags (mutable, to OR
    /// in the commit-accepted bit).
    pub fn phase_b_view(&mut self, c: usize) -> PhaseBView<'_> {
        let off = self.off[c];
        let n = self.n[c];
        PhaseBView {
            pos_x: &self.pos_x[off..off + n],
            pos_y: &self.pos_y[off..off + n],
            pos_z: &self.pos_z[off..off + n],
            flags: &mut self.flags[off..off + n],
        }
    }

    /// Everything phase C needs for species `c`: this species' positions
    /// (mutable, the only phase allowed to write them) and flags
    /// (read-only, already finalized by phase B).
    pub fn phase_c_view(&mut self, c: usize) -> PhaseCView<'_> {
        let off = self.off[c];
        let n = self.n[c];
        PhaseCView {
            pos_x: &mut self.pos_x[off..off + n],
            pos_y: &mut self.pos_y[off..off + n],
            pos_z: &mut self.pos_z[off..off + n],
            flags: &self.flags[off..off + n],
        }
    }

    /// Iterates `(original_index, sorted_index)` pairs for every real (not
    /// padding) monomer, in sorted order. Used to copy results back into
    /// loader order (spec §2 "reordered results are copied back in loader
    /// order").
    pub fn iter_real(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.total_padded).filter_map(move |idx| self.i_new_to_old[idx].map(|old| (old as usize, idx)))
    }
}

/// Borrowed view handed to phase A (propose): whole-array positions (a
/// bonded neighbor is never same-species, so phase A must be able to read
/// any species' position), this species' tags and neighbor matrix
/// (read-only), and this species' flag byte per monomer (exclusive, one
/// slot per worker).
pub struct PhaseAView<'a> {
    /// Whole-array x positions, sorted numbering.
    pub pos_x: &'a [Coord],
    /// Whole-array y positions, sorted numbering.
    pub pos_y: &'a [Coord],
    /// Whole-array z positions, sorted numbering.
    pub pos_z: &'a [Coord],
    /// This species' tag bytes (neighbor count packed in bits 5-7).
    pub tags: &'a [u8],
    /// The whole neighbor matrix, column-major, all species.
    pub neighbors: &'a [u32],
    /// This species' base offset into `neighbors`.
    pub neighbor_off: usize,
    /// This species' padded row count (the neighbor-matrix pitch).
    pub pitch: usize,
    /// This species' flag bytes, one per local monomer.
    pub flags: &'a mut [u8],
}

/// Borrowed view handed to phase B (commit): this species' positions
/// (read-only, to recompute each monomer's destination) and flags
/// (exclusive, to OR in the commit-accepted bit).
pub struct PhaseBView<'a> {
    /// This species' x positions.
    pub pos_x: &'a [Coord],
    /// This species' y positions.
    pub pos_y: &'a [Coord],
    /// This species' z positions.
    pub pos_z: &'a [Coord],
    /// This species' flag bytes.
    pub flags: &'a mut [u8],
}

/// Borrowed view handed to phase C (settle): this species' positions
/// (exclusive, the only phase allowed to write them) and flags (read-only,
/// already finalized by phase B).
pub struct PhaseCView<'a> {
    /// This species' x positions.
    pub pos_x: &'a mut [Coord],
    /// This species' y positions.
    pub pos_y: &'a mut [Coord],
    /// This species' z positions.
    pub pos_z: &'a mut [Coord],
    /// This species' flag bytes.
    pub flags: &'a [u8],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::color_graph;

    #[test]
    fn padded_len_rounds_up_to_alignment() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), ALIGNMENT);
        assert_eq!(padded_len(ALIGNMENT), ALIGNMENT);
        assert_eq!(padded_len(ALIGNMENT + 1), 2 * ALIGNMENT);
    }

    #[test]
    fn species_regions_are_contiguous_and_aligned() {
        let mut staging = MonomerStaging::new(70);
        for i in 0..70 {
            staging.set_position(i, i as Coord, 0, 0).unwrap();
        }
        // A path graph: two colors after greedy coloring.
        for i in 0..69 {
            staging.add_bond(i, i + 1).unwrap();
        }
        let coloring = color_graph(staging.adjacency(), true).unwrap();
        let layout = SortedMonomers::build(&staging, &coloring);

        for c in 0..layout.species_count() {
            assert_eq!(layout.species_off(c) % ALIGNMENT, 0);
        }
        // offsets are non-decreasing and non-overlapping
        let mut sorted_offsets: Vec<usize> = (0..layout.species_count()).map(|c| layout.species_off(c)).collect();
        sorted_offsets.sort_unstable();
        assert_eq!(sorted_offsets, (0..layout.species_count()).map(|c| layout.species_off(c)).collect::<Vec<_>>());
    }

    #[test]
    fn permutation_is_a_bijection_on_real_slots() {
        let mut staging = MonomerStaging::new(40);
        for i in 0..39 {
            staging.add_bond(i, i + 1).unwrap();
        }
        let coloring = color_graph(staging.adjacency(), true).unwrap();
        let layout = SortedMonomers::build(&staging, &coloring);

        let mut seen_old = vec![false; 40];
        for (old, new) in layout.iter_real() {
            assert_eq!(layout.to_new(old), new);
            assert!(!seen_old[old]);
            seen_old[old] = true;
        }
        assert!(seen_old.iter().all(|&b| b));
    }

    #[test]
    fn neighbor_lists_are_rewritten_into_sorted_numbering() {
        let mut staging = MonomerStaging::new(6);
        for i in 0..6usize {
            staging.add_bond(i, (i + 1) % 6).unwrap();
        }
        let coloring = color_graph(staging.adjacency(), true).unwrap();
        let layout = SortedMonomers::build(&staging, &coloring);

        for old in 0..6 {
            let new_idx = layout.to_new(old);
            let c = coloring.color_of(old) as usize;
            let local = new_idx - layout.species_off(c);
            let k = layout.neighbor_count(new_idx);
            assert_eq!(k, staging.adjacency()[old].len());
            for s in 0..k {
                let nb_new = layout.neighbor(c, local, s).unwrap();
                let nb_old = layout.to_old(nb_new).unwrap();
                assert!(staging.adjacency()[old].contains(&(nb_old as u32)));
            }
        }
    }

    #[test]
    fn attribute_survives_the_species_sorted_permutation() {
        let mut staging = MonomerStaging::new(6);
        for i in 0..6usize {
            staging.add_bond(i, (i + 1) % 6).unwrap();
            staging.set_attribute(i, (i as u8) * 17).unwrap();
        }
        let coloring = color_graph(staging.adjacency(), true).unwrap();
        let layout = SortedMonomers::build(&staging, &coloring);

        for old in 0..6 {
            let new_idx = layout.to_new(old);
            assert_eq!(layout.attribute(new_idx), staging.attribute(old));
        }
    }
}
