//! Staging-time monomer storage: positions, attribute tags, and the
//! original-order bond adjacency (spec §3 "Monomer", "Adjacency", §6
//! staging calls).

use crate::config::{Coord, MAX_CONNECTIVITY};
use crate::error::{BfmError, Result};

/// Monomer positions, attributes, and bonds in the caller's original
/// numbering, as staged before `initialize()`.
///
/// Bonds are undirected: [`MonomerStaging::add_bond`] inserts both
/// directions and rejects a monomer that would exceed
/// [`MAX_CONNECTIVITY`] neighbors.
#[derive(Debug, Clone)]
pub struct MonomerStaging {
    positions: Vec<[Coord; 3]>,
    attributes: Vec<u8>,
    adjacency: Vec<Vec<u32>>,
}

impl MonomerStaging {
    /// Allocates storage for `n` monomers with zeroed positions/attributes
    /// and empty adjacency (spec §6 `setNumMonomers`).
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            positions: vec![[0; 3]; n],
            attributes: vec![0; n],
            adjacency: vec![Vec::new(); n],
        }
    }

    /// Number of staged monomers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no monomers have been staged.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Stages the position of monomer `i` (spec §6 `setPosition`).
    pub fn set_position(&mut self, i: usize, x: Coord, y: Coord, z: Coord) -> Result<()> {
        let slot = self
            .positions
            .get_mut(i)
            .ok_or_else(|| out_of_range(i, self.positions.len()))?;
        *slot = [x, y, z];
        Ok(())
    }

    /// Stages an attribute byte for monomer `i` (spec §6 `setAttribute`).
    /// The move logic in phases A/B/C never reads this value; it is carried
    /// verbatim through [`crate::layout::SortedMonomers::build`]'s
    /// species-sorted permutation and exposed again via
    /// [`crate::layout::SortedMonomers::attribute`] (and the engine's
    /// `get_attribute`) for the caller's own use.
    pub fn set_attribute(&mut self, i: usize, attribute: u8) -> Result<()> {
        let slot = self
            .attributes
            .get_mut(i)
            .ok_or_else(|| out_of_range(i, self.attributes.len()))?;
        *slot = attribute;
        Ok(())
    }

    /// Stages an undirected bond between `i` and `j` (spec §6 `addBond`).
    ///
    /// Rejects self-bonds, duplicate bonds, out-of-range indices, and bonds
    /// that would push either endpoint's degree above [`MAX_CONNECTIVITY`].
    pub fn add_bond(&mut self, i: usize, j: usize) -> Result<()> {
        let n = self.positions.len();
        if i >= n {
            return Err(out_of_range(i, n));
        }
        if j >= n {
            return Err(out_of_range(j, n));
        }
        if i == j {
            return Err(BfmError::Configuration(format!(
                "monomer {i} cannot bond to itself"
            )));
        }
        if self.adjacency[i].contains(&(j as u32)) {
            return Ok(()); // idempotent re-add
        }
        if self.adjacency[i].len() >= MAX_CONNECTIVITY {
            return Err(BfmError::Configuration(format!(
                "monomer {i} already has {MAX_CONNECTIVITY} neighbors"
            )));
        }
        if self.adjacency[j].len() >= MAX_CONNECTIVITY {
            return Err(BfmError::Configuration(format!(
                "monomer {j} already has {MAX_CONNECTIVITY} neighbors"
            )));
        }
        self.adjacency[i].push(j as u32);
        self.adjacency[j].push(i as u32);
        Ok(())
    }

    /// The staged position of monomer `i`, in original numbering.
    #[inline]
    #[must_use]
    pub fn position(&self, i: usize) -> [Coord; 3] {
        self.positions[i]
    }

    /// The staged attribute byte of monomer `i`.
    #[inline]
    #[must_use]
    pub fn attribute(&self, i: usize) -> u8 {
        self.attributes[i]
    }

    /// The original-order adjacency list, one entry per monomer.
    #[inline]
    #[must_use]
    pub fn adjacency(&self) -> &[Vec<u32>] {
        &self.adjacency
    }
}

fn out_of_range(i: usize, n: usize) -> BfmError {
    BfmError::Configuration(format!("monomer index {i} out of range for {n} monomers"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_bond_is_undirected_and_idempotent() {
        let mut store = MonomerStaging::new(3);
        store.add_bond(0, 1).unwrap();
        assert_eq!(store.adjacency()[0], vec![1]);
        assert_eq!(store.adjacency()[1], vec![0]);
        store.add_bond(0, 1).unwrap(); // idempotent
        assert_eq!(store.adjacency()[0].len(), 1);
    }

    #[test]
    fn add_bond_rejects_self_loop_and_overflow() {
        let mut store = MonomerStaging::new(2);
        assert!(store.add_bond(0, 0).is_err());

        let mut ring = MonomerStaging::new(9);
        for k in 0..7 {
            ring.add_bond(0, k + 1).unwrap();
        }
        assert!(ring.add_bond(0, 8).is_err());
    }

    #[test]
    fn out_of_range_index_is_configuration_error() {
        let mut store = MonomerStaging::new(2);
        assert!(matches!(
            store.set_position(5, 0, 0, 0),
            Err(BfmError::Configuration(_))
        ));
    }
}
