//! Engine-wide configuration and compile-time constants (spec §6, §9).

use serde::{Deserialize, Serialize};

use crate::error::{BfmError, Result};

/// Maximum number of bonded neighbors a single monomer may carry.
pub const MAX_CONNECTIVITY: usize = 7;

/// Alignment (in monomers) that every species' sorted region is padded up
/// to, so SIMD/warp-wide loads never span two species.
pub const ALIGNMENT: usize = 32;

/// The bond table must contain exactly this many allowed entries once
/// populated; any other count is a fatal configuration error.
pub const REQUIRED_ALLOWED_BONDS: usize = 108;

/// Lattice coordinate type.
///
/// The source parameterizes position width; this crate exposes that as a
/// compile-time choice between 16-bit and 32-bit coordinates (Design Notes
/// §9) via the `narrow-coords` feature. Algorithmic behavior is identical
/// either way.
#[cfg(feature = "narrow-coords")]
pub type Coord = i16;
#[cfg(not(feature = "narrow-coords"))]
pub type Coord = i32;

/// Per-axis periodicity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Periodicity {
    /// Periodic along x.
    pub x: bool,
    /// Periodic along y.
    pub y: bool,
    /// Periodic along z.
    pub z: bool,
}

impl Periodicity {
    /// Fully periodic in all three axes (the common case).
    pub const ALL: Periodicity = Periodicity { x: true, y: true, z: true };

    /// Returns whether the given axis (0=x, 1=y, 2=z) is periodic.
    #[inline]
    pub fn axis(&self, axis: usize) -> bool {
        match axis {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => unreachable!("axis index out of range"),
        }
    }
}

/// Box edge lengths plus the cached derived constants used by every
/// lattice-index computation (spec §3, "Box").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxGeometry {
    bx: u32,
    by: u32,
    bz: u32,
    log2_bx: u32,
    log2_bxy: u32,
}

impl BoxGeometry {
    /// Validates that `(bx, by, bz)` are all powers of two and caches the
    /// derived mask/shift constants.
    pub fn new(bx: u32, by: u32, bz: u32) -> Result<Self> {
        for (axis, edge) in [("x", bx), ("y", by), ("z", bz)] {
            if edge == 0 || !edge.is_power_of_two() {
                return Err(BfmError::Configuration(format!(
                    "box edge along {axis} must be a non-zero power of two, got {edge}"
                )));
            }
        }
        Ok(Self {
            bx,
            by,
            bz,
            log2_bx: bx.trailing_zeros(),
            log2_bxy: bx.trailing_zeros() + by.trailing_zeros(),
        })
    }

    /// Edge length along x.
    #[inline]
    pub fn bx(&self) -> u32 {
        self.bx
    }
    /// Edge length along y.
    #[inline]
    pub fn by(&self) -> u32 {
        self.by
    }
    /// Edge length along z.
    #[inline]
    pub fn bz(&self) -> u32 {
        self.bz
    }

    /// `bx - 1`, the mask used to wrap an x coordinate.
    #[inline]
    pub fn mask_x(&self) -> u32 {
        self.bx - 1
    }
    /// `by - 1`, the mask used to wrap a y coordinate.
    #[inline]
    pub fn mask_y(&self) -> u32 {
        self.by - 1
    }
    /// `bz - 1`, the mask used to wrap a z coordinate.
    #[inline]
    pub fn mask_z(&self) -> u32 {
        self.bz - 1
    }

    /// Total number of lattice cells, `bx * by * bz`.
    #[inline]
    pub fn volume(&self) -> usize {
        self.bx as usize * self.by as usize * self.bz as usize
    }

    /// Linearizes a (possibly out-of-range, possibly negative) lattice
    /// coordinate into a cell index, wrapping via bitwise AND with the
    /// cached masks.
    #[inline]
    pub fn linearize(&self, x: i64, y: i64, z: i64) -> usize {
        let xi = (x as i64 & self.mask_x() as i64) as usize;
        let yi = (y as i64 & self.mask_y() as i64) as usize;
        let zi = (z as i64 & self.mask_z() as i64) as usize;
        xi | (yi << self.log2_bx) | (zi << self.log2_bxy)
    }
}

/// Generates arbitrary, always-valid box geometries by drawing a power-of-
/// two exponent per axis rather than an arbitrary `u32` (whose odds of
/// landing on a power of two are vanishingly small), the same
/// "feature-gated `Arbitrary` that encodes the type's own validity
/// invariant" shape the teacher crate uses for its branded cell types.
#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for BoxGeometry {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        use proptest::strategy::Strategy;
        (0u32..=7, 0u32..=7, 0u32..=7)
            .prop_map(|(lx, ly, lz)| BoxGeometry::new(1 << lx, 1 << ly, 1 << lz).expect("power-of-two edges always validate"))
            .boxed()
    }
}

/// Top-level engine configuration, staged before `initialize()` and frozen
/// thereafter. Serializable so a host can persist it alongside the frames
/// written by the (out-of-scope) frame writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Box geometry, set once via `setBoxSize`.
    pub geometry: BoxGeometry,
    /// Periodicity flags, set once via `setPeriodicity`.
    pub periodicity: Periodicity,
    /// Number of monomers, set once via `setNumMonomers`.
    pub num_monomers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_geometry_rejects_non_power_of_two() {
        assert!(BoxGeometry::new(8, 8, 8).is_ok());
        assert!(BoxGeometry::new(6, 8, 8).is_err());
        assert!(BoxGeometry::new(0, 8, 8).is_err());
    }

    #[test]
    fn box_geometry_linearize_wraps_negative_coordinates() {
        let geom = BoxGeometry::new(8, 8, 8).unwrap();
        assert_eq!(geom.linearize(-1, 0, 0), geom.linearize(7, 0, 0));
        assert_eq!(geom.linearize(8, 0, 0), geom.linearize(0, 0, 0));
    }

    #[cfg(feature = "proptest")]
    mod proptest_arbitrary {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_box_geometry_is_always_valid(geom in any::<BoxGeometry>()) {
                prop_assert!(geom.bx().is_power_of_two());
                prop_assert!(geom.by().is_power_of_two());
                prop_assert!(geom.bz().is_power_of_two());
            }
        }
    }
}
