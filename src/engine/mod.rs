//! `BfmEngine`: the embeddable lifecycle API (spec §6) wrapping the three
//! lower-level collaborators (colorer, layout planner, move engine).
//!
//! The session is branded with a [`GhostToken`]: every array the engine
//! owns during `Ready` is tied to the same `'brand`, the same way the
//! teacher toolkit brands its cells to one token scope. Use
//! [`BfmEngine::with_session`] to mint a session and drive it; the brand
//! statically prevents passing state from two different sessions into the
//! same call.

mod phases;

use std::sync::atomic::Ordering;

use crate::bond::BondTable;
use crate::color::{color_graph, Coloring};
use crate::concurrency::atomic::GhostAtomicU64;
use crate::concurrency::CachePadded;
use crate::config::{BoxGeometry, Coord, EngineConfig, Periodicity};
use crate::error::{BfmError, Result};
use crate::lattice::Lattice;
use crate::layout::SortedMonomers;
use crate::logging::{log_debug, log_error, log_info, log_warn};
use crate::monomer::MonomerStaging;
use crate::rng::SeedStream;
use crate::token::GhostToken;
use crate::verifier::{self, VerificationReport};

pub use phases::SubstepStats;

/// Aggregate counters for one [`BfmEngine::run_sweeps`] (or
/// [`BfmEngine::run_sweeps_with_seeds`]) call: the sum of every substep's
/// [`SubstepStats`] run during that call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// Number of substeps run.
    pub substeps: usize,
    /// Monomers accepted by phase A, summed over every substep.
    pub proposed: u64,
    /// Monomers accepted by phase B, summed over every substep.
    pub committed: u64,
}

/// Staged configuration and bond table, held before `initialize()`.
#[derive(Debug, Default)]
struct Staging {
    geometry: Option<BoxGeometry>,
    periodicity: Option<Periodicity>,
    monomers: Option<MonomerStaging>,
    bonds: BondTable,
    uniform_coloring: bool,
}

/// Everything the move engine needs once `initialize()` has run.
struct Ready<'brand> {
    config: EngineConfig,
    bonds: BondTable,
    lattice: Lattice<'brand>,
    coloring: Coloring,
    monomers: SortedMonomers<'brand>,
    seeds: SeedStream,
    total_accepted: CachePadded<GhostAtomicU64<'brand>>,
}

enum EngineState<'brand> {
    Staging(Staging),
    Ready(Box<Ready<'brand>>),
}

/// The parallel bond-fluctuation-model engine.
///
/// Lives entirely within one [`GhostToken`] session. Staging calls
/// (`set_box_size`, `set_periodicity`, `set_num_monomers`, `set_position`,
/// `set_attribute`, `add_bond`, `set_allowed_bond`, `set_uniform_coloring`)
/// are valid only before [`BfmEngine::initialize`]; `run_sweeps`,
/// `get_position`, `verify`, and the introspection getters are valid only
/// after.
pub struct BfmEngine<'brand> {
    _token: GhostToken<'brand>,
    state: EngineState<'brand>,
}

impl<'brand> BfmEngine<'brand> {
    fn new(token: GhostToken<'brand>) -> Self {
        Self {
            _token: token,
            state: EngineState::Staging(Staging::default()),
        }
    }

    /// Mints a fresh session and runs `f` against it.
    ///
    /// Every array the engine allocates during this call is branded to a
    /// `'brand` unique to this call; it cannot be confused with state from
    /// another `with_session` call even if the two run concurrently on
    /// different threads.
    pub fn with_session<F, R>(f: F) -> R
    where
        F: for<'session> FnOnce(&mut BfmEngine<'session>) -> R,
    {
        GhostToken::new(|token| {
            let mut engine = BfmEngine::new(token);
            f(&mut engine)
        })
    }

    fn staging_mut(&mut self) -> Result<&mut Staging> {
        match &mut self.state {
            EngineState::Staging(staging) => Ok(staging),
            EngineState::Ready(_) => Err(BfmError::StateOrder(
                "staging call is not valid after initialize() (call cleanup() first)".into(),
            )),
        }
    }

    fn ready(&self) -> Result<&Ready<'brand>> {
        match &self.state {
            EngineState::Ready(ready) => Ok(ready),
            EngineState::Staging(_) => Err(BfmError::StateOrder(
                "this call requires initialize() to have run".into(),
            )),
        }
    }

    fn ready_mut(&mut self) -> Result<&mut Ready<'brand>> {
        match &mut self.state {
            EngineState::Ready(ready) => Ok(ready),
            EngineState::Staging(_) => Err(BfmError::StateOrder(
                "this call requires initialize() to have run".into(),
            )),
        }
    }

    /// Stages the box geometry. Requires non-zero power-of-two edges.
    pub fn set_box_size(&mut self, bx: u32, by: u32, bz: u32) -> Result<()> {
        let geometry = BoxGeometry::new(bx, by, bz)?;
        self.staging_mut()?.geometry = Some(geometry);
        Ok(())
    }

    /// Stages per-axis periodicity.
    pub fn set_periodicity(&mut self, px: bool, py: bool, pz: bool) -> Result<()> {
        self.staging_mut()?.periodicity = Some(Periodicity { x: px, y: py, z: pz });
        Ok(())
    }

    /// Stages the monomer count, allocating (or re-allocating, overwriting
    /// any previously staged positions/attributes/bonds) zeroed storage for
    /// `n` monomers.
    pub fn set_num_monomers(&mut self, n: usize) -> Result<()> {
        self.staging_mut()?.monomers = Some(MonomerStaging::new(n));
        Ok(())
    }

    /// Stages the position of monomer `i`. Requires `set_num_monomers` to
    /// have run first.
    pub fn set_position(&mut self, i: usize, x: Coord, y: Coord, z: Coord) -> Result<()> {
        self.staged_monomers_mut()?.set_position(i, x, y, z)
    }

    /// Stages the attribute byte of monomer `i`. Requires `set_num_monomers`
    /// to have run first.
    pub fn set_attribute(&mut self, i: usize, attribute: u8) -> Result<()> {
        self.staged_monomers_mut()?.set_attribute(i, attribute)
    }

    /// Stages an undirected bond between monomers `i` and `j`. Requires
    /// `set_num_monomers` to have run first.
    pub fn add_bond(&mut self, i: usize, j: usize) -> Result<()> {
        self.staged_monomers_mut()?.add_bond(i, j)
    }

    fn staged_monomers_mut(&mut self) -> Result<&mut MonomerStaging> {
        self.staging_mut()?
            .monomers
            .as_mut()
            .ok_or_else(|| BfmError::Configuration("set_num_monomers must be called first".into()))
    }

    /// Stages one entry of the 512-vector allowed-bond table.
    pub fn set_allowed_bond(&mut self, dx: i32, dy: i32, dz: i32, allowed: bool) -> Result<()> {
        self.staging_mut()?.bonds.set_allowed(dx, dy, dz, allowed)
    }

    /// Selects whether `initialize()`'s coloring pass rebalances species
    /// populations to within `ceil(N/C)` of each other (spec §4.1,
    /// "uniform" mode).
    pub fn set_uniform_coloring(&mut self, uniform: bool) -> Result<()> {
        self.staging_mut()?.uniform_coloring = uniform;
        Ok(())
    }

    /// Freezes configuration, runs the colorer and layout planner, primes
    /// the lattice from staged positions, and seeds the substep stream.
    ///
    /// On failure, staged configuration is left untouched so the caller can
    /// fix the problem and retry (spec §7, "Configuration" propagation
    /// policy).
    pub fn initialize(&mut self, seed: u64) -> Result<()> {
        if matches!(self.state, EngineState::Ready(_)) {
            return Err(BfmError::StateOrder(
                "initialize() called twice without cleanup()".into(),
            ));
        }
        let staging = match &self.state {
            EngineState::Staging(staging) => staging,
            EngineState::Ready(_) => unreachable!("checked above"),
        };

        let geometry = staging
            .geometry
            .ok_or_else(|| BfmError::Configuration("set_box_size must be called before initialize()".into()))?;
        let periodicity = staging
            .periodicity
            .ok_or_else(|| BfmError::Configuration("set_periodicity must be called before initialize()".into()))?;
        let monomer_staging = staging
            .monomers
            .as_ref()
            .ok_or_else(|| BfmError::Configuration("set_num_monomers must be called before initialize()".into()))?;

        let mut bonds = staging.bonds.clone();
        bonds.finalize()?;

        let coloring = color_graph(monomer_staging.adjacency(), staging.uniform_coloring)?;
        let monomers = SortedMonomers::build(monomer_staging, &coloring);

        let lattice = Lattice::new(geometry);
        let corners = monomers.iter_real().map(|(_, idx)| {
            let (x, y, z) = monomers.position(idx);
            (x as i64, y as i64, z as i64)
        });
        lattice.prime(corners);

        let config = EngineConfig {
            geometry,
            periodicity,
            num_monomers: monomer_staging.len(),
        };

        log_info!(
            bx = config.geometry.bx(),
            by = config.geometry.by(),
            bz = config.geometry.bz(),
            monomers = config.num_monomers,
            species = coloring.species_count(),
            padded = monomers.total_padded(),
            "bfm engine initialized"
        );

        self.state = EngineState::Ready(Box::new(Ready {
            config,
            bonds,
            lattice,
            coloring,
            monomers,
            seeds: SeedStream::new(seed),
            total_accepted: CachePadded::new(GhostAtomicU64::new(0)),
        }));
        Ok(())
    }

    /// Runs `n_steps` Monte-Carlo steps (`species_count` substeps each,
    /// spec §4.5), drawing each substep's species and seed from the
    /// engine's own [`SeedStream`].
    pub fn run_sweeps(&mut self, n_steps: usize) -> Result<SweepStats> {
        let ready = self.ready_mut()?;
        let species_count = ready.coloring.species_count();
        let mut stats = SweepStats::default();

        for _ in 0..n_steps {
            for _ in 0..species_count {
                let species = ready.seeds.next_species(species_count);
                let sigma = ready.seeds.next_sigma();
                accumulate(&mut stats, run_one_substep(ready, species, sigma)?);
            }
        }
        Ok(stats)
    }

    /// Lower-level sweep hook: runs one substep per `(species, sigma)` pair
    /// in `plan`, in order, bypassing the engine's own [`SeedStream`].
    ///
    /// Lets a host drive the engine with its own seed source while keeping
    /// spec §8 scenario 6's reproducibility guarantee (identical `plan` ⇒
    /// identical resulting positions).
    pub fn run_sweeps_with_seeds(&mut self, plan: &[(usize, u32)]) -> Result<SweepStats> {
        let ready = self.ready_mut()?;
        let species_count = ready.coloring.species_count();
        let mut stats = SweepStats::default();

        for &(species, sigma) in plan {
            if species >= species_count {
                return Err(BfmError::Configuration(format!(
                    "species {species} out of range for {species_count} species"
                )));
            }
            accumulate(&mut stats, run_one_substep(ready, species, sigma)?);
        }
        Ok(stats)
    }

    /// Returns the committed position of monomer `i`, in the caller's
    /// original numbering.
    pub fn get_position(&self, i: usize) -> Result<(Coord, Coord, Coord)> {
        let ready = self.ready()?;
        if i >= ready.config.num_monomers {
            return Err(BfmError::Configuration(format!(
                "monomer index {i} out of range for {} monomers",
                ready.config.num_monomers
            )));
        }
        let sorted = ready.monomers.to_new(i);
        Ok(ready.monomers.position(sorted))
    }

    /// Returns the attribute byte staged for monomer `i` via
    /// [`crate::monomer::MonomerStaging::set_attribute`], in the caller's
    /// original numbering.
    pub fn get_attribute(&self, i: usize) -> Result<u8> {
        let ready = self.ready()?;
        if i >= ready.config.num_monomers {
            return Err(BfmError::Configuration(format!(
                "monomer index {i} out of range for {} monomers",
                ready.config.num_monomers
            )));
        }
        let sorted = ready.monomers.to_new(i);
        Ok(ready.monomers.attribute(sorted))
    }

    /// Runs the optional verifier pass (spec §4.7) over the current state.
    pub fn verify(&self) -> Result<VerificationReport> {
        let ready = self.ready()?;
        let report = verifier::verify(&ready.monomers, &ready.lattice, &ready.bonds);
        if !report.passed() {
            log_warn!(
                bonds_ok = report.bonds_ok,
                occupancy_ok = report.occupancy_ok,
                scratch_zero = report.scratch_zero,
                "verifier found an invariant violation"
            );
        }
        Ok(report)
    }

    /// Runs the verifier and turns a failing report into a fatal
    /// [`BfmError::Invariant`] (spec §7, "Invariant-violation... indicates an
    /// implementation bug; fatal to the run"), rather than leaving the
    /// caller to interpret a [`VerificationReport`] itself. Use
    /// [`BfmEngine::verify`] directly when a non-fatal report is preferred,
    /// e.g. to log and continue.
    pub fn verify_strict(&self) -> Result<()> {
        let report = self.verify()?;
        if report.passed() {
            return Ok(());
        }
        let (index, detail) = if let Some(failure) = &report.first_bond_failure {
            (
                failure.i,
                format!(
                    "{} (bond {}-{}, delta {:?})",
                    failure.reason, failure.i, failure.j, failure.delta
                ),
            )
        } else if !report.occupancy_ok {
            (
                0,
                format!(
                    "excluded-volume violation: {} distinct occupied cells, expected {}",
                    report.occupied_cells, report.expected_cells
                ),
            )
        } else {
            (0, "scratch lattice is not all-zero".to_string())
        };
        log_error!(index, detail = %detail, "fatal invariant violation");
        Err(BfmError::Invariant { index, detail })
    }

    /// Releases the current session's state and returns the engine to its
    /// pre-configured (`Staging`) state. Valid in either state; repeated
    /// calls are harmless.
    pub fn cleanup(&mut self) {
        log_info!("bfm engine cleanup");
        self.state = EngineState::Staging(Staging::default());
    }

    /// The staged or frozen box geometry, if set.
    #[must_use]
    pub fn box_size(&self) -> Option<(u32, u32, u32)> {
        match &self.state {
            EngineState::Ready(ready) => Some((ready.config.geometry.bx(), ready.config.geometry.by(), ready.config.geometry.bz())),
            EngineState::Staging(staging) => staging.geometry.map(|g| (g.bx(), g.by(), g.bz())),
        }
    }

    /// The staged or frozen periodicity flags, if set.
    #[must_use]
    pub fn periodicity(&self) -> Option<Periodicity> {
        match &self.state {
            EngineState::Ready(ready) => Some(ready.config.periodicity),
            EngineState::Staging(staging) => staging.periodicity,
        }
    }

    /// Number of species (colors), available only after `initialize()`.
    #[must_use]
    pub fn species_count(&self) -> Option<usize> {
        match &self.state {
            EngineState::Ready(ready) => Some(ready.coloring.species_count()),
            EngineState::Staging(_) => None,
        }
    }

    /// Number of staged or frozen monomers, if known.
    #[must_use]
    pub fn monomer_count(&self) -> Option<usize> {
        match &self.state {
            EngineState::Ready(ready) => Some(ready.config.num_monomers),
            EngineState::Staging(staging) => staging.monomers.as_ref().map(MonomerStaging::len),
        }
    }

    /// Cumulative accepted-move count since `initialize()`, available only
    /// after `initialize()`.
    #[must_use]
    pub fn total_accepted(&self) -> Option<u64> {
        match &self.state {
            EngineState::Ready(ready) => Some(ready.total_accepted.load(Ordering::Relaxed)),
            EngineState::Staging(_) => None,
        }
    }

    /// The frozen engine configuration, available only after
    /// `initialize()`.
    #[must_use]
    pub fn config(&self) -> Option<&EngineConfig> {
        match &self.state {
            EngineState::Ready(ready) => Some(&ready.config),
            EngineState::Staging(_) => None,
        }
    }
}

fn run_one_substep<'brand>(ready: &mut Ready<'brand>, species: usize, sigma: u32) -> Result<SubstepStats> {
    let substep = phases::run_substep(
        &mut ready.monomers,
        &ready.lattice,
        &ready.bonds,
        &ready.config.geometry,
        ready.config.periodicity,
        species,
        sigma,
        &ready.total_accepted,
    );
    log_debug!(
        species,
        proposed = substep.proposed,
        committed = substep.committed,
        "substep"
    );
    Ok(substep)
}

fn accumulate(stats: &mut SweepStats, substep: SubstepStats) {
    stats.substeps += 1;
    stats.proposed += substep.proposed as u64;
    stats.committed += substep.committed as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_bonds(engine: &mut BfmEngine<'_>) {
        for (dx, dy, dz) in crate::bond::standard_108_bond_set() {
            engine.set_allowed_bond(dx, dy, dz, true).unwrap();
        }
    }

    #[test]
    fn isolated_dimer_stays_bonded_after_many_sweeps() {
        // spec §8 scenario 1.
        BfmEngine::with_session(|engine| {
            engine.set_box_size(8, 8, 8).unwrap();
            engine.set_periodicity(true, true, true).unwrap();
            engine.set_num_monomers(2).unwrap();
            engine.set_position(0, 2, 2, 2).unwrap();
            engine.set_position(1, 4, 2, 2).unwrap();
            engine.add_bond(0, 1).unwrap();
            standard_bonds(engine);
            engine.initialize(1).unwrap();

            engine.run_sweeps(1000).unwrap();

            let (x0, y0, z0) = engine.get_position(0).unwrap();
            let (x1, y1, z1) = engine.get_position(1).unwrap();
            let dx = (x1 - x0) as i32;
            let dy = (y1 - y0) as i32;
            let dz = (z1 - z0) as i32;
            let len_sq = dx * dx + dy * dy + dz * dz;
            assert!((4..=10).contains(&len_sq), "bond length^2 out of range: {len_sq}");

            let report = engine.verify().unwrap();
            assert!(report.passed(), "{report:?}");
        });
    }

    #[test]
    fn zero_sweeps_is_a_no_op() {
        BfmEngine::with_session(|engine| {
            engine.set_box_size(8, 8, 8).unwrap();
            engine.set_periodicity(true, true, true).unwrap();
            engine.set_num_monomers(1).unwrap();
            engine.set_position(0, 1, 1, 1).unwrap();
            standard_bonds(engine);
            engine.initialize(7).unwrap();

            let before = engine.get_position(0).unwrap();
            engine.run_sweeps(0).unwrap();
            let after = engine.get_position(0).unwrap();
            assert_eq!(before, after);
            assert_eq!(engine.total_accepted(), Some(0));
        });
    }

    #[test]
    fn staging_after_initialize_is_rejected() {
        BfmEngine::with_session(|engine| {
            engine.set_box_size(8, 8, 8).unwrap();
            engine.set_periodicity(true, true, true).unwrap();
            engine.set_num_monomers(1).unwrap();
            engine.set_position(0, 1, 1, 1).unwrap();
            standard_bonds(engine);
            engine.initialize(1).unwrap();

            assert!(matches!(engine.set_num_monomers(2), Err(BfmError::StateOrder(_))));
            assert!(matches!(engine.initialize(2), Err(BfmError::StateOrder(_))));
        });
    }

    #[test]
    fn sweeps_before_initialize_is_rejected() {
        BfmEngine::with_session(|engine| {
            assert!(matches!(engine.run_sweeps(1), Err(BfmError::StateOrder(_))));
            assert!(matches!(engine.get_position(0), Err(BfmError::StateOrder(_))));
        });
    }

    #[test]
    fn cleanup_allows_reinitializing() {
        BfmEngine::with_session(|engine| {
            engine.set_box_size(8, 8, 8).unwrap();
            engine.set_periodicity(true, true, true).unwrap();
            engine.set_num_monomers(1).unwrap();
            engine.set_position(0, 1, 1, 1).unwrap();
            standard_bonds(engine);
            engine.initialize(1).unwrap();
            engine.cleanup();

            engine.set_box_size(8, 8, 8).unwrap();
            engine.set_periodicity(true, true, true).unwrap();
            engine.set_num_monomers(1).unwrap();
            engine.set_position(0, 1, 1, 1).unwrap();
            standard_bonds(engine);
            engine.initialize(1).unwrap();
            assert!(engine.species_count().is_some());
        });
    }

    #[test]
    fn verify_strict_turns_a_forbidden_bond_into_an_invariant_error() {
        BfmEngine::with_session(|engine| {
            engine.set_box_size(8, 8, 8).unwrap();
            engine.set_periodicity(true, true, true).unwrap();
            engine.set_num_monomers(2).unwrap();
            engine.set_position(0, 2, 2, 2).unwrap();
            engine.set_position(1, 3, 2, 2).unwrap(); // delta (1,0,0): not in the standard set
            engine.add_bond(0, 1).unwrap();
            standard_bonds(engine);
            engine.initialize(1).unwrap();

            assert!(!engine.verify().unwrap().bonds_ok);
            match engine.verify_strict() {
                Err(BfmError::Invariant { index, .. }) => assert_eq!(index, 0),
                other => panic!("expected Invariant error, got {other:?}"),
            }
        });
    }

    #[test]
    fn reproducible_given_identical_seed_stream() {
        // spec §8 scenario 6.
        fn run_once() -> Vec<(Coord, Coord, Coord)> {
            BfmEngine::with_session(|engine| {
                engine.set_box_size(16, 16, 16).unwrap();
                engine.set_periodicity(true, true, true).unwrap();
                engine.set_num_monomers(4).unwrap();
                for i in 0..4 {
                    engine.set_position(i, (2 * i) as Coord, 2, 2).unwrap();
                }
                for i in 0..3 {
                    engine.add_bond(i, i + 1).unwrap();
                }
                standard_bonds(engine);
                engine.initialize(42).unwrap();
                engine.run_sweeps(50).unwrap();
                (0..4).map(|i| engine.get_position(i).unwrap()).collect()
            })
        }

        assert_eq!(run_once(), run_once());
    }
}
