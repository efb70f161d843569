//! Sweep throughput across dense-melt-sized systems, replacing the
//! teacher's ~50 data-structure micro-benchmarks (see DESIGN.md,
//! "Final trim") with the one benchmark this engine actually needs: how
//! many Monte-Carlo steps per second the three-phase pipeline sustains as
//! monomer count grows.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use bfm_engine::bond::standard_108_bond_set;
use bfm_engine::config::Coord;
use bfm_engine::BfmEngine;

/// Stages `chains` disjoint chains of `chain_len` monomers each, laid out
/// as non-overlapping straight rows on a `box_edge`^3 periodic box (the
/// same shape as `tests/scenarios.rs::dense_melt_preserves_invariants`,
/// scaled up), and runs `initialize()`.
fn stage_melt(engine: &mut BfmEngine<'_>, box_edge: u32, chains: i32, chain_len: i32) {
    let n = (chains * chain_len) as usize;
    engine.set_box_size(box_edge, box_edge, box_edge).unwrap();
    engine.set_periodicity(true, true, true).unwrap();
    engine.set_num_monomers(n).unwrap();

    for chain in 0..chains {
        let y = 2 + 4 * chain;
        for k in 0..chain_len {
            let i = (chain * chain_len + k) as usize;
            let x = 2 + 2 * k;
            engine.set_position(i, x as Coord, y as Coord, 2).unwrap();
        }
    }
    for chain in 0..chains {
        for k in 0..chain_len - 1 {
            let i = (chain * chain_len + k) as usize;
            engine.add_bond(i, i + 1).unwrap();
        }
    }
    for (dx, dy, dz) in standard_108_bond_set() {
        engine.set_allowed_bond(dx, dy, dz, true).unwrap();
    }
    engine.initialize(42).unwrap();
}

fn bench_sweep_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_throughput");

    // (box_edge, chains, chain_len), each comfortably clear of the box
    // edge so the straight-row initial layout never wraps into itself --
    // monomer counts 96, 384, 1536.
    let configs: [(u32, i32, i32); 3] = [(32, 8, 12), (64, 16, 24), (128, 32, 48)];

    for &(box_edge, chains, chain_len) in &configs {
        let n = chains * chain_len;
        group.bench_function(format!("n={n}_box={box_edge}"), |b| {
            b.iter_batched(
                || (box_edge, chains, chain_len),
                |(box_edge, chains, chain_len)| {
                    BfmEngine::with_session(|engine| {
                        stage_melt(engine, box_edge, chains, chain_len);
                        black_box(engine.run_sweeps(black_box(10)).unwrap());
                    });
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sweep_throughput);
criterion_main!(benches);
