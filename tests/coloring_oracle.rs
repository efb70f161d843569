//! Independent oracle for the coloring invariant (spec.md §4.1, §8
//! "Coloring"), per SPEC_FULL.md §A.4: build the bond graph a second time
//! in `petgraph`, walk its own edge list, and assert no edge connects two
//! same-colored vertices -- without calling back into `bfm_engine::color`'s
//! own adjacency-walking code.

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;

use bfm_engine::color::color_graph;

/// Builds both the engine's own CSR-like adjacency (`Vec<Vec<u32>>`) and an
/// equivalent `petgraph::UnGraph`, so the same edge set feeds both the
/// colorer under test and the independent oracle.
fn build_path_with_branches(n: usize, extra_edges: &[(usize, usize)]) -> (Vec<Vec<u32>>, UnGraph<(), ()>) {
    let mut adjacency = vec![Vec::new(); n];
    let mut graph = UnGraph::<(), ()>::with_capacity(n, n + extra_edges.len());
    let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();

    let mut add_edge = |i: usize, j: usize, adjacency: &mut Vec<Vec<u32>>, graph: &mut UnGraph<(), ()>| {
        adjacency[i].push(j as u32);
        adjacency[j].push(i as u32);
        graph.add_edge(nodes[i], nodes[j], ());
    };

    for i in 0..n.saturating_sub(1) {
        add_edge(i, i + 1, &mut adjacency, &mut graph);
    }
    for &(i, j) in extra_edges {
        add_edge(i, j, &mut adjacency, &mut graph);
    }

    (adjacency, graph)
}

fn assert_no_bichromatic_violation(graph: &UnGraph<(), ()>, colors: &[u32]) {
    for edge in graph.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        assert_ne!(
            colors[a], colors[b],
            "petgraph oracle found a bond between same-colored vertices {a} and {b}"
        );
    }
}

#[test]
fn plain_path_is_properly_colored() {
    let (adjacency, graph) = build_path_with_branches(50, &[]);
    let coloring = color_graph(&adjacency, false).unwrap();
    assert_no_bichromatic_violation(&graph, coloring.colors());
}

#[test]
fn path_with_cross_links_is_properly_colored() {
    // A 40-vertex path plus a handful of chords, giving the greedy colorer
    // some vertices with 3+ neighbors to contend with -- still well under
    // MAX_CONNECTIVITY.
    let extra_edges = [(0, 10), (5, 25), (12, 30), (3, 39), (20, 38)];
    let (adjacency, graph) = build_path_with_branches(40, &extra_edges);
    let coloring = color_graph(&adjacency, false).unwrap();
    assert_no_bichromatic_violation(&graph, coloring.colors());
}

#[test]
fn uniform_balancing_preserves_proper_coloring() {
    let extra_edges = [(0, 10), (5, 25), (12, 30)];
    let (adjacency, graph) = build_path_with_branches(64, &extra_edges);
    let coloring = color_graph(&adjacency, true).unwrap();
    assert_no_bichromatic_violation(&graph, coloring.colors());

    // Balancing should not blow up the species count far past what the
    // unbalanced pass produced.
    let unbalanced = color_graph(&adjacency, false).unwrap();
    assert!(coloring.species_count() <= unbalanced.species_count() + 1);
}

#[test]
fn dense_melt_shaped_graph_is_properly_colored() {
    // 16 disjoint chains of 16 monomers each, the shape used by the
    // dense-melt scenario in tests/scenarios.rs.
    let chains = 16;
    let chain_len = 16;
    let n = chains * chain_len;
    let mut adjacency = vec![Vec::new(); n];
    let mut graph = UnGraph::<(), ()>::with_capacity(n, n);
    let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();

    for c in 0..chains {
        for k in 0..chain_len - 1 {
            let i = c * chain_len + k;
            let j = i + 1;
            adjacency[i].push(j as u32);
            adjacency[j].push(i as u32);
            graph.add_edge(nodes[i], nodes[j], ());
        }
    }

    let coloring = color_graph(&adjacency, true).unwrap();
    assert_no_bichromatic_violation(&graph, coloring.colors());
}
