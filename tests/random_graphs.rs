//! CH vs Dijkstra and repair vs rebuild on random networks under random closures

mod common;

use fireline::ch::ChQuery;
use fireline::dijkstra::shortest_path;
use fireline::validate::{all_pairs, random_pairs, validate_against_rebuild, validate_engines};
use fireline::{Router, RouterConfig, UpdateOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn repair_friendly() -> RouterConfig {
    // Let every repair run to completion
    RouterConfig {
        rebuild_threshold: 1.0,
        ..RouterConfig::default()
    }
}

#[test]
fn test_engines_agree_on_random_graphs() {
    for seed in 0..5 {
        let graph = common::random_graph(60, 180, seed);
        let router = Router::new(graph, RouterConfig::default()).unwrap();
        let pairs = all_pairs(&router.snapshot_graph());
        let report = validate_engines(&router, &pairs);
        assert!(report.is_ok(), "seed {}: {:?}", seed, report.mismatches);
        router.with_state(|s| s.hierarchy.check(&s.graph)).unwrap();
    }
}

#[test]
fn test_repairs_match_dijkstra_and_rebuild() {
    let graph = common::random_graph(50, 150, 11);
    let router = Router::new(graph, repair_friendly()).unwrap();
    let edges = router.edge_pairs(false);
    let pairs = random_pairs(&router.snapshot_graph(), 300, 5);
    let mut rng = StdRng::seed_from_u64(99);
    let mut repaired = 0;

    for step in 0..40 {
        let (from, to) = &edges[rng.random_range(0..edges.len())];
        let close = rng.random_bool(0.7);
        let outcome = router.set_closed(from, to, close).unwrap();
        if matches!(outcome, UpdateOutcome::Repaired { .. }) {
            repaired += 1;
        }

        router
            .with_state(|s| s.hierarchy.check(&s.graph))
            .unwrap_or_else(|e| panic!("step {}: {}", step, e));
        let report = validate_engines(&router, &pairs);
        assert!(report.is_ok(), "step {}: {:?}", step, report.mismatches);
    }

    assert!(repaired > 0);
    let report = validate_against_rebuild(&router);
    assert!(report.is_ok(), "{:?}", report.mismatches);
}

#[test]
fn test_repair_on_grid_with_many_closures() {
    let router = Router::new(common::grid(8, 8, 3), repair_friendly()).unwrap();
    let edges = router.edge_pairs(false);
    let mut rng = StdRng::seed_from_u64(7);

    // Close a fifth of the roads, then reopen them in a different order
    let mut closed: Vec<(String, String)> = Vec::new();
    for _ in 0..edges.len() / 5 {
        let (from, to) = edges[rng.random_range(0..edges.len())].clone();
        router.set_closed(&from, &to, true).unwrap();
        closed.push((from, to));
    }
    let pairs = all_pairs(&router.snapshot_graph());
    assert!(validate_engines(&router, &pairs).is_ok());
    assert!(validate_against_rebuild(&router).is_ok());

    closed.reverse();
    for (from, to) in &closed {
        router.set_closed(from, to, false).unwrap();
    }
    assert_eq!(router.stats().closed_edges, 0);
    assert!(validate_engines(&router, &pairs).is_ok());
    router.with_state(|s| s.hierarchy.check(&s.graph)).unwrap();
}

#[test]
fn test_every_shortcut_unpacks_to_its_weight() {
    let graph = common::random_graph(80, 260, 21);
    let router = Router::new(graph, RouterConfig::default()).unwrap();
    router.with_state(|s| {
        let mut edges = Vec::new();
        for id in s.hierarchy.shortcuts() {
            edges.clear();
            fireline::ch::unpack::unpack_arc(&s.hierarchy, id, &mut edges);
            let sum: f64 = edges.iter().map(|&e| s.graph.edge(e).weight).sum();
            let weight = s.hierarchy.arc(id).weight;
            assert!((sum - weight).abs() <= 1e-9 * weight.max(1.0));
        }
    });
}

/// The forward half never leaves the ball Dijkstra settles before reaching the target
fn assert_forward_inside_ball(router: &Router) {
    router.with_state(|s| {
        for (from, to) in all_pairs(&s.graph) {
            let (ch, space) = ChQuery::new(&s.hierarchy, &s.graph).run_counted(from, to);
            let dj = shortest_path(&s.graph, from, to);
            assert!(fireline::route::costs_agree(ch.cost, dj.cost));
            if dj.found() {
                assert!(
                    space.forward < dj.nodes_explored,
                    "{} -> {}: forward {} vs dijkstra {}",
                    from,
                    to,
                    space.forward,
                    dj.nodes_explored
                );
            } else {
                assert!(space.forward <= dj.nodes_explored);
            }
        }
    });
}

#[test]
fn test_forward_search_space_bounded_by_dijkstra() {
    let router = Router::new(common::random_graph(60, 180, 4), repair_friendly()).unwrap();
    assert_forward_inside_ball(&router);

    let grid = Router::new(common::grid(8, 8, 9), repair_friendly()).unwrap();
    assert_forward_inside_ball(&grid);

    // Still holds on a repaired hierarchy
    let edges = grid.edge_pairs(false);
    let mut rng = StdRng::seed_from_u64(12);
    for _ in 0..15 {
        let (from, to) = &edges[rng.random_range(0..edges.len())];
        grid.set_closed(from, to, true).unwrap();
    }
    assert_forward_inside_ball(&grid);
}
