//! Shared graph generators for integration tests

#![allow(dead_code)]

use fireline::GraphStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `width` x `height` grid of two-way roads with random weights
pub fn grid(width: usize, height: usize, seed: u64) -> GraphStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = GraphStore::new();
    let id = |x: usize, y: usize| format!("{}_{}", x, y);

    for y in 0..height {
        for x in 0..width {
            graph
                .add_node(&id(x, y), 20.88 + y as f64 * 1e-3, -156.68 + x as f64 * 1e-3, "")
                .unwrap();
        }
    }
    for y in 0..height {
        for x in 0..width {
            if x + 1 < width {
                let w = rng.random_range(1..=10) as f64;
                graph.add_road(&id(x, y), &id(x + 1, y), w).unwrap();
            }
            if y + 1 < height {
                let w = rng.random_range(1..=10) as f64;
                graph.add_road(&id(x, y), &id(x, y + 1), w).unwrap();
            }
        }
    }
    graph
}

/// Sparse random directed graph; parallel edges are skipped
pub fn random_graph(nodes: usize, edges: usize, seed: u64) -> GraphStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = GraphStore::new();
    for i in 0..nodes {
        graph.add_node(&format!("n{}", i), 0.0, 0.0, "").unwrap();
    }
    let mut added = 0;
    while added < edges {
        let a = rng.random_range(0..nodes);
        let b = rng.random_range(0..nodes);
        if a == b {
            continue;
        }
        let w = rng.random_range(1..=100) as f64;
        if graph.add_edge(&format!("n{}", a), &format!("n{}", b), w).is_ok() {
            added += 1;
        }
    }
    graph
}
