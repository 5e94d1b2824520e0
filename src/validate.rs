//! Correctness validation (parallel)
//!
//! Compares the CH engine against an exact baseline on node pairs: either the
//! Dijkstra engine on the live graph, or a hierarchy freshly built from the
//! live graph (to check that incremental repair matches a full rebuild).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::ch::{self, ChQuery};
use crate::graph::{GraphStore, NodeIdx};
use crate::route::{costs_agree, Engine, RouteResult};
use crate::router::Router;

/// Single disagreement
#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub from: String,
    pub to: String,
    pub baseline_cost: f64,
    pub ch_cost: f64,
}

/// Validation result
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub total: usize,
    pub agreed: usize,
    pub unreachable_both: usize,
    /// CH paths that used a closed edge
    pub invalid_paths: usize,
    /// Pairs where CH settled no more nodes than the baseline
    pub ch_explored_no_more: usize,
    pub mismatches: Vec<Mismatch>,
    pub elapsed_ms: u64,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty() && self.invalid_paths == 0
    }
}

/// Every ordered pair of distinct nodes
pub fn all_pairs(graph: &GraphStore) -> Vec<(NodeIdx, NodeIdx)> {
    let n = graph.node_count() as NodeIdx;
    (0..n)
        .flat_map(|s| (0..n).filter(move |&t| t != s).map(move |t| (s, t)))
        .collect()
}

/// `count` random pairs drawn with a seeded RNG
pub fn random_pairs(graph: &GraphStore, count: usize, seed: u64) -> Vec<(NodeIdx, NodeIdx)> {
    let n = graph.node_count() as NodeIdx;
    if n == 0 {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (rng.random_range(0..n), rng.random_range(0..n)))
        .collect()
}

fn tally(
    graph: &GraphStore,
    pairs: &[(NodeIdx, NodeIdx)],
    results: Vec<(RouteResult, RouteResult)>,
    started: Instant,
) -> ValidationReport {
    let mut report = ValidationReport {
        total: pairs.len(),
        ..Default::default()
    };
    for (&(s, t), (baseline, ch)) in pairs.iter().zip(results) {
        if !ch.valid {
            report.invalid_paths += 1;
        }
        if ch.nodes_explored <= baseline.nodes_explored {
            report.ch_explored_no_more += 1;
        }
        if costs_agree(baseline.cost, ch.cost) {
            report.agreed += 1;
            if !baseline.found() {
                report.unreachable_both += 1;
            }
        } else {
            report.mismatches.push(Mismatch {
                from: graph.node(s).id.clone(),
                to: graph.node(t).id.clone(),
                baseline_cost: baseline.cost,
                ch_cost: ch.cost,
            });
        }
    }
    report.elapsed_ms = started.elapsed().as_millis() as u64;
    report
}

/// Dijkstra vs CH on the live graph
pub fn validate_engines(router: &Router, pairs: &[(NodeIdx, NodeIdx)]) -> ValidationReport {
    let started = Instant::now();
    let report = router.with_state(|state| {
        let results: Vec<_> = pairs
            .par_iter()
            .map(|&(s, t)| {
                (
                    state.query(Engine::Dijkstra, s, t),
                    state.query(Engine::Ch, s, t),
                )
            })
            .collect();
        tally(&state.graph, pairs, results, started)
    });
    info!(
        total = report.total,
        agreed = report.agreed,
        mismatches = report.mismatches.len(),
        ms = report.elapsed_ms,
        "engine validation done"
    );
    report
}

/// Repaired hierarchy vs a hierarchy rebuilt from scratch, over all pairs
pub fn validate_against_rebuild(router: &Router) -> ValidationReport {
    let started = Instant::now();
    let report = router.with_state(|state| {
        let fresh = ch::build(&state.graph, router.config());
        let pairs = all_pairs(&state.graph);
        let results: Vec<_> = pairs
            .par_iter()
            .map(|&(s, t)| {
                (
                    ChQuery::new(&fresh, &state.graph).run(s, t),
                    state.query(Engine::Ch, s, t),
                )
            })
            .collect();
        tally(&state.graph, &pairs, results, started)
    });
    info!(
        total = report.total,
        agreed = report.agreed,
        mismatches = report.mismatches.len(),
        ms = report.elapsed_ms,
        "rebuild validation done"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::graph::demo::lahaina;

    #[test]
    fn test_all_pairs_excludes_self() {
        let graph = lahaina();
        let pairs = all_pairs(&graph);
        assert_eq!(pairs.len(), 90);
        assert!(pairs.iter().all(|(s, t)| s != t));
    }

    #[test]
    fn test_random_pairs_are_reproducible() {
        let graph = lahaina();
        assert_eq!(random_pairs(&graph, 20, 3), random_pairs(&graph, 20, 3));
        assert!(random_pairs(&GraphStore::new(), 5, 1).is_empty());
    }

    #[test]
    fn test_demo_validates() {
        let router = Router::new(lahaina(), RouterConfig::default()).unwrap();
        let pairs = all_pairs(&router.snapshot_graph());
        let report = validate_engines(&router, &pairs);
        assert!(report.is_ok(), "{:?}", report.mismatches);
        assert_eq!(report.agreed, 90);
        // A -> F settles 6 nodes in CH against 9 in Dijkstra
        assert!(report.ch_explored_no_more > 0);
        assert!(report.ch_explored_no_more <= report.total);

        router.set_closed("C", "D", true).unwrap();
        assert!(validate_engines(&router, &pairs).is_ok());
        assert!(validate_against_rebuild(&router).is_ok());
    }
}
