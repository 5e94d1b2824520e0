//! Node ordering by simulated contraction
//!
//! Importance key, smallest contracted first:
//! 1. edge difference: shortcuts added minus arcs removed
//! 2. number of neighbours already contracted (spreads contraction out)
//! 3. node index, so the order is deterministic
//!
//! Keys are recomputed lazily when a node reaches the top of the queue and
//! eagerly only for the neighbours of a freshly contracted node.

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use super::contraction::plan_contraction;
use super::{Hierarchy, UNRANKED};
use crate::graph::{GraphStore, NodeIdx};

pub(crate) type ImportanceKey = (i64, u32, NodeIdx);

/// Importance of `v` if it were contracted next at `level`
pub(crate) fn importance(
    h: &Hierarchy,
    graph: &GraphStore,
    v: NodeIdx,
    level: u32,
    settle_limit: usize,
) -> ImportanceKey {
    let plan = plan_contraction(h, graph, v, level, settle_limit);
    let edge_difference = plan.shortcuts.len() as i64 - (plan.in_degree + plan.out_degree) as i64;
    (edge_difference, contracted_neighbors(h, v, level), v)
}

/// Importance of every node before any contraction
pub(crate) fn initial_keys(
    h: &Hierarchy,
    graph: &GraphStore,
    settle_limit: usize,
    parallel: bool,
) -> Vec<ImportanceKey> {
    let n = h.node_count() as NodeIdx;
    if parallel {
        (0..n)
            .into_par_iter()
            .map(|v| importance(h, graph, v, 0, settle_limit))
            .collect()
    } else {
        (0..n).map(|v| importance(h, graph, v, 0, settle_limit)).collect()
    }
}

fn contracted_neighbors(h: &Hierarchy, v: NodeIdx, level: u32) -> u32 {
    let mut seen: FxHashSet<NodeIdx> = FxHashSet::default();
    let tails = h.in_arcs[v as usize].iter().map(|&id| h.arc(id).from);
    let heads = h.out_arcs[v as usize].iter().map(|&id| h.arc(id).to);
    for x in tails.chain(heads) {
        if x != v && h.rank(x) < level {
            seen.insert(x);
        }
    }
    seen.len() as u32
}

/// Neighbours of `v` that are still waiting to be contracted
pub(crate) fn pending_neighbors(h: &Hierarchy, v: NodeIdx) -> Vec<NodeIdx> {
    let tails = h.in_arcs[v as usize].iter().map(|&id| h.arc(id).from);
    let heads = h.out_arcs[v as usize].iter().map(|&id| h.arc(id).to);
    let mut out: Vec<NodeIdx> = tails
        .chain(heads)
        .filter(|&x| x != v && h.rank(x) == UNRANKED)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::demo::lahaina;

    #[test]
    fn test_initial_keys_on_demo() {
        let graph = lahaina();
        let h = Hierarchy::from_graph(&graph);
        let keys = initial_keys(&h, &graph, 500, false);
        let a = graph.resolve("A").unwrap();
        let c = graph.resolve("C").unwrap();
        // A has no in-neighbours: contracting it only removes two arcs
        assert_eq!(keys[a as usize], (-2, 0, a));
        // C needs B -> D and B -> I, and loses three arcs
        assert_eq!(keys[c as usize], (-1, 0, c));
        assert_eq!(keys, initial_keys(&h, &graph, 500, true));
    }

    #[test]
    fn test_pending_neighbors_are_distinct() {
        let graph = lahaina();
        let h = Hierarchy::from_graph(&graph);
        let c = graph.resolve("C").unwrap();
        let ids: Vec<&str> = pending_neighbors(&h, c)
            .into_iter()
            .map(|n| graph.node(n).id.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "D", "I"]);
    }
}
