//! Node contraction with witness search
//!
//! Contracting v at level r looks at every pair (u -> v, v -> w) of live,
//! open arcs whose outer endpoints rank above r. A shortcut u -> w is needed
//! unless a witness path of equal or lower cost exists that avoids v and only
//! visits nodes ranked above r. Witness searches are bounded Dijkstras; when
//! one runs out of its settle budget the shortcut is inserted anyway, which
//! costs space but never correctness.

use priority_queue::PriorityQueue;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::time::Instant;
use tracing::{debug, info};

use super::ordering::{importance, initial_keys, pending_neighbors};
use super::{ArcId, ArcKind, CancelToken, ChArc, Hierarchy};
use crate::config::RouterConfig;
use crate::dijkstra::{Frontier, HeapEntry};
use crate::error::{Error, Result};
use crate::graph::{GraphStore, NodeIdx};

/// Slack when comparing a witness cost against a two-arc candidate
const WITNESS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShortcutPlan {
    pub from: NodeIdx,
    pub to: NodeIdx,
    pub weight: f64,
    pub first: ArcId,
    pub second: ArcId,
}

/// Outcome of contracting one node, before it is applied
#[derive(Debug, Default)]
pub(crate) struct ContractionPlan {
    pub shortcuts: Vec<ShortcutPlan>,
    /// Arcs used by witness paths that suppressed a shortcut
    pub witnesses: Vec<ArcId>,
    pub timeouts: usize,
    pub in_degree: usize,
    pub out_degree: usize,
}

/// Arc may take part in contraction at `level`: live, open, and if it is a
/// shortcut its middle was contracted below `level`
#[inline]
pub(crate) fn usable_at(h: &Hierarchy, graph: &GraphStore, id: ArcId, level: u32) -> bool {
    if !h.is_usable(graph, id) {
        return false;
    }
    match h.arc(id).kind {
        ArcKind::Shortcut { middle, .. } => h.rank(middle) < level,
        ArcKind::Original => true,
    }
}

/// Cheapest usable arc per neighbour ranked above `level`, sorted by neighbour
fn cheapest_by_neighbor(
    h: &Hierarchy,
    graph: &GraphStore,
    arcs: &[ArcId],
    v: NodeIdx,
    level: u32,
    endpoint: impl Fn(&ChArc) -> NodeIdx,
) -> Vec<(NodeIdx, ArcId, f64)> {
    let mut best: FxHashMap<NodeIdx, (ArcId, f64)> = FxHashMap::default();
    for &id in arcs {
        if !usable_at(h, graph, id, level) {
            continue;
        }
        let arc = h.arc(id);
        let x = endpoint(arc);
        if x == v || h.rank(x) <= level {
            continue;
        }
        best.entry(x)
            .and_modify(|e| {
                if arc.weight < e.1 || (arc.weight == e.1 && id < e.0) {
                    *e = (id, arc.weight);
                }
            })
            .or_insert((id, arc.weight));
    }
    let mut out: Vec<_> = best.into_iter().map(|(x, (id, w))| (x, id, w)).collect();
    out.sort_unstable_by_key(|&(x, _, _)| x);
    out
}

/// Decide the shortcuts needed to contract `v` at `level`.
///
/// `level` is the rank `v` holds (repair) or would receive (ordering); every
/// node ranked above it counts as still in the graph.
pub(crate) fn plan_contraction(
    h: &Hierarchy,
    graph: &GraphStore,
    v: NodeIdx,
    level: u32,
    settle_limit: usize,
) -> ContractionPlan {
    let incoming = cheapest_by_neighbor(h, graph, &h.in_arcs[v as usize], v, level, |a| a.from);
    let outgoing = cheapest_by_neighbor(h, graph, &h.out_arcs[v as usize], v, level, |a| a.to);

    let mut plan = ContractionPlan {
        in_degree: incoming.len(),
        out_degree: outgoing.len(),
        ..Default::default()
    };
    let mut witnesses: FxHashSet<ArcId> = FxHashSet::default();

    for &(u, first, w_in) in &incoming {
        let candidates: Vec<(NodeIdx, ArcId, f64)> = outgoing
            .iter()
            .filter(|&&(w, _, _)| w != u)
            .map(|&(w, second, w_out)| (w, second, w_in + w_out))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let limit = candidates.iter().map(|c| c.2).fold(0.0, f64::max);
        let targets: Vec<NodeIdx> = candidates.iter().map(|c| c.0).collect();
        let search = WitnessSearch::run(h, graph, u, v, level, limit, settle_limit, &targets);

        for (w, second, candidate) in candidates {
            let bound = candidate + WITNESS_EPSILON * candidate.max(1.0);
            if search.cost(w).is_some_and(|d| d <= bound) {
                witnesses.extend(search.path_arcs(h, w));
                continue;
            }
            if search.timed_out {
                plan.timeouts += 1;
            }
            plan.shortcuts.push(ShortcutPlan {
                from: u,
                to: w,
                weight: candidate,
                first,
                second,
            });
        }
    }

    let mut witnesses: Vec<ArcId> = witnesses.into_iter().collect();
    witnesses.sort_unstable();
    plan.witnesses = witnesses;
    plan
}

/// Bounded local Dijkstra from one in-neighbour of the node being contracted
struct WitnessSearch {
    dist: FxHashMap<NodeIdx, (f64, Option<ArcId>)>,
    timed_out: bool,
}

impl WitnessSearch {
    #[allow(clippy::too_many_arguments)]
    fn run(
        h: &Hierarchy,
        graph: &GraphStore,
        source: NodeIdx,
        avoid: NodeIdx,
        level: u32,
        limit: f64,
        settle_limit: usize,
        targets: &[NodeIdx],
    ) -> Self {
        let limit = limit + WITNESS_EPSILON * limit.max(1.0);
        let mut dist: FxHashMap<NodeIdx, (f64, Option<ArcId>)> = FxHashMap::default();
        let mut settled: FxHashSet<NodeIdx> = FxHashSet::default();
        let mut frontier = Frontier::default();
        let mut remaining = targets.len();
        let mut timed_out = false;

        dist.insert(source, (0.0, None));
        frontier.push(source, 0.0);

        while let Some(HeapEntry { cost, node, .. }) = frontier.pop() {
            if cost > limit {
                break;
            }
            if !settled.insert(node) {
                continue;
            }
            if settled.len() > settle_limit {
                timed_out = true;
                break;
            }
            if targets.contains(&node) {
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }

            for &id in &h.out_arcs[node as usize] {
                if !usable_at(h, graph, id, level) {
                    continue;
                }
                let arc = h.arc(id);
                if arc.to == avoid || h.rank(arc.to) <= level {
                    continue;
                }
                let new_cost = cost + arc.weight;
                if new_cost > limit {
                    continue;
                }
                let improves = dist.get(&arc.to).map_or(true, |&(d, _)| new_cost < d);
                if improves {
                    dist.insert(arc.to, (new_cost, Some(id)));
                    frontier.push(arc.to, new_cost);
                }
            }
        }

        Self { dist, timed_out }
    }

    fn cost(&self, node: NodeIdx) -> Option<f64> {
        self.dist.get(&node).map(|&(d, _)| d)
    }

    /// Arcs of the best known path to `node`
    fn path_arcs(&self, h: &Hierarchy, node: NodeIdx) -> Vec<ArcId> {
        let mut arcs = Vec::new();
        let mut current = node;
        while let Some(&(_, Some(id))) = self.dist.get(&current) {
            arcs.push(id);
            current = h.arc(id).from;
        }
        arcs
    }
}

/// Record a planned contraction in the hierarchy, returning the new shortcut ids
pub(crate) fn apply_plan(h: &mut Hierarchy, v: NodeIdx, plan: ContractionPlan) -> Vec<ArcId> {
    if plan.timeouts > 0 {
        debug!(node = v, timeouts = plan.timeouts, "witness search hit settle limit");
    }
    let added = plan
        .shortcuts
        .iter()
        .map(|s| h.add_shortcut(s.from, s.to, s.weight, v, s.first, s.second))
        .collect();
    h.set_witnesses(v, plan.witnesses);
    h.stats.witness_timeouts += plan.timeouts;
    added
}

/// Build a hierarchy for the graph's current closure state
pub fn build(graph: &GraphStore, config: &RouterConfig) -> Hierarchy {
    match contract_all(graph, config, None) {
        Ok(hierarchy) => hierarchy,
        Err(e) => unreachable!("build without a cancel token cannot fail: {e}"),
    }
}

/// Like [`build`], but gives up with [`Error::Cancelled`] once `cancel` fires
pub fn build_cancellable(
    graph: &GraphStore,
    config: &RouterConfig,
    cancel: &CancelToken,
) -> Result<Hierarchy> {
    contract_all(graph, config, Some(cancel))
}

fn contract_all(
    graph: &GraphStore,
    config: &RouterConfig,
    cancel: Option<&CancelToken>,
) -> Result<Hierarchy> {
    let start = Instant::now();
    let n = graph.node_count();
    let settle_limit = config.witness_settle_limit;
    let mut h = Hierarchy::from_graph(graph);

    info!(
        nodes = n,
        edges = graph.edge_count(),
        closed = graph.closed_count(),
        "Building contraction hierarchy"
    );

    let keys = initial_keys(&h, graph, settle_limit, config.parallel_ordering);
    let mut queue: PriorityQueue<NodeIdx, Reverse<(i64, u32, NodeIdx)>> =
        PriorityQueue::with_capacity(n);
    for (v, key) in keys.into_iter().enumerate() {
        queue.push(v as NodeIdx, Reverse(key));
    }

    let mut next_rank: u32 = 0;
    while let Some((v, _)) = queue.pop() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!(contracted = next_rank, "Contraction cancelled");
            return Err(Error::Cancelled);
        }

        // Lazy update: the stored key may be stale, re-queue if it got worse
        let fresh = importance(&h, graph, v, next_rank, settle_limit);
        if let Some((_, Reverse(next))) = queue.peek() {
            if fresh > *next {
                queue.push(v, Reverse(fresh));
                continue;
            }
        }

        let plan = plan_contraction(&h, graph, v, next_rank, settle_limit);
        h.rank[v as usize] = next_rank;
        h.order.push(v);
        apply_plan(&mut h, v, plan);
        next_rank += 1;

        for x in pending_neighbors(&h, v) {
            if queue.get(&x).is_some() {
                let key = importance(&h, graph, x, next_rank, settle_limit);
                queue.change_priority(&x, Reverse(key));
            }
        }

        if next_rank % 10_000 == 0 {
            debug!(contracted = next_rank, total = n, "Contraction progress");
        }
    }

    h.build_views();
    h.stats.build_time_ms = start.elapsed().as_millis() as u64;

    info!(
        shortcuts = h.stats.n_shortcuts,
        up = h.stats.n_up_edges,
        down = h.stats.n_down_edges,
        witness_timeouts = h.stats.witness_timeouts,
        ms = h.stats.build_time_ms,
        "Contraction hierarchy ready"
    );
    Ok(h)
}
