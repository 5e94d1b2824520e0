//! CH query - bidirectional Dijkstra on the hierarchy
//!
//! Forward search relaxes UP arcs from the start, backward search relaxes
//! reversed DOWN arcs from the target. The side with the smaller frontier key
//! moves next. μ is the best meeting cost seen so far; a direction stops once
//! its smallest key reaches μ, since no node at that key can improve it.
//!
//! Stall-on-demand: a settled node that a higher-ranked node of the same
//! search reaches more cheaply over a DOWN arc is not expanded. Its key is not
//! a shortest distance, so nothing relaxed from it can lie on a shortest path.
//!
//! Raw arcs are checked against the live closed flags on every relaxation.

use std::time::Instant;

use super::unpack::unpack_path;
use super::{ArcId, Hierarchy};
use crate::dijkstra::{Frontier, HeapEntry};
use crate::graph::{GraphStore, NodeIdx};
use crate::route::{Engine, RouteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Nodes settled by each half of one query
///
/// With positive weights and `start != target`, every node the forward half
/// settles lies strictly closer to `start` than `target` does, so `forward`
/// is always below the baseline Dijkstra count for the same query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchSpace {
    pub forward: usize,
    pub backward: usize,
    /// Settled but not expanded (included in the two counts above)
    pub stalled: usize,
}

impl SearchSpace {
    pub fn total(&self) -> usize {
        self.forward + self.backward
    }
}

/// One half of the bidirectional search
struct SearchSide {
    dist: Vec<f64>,
    parent: Vec<Option<ArcId>>,
    settled: Vec<bool>,
    frontier: Frontier,
    n_settled: usize,
    n_stalled: usize,
}

impl SearchSide {
    fn new(n: usize, origin: NodeIdx) -> Self {
        let mut side = Self {
            dist: vec![f64::INFINITY; n],
            parent: vec![None; n],
            settled: vec![false; n],
            frontier: Frontier::default(),
            n_settled: 0,
            n_stalled: 0,
        };
        side.dist[origin as usize] = 0.0;
        side.frontier.push(origin, 0.0);
        side
    }

    /// Smallest frontier key, if it can still improve `mu`
    fn next_key(&self, mu: f64) -> Option<f64> {
        self.frontier.min_key().filter(|&k| k < mu)
    }
}

/// Keep the cheaper of two meeting candidates
fn improve(best: &mut Option<(NodeIdx, f64)>, node: NodeIdx, total: f64) {
    if total.is_finite() && best.map_or(true, |(_, b)| total < b) {
        *best = Some((node, total));
    }
}

/// Bidirectional query over a hierarchy and the graph it was built from
pub struct ChQuery<'a> {
    hierarchy: &'a Hierarchy,
    graph: &'a GraphStore,
}

impl<'a> ChQuery<'a> {
    pub fn new(hierarchy: &'a Hierarchy, graph: &'a GraphStore) -> Self {
        Self { hierarchy, graph }
    }

    pub fn run(&self, start: NodeIdx, target: NodeIdx) -> RouteResult {
        self.run_counted(start, target).0
    }

    /// Like [`run`](Self::run), also reporting how many nodes each half settled
    pub fn run_counted(&self, start: NodeIdx, target: NodeIdx) -> (RouteResult, SearchSpace) {
        let timer = Instant::now();
        let n = self.hierarchy.node_count();
        let mut fwd = SearchSide::new(n, start);
        let mut bwd = SearchSide::new(n, target);

        let mut mu = f64::INFINITY;
        let mut meeting: Option<NodeIdx> = None;

        loop {
            let direction = match (fwd.next_key(mu), bwd.next_key(mu)) {
                (None, None) => break,
                (Some(_), None) => Direction::Forward,
                (None, Some(_)) => Direction::Backward,
                (Some(f), Some(b)) if f <= b => Direction::Forward,
                (Some(_), Some(_)) => Direction::Backward,
            };

            let (this, other) = match direction {
                Direction::Forward => (&mut fwd, &bwd),
                Direction::Backward => (&mut bwd, &fwd),
            };
            if let Some((node, cost)) = self.step(direction, this, other) {
                if cost < mu {
                    mu = cost;
                    meeting = Some(node);
                }
            }
        }

        let space = SearchSpace {
            forward: fwd.n_settled,
            backward: bwd.n_settled,
            stalled: fwd.n_stalled + bwd.n_stalled,
        };
        let elapsed_us = timer.elapsed().as_micros() as u64;
        let Some(meet) = meeting else {
            let result = RouteResult::not_found(Engine::Ch, space.total(), elapsed_us);
            return (result, space);
        };

        let arcs = self.collect_arcs(&fwd, &bwd, start, target, meet);
        let edges = unpack_path(self.hierarchy, &arcs);
        let result = RouteResult::from_edges(
            Engine::Ch,
            self.graph,
            start,
            &edges,
            mu,
            space.total(),
            elapsed_us,
        );
        (result, space)
    }

    /// Settle one node on `this` side. Returns the best meeting seen while doing so.
    fn step(
        &self,
        direction: Direction,
        this: &mut SearchSide,
        other: &SearchSide,
    ) -> Option<(NodeIdx, f64)> {
        let HeapEntry { cost, node, .. } = this.frontier.pop()?;
        let u = node as usize;
        if this.settled[u] || cost > this.dist[u] {
            return None; // Stale entry
        }
        this.settled[u] = true;
        this.n_settled += 1;

        let mut best: Option<(NodeIdx, f64)> = None;
        improve(&mut best, node, cost + other.dist[u]);

        if self.is_stalled(direction, this, u, cost) {
            this.n_stalled += 1;
            return best;
        }

        let h = self.hierarchy;
        let arcs = match direction {
            Direction::Forward => &h.up[u],
            Direction::Backward => &h.down_rev[u],
        };
        for &id in arcs {
            if !h.is_usable(self.graph, id) {
                continue;
            }
            let arc = h.arc(id);
            let next = match direction {
                Direction::Forward => arc.to,
                Direction::Backward => arc.from,
            };
            let next_cost = cost + arc.weight;
            if next_cost < this.dist[next as usize] {
                this.dist[next as usize] = next_cost;
                this.parent[next as usize] = Some(id);
                this.frontier.push(next, next_cost);
                improve(&mut best, next, next_cost + other.dist[next as usize]);
            }
        }
        best
    }

    /// `u` can be reached more cheaply through a higher-ranked node this side already reached
    fn is_stalled(&self, direction: Direction, side: &SearchSide, u: usize, cost: f64) -> bool {
        let h = self.hierarchy;
        let arcs = match direction {
            Direction::Forward => &h.down_rev[u],
            Direction::Backward => &h.up[u],
        };
        arcs.iter().any(|&id| {
            if !h.is_usable(self.graph, id) {
                return false;
            }
            let arc = h.arc(id);
            let higher = match direction {
                Direction::Forward => arc.from,
                Direction::Backward => arc.to,
            };
            side.dist[higher as usize] + arc.weight < cost
        })
    }

    /// Hierarchy arcs start -> meet -> target
    fn collect_arcs(
        &self,
        fwd: &SearchSide,
        bwd: &SearchSide,
        start: NodeIdx,
        target: NodeIdx,
        meet: NodeIdx,
    ) -> Vec<ArcId> {
        let h = self.hierarchy;
        let mut arcs = Vec::new();

        let mut current = meet;
        while current != start {
            let Some(id) = fwd.parent[current as usize] else { break };
            arcs.push(id);
            current = h.arc(id).from;
        }
        arcs.reverse();

        let mut current = meet;
        while current != target {
            let Some(id) = bwd.parent[current as usize] else { break };
            arcs.push(id);
            current = h.arc(id).to;
        }
        arcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::build;
    use crate::config::RouterConfig;
    use crate::graph::demo::lahaina;

    fn route(h: &Hierarchy, graph: &GraphStore, from: &str, to: &str) -> RouteResult {
        ChQuery::new(h, graph).run(graph.resolve(from).unwrap(), graph.resolve(to).unwrap())
    }

    #[test]
    fn test_demo_corridor() {
        let graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        let result = route(&h, &graph, "A", "F");
        assert_eq!(result.engine, Engine::Ch);
        assert_eq!(result.cost, 460.0);
        assert_eq!(result.path, vec!["A", "B", "C", "D", "E", "F"]);
        assert!(result.valid);
        assert!(result.nodes_explored <= 9);
    }

    #[test]
    fn test_demo_corridor_search_space() {
        // Forward settles A, G, B, I and D; D -> F sets mu = 460 and F is the
        // backward side's only node, so nothing at key 460 gets settled
        let graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        let a = graph.resolve("A").unwrap();
        let f = graph.resolve("F").unwrap();
        let (result, space) = ChQuery::new(&h, &graph).run_counted(a, f);
        assert_eq!(result.cost, 460.0);
        assert_eq!(space.forward, 5);
        assert_eq!(space.backward, 1);
        assert_eq!(result.nodes_explored, space.total());
    }

    #[test]
    fn test_forward_half_stays_inside_dijkstra_ball() {
        let graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        for s in 0..graph.node_count() as NodeIdx {
            for t in 0..graph.node_count() as NodeIdx {
                if s == t {
                    continue;
                }
                let (ch, space) = ChQuery::new(&h, &graph).run_counted(s, t);
                let dj = crate::dijkstra::shortest_path(&graph, s, t);
                assert_eq!(ch.nodes_explored, space.total());
                if dj.found() {
                    assert!(space.forward < dj.nodes_explored, "{} -> {}", s, t);
                } else {
                    assert!(space.forward <= dj.nodes_explored, "{} -> {}", s, t);
                }
            }
        }
    }

    #[test]
    fn test_closed_edge_is_filtered_live() {
        // No repair runs here: the closed raw arc is skipped at query time
        let mut graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        graph.set_closed("A", "B", true).unwrap();
        let result = route(&h, &graph, "A", "F");
        assert!(!result.found());
        assert!(result.valid);
    }

    #[test]
    fn test_same_start_and_target() {
        let graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        let result = route(&h, &graph, "E", "E");
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.path, vec!["E"]);
    }

    #[test]
    fn test_unreachable_against_edge_direction() {
        let graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        let result = route(&h, &graph, "F", "A");
        assert!(!result.found());
        assert!(result.cost.is_infinite());
    }

    #[test]
    fn test_matches_dijkstra_on_every_demo_pair() {
        let graph = lahaina();
        let h = build(&graph, &RouterConfig::default());
        for s in 0..graph.node_count() as NodeIdx {
            for t in 0..graph.node_count() as NodeIdx {
                let ch = ChQuery::new(&h, &graph).run(s, t);
                let dj = crate::dijkstra::shortest_path(&graph, s, t);
                assert!(crate::route::costs_agree(ch.cost, dj.cost), "{} -> {}", s, t);
            }
        }
    }
}
