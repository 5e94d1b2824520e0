//! Contraction Hierarchies with incremental repair
//!
//! Key concepts:
//! - Node ordering: contract unimportant nodes first (edge difference heuristic)
//! - Contraction: remove nodes one-by-one, add shortcuts unless a witness exists
//! - Shortcuts: arcs bypassing a contracted middle node, built from two arcs
//! - Bidirectional search: search "up" the hierarchy from both ends
//! - Repair: closures and reopenings recontract only the affected nodes
//!
//! All arcs live in one arena. Arc ids `0..edge_count` mirror the graph's raw
//! edges one-to-one; shortcut arcs are appended and refer to their two children
//! by id, so shortcut provenance is a DAG of indices. Removed shortcuts are
//! tombstoned until the next full rebuild.

mod contraction;
mod ordering;
pub mod query;
pub mod repair;
pub mod unpack;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::graph::{EdgeId, GraphStore, NodeIdx};

pub use contraction::{build, build_cancellable};
pub use query::{ChQuery, SearchSpace};
pub use repair::UpdateOutcome;

pub type ArcId = u32;

/// Rank of a node that has not been contracted yet
pub(crate) const UNRANKED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArcKind {
    /// Mirrors the raw graph edge with the same id
    Original,
    /// Bypasses `middle`; `first` ends and `second` starts at `middle`
    Shortcut {
        middle: NodeIdx,
        first: ArcId,
        second: ArcId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChArc {
    pub from: NodeIdx,
    pub to: NodeIdx,
    pub weight: f64,
    pub kind: ArcKind,
    pub alive: bool,
}

impl ChArc {
    pub fn is_shortcut(&self) -> bool {
        matches!(self.kind, ArcKind::Shortcut { .. })
    }

    pub fn middle(&self) -> Option<NodeIdx> {
        match self.kind {
            ArcKind::Shortcut { middle, .. } => Some(middle),
            ArcKind::Original => None,
        }
    }
}

/// Statistics from hierarchy construction
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChStats {
    pub n_nodes: usize,
    pub n_original_edges: usize,
    pub n_shortcuts: usize,
    pub n_up_edges: usize,
    pub n_down_edges: usize,
    /// Witness searches that hit the settle limit and fell back to a shortcut
    pub witness_timeouts: usize,
    pub build_time_ms: u64,
}

/// Cooperative cancellation for long preprocessing runs.
///
/// Checked between two node contractions; a cancelled build returns
/// [`Error::Cancelled`](crate::error::Error::Cancelled) and its partial state is dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// The contracted graph: rank table, arc arena and the up/down search views
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub(crate) arcs: Vec<ChArc>,
    pub(crate) n_original: usize,

    /// Node → rank
    pub(crate) rank: Vec<u32>,
    /// Rank → node
    pub(crate) order: Vec<NodeIdx>,

    // Every live arc by tail and by head, used by contraction and witness search
    pub(crate) out_arcs: Vec<Vec<ArcId>>,
    pub(crate) in_arcs: Vec<Vec<ArcId>>,

    // UP: u → higher-ranked heads. DOWN_REV: u ← higher-ranked tails.
    pub(crate) up: Vec<Vec<ArcId>>,
    pub(crate) down_rev: Vec<Vec<ArcId>>,
    pub(crate) views_built: bool,

    /// Shortcuts built directly on each arc (reverse provenance)
    pub(crate) parents: Vec<Vec<ArcId>>,
    /// Live shortcuts by middle node
    pub(crate) by_middle: Vec<Vec<ArcId>>,

    /// Nodes whose shortcut suppression relied on a witness path through the arc
    pub(crate) witness_deps: FxHashMap<ArcId, FxHashSet<NodeIdx>>,
    /// Arcs each node's witnesses used, for unlinking on recontraction
    pub(crate) node_witnesses: Vec<Vec<ArcId>>,

    pub(crate) stats: ChStats,
}

impl Hierarchy {
    /// Uncontracted hierarchy holding only the raw edges
    pub(crate) fn from_graph(graph: &GraphStore) -> Self {
        let n_nodes = graph.node_count();
        let n_edges = graph.edge_count();

        let mut arcs = Vec::with_capacity(n_edges * 2);
        let mut out_arcs = vec![Vec::new(); n_nodes];
        let mut in_arcs = vec![Vec::new(); n_nodes];

        for (id, edge) in graph.edges().iter().enumerate() {
            arcs.push(ChArc {
                from: edge.from,
                to: edge.to,
                weight: edge.weight,
                kind: ArcKind::Original,
                alive: true,
            });
            out_arcs[edge.from as usize].push(id as ArcId);
            in_arcs[edge.to as usize].push(id as ArcId);
        }

        Self {
            arcs,
            n_original: n_edges,
            rank: vec![UNRANKED; n_nodes],
            order: Vec::with_capacity(n_nodes),
            out_arcs,
            in_arcs,
            up: vec![Vec::new(); n_nodes],
            down_rev: vec![Vec::new(); n_nodes],
            views_built: false,
            parents: vec![Vec::new(); n_edges],
            by_middle: vec![Vec::new(); n_nodes],
            witness_deps: FxHashMap::default(),
            node_witnesses: vec![Vec::new(); n_nodes],
            stats: ChStats {
                n_nodes,
                n_original_edges: n_edges,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn arc(&self, id: ArcId) -> &ChArc {
        &self.arcs[id as usize]
    }

    #[inline]
    pub fn rank(&self, node: NodeIdx) -> u32 {
        self.rank[node as usize]
    }

    /// Nodes in contraction order
    pub fn order(&self) -> &[NodeIdx] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.rank.len()
    }

    pub fn stats(&self) -> &ChStats {
        &self.stats
    }

    /// Live shortcut ids
    pub fn shortcuts(&self) -> impl Iterator<Item = ArcId> + '_ {
        (self.n_original..self.arcs.len())
            .map(|i| i as ArcId)
            .filter(move |&id| self.arcs[id as usize].alive)
    }

    /// Live shortcuts whose middle node is `node`
    pub fn shortcuts_via(&self, node: NodeIdx) -> &[ArcId] {
        &self.by_middle[node as usize]
    }

    /// Live shortcut `from -> to`, if any
    pub fn find_shortcut(&self, from: NodeIdx, to: NodeIdx) -> Option<ArcId> {
        self.out_arcs[from as usize]
            .iter()
            .copied()
            .find(|&id| id as usize >= self.n_original && self.arcs[id as usize].to == to)
    }

    /// An arc can be traversed: it is live, and a raw arc's edge is open
    #[inline]
    pub(crate) fn is_usable(&self, graph: &GraphStore, id: ArcId) -> bool {
        let arc = &self.arcs[id as usize];
        arc.alive && (arc.is_shortcut() || !graph.is_closed(id as EdgeId))
    }

    pub(crate) fn add_shortcut(
        &mut self,
        from: NodeIdx,
        to: NodeIdx,
        weight: f64,
        middle: NodeIdx,
        first: ArcId,
        second: ArcId,
    ) -> ArcId {
        let id = self.arcs.len() as ArcId;
        self.arcs.push(ChArc {
            from,
            to,
            weight,
            kind: ArcKind::Shortcut { middle, first, second },
            alive: true,
        });
        self.parents.push(Vec::new());
        self.parents[first as usize].push(id);
        self.parents[second as usize].push(id);
        self.by_middle[middle as usize].push(id);
        self.out_arcs[from as usize].push(id);
        self.in_arcs[to as usize].push(id);
        if self.views_built {
            self.link_view(id);
        }
        id
    }

    /// Tombstone a single shortcut and unlink it everywhere.
    ///
    /// Returns the shortcuts built on it and the nodes whose witnesses used it;
    /// the caller decides how to cascade.
    pub(crate) fn unlink_shortcut(&mut self, id: ArcId) -> (Vec<ArcId>, Vec<NodeIdx>) {
        let arc = &mut self.arcs[id as usize];
        if !arc.alive {
            return (Vec::new(), Vec::new());
        }
        arc.alive = false;
        let (from, to) = (arc.from, arc.to);
        let (middle, first, second) = match arc.kind {
            ArcKind::Shortcut { middle, first, second } => (middle, first, second),
            ArcKind::Original => unreachable!("raw arcs are never unlinked"),
        };

        self.out_arcs[from as usize].retain(|&a| a != id);
        self.in_arcs[to as usize].retain(|&a| a != id);
        self.up[from as usize].retain(|&a| a != id);
        self.down_rev[to as usize].retain(|&a| a != id);
        self.by_middle[middle as usize].retain(|&a| a != id);
        self.parents[first as usize].retain(|&a| a != id);
        self.parents[second as usize].retain(|&a| a != id);

        let built_on = std::mem::take(&mut self.parents[id as usize]);
        let dependents = self
            .witness_deps
            .remove(&id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        (built_on, dependents)
    }

    /// Replace the witness dependencies recorded for `node`
    pub(crate) fn set_witnesses(&mut self, node: NodeIdx, arcs: Vec<ArcId>) {
        let old = std::mem::take(&mut self.node_witnesses[node as usize]);
        for arc in old {
            if let Some(set) = self.witness_deps.get_mut(&arc) {
                set.remove(&node);
                if set.is_empty() {
                    self.witness_deps.remove(&arc);
                }
            }
        }
        for &arc in &arcs {
            self.witness_deps.entry(arc).or_default().insert(node);
        }
        self.node_witnesses[node as usize] = arcs;
    }

    fn link_view(&mut self, id: ArcId) {
        let arc = &self.arcs[id as usize];
        let (from, to) = (arc.from, arc.to);
        let (rank_from, rank_to) = (self.rank[from as usize], self.rank[to as usize]);
        if rank_to > rank_from {
            self.up[from as usize].push(id);
        } else if rank_from > rank_to {
            self.down_rev[to as usize].push(id);
        }
    }

    /// Split live arcs into the UP and reversed DOWN views once all ranks are known
    pub(crate) fn build_views(&mut self) {
        for list in self.up.iter_mut().chain(self.down_rev.iter_mut()) {
            list.clear();
        }
        for id in 0..self.arcs.len() as ArcId {
            if self.arcs[id as usize].alive {
                self.link_view(id);
            }
        }
        self.views_built = true;
        self.refresh_stats();
    }

    pub(crate) fn refresh_stats(&mut self) {
        self.stats.n_shortcuts = self.shortcuts().count();
        self.stats.n_up_edges = self.up.iter().map(Vec::len).sum();
        self.stats.n_down_edges = self.down_rev.iter().map(Vec::len).sum();
    }

    /// Check the structural invariants of the hierarchy.
    ///
    /// - every UP arc climbs in rank and every DOWN_REV arc descends
    /// - every live shortcut's middle ranks below both endpoints
    /// - a live shortcut's weight equals its children's and both children are live
    /// - no live shortcut unpacks through a closed edge
    pub fn check(&self, graph: &GraphStore) -> std::result::Result<(), String> {
        for (u, list) in self.up.iter().enumerate() {
            for &id in list {
                let arc = self.arc(id);
                if arc.from as usize != u || self.rank(arc.to) <= self.rank(arc.from) {
                    return Err(format!("UP arc {} does not climb from {}", id, u));
                }
            }
        }
        for (v, list) in self.down_rev.iter().enumerate() {
            for &id in list {
                let arc = self.arc(id);
                if arc.to as usize != v || self.rank(arc.from) <= self.rank(arc.to) {
                    return Err(format!("DOWN_REV arc {} does not descend into {}", id, v));
                }
            }
        }
        let mut raw = Vec::new();
        for id in self.shortcuts() {
            let arc = self.arc(id);
            let ArcKind::Shortcut { middle, first, second } = arc.kind else {
                continue;
            };
            if self.rank(middle) >= self.rank(arc.from) || self.rank(middle) >= self.rank(arc.to) {
                return Err(format!("shortcut {} via {} is not below its endpoints", id, middle));
            }
            let (a, b) = (self.arc(first), self.arc(second));
            if !a.alive || !b.alive {
                return Err(format!("shortcut {} is built on a removed arc", id));
            }
            if a.from != arc.from || a.to != middle || b.from != middle || b.to != arc.to {
                return Err(format!("shortcut {} children do not chain through {}", id, middle));
            }
            raw.clear();
            unpack::unpack_arc(self, id, &mut raw);
            let sum: f64 = raw.iter().map(|&e| graph.edge(e).weight).sum();
            if (sum - arc.weight).abs() > unpack::UNPACK_EPSILON * arc.weight.max(1.0) {
                return Err(format!("shortcut {} weighs {} but unpacks to {}", id, arc.weight, sum));
            }
            if raw.iter().any(|&e| graph.is_closed(e)) {
                return Err(format!("shortcut {} unpacks through a closed edge", id));
            }
        }
        Ok(())
    }
}
