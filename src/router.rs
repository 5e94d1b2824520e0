//! Router: the live graph and its hierarchy behind one read-write lock
//!
//! Queries take the read lock and may run concurrently. Closure commands take
//! the write lock, so no query ever observes a half-repaired hierarchy. Repair
//! patches the live hierarchy directly; when it runs over budget the patched
//! state is thrown away by a full rebuild before the lock is released.

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use tracing::{info, warn};

use crate::ch::repair::repair_edge;
use crate::ch::{self, CancelToken, ChQuery, ChStats, Hierarchy, UpdateOutcome};
use crate::config::RouterConfig;
use crate::dijkstra;
use crate::error::Result;
use crate::graph::{GraphStore, NodeIdx};
use crate::route::{Comparison, Engine, RouteResult};

pub struct RouterState {
    pub graph: GraphStore,
    pub hierarchy: Hierarchy,
}

impl RouterState {
    /// Answer a query with either engine against this state
    pub fn query(&self, engine: Engine, start: NodeIdx, target: NodeIdx) -> RouteResult {
        match engine {
            Engine::Dijkstra => dijkstra::shortest_path(&self.graph, start, target),
            Engine::Ch => ChQuery::new(&self.hierarchy, &self.graph).run(start, target),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub nodes: usize,
    pub edges: usize,
    pub closed_edges: usize,
    pub hierarchy: ChStats,
}

pub struct Router {
    state: RwLock<RouterState>,
    config: RouterConfig,
}

impl Router {
    /// Preprocess `graph` and wrap it for querying
    pub fn new(graph: GraphStore, config: RouterConfig) -> Result<Self> {
        config.validate()?;
        let hierarchy = ch::build(&graph, &config);
        Ok(Self {
            state: RwLock::new(RouterState { graph, hierarchy }),
            config,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn route(&self, engine: Engine, from: &str, to: &str) -> Result<RouteResult> {
        let state = self.state.read();
        let start = state.graph.resolve(from)?;
        let target = state.graph.resolve(to)?;
        Ok(state.query(engine, start, target))
    }

    /// Run both engines against the same graph state
    pub fn compare(&self, from: &str, to: &str) -> Result<Comparison> {
        let state = self.state.read();
        let start = state.graph.resolve(from)?;
        let target = state.graph.resolve(to)?;
        let dijkstra = state.query(Engine::Dijkstra, start, target);
        let ch = state.query(Engine::Ch, start, target);
        if !crate::route::costs_agree(dijkstra.cost, ch.cost) {
            warn!(from, to, dijkstra = dijkstra.cost, ch = ch.cost, "engines disagree");
        }
        Ok(Comparison {
            from: from.to_string(),
            to: to.to_string(),
            dijkstra,
            ch,
        })
    }

    /// Close or reopen the edge `from -> to` and bring the hierarchy up to date
    pub fn set_closed(&self, from: &str, to: &str, closed: bool) -> Result<UpdateOutcome> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let edge = state.graph.edge_id(from, to)?;
        if !state.graph.set_closed_by_id(edge, closed) {
            return Ok(UpdateOutcome::Unchanged);
        }

        // Repair in place: the write lock hides intermediate states, and a
        // repair that runs over budget is replaced by a full rebuild below
        let budget = self.config.repair_budget(state.graph.node_count());
        match repair_edge(
            &mut state.hierarchy,
            &state.graph,
            edge,
            self.config.witness_settle_limit,
            budget,
        ) {
            Ok(outcome) => {
                info!(from, to, closed, ?outcome, "edge updated");
                Ok(outcome)
            }
            Err(exceeded) => {
                info!(
                    from,
                    to,
                    closed,
                    affected = exceeded.affected,
                    budget,
                    "repair too large, rebuilding hierarchy"
                );
                state.hierarchy = ch::build(&state.graph, &self.config);
                Ok(UpdateOutcome::RebuildRequired {
                    affected: exceeded.affected,
                })
            }
        }
    }

    /// Rebuild the hierarchy from scratch for the current closures
    pub fn rebuild(&self) {
        let mut state = self.state.write();
        state.hierarchy = ch::build(&state.graph, &self.config);
    }

    /// Rebuild while queries keep running on the old hierarchy.
    ///
    /// On cancellation the old hierarchy stays in place.
    pub fn rebuild_cancellable(&self, cancel: &CancelToken) -> Result<()> {
        let state = self.state.upgradable_read();
        let hierarchy = ch::build_cancellable(&state.graph, &self.config, cancel)?;
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        state.hierarchy = hierarchy;
        Ok(())
    }

    pub fn stats(&self) -> RouterStats {
        let state = self.state.read();
        RouterStats {
            nodes: state.graph.node_count(),
            edges: state.graph.edge_count(),
            closed_edges: state.graph.closed_count(),
            hierarchy: state.hierarchy.stats().clone(),
        }
    }

    /// Copy of the graph with its current closures
    pub fn snapshot_graph(&self) -> GraphStore {
        self.state.read().graph.clone()
    }

    /// Directed edges as external id pairs, optionally only the closed ones
    pub fn edge_pairs(&self, only_closed: bool) -> Vec<(String, String)> {
        let state = self.state.read();
        state
            .graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| !only_closed || e.closed)
            .map(|(id, _)| {
                let (from, to) = state.graph.edge_endpoints(id as u32);
                (from.to_string(), to.to_string())
            })
            .collect()
    }

    /// Run `f` against a consistent view of the graph and hierarchy
    pub fn with_state<R>(&self, f: impl FnOnce(&RouterState) -> R) -> R {
        f(&self.state.read())
    }
}
