//! Route result records produced by both engines

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::graph::{EdgeId, GraphStore};

/// Which engine answered a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Dijkstra,
    Ch,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Dijkstra => write!(f, "dijkstra"),
            Engine::Ch => write!(f, "ch"),
        }
    }
}

/// One engine's answer to one query.
///
/// An unreachable target is not an error: `path` is empty, `cost` is infinite
/// and `valid` is vacuously true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    pub engine: Engine,
    /// External node ids from start to end
    pub path: Vec<String>,
    #[serde(with = "cost_serde")]
    pub cost: f64,
    /// Nodes settled by the search
    pub nodes_explored: usize,
    /// No edge along the path is closed
    pub valid: bool,
    pub elapsed_us: u64,
}

impl RouteResult {
    pub fn not_found(engine: Engine, nodes_explored: usize, elapsed_us: u64) -> Self {
        Self {
            engine,
            path: Vec::new(),
            cost: f64::INFINITY,
            nodes_explored,
            valid: true,
            elapsed_us,
        }
    }

    /// Build a result from the raw edges of a path
    pub fn from_edges(
        engine: Engine,
        graph: &GraphStore,
        start: u32,
        edges: &[EdgeId],
        cost: f64,
        nodes_explored: usize,
        elapsed_us: u64,
    ) -> Self {
        let mut path = Vec::with_capacity(edges.len() + 1);
        path.push(graph.node(start).id.clone());
        for &edge_id in edges {
            path.push(graph.node(graph.edge(edge_id).to).id.clone());
        }
        Self {
            engine,
            path,
            cost,
            nodes_explored,
            valid: path_is_open(graph, edges),
            elapsed_us,
        }
    }

    pub fn found(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Re-check every edge of a path against the live closed flags
pub fn path_is_open(graph: &GraphStore, edges: &[EdgeId]) -> bool {
    edges.iter().all(|&e| !graph.is_closed(e))
}

impl fmt::Display for RouteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.found() {
            return write!(
                f,
                "{:<8} no path ({} nodes explored, {} us)",
                self.engine, self.nodes_explored, self.elapsed_us
            );
        }
        write!(
            f,
            "{:<8} cost {:.1} via {} ({} nodes explored, {} us, {})",
            self.engine,
            self.cost,
            self.path.join(" -> "),
            self.nodes_explored,
            self.elapsed_us,
            if self.valid { "valid" } else { "INVALID: closed edge on path" }
        )
    }
}

/// Both engines' results for the same query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub from: String,
    pub to: String,
    pub dijkstra: RouteResult,
    pub ch: RouteResult,
}

/// Tolerance when comparing costs summed in different orders
pub const COST_EPSILON: f64 = 1e-6;

pub fn costs_agree(a: f64, b: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= COST_EPSILON * a.abs().max(b.abs()).max(1.0)
}

impl Comparison {
    pub fn costs_agree(&self) -> bool {
        costs_agree(self.dijkstra.cost, self.ch.cost)
    }
}

/// JSON has no infinity; unreachable costs serialize as `null`
mod cost_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(cost: &f64, s: S) -> Result<S::Ok, S::Error> {
        if cost.is_finite() {
            s.serialize_f64(*cost)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}
