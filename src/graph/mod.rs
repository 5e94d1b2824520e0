//! Graph Store: road-segment nodes and directed edges with open/closed state
//!
//! Nodes are addressed externally by string id and internally by a dense
//! [`NodeIdx`]. Edges live in an arena indexed by [`EdgeId`]; an undirected road
//! is two directed edges. The closed flag is stored here and nowhere else, so a
//! toggle is visible to the next search that runs.

pub mod demo;
pub mod format;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

pub type NodeIdx = u32;
pub type EdgeId = u32;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two nodes in metres
pub fn haversine_m(a: &Node, b: &Node) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// A road node. Coordinates are informational (display, export), never used for routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

/// A directed road segment
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: NodeIdx,
    pub to: NodeIdx,
    pub weight: f64,
    pub closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    node_map: FxHashMap<String, NodeIdx>,
    edges: Vec<Edge>,
    edge_map: FxHashMap<(NodeIdx, NodeIdx), EdgeId>,
    out_edges: Vec<Vec<EdgeId>>,
    in_edges: Vec<Vec<EdgeId>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str, lat: f64, lon: f64, label: &str) -> Result<NodeIdx> {
        if self.node_map.contains_key(id) {
            return Err(Error::DuplicateNode(id.to_string()));
        }
        let idx = self.nodes.len() as NodeIdx;
        self.nodes.push(Node {
            id: id.to_string(),
            lat,
            lon,
            label: label.to_string(),
        });
        self.node_map.insert(id.to_string(), idx);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        Ok(idx)
    }

    /// Add a directed edge between two known nodes
    pub fn add_edge(&mut self, from: &str, to: &str, weight: f64) -> Result<EdgeId> {
        let u = self.resolve(from)?;
        let v = self.resolve(to)?;

        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight {
                from: from.to_string(),
                to: to.to_string(),
                weight,
            });
        }
        if self.edge_map.contains_key(&(u, v)) {
            return Err(Error::DuplicateEdge {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let edge_id = self.edges.len() as EdgeId;
        self.edges.push(Edge {
            from: u,
            to: v,
            weight,
            closed: false,
        });
        self.edge_map.insert((u, v), edge_id);
        self.out_edges[u as usize].push(edge_id);
        self.in_edges[v as usize].push(edge_id);
        Ok(edge_id)
    }

    /// Add an undirected road as two directed edges
    pub fn add_road(&mut self, a: &str, b: &str, weight: f64) -> Result<(EdgeId, EdgeId)> {
        let forward = self.add_edge(a, b, weight)?;
        let backward = self.add_edge(b, a, weight)?;
        Ok((forward, backward))
    }

    /// Set the closed flag of the edge `from -> to`.
    ///
    /// Returns `true` when the state actually changed.
    pub fn set_closed(&mut self, from: &str, to: &str, closed: bool) -> Result<bool> {
        let edge_id = self.edge_id(from, to)?;
        Ok(self.set_closed_by_id(edge_id, closed))
    }

    pub(crate) fn set_closed_by_id(&mut self, edge_id: EdgeId, closed: bool) -> bool {
        let edge = &mut self.edges[edge_id as usize];
        if edge.closed == closed {
            return false;
        }
        edge.closed = closed;
        true
    }

    /// Resolve an external node id
    pub fn resolve(&self, id: &str) -> Result<NodeIdx> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| Error::InvalidReference(id.to_string()))
    }

    /// Resolve the edge `from -> to`
    pub fn edge_id(&self, from: &str, to: &str) -> Result<EdgeId> {
        let u = self.resolve(from)?;
        let v = self.resolve(to)?;
        self.find_edge(u, v).ok_or_else(|| Error::UnknownEdge {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn find_edge(&self, from: NodeIdx, to: NodeIdx) -> Option<EdgeId> {
        self.edge_map.get(&(from, to)).copied()
    }

    /// Open outgoing edges of `node`, for traversals that must respect closures
    pub fn neighbors(&self, node: NodeIdx) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.all_neighbors(node).filter(|(_, e)| !e.closed)
    }

    /// Every outgoing edge of `node`, open or closed
    pub fn all_neighbors(&self, node: NodeIdx) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.out_edges[node as usize]
            .iter()
            .map(move |&id| (id, &self.edges[id as usize]))
    }

    /// Every incoming edge of `node`, open or closed
    pub fn all_incoming(&self, node: NodeIdx) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.in_edges[node as usize]
            .iter()
            .map(move |&id| (id, &self.edges[id as usize]))
    }

    #[inline]
    pub fn edge(&self, edge_id: EdgeId) -> &Edge {
        &self.edges[edge_id as usize]
    }

    #[inline]
    pub fn is_closed(&self, edge_id: EdgeId) -> bool {
        self.edges[edge_id as usize].closed
    }

    #[inline]
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn closed_count(&self) -> usize {
        self.edges.iter().filter(|e| e.closed).count()
    }

    /// External ids of the edge's endpoints
    pub fn edge_endpoints(&self, edge_id: EdgeId) -> (&str, &str) {
        let edge = self.edge(edge_id);
        (&self.node(edge.from).id, &self.node(edge.to).id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let node = |lat: f64| Node {
            id: String::new(),
            lat,
            lon: 0.0,
            label: String::new(),
        };
        let d = haversine_m(&node(0.0), &node(1.0));
        assert!((d - 111_195.0).abs() < 10.0, "{}", d);
        assert_eq!(haversine_m(&node(5.0), &node(5.0)), 0.0);
    }

    fn triangle() -> GraphStore {
        let mut graph = GraphStore::new();
        for id in ["A", "B", "C"] {
            graph.add_node(id, 0.0, 0.0, id).unwrap();
        }
        graph.add_edge("A", "B", 1.0).unwrap();
        graph.add_edge("B", "C", 2.0).unwrap();
        graph.add_edge("A", "C", 5.0).unwrap();
        graph
    }

    #[test]
    fn test_add_edge_unknown_node() {
        let mut graph = triangle();
        let err = graph.add_edge("A", "Z", 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidReference(ref id) if id == "Z"));
    }

    #[test]
    fn test_add_edge_rejects_bad_weights_and_duplicates() {
        let mut graph = triangle();
        assert!(matches!(graph.add_edge("B", "A", -1.0), Err(Error::InvalidWeight { .. })));
        assert!(matches!(graph.add_edge("B", "A", f64::NAN), Err(Error::InvalidWeight { .. })));
        assert!(matches!(graph.add_edge("A", "B", 3.0), Err(Error::DuplicateEdge { .. })));
        assert!(graph.add_edge("B", "A", 0.0).is_ok());
    }

    #[test]
    fn test_neighbors_filter_closed_edges() {
        let mut graph = triangle();
        let a = graph.resolve("A").unwrap();
        assert_eq!(graph.neighbors(a).count(), 2);

        assert!(graph.set_closed("A", "B", true).unwrap());
        let open: Vec<NodeIdx> = graph.neighbors(a).map(|(_, e)| e.to).collect();
        assert_eq!(open, vec![graph.resolve("C").unwrap()]);
        assert_eq!(graph.all_neighbors(a).count(), 2);
        assert_eq!(graph.closed_count(), 1);
    }

    #[test]
    fn test_set_closed_is_idempotent() {
        let mut graph = triangle();
        assert!(graph.set_closed("B", "C", true).unwrap());
        assert!(!graph.set_closed("B", "C", true).unwrap());
        assert!(graph.set_closed("B", "C", false).unwrap());
        assert!(!graph.set_closed("B", "C", false).unwrap());
    }

    #[test]
    fn test_set_closed_unknown_edge() {
        let mut graph = triangle();
        let err = graph.set_closed("C", "A", true).unwrap_err();
        assert!(matches!(err, Error::UnknownEdge { .. }));
        assert!(err.is_invalid_reference());
    }

    #[test]
    fn test_add_road_creates_both_directions() {
        let mut graph = triangle();
        graph.add_node("D", 0.0, 0.0, "D").unwrap();
        let (fwd, bwd) = graph.add_road("C", "D", 4.0).unwrap();
        assert_eq!(graph.edge_endpoints(fwd), ("C", "D"));
        assert_eq!(graph.edge_endpoints(bwd), ("D", "C"));
        assert_eq!(graph.edge_count(), 5);
    }
}
