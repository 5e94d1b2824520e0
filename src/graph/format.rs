//! JSON graph definition
//!
//! ```json
//! {
//!   "nodes": [{ "id": "A", "lat": 20.88, "lon": -156.68, "label": "Front St" }],
//!   "edges": [{ "from": "A", "to": "B", "weight": 100.0, "bidirectional": false }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::GraphStore;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub from: String,
    pub to: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub closed: bool,
    /// Also add the reverse edge with the same weight and state
    #[serde(default, skip_serializing_if = "is_false")]
    pub bidirectional: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
}

impl GraphDefinition {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let definition = serde_json::from_reader(BufReader::new(file))?;
        Ok(definition)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Build a graph store, validating every reference and weight
    pub fn build(&self) -> Result<GraphStore> {
        let mut graph = GraphStore::new();
        for node in &self.nodes {
            graph.add_node(&node.id, node.lat, node.lon, &node.label)?;
        }
        for edge in &self.edges {
            graph.add_edge(&edge.from, &edge.to, edge.weight)?;
            if edge.closed {
                graph.set_closed(&edge.from, &edge.to, true)?;
            }
            if edge.bidirectional {
                graph.add_edge(&edge.to, &edge.from, edge.weight)?;
                if edge.closed {
                    graph.set_closed(&edge.to, &edge.from, true)?;
                }
            }
        }
        Ok(graph)
    }

    /// Snapshot a graph store, one directed edge per entry
    pub fn from_graph(graph: &GraphStore) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| NodeDef {
                id: n.id.clone(),
                lat: n.lat,
                lon: n.lon,
                label: n.label.clone(),
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|e| EdgeDef {
                from: graph.node(e.from).id.clone(),
                to: graph.node(e.to).id.clone(),
                weight: e.weight,
                closed: e.closed,
                bidirectional: false,
            })
            .collect();
        Self { nodes, edges }
    }
}
