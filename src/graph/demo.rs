//! Bundled demo network: a small slice of Lahaina, Maui
//!
//! Edges are one-way, as in the field demo this network comes from. The main
//! corridor is A -> B -> C -> D -> E -> F (460 in total) with side streets to
//! the wharf (G, H), Waine'e St (I) and Napili Bay (J).

use super::GraphStore;

const NODES: &[(&str, f64, f64, &str)] = &[
    ("A", 20.8849, -156.6856, "Front St & Papalaua"),
    ("B", 20.8855, -156.6848, "Front St & Dickenson"),
    ("C", 20.8861, -156.6839, "Front St & Prison St"),
    ("D", 20.8867, -156.6821, "Honoapi'ilani Hwy"),
    ("E", 20.8873, -156.6803, "Hwy 30 & Kai Hele Ku"),
    ("F", 20.8880, -156.6785, "Hwy 30 North Exit"),
    ("G", 20.8840, -156.6865, "Cannery Mall"),
    ("H", 20.8830, -156.6875, "Mala Wharf"),
    ("I", 20.8870, -156.6790, "Waine'e St"),
    ("J", 20.8890, -156.6770, "Napili Bay"),
];

const EDGES: &[(&str, &str, f64)] = &[
    ("A", "B", 100.0),
    ("B", "C", 80.0),
    ("C", "D", 120.0),
    ("D", "E", 90.0),
    ("E", "F", 70.0),
    ("A", "G", 50.0),
    ("G", "H", 60.0),
    ("C", "I", 40.0),
    ("E", "J", 100.0),
];

/// Build the demo graph
pub fn lahaina() -> GraphStore {
    let mut graph = GraphStore::new();
    for &(id, lat, lon, label) in NODES {
        // Static table: ids are unique and edges reference known nodes
        if let Err(e) = graph.add_node(id, lat, lon, label) {
            unreachable!("demo node table is inconsistent: {e}");
        }
    }
    for &(from, to, weight) in EDGES {
        if let Err(e) = graph.add_edge(from, to, weight) {
            unreachable!("demo edge table is inconsistent: {e}");
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lahaina_shape() {
        let graph = lahaina();
        assert_eq!(graph.node_count(), 10);
        assert_eq!(graph.edge_count(), 9);
        assert_eq!(graph.closed_count(), 0);
        assert_eq!(graph.node(graph.resolve("F").unwrap()).label, "Hwy 30 North Exit");
    }
}
