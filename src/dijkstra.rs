//! Dijkstra Engine: exact baseline search over the live graph
//!
//! Closed edges are skipped, equal keys pop in insertion order, and the search
//! stops as soon as the target is settled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::graph::{EdgeId, GraphStore, NodeIdx};
use crate::route::{Engine, RouteResult};

/// Frontier entry keyed by tentative cost, ties broken by insertion sequence
#[derive(Clone, Copy, Debug)]
pub(crate) struct HeapEntry {
    pub cost: f64,
    pub seq: u64,
    pub node: NodeIdx,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: reverse ordering on (cost, seq)
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap with a monotone insertion counter
#[derive(Debug, Default)]
pub(crate) struct Frontier {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

impl Frontier {
    pub fn push(&mut self, node: NodeIdx, cost: f64) {
        self.heap.push(HeapEntry { cost, seq: self.next_seq, node });
        self.next_seq += 1;
    }

    pub fn pop(&mut self) -> Option<HeapEntry> {
        self.heap.pop()
    }

    pub fn min_key(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.cost)
    }
}

/// Shortest path from `start` to `target` over open edges
pub fn shortest_path(graph: &GraphStore, start: NodeIdx, target: NodeIdx) -> RouteResult {
    let timer = Instant::now();
    let n = graph.node_count();

    let mut dist = vec![f64::INFINITY; n];
    let mut parent: Vec<Option<EdgeId>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut frontier = Frontier::default();

    dist[start as usize] = 0.0;
    frontier.push(start, 0.0);

    let mut nodes_explored = 0usize;
    let mut reached = false;

    while let Some(HeapEntry { cost, node, .. }) = frontier.pop() {
        if settled[node as usize] || cost > dist[node as usize] {
            continue; // Stale entry
        }
        settled[node as usize] = true;
        nodes_explored += 1;

        if node == target {
            reached = true;
            break;
        }

        for (edge_id, edge) in graph.neighbors(node) {
            let next = edge.to as usize;
            if settled[next] {
                continue;
            }
            let new_cost = cost + edge.weight;
            if new_cost < dist[next] {
                dist[next] = new_cost;
                parent[next] = Some(edge_id);
                frontier.push(edge.to, new_cost);
            }
        }
    }

    let elapsed_us = timer.elapsed().as_micros() as u64;
    if !reached {
        return RouteResult::not_found(Engine::Dijkstra, nodes_explored, elapsed_us);
    }

    let edges = reconstruct_edges(graph, &parent, start, target);
    RouteResult::from_edges(
        Engine::Dijkstra,
        graph,
        start,
        &edges,
        dist[target as usize],
        nodes_explored,
        elapsed_us,
    )
}

/// Walk parent edges back from `target` to `start`
fn reconstruct_edges(
    graph: &GraphStore,
    parent: &[Option<EdgeId>],
    start: NodeIdx,
    target: NodeIdx,
) -> Vec<EdgeId> {
    let mut edges = Vec::new();
    let mut current = target;
    while current != start {
        match parent[current as usize] {
            Some(edge_id) => {
                edges.push(edge_id);
                current = graph.edge(edge_id).from;
            }
            None => break,
        }
    }
    edges.reverse();
    edges
}

/// Distances from `start` to every node over open edges (unbounded)
pub fn distances_from(graph: &GraphStore, start: NodeIdx) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; graph.node_count()];
    let mut frontier = Frontier::default();
    dist[start as usize] = 0.0;
    frontier.push(start, 0.0);

    while let Some(HeapEntry { cost, node, .. }) = frontier.pop() {
        if cost > dist[node as usize] {
            continue;
        }
        for (_, edge) in graph.neighbors(node) {
            let new_cost = cost + edge.weight;
            if new_cost < dist[edge.to as usize] {
                dist[edge.to as usize] = new_cost;
                frontier.push(edge.to, new_cost);
            }
        }
    }
    dist
}
