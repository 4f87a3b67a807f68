use std::collections::HashMap;

use bevy_math::DVec2;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use super::{Segment, SegmentRole};

/// Quantized coordinate used as node identity
pub type NodeKey = (i64, i64);

pub type NodeEntry = GeomWithData<[f64; 2], usize>;

pub fn node_key(p: DVec2, quantum: f64) -> NodeKey {
    ((p.x / quantum).round() as i64, (p.y / quantum).round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    pub a: usize,
    pub b: usize,
    pub length: f64,
    pub segment: usize,
}

/// Nodes are distinct segment endpoints, edges are whole segments.
/// Rebuilt from scratch whenever the segment set changes.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    pub nodes: Vec<DVec2>,
    pub edges: Vec<GraphEdge>,
    index: HashMap<NodeKey, usize>,
    quantum: f64,
}

impl NetworkGraph {
    pub fn build(segments: &[Segment], quantum: f64) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::with_capacity(segments.len()),
            index: HashMap::new(),
            quantum,
        };

        for (segment_idx, segment) in segments.iter().enumerate() {
            if segment.points.len() < 2 {
                continue;
            }
            let a = graph.insert_node(segment.start());
            let b = graph.insert_node(segment.end());
            graph.edges.push(GraphEdge { a, b, length: segment.length(), segment: segment_idx });
        }

        graph
    }

    // first position seen wins
    fn insert_node(&mut self, p: DVec2) -> usize {
        let key = node_key(p, self.quantum);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(p);
        self.index.insert(key, idx);
        idx
    }

    pub fn node_of(&self, p: DVec2) -> Option<usize> {
        self.index.get(&node_key(p, self.quantum)).copied()
    }

    /// Edge indices incident to every node, a self loop appears twice
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        for (edge_idx, edge) in self.edges.iter().enumerate() {
            adjacency[edge.a].push(edge_idx);
            adjacency[edge.b].push(edge_idx);
        }
        adjacency
    }

    /// Connected components ordered by size (largest first), then by smallest node index.
    /// Node lists are sorted ascending.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut union_find = UnionFind::<usize>::new(self.nodes.len());
        for edge in &self.edges {
            union_find.union(edge.a, edge.b);
        }

        let labels = union_find.into_labeling();
        let mut by_label: HashMap<usize, Vec<usize>> = HashMap::new();
        for (node, label) in labels.into_iter().enumerate() {
            by_label.entry(label).or_default().push(node);
        }

        let mut components: Vec<Vec<usize>> = by_label.into_values().collect();
        components.sort_by(|x, y| y.len().cmp(&x.len()).then(x[0].cmp(&y[0])));
        components
    }

    /// Weighted undirected copy for path search, edge weights are (length, segment index)
    pub fn to_petgraph(&self) -> UnGraph<DVec2, (f64, usize)> {
        let mut graph = UnGraph::with_capacity(self.nodes.len(), self.edges.len());
        let handles: Vec<_> = self.nodes.iter().map(|p| graph.add_node(*p)).collect();
        for edge in &self.edges {
            graph.add_edge(handles[edge.a], handles[edge.b], (edge.length, edge.segment));
        }
        graph
    }

    pub fn node_tree(&self) -> RTree<NodeEntry> {
        node_tree_of(self.nodes.iter().copied().enumerate())
    }
}

pub fn node_tree_of(nodes: impl Iterator<Item = (usize, DVec2)>) -> RTree<NodeEntry> {
    RTree::bulk_load(nodes.map(|(idx, p)| GeomWithData::new([p.x, p.y], idx)).collect())
}

/// Joins segments meeting at degree-2 nodes into longer polylines.
/// Only segments of the same role without an owning building are joined.
pub fn merge_chains(segments: Vec<Segment>, quantum: f64) -> Vec<Segment> {
    let graph = NetworkGraph::build(&segments, quantum);
    let adjacency = graph.adjacency();

    let joinable = |node: usize, role: SegmentRole| {
        let incident = &adjacency[node];
        incident.len() == 2
            && incident[0] != incident[1]
            && incident.iter().all(|&e| {
                let s = &segments[graph.edges[e].segment];
                s.role == role && s.building.is_none()
            })
    };

    let mut used = vec![false; graph.edges.len()];
    let mut merged = Vec::with_capacity(segments.len());

    for start in 0..graph.edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let first = &segments[graph.edges[start].segment];
        if first.building.is_some() {
            merged.push(first.clone());
            continue;
        }
        let role = first.role;
        let mut points = first.points.clone();

        // forward from the end node, then backward from the start node
        for forward in [true, false] {
            let mut edge = start;
            let mut node = if forward { graph.edges[start].b } else { graph.edges[start].a };
            while joinable(node, role) {
                let next = if adjacency[node][0] == edge { adjacency[node][1] } else { adjacency[node][0] };
                if used[next] {
                    break;
                }
                used[next] = true;

                let next_edge = graph.edges[next];
                let mut piece = segments[next_edge.segment].points.clone();
                let far = if next_edge.a == node { next_edge.b } else { piece.reverse(); next_edge.a };

                if forward {
                    points.extend(piece.into_iter().skip(1));
                } else {
                    piece.reverse();
                    piece.pop();
                    piece.extend(points);
                    points = piece;
                }
                edge = next;
                node = far;
            }
        }

        merged.push(Segment { points, role, building: None });
    }

    merged
}
