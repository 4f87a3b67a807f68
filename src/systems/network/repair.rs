use bevy_math::DVec2;
use log::{debug, info, warn};

use crate::error::RoadGenError;
use super::collision::ExclusionIndex;
use super::graph::{node_tree_of, NetworkGraph};
use super::{Params, RemainderReport, Segment, SegmentRole};

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub segments: Vec<Segment>,
    pub components_before: usize,
    pub components_after: usize,
    pub bridges_added: usize,
    pub remainders: Vec<RemainderReport>,
}

/// Bridges every component to the dominant one with the shortest collision-free link.
///
/// Each round rebuilds the graph and bridges the first component (size descending, then smallest
/// node index) that has a usable link. Ties between links break on (distance, component node,
/// dominant node). Components with no usable link are reported, never removed.
pub fn repair_connectivity(mut segments: Vec<Segment>, zones: &ExclusionIndex, params: &Params) -> RepairOutcome {
    let quantum = params.quantum();
    let min_len = params.units(params.min_segment_length);
    let max_len = params.units(params.max_bridge_length);

    let components_before = NetworkGraph::build(&segments, quantum).components().len();
    let mut bridges_added = 0;

    loop {
        let graph = NetworkGraph::build(&segments, quantum);
        let components = graph.components();
        if components.len() <= 1 {
            break;
        }

        let dominant = node_tree_of(components[0].iter().map(|&n| (n, graph.nodes[n])));
        let bridge = components[1..]
            .iter()
            .find_map(|component| shortest_link(&graph, component, &dominant, zones, params.bridge_candidates, min_len, max_len));

        match bridge {
            Some((a, b)) => {
                debug!("bridging {:?} -> {:?}", a, b);
                segments.push(Segment::line(a, b, SegmentRole::Bridge));
                bridges_added += 1;
            }
            None => break,
        }
    }

    let graph = NetworkGraph::build(&segments, quantum);
    let components = graph.components();
    let mut remainders = Vec::new();
    for component in components.iter().skip(1) {
        let edges = graph
            .edges
            .iter()
            .filter(|e| component.binary_search(&e.a).is_ok())
            .count();
        warn!(
            "{}",
            RoadGenError::DisconnectedRemainder { nodes: component.len(), max_bridge_m: params.max_bridge_length }
        );
        remainders.push(RemainderReport { nodes: component.len(), segments: edges });
    }

    if bridges_added > 0 {
        info!("connectivity repair: {} components, {} bridges added", components_before, bridges_added);
    }

    RepairOutcome {
        segments,
        components_before,
        components_after: components.len(),
        bridges_added,
        remainders,
    }
}

// shortest acceptable link from a component node to a dominant node
fn shortest_link(
    graph: &NetworkGraph,
    component: &[usize],
    dominant: &rstar::RTree<super::graph::NodeEntry>,
    zones: &ExclusionIndex,
    per_node: usize,
    min_len: f64,
    max_len: f64,
) -> Option<(DVec2, DVec2)> {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for &n in component {
        let p = graph.nodes[n];
        for entry in dominant.nearest_neighbor_iter(&[p.x, p.y]).take(per_node) {
            let q = graph.nodes[entry.data];
            let d = p.distance(q);
            if d > max_len {
                break;
            }
            if d >= min_len {
                candidates.push((d, n, entry.data));
            }
        }
    }

    candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
    candidates
        .into_iter()
        .map(|(_, n, m)| (graph.nodes[n], graph.nodes[m]))
        .find(|(a, b)| !zones.intersects_segment(*a, *b))
}
