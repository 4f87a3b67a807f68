use std::collections::BTreeSet;

use bevy_math::DVec2;
use log::{debug, info};
use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::RoadGenError;
use super::graph::NetworkGraph;
use super::poly::point_gen::sample_perimeter;
use super::settlement::Building;
use super::{GenerationContext, Segment, SegmentRole};

#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub segments: Vec<Segment>,
    pub routes_found: usize,
    pub pairs_failed: usize,
}

/// Picks gateways and points of interest, then promotes their shortest routes
pub fn plan_routes(segments: Vec<Segment>, ctx: &GenerationContext) -> RouteOutcome {
    let params = ctx.params;
    let gateways = sample_perimeter(&ctx.boundary.polygon, params.max_gateways);
    let pois: Vec<DVec2> = select_pois(ctx.buildings, params.max_pois, params.seed)
        .into_iter()
        .map(|idx| ctx.buildings[idx].centroid)
        .collect();
    info!("routing {} gateways to {} points of interest", gateways.len(), pois.len());
    route_between(segments, &gateways, &pois, params.quantum())
}

/// Up to `count` buildings sampled without replacement, weighted by importance
pub fn select_pois(buildings: &[Building], count: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let indices: Vec<usize> = (0..buildings.len()).collect();
    let mut chosen: Vec<usize> = indices
        .choose_multiple_weighted(&mut rng, count.min(buildings.len()), |&i| buildings[i].importance.max(1) as f64)
        .map(|picked| picked.copied().collect())
        .unwrap_or_default();
    chosen.sort_unstable();
    chosen
}

/// A* over the candidate graph for every (gateway, poi) pair.
/// Candidate edges on a found route become `Route` segments; missing paths are counted and skipped.
pub fn route_between(mut segments: Vec<Segment>, gateways: &[DVec2], pois: &[DVec2], quantum: f64) -> RouteOutcome {
    let graph = NetworkGraph::build(&segments, quantum);
    let mut outcome = RouteOutcome { segments: Vec::new(), routes_found: 0, pairs_failed: 0 };
    if graph.nodes.is_empty() {
        outcome.pairs_failed = gateways.len() * pois.len();
        outcome.segments = segments;
        return outcome;
    }

    let tree = graph.node_tree();
    let snap = |p: &DVec2| tree.nearest_neighbor(&[p.x, p.y]).map(|entry| NodeIndex::new(entry.data));
    let pg = graph.to_petgraph();

    let mut on_route: BTreeSet<usize> = BTreeSet::new();
    for (gateway_idx, gateway) in gateways.iter().enumerate() {
        let Some(start) = snap(gateway) else { continue };
        for (poi_idx, poi) in pois.iter().enumerate() {
            let Some(goal) = snap(poi) else { continue };
            let goal_pos = pg[goal];

            let found = astar(
                &pg,
                start,
                |n| n == goal,
                |e| e.weight().0,
                |n| pg[n].distance(goal_pos),
            );

            let Some((_, path)) = found else {
                outcome.pairs_failed += 1;
                debug!("{}", RoadGenError::NoPathFound { gateway: gateway_idx, poi: poi_idx });
                continue;
            };

            outcome.routes_found += 1;
            for w in path.windows(2) {
                // shortest of any parallel edges
                let best = pg
                    .edges_connecting(w[0], w[1])
                    .min_by(|x, y| x.weight().0.total_cmp(&y.weight().0).then(x.weight().1.cmp(&y.weight().1)));
                if let Some(edge) = best {
                    on_route.insert(edge.weight().1);
                }
            }
        }
    }

    for &segment_idx in &on_route {
        segments[segment_idx].role = SegmentRole::Route;
    }
    debug!("{} segments promoted to routes", on_route.len());

    outcome.segments = segments;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ax: f64, ay: f64, bx: f64, by: f64) -> Segment {
        Segment::line(DVec2::new(ax, ay), DVec2::new(bx, by), SegmentRole::Street)
    }

    #[test]
    fn test_route_follows_shorter_side_of_square() {
        // square 0..100 with a detour on the top side
        let segments = vec![
            line(0.0, 0.0, 100.0, 0.0),
            line(100.0, 0.0, 100.0, 100.0),
            line(0.0, 0.0, 0.0, 100.0),
            line(0.0, 100.0, 50.0, 180.0),
            line(50.0, 180.0, 100.0, 100.0),
        ];
        let outcome = route_between(segments, &[DVec2::new(-5.0, -5.0)], &[DVec2::new(101.0, 99.0)], 0.01);
        assert_eq!(outcome.routes_found, 1);
        assert_eq!(outcome.pairs_failed, 0);
        let roles: Vec<SegmentRole> = outcome.segments.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![
                SegmentRole::Route,
                SegmentRole::Route,
                SegmentRole::Street,
                SegmentRole::Street,
                SegmentRole::Street,
            ]
        );
    }

    #[test]
    fn test_disconnected_pair_is_counted() {
        let segments = vec![line(0.0, 0.0, 10.0, 0.0), line(50.0, 0.0, 60.0, 0.0)];
        let outcome = route_between(segments, &[DVec2::new(0.0, 0.0)], &[DVec2::new(60.0, 1.0)], 0.01);
        assert_eq!(outcome.routes_found, 0);
        assert_eq!(outcome.pairs_failed, 1);
        assert!(outcome.segments.iter().all(|s| s.role == SegmentRole::Street));
    }

    #[test]
    fn test_poi_selection_is_seeded() {
        let buildings: Vec<Building> = (0..20)
            .map(|i| {
                let c = DVec2::new(i as f64 * 20.0, 0.0);
                Building::from_footprint(i, vec![c, c + DVec2::new(5.0, 0.0), c + DVec2::new(5.0, 5.0)])
                    .unwrap()
                    .with_importance(if i % 5 == 0 { 10 } else { 2 })
            })
            .collect();
        let first = select_pois(&buildings, 8, 42);
        let second = select_pois(&buildings, 8, 42);
        assert_eq!(first.len(), 8);
        assert_eq!(first, second);
        assert_eq!(select_pois(&buildings[..3], 8, 42), vec![0, 1, 2]);
    }
}
