use std::collections::HashSet;

use bevy_math::DVec2;
use log::debug;

use super::graph::NetworkGraph;
use super::poly::utils::closest_point_on_polygon_boundary;
use super::{GenerationContext, Segment, SegmentRole};

#[derive(Debug, Clone, Default)]
pub struct AccessOutcome {
    pub roads: Vec<Segment>,
    pub unconnected: Vec<usize>,
}

/// Connects every building without its own segment to a nearby network node.
/// Connectors start where the straight line to the node leaves the building's zone.
pub fn synthesize_access_roads(segments: &[Segment], ctx: &GenerationContext) -> AccessOutcome {
    let params = ctx.params;
    let graph = NetworkGraph::build(segments, params.quantum());
    let tree = graph.node_tree();

    let owned: HashSet<usize> = segments.iter().filter_map(|s| s.building).collect();
    let min_len = params.units(params.min_segment_length);
    let max_len = params.units(params.max_access_distance);

    let mut outcome = AccessOutcome::default();
    for (idx, building) in ctx.buildings.iter().enumerate() {
        if owned.contains(&idx) {
            continue;
        }

        let connector = tree
            .nearest_neighbor_iter(&[building.centroid.x, building.centroid.y])
            .take(params.access_candidates)
            .find_map(|entry| {
                let node = graph.nodes[entry.data];
                access_connector(ctx, idx, node, min_len, max_len)
            });

        match connector {
            Some((start, node)) => {
                outcome.roads.push(Segment {
                    points: vec![start, node],
                    role: SegmentRole::Access,
                    building: Some(idx),
                });
            }
            None => outcome.unconnected.push(idx),
        }
    }

    debug!("{} access roads, {} buildings left unconnected", outcome.roads.len(), outcome.unconnected.len());
    outcome
}

// straight connector from the zone edge of `building` to `node`, if it is acceptable
fn access_connector(ctx: &GenerationContext, building: usize, node: DVec2, min_len: f64, max_len: f64) -> Option<(DVec2, DVec2)> {
    let footprint = &ctx.buildings[building].footprint;
    let door = closest_point_on_polygon_boundary(node, footprint);
    if door.distance(node) > max_len {
        return None;
    }

    let exit = ctx.zones.zone_exit(door, node, building);
    if exit >= 1.0 {
        return None; // node sits inside the building's own zone
    }
    let start = door + (node - door) * exit;

    let length = start.distance(node);
    if length < min_len || length > max_len {
        return None;
    }
    if !ctx.boundary.contains(start, ctx.params.quantum()) {
        return None;
    }
    if ctx.zones.intersects_segment(start, node) {
        return None;
    }
    Some((start, node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::network::boundary::derive_boundary;
    use crate::systems::network::collision::ExclusionIndex;
    use crate::systems::network::settlement::Building;
    use crate::systems::network::Params;

    fn square_building(index: usize, center: DVec2, half: f64) -> Building {
        let footprint = vec![
            center + DVec2::new(-half, -half),
            center + DVec2::new(half, -half),
            center + DVec2::new(half, half),
            center + DVec2::new(-half, half),
        ];
        Building::from_footprint(index, footprint).unwrap()
    }

    #[test]
    fn test_access_road_starts_at_zone_edge() {
        let params = Params { meters_per_unit: 1.0, ..Params::default() };
        let buildings = vec![
            square_building(0, DVec2::new(0.0, 0.0), 4.0),
            square_building(1, DVec2::new(0.0, 80.0), 4.0),
        ];
        let boundary = derive_boundary(&buildings, &params).unwrap();
        let zones = ExclusionIndex::new(&buildings, params.units(params.exclusion_margin));
        let ctx = GenerationContext { buildings: &buildings, boundary: &boundary, zones: &zones, params: &params };

        // a street east of both buildings
        let street = vec![Segment::line(DVec2::new(40.0, -20.0), DVec2::new(40.0, 100.0), SegmentRole::Street)];
        let outcome = synthesize_access_roads(&street, &ctx);

        assert_eq!(outcome.roads.len(), 2);
        assert!(outcome.unconnected.is_empty());
        for road in &outcome.roads {
            assert_eq!(road.role, SegmentRole::Access);
            assert!(!zones.intersects_polyline(&road.points));
            let owner = &buildings[road.building.unwrap()];
            let gap = crate::systems::network::poly::utils::polygon_boundary_distance(road.start(), &owner.footprint);
            assert!((gap - 5.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_building_out_of_reach_stays_unconnected() {
        let params = Params { meters_per_unit: 1.0, max_access_distance: 20.0, ..Params::default() };
        let buildings = vec![square_building(0, DVec2::new(0.0, 0.0), 4.0)];
        let boundary = derive_boundary(&buildings, &params).unwrap();
        let zones = ExclusionIndex::new(&buildings, params.units(params.exclusion_margin));
        let ctx = GenerationContext { buildings: &buildings, boundary: &boundary, zones: &zones, params: &params };

        let street = vec![Segment::line(DVec2::new(100.0, -20.0), DVec2::new(100.0, 20.0), SegmentRole::Street)];
        let outcome = synthesize_access_roads(&street, &ctx);
        assert!(outcome.roads.is_empty());
        assert_eq!(outcome.unconnected, vec![0]);
    }
}
