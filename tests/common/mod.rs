#![allow(dead_code)]

use bevy_math::DVec2;
use roadnet_gen::systems::network::collision::ExclusionIndex;
use roadnet_gen::systems::network::poly::utils::polyline_length;
use roadnet_gen::{Building, Params, RoadNetwork, Settlement};

pub fn metric_params() -> Params {
    Params { meters_per_unit: 1.0, ..Params::default() }
}

pub fn square(index: usize, center: DVec2, half: f64) -> Building {
    let footprint = vec![
        center + DVec2::new(-half, -half),
        center + DVec2::new(half, -half),
        center + DVec2::new(half, half),
        center + DVec2::new(-half, half),
    ];
    Building::from_footprint(index, footprint).unwrap()
}

// `cols x rows` squares at `pitch` meters, lower left centroid at `origin`
pub fn lattice(origin: DVec2, cols: usize, rows: usize, pitch: f64, half: f64, first_index: usize) -> Vec<Building> {
    let mut buildings = Vec::new();
    for j in 0..rows {
        for i in 0..cols {
            let center = origin + DVec2::new(i as f64, j as f64) * pitch;
            buildings.push(square(first_index + buildings.len(), center, half));
        }
    }
    buildings
}

pub fn triangle_village() -> Settlement {
    Settlement::new(
        "Threeoaks",
        vec![
            square(0, DVec2::new(0.0, 0.0), 4.0),
            square(1, DVec2::new(50.0, 0.0), 4.0),
            square(2, DVec2::new(25.0, 43.0), 4.0),
        ],
    )
}

pub fn twin_hamlets() -> Settlement {
    let mut buildings = lattice(DVec2::ZERO, 6, 5, 60.0, 4.0, 0);
    buildings.extend(lattice(DVec2::new(1000.0, 0.0), 6, 5, 60.0, 4.0, 30));
    Settlement::new("Twinford", buildings)
}

/// Panics with a description of the first violated network invariant
pub fn assert_network_invariants(settlement: &Settlement, network: &RoadNetwork, params: &Params) {
    let zones = ExclusionIndex::new(&settlement.buildings, params.units(params.exclusion_margin));
    let min_len = params.units(params.min_segment_length);
    let tolerance = params.quantum();

    for road in &network.roads {
        assert!(road.points.len() >= 2, "{} has fewer than two points", road.id);
        assert!(!zones.intersects_polyline(&road.points), "{} crosses an exclusion zone", road.id);
        assert!(polyline_length(&road.points) >= min_len, "{} is shorter than the minimum", road.id);
        for end in [road.points[0], road.points[road.points.len() - 1]] {
            assert!(network.boundary.contains(end, tolerance), "{} ends outside the boundary", road.id);
        }
        assert!(road.tier.importance_range().contains(&road.importance), "{} importance out of tier range", road.id);
        assert_eq!(road.width, road.tier.width());
    }

    let report = &network.report;
    assert!(
        report.components_after_repair == 1 || !report.remainders.is_empty(),
        "disconnected network without remainders"
    );
}
