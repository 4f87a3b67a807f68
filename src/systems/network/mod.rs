// this is the entry point for the road network generation pipeline
use std::collections::BTreeMap;
use std::time::Instant;

use bevy_math::DVec2;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::*;
use crate::error::RoadGenError;
use crate::systems::grid;

pub mod access;
pub mod boundary;
pub mod collision;
pub mod graph;
pub mod hierarchy;
pub mod junction;
pub mod poly;
pub mod repair;
pub mod router;
pub mod settlement;
pub mod strategy;

use boundary::SettlementBoundary;
use collision::ExclusionIndex;
use hierarchy::{ClassifiedRoad, RoadTier};
use settlement::{Building, Settlement};
use strategy::NetworkStrategy;

// my 2d polygon datatype, also used for open polylines
pub type Polygon = Vec<DVec2>;
pub type Polyline = Vec<DVec2>;

// generation parameters, distances in meters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub seed: u64,
    pub meters_per_unit: f64,      // input coordinate scale, 111000 for degrees
    pub strategy: Option<NetworkStrategy>, // overrides the building count policy
    // boundary parameters
    pub boundary_buffer: f64,
    pub circle_radius_factor: f64,
    pub boundary_circle_segments: usize,
    pub buffer_arc_segments: usize,
    // collision parameters
    pub exclusion_margin: f64,
    pub min_segment_length: f64,
    pub node_snap: f64,
    // strategy selection
    pub grid_strategy_max_buildings: usize,
    pub cluster_strategy_max_buildings: usize,
    // grid backbone
    pub grid_spacing_small: f64,
    pub grid_spacing_large: f64,
    pub small_settlement_extent: f64,
    // voronoi parameters
    pub voronoi_boundary_samples: usize,
    pub circumcenter_merge_threshold: f64,
    // density-adaptive junctions
    pub cluster_eps: f64,
    pub cluster_min_samples: usize,
    pub cluster_margin: f64,
    pub junction_spacing_factor: f64,
    pub junction_spacing_min: f64,
    pub junction_spacing_max: f64,
    pub junction_jitter: f64,
    // routing and access
    pub max_gateways: usize,
    pub max_pois: usize,
    pub max_access_distance: f64,
    pub access_candidates: usize,
    // connectivity repair
    pub max_bridge_length: f64,
    pub bridge_candidates: usize,
    // hierarchy
    pub proximity_distance: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            seed: INITIAL_SEED,
            meters_per_unit: METERS_PER_UNIT,
            strategy: None,
            boundary_buffer: BOUNDARY_BUFFER,
            circle_radius_factor: CIRCLE_RADIUS_FACTOR,
            boundary_circle_segments: BOUNDARY_CIRCLE_SEGMENTS,
            buffer_arc_segments: BUFFER_ARC_SEGMENTS,
            exclusion_margin: EXCLUSION_MARGIN,
            min_segment_length: MIN_SEGMENT_LENGTH,
            node_snap: NODE_SNAP,
            grid_strategy_max_buildings: GRID_STRATEGY_MAX_BUILDINGS,
            cluster_strategy_max_buildings: CLUSTER_STRATEGY_MAX_BUILDINGS,
            grid_spacing_small: GRID_SPACING_SMALL,
            grid_spacing_large: GRID_SPACING_LARGE,
            small_settlement_extent: SMALL_SETTLEMENT_EXTENT,
            voronoi_boundary_samples: VORONOI_BOUNDARY_SAMPLES,
            circumcenter_merge_threshold: CIRCUMCENTER_MERGE_THRESHOLD,
            cluster_eps: CLUSTER_EPS,
            cluster_min_samples: CLUSTER_MIN_SAMPLES,
            cluster_margin: CLUSTER_MARGIN,
            junction_spacing_factor: JUNCTION_SPACING_FACTOR,
            junction_spacing_min: JUNCTION_SPACING_MIN,
            junction_spacing_max: JUNCTION_SPACING_MAX,
            junction_jitter: JUNCTION_JITTER,
            max_gateways: MAX_GATEWAYS,
            max_pois: MAX_POIS,
            max_access_distance: MAX_ACCESS_DISTANCE,
            access_candidates: ACCESS_CANDIDATES,
            max_bridge_length: MAX_BRIDGE_LENGTH,
            bridge_candidates: BRIDGE_CANDIDATES,
            proximity_distance: PROXIMITY_DISTANCE,
        }
    }
}

impl Params {
    /// Converts a distance in meters to input coordinate units
    pub fn units(&self, meters: f64) -> f64 {
        meters / self.meters_per_unit
    }

    /// Node snap precision in input units
    pub fn quantum(&self) -> f64 {
        self.units(self.node_snap)
    }
}

/// Which stage produced a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRole {
    Backbone,
    Street,
    ClusterConnector,
    Route,
    Access,
    Bridge,
}

impl SegmentRole {
    pub fn tag(&self) -> &'static str {
        match self {
            SegmentRole::Backbone => "backbone",
            SegmentRole::Street => "street",
            SegmentRole::ClusterConnector => "cluster_connector",
            SegmentRole::Route => "route",
            SegmentRole::Access => "access",
            SegmentRole::Bridge => "bridge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub points: Polyline,
    pub role: SegmentRole,
    pub building: Option<usize>, // owning building, access roads only
}

impl Segment {
    pub fn new(points: Polyline, role: SegmentRole) -> Self {
        Self { points, role, building: None }
    }

    pub fn line(a: DVec2, b: DVec2, role: SegmentRole) -> Self {
        Self::new(vec![a, b], role)
    }

    pub fn length(&self) -> f64 {
        poly::utils::polyline_length(&self.points)
    }

    pub fn start(&self) -> DVec2 {
        self.points.first().copied().unwrap_or(DVec2::ZERO)
    }

    pub fn end(&self) -> DVec2 {
        self.points.last().copied().unwrap_or(DVec2::ZERO)
    }
}

/// Read-only inputs shared by every stage
pub struct GenerationContext<'a> {
    pub buildings: &'a [Building],
    pub boundary: &'a SettlementBoundary,
    pub zones: &'a ExclusionIndex,
    pub params: &'a Params,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemainderReport {
    pub nodes: usize,
    pub segments: usize,
}

/// Diagnostics gathered while generating one settlement
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub strategy_requested: Option<NetworkStrategy>,
    pub strategy_used: Option<NetworkStrategy>,
    pub fell_back: bool,
    pub boundary: Option<boundary::BoundaryKind>,
    pub buildings: usize,
    pub candidates: usize,
    pub after_pruning: usize,
    pub routes_found: usize,
    pub route_pairs_failed: usize,
    pub access_roads: usize,
    pub unconnected_buildings: usize,
    pub components_before_repair: usize,
    pub components_after_repair: usize,
    pub bridges_added: usize,
    pub remainders: Vec<RemainderReport>,
    pub dropped_in_validation: usize,
    pub roles: BTreeMap<SegmentRole, usize>,
    pub tiers: BTreeMap<RoadTier, usize>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RoadNetwork {
    pub city: String,
    pub boundary: SettlementBoundary,
    pub roads: Vec<ClassifiedRoad>,
    pub report: GenerationReport,
}

/// Runs the whole pipeline for one settlement
pub fn generate_road_network(settlement: &Settlement, params: &Params) -> Result<RoadNetwork, RoadGenError> {
    let started = Instant::now();
    let buildings = &settlement.buildings;
    if buildings.is_empty() {
        return Err(RoadGenError::Input(format!("{} has no buildings", settlement.name)));
    }
    if !(params.meters_per_unit.is_finite() && params.meters_per_unit > 0.0) {
        return Err(RoadGenError::Input("meters_per_unit must be positive".to_string()));
    }

    let mut report = GenerationReport { buildings: buildings.len(), ..Default::default() };

    // 1. boundary
    let boundary = boundary::derive_boundary(buildings, params)?;
    report.boundary = Some(boundary.kind);

    let zones = ExclusionIndex::new(buildings, params.units(params.exclusion_margin));
    let ctx = GenerationContext { buildings, boundary: &boundary, zones: &zones, params };
    let min_len = params.units(params.min_segment_length);
    let quantum = params.quantum();

    // 2. candidates
    let requested = params.strategy.unwrap_or_else(|| strategy::select_strategy(buildings.len(), params));
    report.strategy_requested = Some(requested);

    let (used, candidates) = match strategy::generate_candidates(requested, &ctx) {
        Ok(candidates) if !candidates.is_empty() => (requested, candidates),
        Ok(_) => {
            warn!("{}: {} strategy produced no candidates, falling back to grid", settlement.name, requested.tag());
            (NetworkStrategy::Grid, grid::grid_backbone(&ctx))
        }
        Err(e @ RoadGenError::Geometry(_)) => {
            warn!("{}: {}, falling back to grid", settlement.name, e);
            (NetworkStrategy::Grid, grid::grid_backbone(&ctx))
        }
        Err(e) => return Err(e),
    };
    report.strategy_used = Some(used);
    report.fell_back = used != requested;
    report.candidates = candidates.len();
    info!("{}: {} buildings, strategy {}, {} candidates", settlement.name, buildings.len(), used.tag(), candidates.len());

    // 3. collision filter and chain simplification
    let pruned = collision::prune_candidates(candidates, &zones, min_len);
    let mut segments: Vec<Segment> = graph::merge_chains(pruned, quantum)
        .into_iter()
        .filter(|s| s.length() >= min_len)
        .collect();
    report.after_pruning = segments.len();
    debug!("{} segments after pruning", segments.len());

    // 4. poi routes
    if used == NetworkStrategy::Pathfinder {
        let outcome = router::plan_routes(segments, &ctx);
        report.routes_found = outcome.routes_found;
        report.route_pairs_failed = outcome.pairs_failed;
        segments = outcome.segments;
    }

    // 5. access roads
    let access = access::synthesize_access_roads(&segments, &ctx);
    report.access_roads = access.roads.len();
    report.unconnected_buildings = access.unconnected.len();
    segments.extend(access.roads);

    // 6. connectivity repair
    let repaired = repair::repair_connectivity(segments, &zones, params);
    report.components_before_repair = repaired.components_before;
    report.bridges_added = repaired.bridges_added;
    report.remainders = repaired.remainders;

    // 7. final validation
    let (segments, dropped) = collision::validate_network(repaired.segments, &zones, &boundary, min_len, quantum);
    report.dropped_in_validation = dropped;
    if dropped > 0 {
        warn!("{}: {} segments failed final validation", settlement.name, dropped);
    }

    if segments.is_empty() {
        return Err(RoadGenError::NoRoadsProduced { city: settlement.name.clone() });
    }

    let final_graph = graph::NetworkGraph::build(&segments, quantum);
    report.components_after_repair = final_graph.components().len();

    // 8. hierarchy
    let roads = hierarchy::classify_roads(&segments, &final_graph, &ctx, used);
    for road in &roads {
        *report.roles.entry(road.role).or_default() += 1;
        *report.tiers.entry(road.tier).or_default() += 1;
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        "{}: {} roads, {} components, {} bridges in {} ms",
        settlement.name,
        roads.len(),
        report.components_after_repair,
        report.bridges_added,
        report.elapsed_ms
    );

    Ok(RoadNetwork { city: settlement.name.clone(), boundary, roads, report })
}
