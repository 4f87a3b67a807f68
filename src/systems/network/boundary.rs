use bevy_math::DVec2;
use log::debug;
use serde::Serialize;

use crate::error::RoadGenError;
use super::poly::point_gen::{buffered_hull, footprint_vertices, generate_circle_polygon};
use super::poly::utils::{point_in_polygon, polygon_boundary_distance};
use super::settlement::Building;
use super::{Params, Polygon};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Hull,
    Circle,
}

/// Settlement extent: a convex polygon every road endpoint must stay inside
#[derive(Debug, Clone)]
pub struct SettlementBoundary {
    pub polygon: Polygon,
    pub kind: BoundaryKind,
    pub min: DVec2,
    pub max: DVec2,
}

impl SettlementBoundary {
    pub fn new(polygon: Polygon, kind: BoundaryKind) -> Self {
        let (min, max) = polygon.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );
        Self { polygon, kind, min, max }
    }

    /// Inside test that also accepts points within `tolerance` of the outline
    pub fn contains(&self, p: DVec2, tolerance: f64) -> bool {
        point_in_polygon(&p, &self.polygon) || polygon_boundary_distance(p, &self.polygon) <= tolerance
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> DVec2 {
        self.max - self.min
    }
}

/// Hull of all footprint vertices grown by the boundary buffer.
/// Fewer than 3 buildings fall back to a circle around the footprint bounds.
pub fn derive_boundary(buildings: &[Building], params: &Params) -> Result<SettlementBoundary, RoadGenError> {
    if buildings.is_empty() {
        return Err(RoadGenError::Input("cannot derive a boundary without buildings".to_string()));
    }

    let buffer = params.units(params.boundary_buffer);
    let vertices = footprint_vertices(buildings);

    if buildings.len() >= 3 {
        let polygon = buffered_hull(&vertices, buffer, params.buffer_arc_segments);
        if polygon.len() >= 3 {
            debug!("hull boundary with {} vertices", polygon.len());
            return Ok(SettlementBoundary::new(polygon, BoundaryKind::Hull));
        }
    }

    let (lo, hi) = vertices.iter().fold(
        (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    );
    let center = (lo + hi) * 0.5;
    let radius = params.circle_radius_factor * buffer + (hi - lo).length() * 0.5;
    debug!("circle boundary, radius {:.6}", radius);

    Ok(SettlementBoundary::new(
        generate_circle_polygon(center, radius, params.boundary_circle_segments),
        BoundaryKind::Circle,
    ))
}
