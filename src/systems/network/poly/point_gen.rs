// handles point generation logic

use bevy_math::DVec2;

use crate::systems::network::Polygon;
use crate::systems::network::settlement::Building;
use super::utils::convex_hull;

// regular polygon approximating a circle, counter-clockwise
pub fn generate_circle_polygon(center: DVec2, radius: f64, segments: usize) -> Polygon {
    let segments = segments.max(3);
    (0..segments)
        .map(|i| {
            let angle = (i as f64 / segments as f64) * std::f64::consts::TAU;
            center + DVec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

// expand a point set by `radius`, keeping the result convex
// every hull vertex contributes a ring of arc points and the hull of all of them is taken
pub fn buffered_hull(points: &[DVec2], radius: f64, arc_segments: usize) -> Polygon {
    let hull = convex_hull(points);
    if radius <= 0.0 {
        return hull;
    }

    let mut expanded = Vec::with_capacity(hull.len() * arc_segments.max(3));
    for vertex in &hull {
        expanded.extend(generate_circle_polygon(*vertex, radius, arc_segments));
    }
    convex_hull(&expanded)
}

pub fn perimeter_length(polygon: &[DVec2]) -> f64 {
    let n = polygon.len();
    (0..n).map(|i| polygon[i].distance(polygon[(i + 1) % n])).sum()
}

// `count` points evenly spaced by arc length along a closed polygon, starting at the first vertex
pub fn sample_perimeter(polygon: &[DVec2], count: usize) -> Vec<DVec2> {
    let total = perimeter_length(polygon);
    if count == 0 || polygon.len() < 2 || total <= 0.0 {
        return Vec::new();
    }

    let step = total / count as f64;
    let n = polygon.len();
    let mut samples = Vec::with_capacity(count);
    let mut edge = 0;
    let mut walked = 0.0; // arc length at the start of `edge`

    for k in 0..count {
        let target = k as f64 * step;
        loop {
            let len = polygon[edge].distance(polygon[(edge + 1) % n]);
            if walked + len >= target || edge + 1 == n {
                let t = if len > 0.0 { ((target - walked) / len).clamp(0.0, 1.0) } else { 0.0 };
                samples.push(polygon[edge].lerp(polygon[(edge + 1) % n], t));
                break;
            }
            walked += len;
            edge += 1;
        }
    }

    samples
}

// unique footprint vertices of all buildings, in building order
pub fn footprint_vertices(buildings: &[Building]) -> Vec<DVec2> {
    let mut vertices: Vec<DVec2> = buildings
        .iter()
        .flat_map(|b| b.footprint.iter().copied())
        .collect();
    let mut seen = std::collections::HashSet::with_capacity(vertices.len());
    vertices.retain(|p| seen.insert((p.x.to_bits(), p.y.to_bits())));
    vertices
}
