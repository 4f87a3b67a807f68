// UTILS

use bevy_math::DVec2;
use spade::Point2;

use crate::systems::network::Polygon;

/// find where two segments cross, lookup Cramer's rule
/// https://cp-algorithms.com/geometry/lines-intersection.html
/// # Returns `Some((t, s))` with `p1 + t * (p2 - p1) == p3 + s * (p4 - p3)`, 'None' if they miss
pub fn segment_intersection_params(p1: DVec2, p2: DVec2, p3: DVec2, p4: DVec2) -> Option<(f64, f64)> {
    let s1 = p2 - p1;   // direction vector of segment 1
    let s2 = p4 - p3;   // direction vector of segment 2

    let denom = s1.x * s2.y - s2.x * s1.y; // determinant of 2x2 matrix

    // parallel lines
    if denom.abs() < f64::EPSILON * s1.length() * s2.length() || denom == 0.0 {
        return None;
    }

    let s = (s1.x * (p1.y - p3.y) - s1.y * (p1.x - p3.x)) / denom;
    let t = (s2.x * (p1.y - p3.y) - s2.y * (p1.x - p3.x)) / denom;

    // check if intersection is within both segments
    if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
        Some((t, s))
    } else {
        None
    }
}

/// Computes the signed area of a polygon
/// # Returns the polygon's area, positive for counter-clockwise winding. 0.0 for fewer than 3 vertices.
pub fn polygon_area(polygon: &[DVec2]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let n = polygon.len();
    let mut area = 0.0;

    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].x * polygon[j].y - polygon[j].x * polygon[i].y;
    }

    area / 2.0
}

/// Calculates the centroid of a polygon
/// Returns a `DVec2` representing the centroid position. Falls back to the vertex mean for degenerate polygons.
pub fn polygon_centroid(polygon: &[DVec2], area: f64) -> DVec2 {
    if polygon.is_empty() {
        return DVec2::ZERO;
    }
    if polygon.len() < 3 || area == 0.0 {
        return polygon.iter().copied().sum::<DVec2>() / polygon.len() as f64;
    }

    // shift to the first vertex, keeps precision for large geographic coordinates
    let origin = polygon[0];
    let n = polygon.len();
    let mut centroid = DVec2::ZERO;

    for i in 0..n {
        let j = (i + 1) % n;
        let a = polygon[i] - origin;
        let b = polygon[j] - origin;
        let p = a.x * b.y - b.x * a.y;
        centroid += (a + b) * p;
    }

    origin + centroid / (6.0 * area)
}

/// Calculates the circumcenter of a triangle given by three points.
/// # Returns a tuple `(x, y)` representing the circumcenter coordinates.
/// Falls back to the triangle centroid if points are collinear.
pub fn calculate_circumcenter(p1: Point2<f64>, p2: Point2<f64>, p3: Point2<f64>) -> (f64, f64) {
    // work relative to p1 so geographic coordinates keep their precision
    let bx = p2.x - p1.x;
    let by = p2.y - p1.y;
    let cx = p3.x - p1.x;
    let cy = p3.y - p1.y;

    // denominator in Cramer's rule solution, with p1 at the origin
    // d = 2 * det | x2 y2 |
    //             | x3 y3 |
    let d = 2.0 * (bx * cy - by * cx);

    if d.abs() <= f64::EPSILON * (bx * bx + by * by + cx * cx + cy * cy) {
        // fallback to centroid in event that points are collinear
        return ((p1.x + p2.x + p3.x) / 3.0, (p1.y + p2.y + p3.y) / 3.0);
    }

    // solving |X|^2 = |X - B|^2 = |X - C|^2 for X
    let b_sq = bx * bx + by * by;
    let c_sq = cx * cx + cy * cy;
    let ux = (cy * b_sq - by * c_sq) / d;
    let uy = (bx * c_sq - cx * b_sq) / d;

    (p1.x + ux, p1.y + uy)
}

/// Determines whether a point is inside a polygon using the ray-casting algorithm.
/// # Returns `true` if the point is inside the polygon, otherwise `false`.
pub fn point_in_polygon(point: &DVec2, polygon: &[DVec2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let yi = polygon[i].y;
        let yj = polygon[j].y;
        let xi = polygon[i].x;
        let xj = polygon[j].x;

        if ((yi > point.y) != (yj > point.y)) &&
           (point.x < (xj - xi) * (point.y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Projects `p` onto the segment `a -> b`
pub fn closest_point_on_segment(p: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

pub fn point_segment_distance(p: DVec2, a: DVec2, b: DVec2) -> f64 {
    p.distance(closest_point_on_segment(p, a, b))
}

/// Shortest distance between two segments, 0.0 when they cross
pub fn segment_segment_distance(a1: DVec2, a2: DVec2, b1: DVec2, b2: DVec2) -> f64 {
    if segment_intersection_params(a1, a2, b1, b2).is_some() {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

/// Nearest point on the polygon outline
pub fn closest_point_on_polygon_boundary(p: DVec2, polygon: &[DVec2]) -> DVec2 {
    let n = polygon.len();
    let mut best = polygon.first().copied().unwrap_or(p);
    let mut best_dist = f64::INFINITY;
    for i in 0..n {
        let q = closest_point_on_segment(p, polygon[i], polygon[(i + 1) % n]);
        let d = p.distance_squared(q);
        if d < best_dist {
            best_dist = d;
            best = q;
        }
    }
    best
}

/// Distance from a point to the polygon outline, ignores the interior
pub fn polygon_boundary_distance(p: DVec2, polygon: &[DVec2]) -> f64 {
    if polygon.is_empty() {
        return f64::INFINITY;
    }
    p.distance(closest_point_on_polygon_boundary(p, polygon))
}

/// Distance between a segment and a polygon region (0.0 if they overlap)
pub fn segment_polygon_distance(a: DVec2, b: DVec2, polygon: &[DVec2]) -> f64 {
    if point_in_polygon(&a, polygon) || point_in_polygon(&b, polygon) {
        return 0.0;
    }
    let n = polygon.len();
    let mut best = f64::INFINITY;
    for i in 0..n {
        let d = segment_segment_distance(a, b, polygon[i], polygon[(i + 1) % n]);
        if d == 0.0 {
            return 0.0;
        }
        best = best.min(d);
    }
    best
}

/// Distance between a polyline and a polygon region
pub fn polyline_polygon_distance(points: &[DVec2], polygon: &[DVec2]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [p] => {
            if point_in_polygon(p, polygon) { 0.0 } else { polygon_boundary_distance(*p, polygon) }
        }
        _ => points
            .windows(2)
            .map(|w| segment_polygon_distance(w[0], w[1], polygon))
            .fold(f64::INFINITY, f64::min),
    }
}

pub fn polyline_length(points: &[DVec2]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Andrew's monotone chain
/// # Returns the hull in counter-clockwise order without a closing vertex
pub fn convex_hull(points: &[DVec2]) -> Polygon {
    let mut pts: Vec<DVec2> = points.iter().copied().filter(|p| p.is_finite()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: DVec2, a: DVec2, b: DVec2| (a - o).perp_dot(b - o);

    let mut lower: Vec<DVec2> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<DVec2> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Parameter ranges of the segment `a -> b` that lie inside `polygon`.
/// Works for concave polygons, touching pieces are merged.
pub fn clip_segment_to_polygon(a: DVec2, b: DVec2, polygon: &[DVec2]) -> Vec<(f64, f64)> {
    let n = polygon.len();
    if n < 3 || a == b {
        return Vec::new();
    }

    let mut cuts = vec![0.0, 1.0];
    for i in 0..n {
        if let Some((t, _)) = segment_intersection_params(a, b, polygon[i], polygon[(i + 1) % n]) {
            cuts.push(t);
        }
    }
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let mut inside: Vec<(f64, f64)> = Vec::new();
    for w in cuts.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        if t1 - t0 <= f64::EPSILON {
            continue;
        }
        let mid = a.lerp(b, (t0 + t1) * 0.5);
        if point_in_polygon(&mid, polygon) {
            match inside.last_mut() {
                Some(last) if last.1 == t0 => last.1 = t1,
                _ => inside.push((t0, t1)),
            }
        }
    }
    inside
}

/// Parameter range of the line `a + t (b - a)` lying strictly within `radius` of the segment `c -> d`.
/// The capsule is convex so the set is a single interval; it is not clamped to [0, 1].
pub fn capsule_interval(a: DVec2, b: DVec2, c: DVec2, d: DVec2, radius: f64) -> Option<(f64, f64)> {
    let v = b - a;
    if v.length_squared() == 0.0 {
        return None;
    }

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut take = |range: Option<(f64, f64)>| {
        if let Some((t0, t1)) = range {
            lo = lo.min(t0);
            hi = hi.max(t1);
        }
    };

    take(disc_interval(a, v, c, radius));
    take(disc_interval(a, v, d, radius));

    let cd = d - c;
    let len = cd.length();
    if len > 0.0 {
        let u = cd / len;
        let normal = u.perp();
        // slab along the segment, then slab across it
        let along = slab_interval((a - c).dot(u), v.dot(u), 0.0, len);
        let across = slab_interval((a - c).dot(normal), v.dot(normal), -radius, radius);
        if let (Some(s1), Some(s2)) = (along, across) {
            let t0 = s1.0.max(s2.0);
            let t1 = s1.1.min(s2.1);
            if t0 < t1 {
                take(Some((t0, t1)));
            }
        }
    }

    (lo < hi).then_some((lo, hi))
}

// |a + t v - center| < radius
fn disc_interval(a: DVec2, v: DVec2, center: DVec2, radius: f64) -> Option<(f64, f64)> {
    let f = a - center;
    let qa = v.length_squared();
    let qb = 2.0 * f.dot(v);
    let qc = f.length_squared() - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc <= 0.0 {
        return None;
    }
    let root = disc.sqrt();
    Some(((-qb - root) / (2.0 * qa), (-qb + root) / (2.0 * qa)))
}

// lo <= offset + t * rate <= hi
fn slab_interval(offset: f64, rate: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    if rate == 0.0 {
        return (offset >= lo && offset <= hi).then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let t0 = (lo - offset) / rate;
    let t1 = (hi - offset) / rate;
    Some((t0.min(t1), t0.max(t1)))
}

/// Sorts and merges overlapping parameter ranges, clamped to [0, 1]
pub fn merge_intervals(mut intervals: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    intervals.retain(|(t0, t1)| *t1 > 0.0 && *t0 < 1.0 && t0 < t1);
    for range in intervals.iter_mut() {
        range.0 = range.0.max(0.0);
        range.1 = range.1.min(1.0);
    }
    intervals.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(intervals.len());
    for (t0, t1) in intervals {
        match merged.last_mut() {
            Some(last) if t0 <= last.1 => last.1 = last.1.max(t1),
            _ => merged.push((t0, t1)),
        }
    }
    merged
}

/// Complement of merged ranges within [0, 1]
pub fn complement_intervals(blocked: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut free = Vec::new();
    let mut cursor = 0.0;
    for &(t0, t1) in blocked {
        if t0 > cursor {
            free.push((cursor, t0));
        }
        cursor = cursor.max(t1);
    }
    if cursor < 1.0 {
        free.push((cursor, 1.0));
    }
    free
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(center: DVec2, half: f64) -> Polygon {
        vec![
            center + DVec2::new(-half, -half),
            center + DVec2::new(half, -half),
            center + DVec2::new(half, half),
            center + DVec2::new(-half, half),
        ]
    }

    #[test]
    fn test_area_and_centroid_of_square() {
        let sq = square(DVec2::new(10.0, -4.0), 2.0);
        let area = polygon_area(&sq);
        assert!((area - 16.0).abs() < 1e-9);
        let c = polygon_centroid(&sq, area);
        assert!(c.distance(DVec2::new(10.0, -4.0)) < 1e-9);
    }

    #[test]
    fn test_centroid_keeps_precision_far_from_origin() {
        let sq = square(DVec2::new(12.5, 51.2), 0.00004);
        let area = polygon_area(&sq);
        let c = polygon_centroid(&sq, area);
        assert!(c.distance(DVec2::new(12.5, 51.2)) < 1e-9);
    }

    #[test]
    fn test_circumcenter_right_triangle() {
        let (x, y) = calculate_circumcenter(
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(0.0, 2.0),
        );
        assert!((x - 2.0).abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_circumcenter_collinear_falls_back_to_centroid() {
        let (x, y) = calculate_circumcenter(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        );
        assert!((x - 1.0).abs() < 1e-12);
        assert!(y.abs() < 1e-12);
    }

    #[test]
    fn test_segment_intersection() {
        let hit = segment_intersection_params(
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(0.0, 2.0),
            DVec2::new(2.0, 0.0),
        );
        assert_eq!(hit, Some((0.5, 0.5)));

        let parallel = segment_intersection_params(
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
            DVec2::new(1.0, 1.0),
        );
        assert!(parallel.is_none());
    }

    #[test]
    fn test_convex_hull_drops_interior_points() {
        let pts = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(4.0, 0.0),
            DVec2::new(2.0, 1.0),
            DVec2::new(4.0, 4.0),
            DVec2::new(0.0, 4.0),
            DVec2::new(0.0, 4.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(polygon_area(&hull) > 0.0);
        assert!(!hull.contains(&DVec2::new(2.0, 1.0)));
    }

    #[test]
    fn test_clip_segment_to_square() {
        let sq = square(DVec2::ZERO, 1.0);
        let inside = clip_segment_to_polygon(DVec2::new(-2.0, 0.0), DVec2::new(2.0, 0.0), &sq);
        assert_eq!(inside.len(), 1);
        assert!((inside[0].0 - 0.25).abs() < 1e-12);
        assert!((inside[0].1 - 0.75).abs() < 1e-12);

        let outside = clip_segment_to_polygon(DVec2::new(-2.0, 3.0), DVec2::new(2.0, 3.0), &sq);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_capsule_interval_horizontal_pass() {
        // line y = 0 passing a vertical segment at x = 5 with radius 1
        let range = capsule_interval(
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(5.0, -3.0),
            DVec2::new(5.0, 3.0),
            1.0,
        )
        .expect("line crosses the capsule");
        assert!((range.0 - 0.4).abs() < 1e-12);
        assert!((range.1 - 0.6).abs() < 1e-12);

        let miss = capsule_interval(
            DVec2::new(0.0, 5.0),
            DVec2::new(10.0, 5.0),
            DVec2::new(5.0, -3.0),
            DVec2::new(5.0, 3.0),
            1.0,
        );
        assert!(miss.is_none());
    }

    #[test]
    fn test_merge_and_complement_intervals() {
        let merged = merge_intervals(vec![(0.5, 0.7), (-0.2, 0.1), (0.6, 0.8)]);
        assert_eq!(merged, vec![(0.0, 0.1), (0.5, 0.8)]);
        assert_eq!(complement_intervals(&merged), vec![(0.1, 0.5), (0.8, 1.0)]);
    }

    #[test]
    fn test_segment_polygon_distance() {
        let sq = square(DVec2::ZERO, 1.0);
        let d = segment_polygon_distance(DVec2::new(3.0, -5.0), DVec2::new(3.0, 5.0), &sq);
        assert!((d - 2.0).abs() < 1e-12);
        let inside = segment_polygon_distance(DVec2::new(-5.0, 0.0), DVec2::new(5.0, 0.0), &sq);
        assert_eq!(inside, 0.0);
    }
}
