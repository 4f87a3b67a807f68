use bevy_math::DVec2;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use super::boundary::SettlementBoundary;
use super::poly::utils::{
    capsule_interval, clip_segment_to_polygon, complement_intervals, merge_intervals,
    point_in_polygon, polygon_boundary_distance, polyline_length, segment_polygon_distance,
};
use super::settlement::Building;
use super::{Polygon, Polyline, Segment};

type ZoneEntry = GeomWithData<Rectangle<[f64; 2]>, usize>;

// roads exactly on the margin do not collide
const TOUCH_TOLERANCE: f64 = 1e-6;

/// Building footprints buffered by the safety margin.
/// The union is never materialized; queries go through an R-tree of zone envelopes.
pub struct ExclusionIndex {
    footprints: Vec<Polygon>,
    margin: f64,
    tree: RTree<ZoneEntry>,
}

impl ExclusionIndex {
    pub fn new(buildings: &[Building], margin: f64) -> Self {
        let margin = margin.max(0.0);
        let entries = buildings
            .iter()
            .enumerate()
            .map(|(idx, b)| {
                let (lo, hi) = b.bounds();
                GeomWithData::new(
                    Rectangle::from_corners([lo.x - margin, lo.y - margin], [hi.x + margin, hi.y + margin]),
                    idx,
                )
            })
            .collect();

        Self {
            footprints: buildings.iter().map(|b| b.footprint.clone()).collect(),
            margin,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    // zones whose envelope meets the segment's bounding box, in index order
    fn candidates(&self, a: DVec2, b: DVec2) -> Vec<usize> {
        let lo = a.min(b);
        let hi = a.max(b);
        let envelope = AABB::from_corners([lo.x, lo.y], [hi.x, hi.y]);
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        found.sort_unstable();
        found
    }

    fn limit(&self) -> f64 {
        self.margin * (1.0 - TOUCH_TOLERANCE)
    }

    pub fn contains_point(&self, p: DVec2) -> bool {
        self.candidates(p, p).into_iter().any(|idx| {
            let footprint = &self.footprints[idx];
            point_in_polygon(&p, footprint) || polygon_boundary_distance(p, footprint) < self.limit()
        })
    }

    pub fn intersects_segment(&self, a: DVec2, b: DVec2) -> bool {
        self.intersects_segment_except(a, b, None)
    }

    /// Collision test that ignores one building's zone
    pub fn intersects_segment_except(&self, a: DVec2, b: DVec2, skip: Option<usize>) -> bool {
        self.candidates(a, b)
            .into_iter()
            .filter(|idx| Some(*idx) != skip)
            .any(|idx| segment_polygon_distance(a, b, &self.footprints[idx]) < self.limit())
    }

    pub fn intersects_polyline(&self, points: &[DVec2]) -> bool {
        match points {
            [p] => self.contains_point(*p),
            _ => points.windows(2).any(|w| self.intersects_segment(w[0], w[1])),
        }
    }

    // parameter ranges of a -> b within one zone, unmerged
    fn zone_intervals(&self, a: DVec2, b: DVec2, idx: usize) -> Vec<(f64, f64)> {
        let footprint = &self.footprints[idx];
        let n = footprint.len();
        let mut ranges = clip_segment_to_polygon(a, b, footprint);
        for i in 0..n {
            if let Some(range) = capsule_interval(a, b, footprint[i], footprint[(i + 1) % n], self.margin) {
                ranges.push(range);
            }
        }
        ranges
    }

    /// Merged parameter ranges of `a -> b` lying inside any zone
    pub fn blocked_intervals(&self, a: DVec2, b: DVec2) -> Vec<(f64, f64)> {
        if a == b {
            return Vec::new();
        }
        let ranges = self
            .candidates(a, b)
            .into_iter()
            .flat_map(|idx| self.zone_intervals(a, b, idx))
            .collect();
        merge_intervals(ranges)
    }

    /// Parameter ranges of `a -> b` clear of every zone
    pub fn free_intervals(&self, a: DVec2, b: DVec2) -> Vec<(f64, f64)> {
        if a == b {
            return Vec::new();
        }
        complement_intervals(&self.blocked_intervals(a, b))
    }

    /// Parameter at which `a -> b` leaves the zone of `building`, 0.0 if `a` is outside it
    pub fn zone_exit(&self, a: DVec2, b: DVec2, building: usize) -> f64 {
        if a == b || building >= self.footprints.len() {
            return 0.0;
        }
        merge_intervals(self.zone_intervals(a, b, building))
            .first()
            .filter(|range| range.0 <= 0.0)
            .map(|range| range.1)
            .unwrap_or(0.0)
    }

    /// Splits a polyline into the pieces lying outside every zone
    pub fn difference(&self, points: &[DVec2]) -> Vec<Polyline> {
        let mut pieces: Vec<Polyline> = Vec::new();
        let mut current: Polyline = Vec::new();

        for w in points.windows(2) {
            let (a, b) = (w[0], w[1]);
            if a == b {
                continue;
            }
            for (t0, t1) in self.free_intervals(a, b) {
                let start = if t0 == 0.0 { a } else { a + (b - a) * t0 };
                let end = if t1 == 1.0 { b } else { a + (b - a) * t1 };

                // continue the running piece when it ends where this one starts
                if t0 == 0.0 && current.last() == Some(&a) {
                    current.push(end);
                } else {
                    if current.len() >= 2 {
                        pieces.push(std::mem::take(&mut current));
                    }
                    current = vec![start, end];
                }

                if t1 < 1.0 {
                    pieces.push(std::mem::take(&mut current));
                }
            }
        }

        if current.len() >= 2 {
            pieces.push(current);
        }
        pieces
    }
}

/// Keeps clear candidates as they are and trims colliding ones to their free pieces.
/// Pieces shorter than `min_len` are dropped.
pub fn prune_candidates(candidates: Vec<Segment>, zones: &ExclusionIndex, min_len: f64) -> Vec<Segment> {
    let mut kept = Vec::with_capacity(candidates.len());
    for segment in candidates {
        if segment.points.len() < 2 {
            continue;
        }
        if !zones.intersects_polyline(&segment.points) {
            if segment.length() >= min_len {
                kept.push(segment);
            }
            continue;
        }
        for piece in zones.difference(&segment.points) {
            if polyline_length(&piece) >= min_len {
                kept.push(Segment { points: piece, role: segment.role, building: segment.building });
            }
        }
    }
    kept
}

/// Final pass: drops any segment that collides, leaves the boundary or is too short.
/// # Returns the surviving segments and how many were dropped
pub fn validate_network(
    segments: Vec<Segment>,
    zones: &ExclusionIndex,
    boundary: &SettlementBoundary,
    min_len: f64,
    tolerance: f64,
) -> (Vec<Segment>, usize) {
    let before = segments.len();
    let kept: Vec<Segment> = segments
        .into_iter()
        .filter(|s| s.points.len() >= 2)
        .filter(|s| s.length() >= min_len)
        .filter(|s| boundary.contains(s.start(), tolerance) && boundary.contains(s.end(), tolerance))
        .filter(|s| !zones.intersects_polyline(&s.points))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::network::SegmentRole;

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
    fn test_free_intervals_around_single_zone() {
        let index = ExclusionIndex::new(&[square_building(0, DVec2::new(50.0, 0.0), 4.0)], 5.0);
        let free = index.free_intervals(DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0));
        assert_eq!(free.len(), 2);
        assert!((free[0].1 - 0.41).abs() < 1e-9);
        assert!((free[1].0 - 0.59).abs() < 1e-9);
    }

    #[test]
    fn test_touching_the_margin_is_not_a_collision() {
        let index = ExclusionIndex::new(&[square_building(0, DVec2::ZERO, 4.0)], 5.0);
        assert!(!index.intersects_segment(DVec2::new(-20.0, 9.0), DVec2::new(20.0, 9.0)));
        assert!(index.intersects_segment(DVec2::new(-20.0, 8.9), DVec2::new(20.0, 8.9)));
        assert!(index.contains_point(DVec2::new(0.0, 8.0)));
        assert!(!index.contains_point(DVec2::new(0.0, 9.5)));
    }

    #[test]
    fn test_difference_splits_line_and_keeps_clear_polyline() {
        let index = ExclusionIndex::new(&[square_building(0, DVec2::new(50.0, 0.0), 4.0)], 5.0);
        let pieces = index.difference(&[DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)]);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0][0], DVec2::new(0.0, 0.0));
        assert!((pieces[0][1].x - 41.0).abs() < 1e-9);
        assert!((pieces[1][0].x - 59.0).abs() < 1e-9);
        assert_eq!(pieces[1][1], DVec2::new(100.0, 0.0));
        for piece in &pieces {
            assert!(!index.intersects_polyline(piece));
        }

        let bent = vec![DVec2::new(0.0, 20.0), DVec2::new(50.0, 20.0), DVec2::new(50.0, 40.0)];
        assert_eq!(index.difference(&bent), vec![bent.clone()]);
    }

    #[test]
    fn test_zone_exit_from_own_footprint() {
        let index = ExclusionIndex::new(&[square_building(0, DVec2::ZERO, 4.0)], 5.0);
        let t = index.zone_exit(DVec2::new(4.0, 0.0), DVec2::new(24.0, 0.0), 0);
        assert!((t - 0.25).abs() < 1e-9);
        assert_eq!(index.zone_exit(DVec2::new(30.0, 0.0), DVec2::new(40.0, 0.0), 0), 0.0);
    }

    #[test]
    fn test_prune_candidates_drops_short_pieces() {
        let index = ExclusionIndex::new(&[square_building(0, DVec2::new(10.0, 0.0), 4.0)], 5.0);
        let candidates = vec![
            Segment::line(DVec2::new(0.0, 0.0), DVec2::new(60.0, 0.0), SegmentRole::Street),
            Segment::line(DVec2::new(0.0, 30.0), DVec2::new(60.0, 30.0), SegmentRole::Street),
        ];
        let pruned = prune_candidates(candidates, &index, 5.0);
        // the first line keeps only its long right-hand piece, 0..1 on the left is too short
        assert_eq!(pruned.len(), 2);
        assert!((pruned[0].points[0].x - 19.0).abs() < 1e-9);
        assert_eq!(pruned[1].points[0], DVec2::new(0.0, 30.0));
    }

    #[test]
    fn test_validate_network_drops_without_trimming() {
        use crate::systems::network::boundary::BoundaryKind;

        let index = ExclusionIndex::new(&[square_building(0, DVec2::new(50.0, 0.0), 4.0)], 5.0);
        let boundary = SettlementBoundary::new(
            vec![DVec2::new(-100.0, -100.0), DVec2::new(100.0, -100.0), DVec2::new(100.0, 100.0), DVec2::new(-100.0, 100.0)],
            BoundaryKind::Hull,
        );
        let segments = vec![
            Segment::line(DVec2::new(0.0, 50.0), DVec2::new(80.0, 50.0), SegmentRole::Street),
            Segment::line(DVec2::new(0.0, 0.0), DVec2::new(80.0, 0.0), SegmentRole::Street),
            Segment::line(DVec2::new(0.0, -50.0), DVec2::new(150.0, -50.0), SegmentRole::Street),
            Segment::line(DVec2::new(0.0, 80.0), DVec2::new(2.0, 80.0), SegmentRole::Street),
        ];
        let (kept, dropped) = validate_network(segments.clone(), &index, &boundary, 5.0, 0.01);
        assert_eq!(dropped, 3);
        assert_eq!(kept, vec![segments[0].clone()]);
    }
}
