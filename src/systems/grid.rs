use bevy_math::DVec2;
use log::debug;

use crate::systems::network::poly::utils::{clip_segment_to_polygon, polyline_length};
use crate::systems::network::{GenerationContext, Segment, SegmentRole};

// this is the grid backbone, parallel lines anchored at the boundary center
// crossing lines are split at their shared coordinates so they meet in one node
pub fn grid_backbone(ctx: &GenerationContext) -> Vec<Segment> {
    let params = ctx.params;
    let boundary = ctx.boundary;

    let extent = boundary.extent();
    let small = extent.x.max(extent.y) < params.units(params.small_settlement_extent);
    let spacing = params.units(if small { params.grid_spacing_small } else { params.grid_spacing_large });
    if !(spacing > 0.0) {
        return Vec::new();
    }

    let center = boundary.center();
    let xs = line_positions(center.x, boundary.min.x, boundary.max.x, spacing);
    let ys = line_positions(center.y, boundary.min.y, boundary.max.y, spacing);
    debug!("grid backbone: {} x {} lines, spacing {:.6}", xs.len(), ys.len(), spacing);

    let min_fragment = spacing * 0.5;
    let mut segments = Vec::new();

    // vertical lines
    for &x in &xs {
        let a = DVec2::new(x, boundary.min.y - spacing);
        let b = DVec2::new(x, boundary.max.y + spacing);
        for fragment in line_fragments(ctx, a, b, min_fragment) {
            split_at(&fragment, &ys, |p| p.y, |y| DVec2::new(x, y), &mut segments);
        }
    }

    // horizontal lines
    for &y in &ys {
        let a = DVec2::new(boundary.min.x - spacing, y);
        let b = DVec2::new(boundary.max.x + spacing, y);
        for fragment in line_fragments(ctx, a, b, min_fragment) {
            split_at(&fragment, &xs, |p| p.x, |x| DVec2::new(x, y), &mut segments);
        }
    }

    segments
}

// center + i * spacing for every i that lands strictly inside (lo, hi)
fn line_positions(center: f64, lo: f64, hi: f64, spacing: f64) -> Vec<f64> {
    let first = ((lo - center) / spacing).ceil() as i64;
    let last = ((hi - center) / spacing).floor() as i64;
    (first..=last)
        .map(|i| center + i as f64 * spacing)
        .filter(|v| *v > lo && *v < hi)
        .collect()
}

// clip one full line to the boundary and cut out the exclusion zones
fn line_fragments(ctx: &GenerationContext, a: DVec2, b: DVec2, min_fragment: f64) -> Vec<Vec<DVec2>> {
    let mut fragments = Vec::new();
    for (t0, t1) in clip_segment_to_polygon(a, b, &ctx.boundary.polygon) {
        let start = a + (b - a) * t0;
        let end = a + (b - a) * t1;
        for piece in ctx.zones.difference(&[start, end]) {
            if polyline_length(&piece) >= min_fragment {
                fragments.push(piece);
            }
        }
    }
    fragments
}

// split a straight fragment wherever a crossing line passes through it
fn split_at(
    fragment: &[DVec2],
    crossings: &[f64],
    coord: impl Fn(DVec2) -> f64,
    point: impl Fn(f64) -> DVec2,
    out: &mut Vec<Segment>,
) {
    let (Some(&start), Some(&end)) = (fragment.first(), fragment.last()) else {
        return;
    };
    let (lo, hi) = (coord(start).min(coord(end)), coord(start).max(coord(end)));

    let mut cuts: Vec<f64> = crossings.iter().copied().filter(|c| *c > lo && *c < hi).collect();
    if coord(start) > coord(end) {
        cuts.reverse();
    }

    let mut from = start;
    for c in cuts {
        let to = point(c);
        out.push(Segment::line(from, to, SegmentRole::Backbone));
        from = to;
    }
    out.push(Segment::line(from, end, SegmentRole::Backbone));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_positions_are_anchored_at_center() {
        let xs = line_positions(0.0, -170.0, 170.0, 80.0);
        assert_eq!(xs, vec![-160.0, -80.0, 0.0, 80.0, 160.0]);
        let none = line_positions(5.0, 0.0, 1.0, 80.0);
        assert!(none.is_empty());
    }

    #[test]
    fn test_split_at_shares_crossing_points() {
        let mut out = Vec::new();
        let fragment = vec![DVec2::new(10.0, 100.0), DVec2::new(10.0, -100.0)];
        split_at(&fragment, &[-80.0, 0.0, 80.0, 150.0], |p| p.y, |y| DVec2::new(10.0, y), &mut out);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].end(), DVec2::new(10.0, 80.0));
        assert_eq!(out[1].end(), DVec2::new(10.0, 0.0));
        assert_eq!(out[3].end(), DVec2::new(10.0, -100.0));
    }
}
