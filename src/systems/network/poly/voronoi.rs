use std::collections::HashMap;

use bevy_math::DVec2;
use log::debug;
use spade::{DelaunayTriangulation, LastUsedVertexHintGenerator, Point2, Triangulation as _};

use crate::error::RoadGenError;
use crate::systems::network::{GenerationContext, Segment, SegmentRole};
use super::point_gen::{footprint_vertices, sample_perimeter};
use super::utils::{calculate_circumcenter, clip_segment_to_polygon};

/// Builds street candidates from the Voronoi diagram of the footprint vertices,
/// every finite ridge becomes a segment clipped to the settlement boundary
///
/// # Returns
/// The ridges, or a `Geometry` error when fewer than 4 distinct footprint vertices exist
pub fn voronoi_skeleton(ctx: &GenerationContext) -> Result<Vec<Segment>, RoadGenError> {
    let vertices = footprint_vertices(ctx.buildings);
    if vertices.len() < 4 {
        return Err(RoadGenError::Geometry(format!(
            "voronoi skeleton needs at least 4 footprint vertices, got {}",
            vertices.len()
        )));
    }

    let boundary_samples = sample_perimeter(
        &ctx.boundary.polygon,
        ctx.params.voronoi_boundary_samples.min(ctx.boundary.polygon.len()),
    );

    // shift to a local origin, keeps the triangulation well conditioned for degrees
    let origin = ctx.boundary.center();
    let d_points: Vec<Point2<f64>> = vertices
        .iter()
        .chain(boundary_samples.iter())
        .map(|p| Point2::new(p.x - origin.x, p.y - origin.y))
        .collect();

    let mut triangulation: DelaunayTriangulation<Point2<f64>, (), (), (), LastUsedVertexHintGenerator> = DelaunayTriangulation::new();
    for point in d_points.iter() {
        triangulation.insert(*point).ok();
    }

    if triangulation.num_inner_faces() == 0 {
        return Err(RoadGenError::Geometry("footprint vertices are collinear".to_string()));
    }

    // calculate circumcenters, one per inner face
    let mut face_index = HashMap::new();
    let mut circumcenters = Vec::new();
    for (face_idx, face) in triangulation.inner_faces().enumerate() {
        let [v1, v2, v3] = face.vertices();
        let (x, y) = calculate_circumcenter(v1.position(), v2.position(), v3.position());
        circumcenters.push(DVec2::new(x, y) + origin);
        face_index.insert(face.fix(), face_idx);
    }

    // merge circumcenters that are too close together
    let merge_threshold = ctx.params.units(ctx.params.circumcenter_merge_threshold);
    let mut merged_circumcenters: Vec<DVec2> = Vec::new();
    let mut index_mapping = vec![0; circumcenters.len()];
    let mut used = vec![false; circumcenters.len()];

    for i in 0..circumcenters.len() {
        if used[i] { continue; }

        let mut cluster = vec![i];
        used[i] = true;

        // find all points within merge threshold
        for j in (i + 1)..circumcenters.len() {
            if !used[j] && circumcenters[i].distance(circumcenters[j]) < merge_threshold {
                cluster.push(j);
                used[j] = true;
            }
        }

        // average positions in cluster
        let avg_pos = cluster.iter()
            .map(|&idx| circumcenters[idx])
            .sum::<DVec2>() / cluster.len() as f64;

        let new_index = merged_circumcenters.len();
        merged_circumcenters.push(avg_pos);

        for &old_idx in &cluster {
            index_mapping[old_idx] = new_index;
        }
    }

    // ridges join circumcenters of neighbouring inner faces
    // faces next to the outer face would give infinite rays and are skipped
    let mut ridges = Vec::new();
    for face in triangulation.inner_faces() {
        let Some(&this_idx) = face_index.get(&face.fix()) else { continue };
        for edge in face.adjacent_edges() {
            let Some(neighbour) = edge.rev().face().as_inner() else { continue };
            let Some(&other_idx) = face_index.get(&neighbour.fix()) else { continue };
            if other_idx <= this_idx {
                continue; // each ridge once
            }
            let (a, b) = (index_mapping[this_idx], index_mapping[other_idx]);
            if a != b {
                ridges.push((a.min(b), a.max(b)));
            }
        }
    }
    ridges.sort_unstable();
    ridges.dedup();

    let mut segments = Vec::new();
    for (a, b) in ridges {
        let (pa, pb) = (merged_circumcenters[a], merged_circumcenters[b]);
        for (t0, t1) in clip_segment_to_polygon(pa, pb, &ctx.boundary.polygon) {
            let start = if t0 == 0.0 { pa } else { pa + (pb - pa) * t0 };
            let end = if t1 == 1.0 { pb } else { pa + (pb - pa) * t1 };
            segments.push(Segment::line(start, end, SegmentRole::Street));
        }
    }

    debug!(
        "voronoi skeleton: {} generators, {} circumcenters ({} merged), {} ridge pieces",
        d_points.len(),
        circumcenters.len(),
        merged_circumcenters.len(),
        segments.len()
    );

    Ok(segments)
}
