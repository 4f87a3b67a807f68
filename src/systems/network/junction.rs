use std::collections::{HashMap, VecDeque};

use bevy_math::DVec2;
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Normal;

use super::graph::node_tree_of;
use super::poly::point_gen::buffered_hull;
use super::poly::utils::{point_in_polygon, polygon_area};
use super::{GenerationContext, Segment, SegmentRole};

/// Density based clustering of building centroids.
/// A building with at least `min_samples` centroids within `eps` (itself included) is a core point;
/// clusters grow through core points. Noise belongs to no cluster.
/// # Returns clusters as sorted index lists, in order of their first member
pub fn cluster_buildings(centroids: &[DVec2], eps: f64, min_samples: usize) -> Vec<Vec<usize>> {
    let tree = node_tree_of(centroids.iter().copied().enumerate());
    let neighbours = |idx: usize| -> Vec<usize> {
        let p = centroids[idx];
        let mut found: Vec<usize> = tree
            .locate_within_distance([p.x, p.y], eps * eps)
            .map(|entry| entry.data)
            .collect();
        found.sort_unstable();
        found
    };

    let mut label: Vec<Option<usize>> = vec![None; centroids.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for seed in 0..centroids.len() {
        if label[seed].is_some() {
            continue;
        }
        let seed_neighbours = neighbours(seed);
        if seed_neighbours.len() < min_samples {
            continue; // noise, may still be claimed by a later cluster as a border point
        }

        let cluster_id = clusters.len();
        let mut members = Vec::new();
        let mut queue: VecDeque<usize> = VecDeque::from(seed_neighbours);
        label[seed] = Some(cluster_id);
        members.push(seed);

        while let Some(idx) = queue.pop_front() {
            if label[idx].is_some() {
                continue;
            }
            label[idx] = Some(cluster_id);
            members.push(idx);

            let found = neighbours(idx);
            if found.len() >= min_samples {
                queue.extend(found.into_iter().filter(|n| label[*n].is_none()));
            }
        }

        members.sort_unstable();
        clusters.push(members);
    }

    clusters
}

/// Per-cluster junction grids whose spacing follows building density
pub fn junction_network(ctx: &GenerationContext) -> Vec<Segment> {
    let params = ctx.params;
    let centroids: Vec<DVec2> = ctx.buildings.iter().map(|b| b.centroid).collect();

    let mut clusters = cluster_buildings(&centroids, params.units(params.cluster_eps), params.cluster_min_samples);
    if clusters.is_empty() {
        clusters.push((0..centroids.len()).collect());
    }
    debug!("{} building clusters", clusters.len());

    let mut segments = Vec::new();
    for (cluster_idx, members) in clusters.iter().enumerate() {
        segments.extend(cluster_grid(ctx, cluster_idx, members));
    }
    segments
}

fn cluster_grid(ctx: &GenerationContext, cluster_idx: usize, members: &[usize]) -> Vec<Segment> {
    let params = ctx.params;
    let vertices: Vec<DVec2> = members
        .iter()
        .flat_map(|&i| ctx.buildings[i].footprint.iter().copied())
        .collect();
    let region = buffered_hull(&vertices, params.units(params.cluster_margin), params.buffer_arc_segments);
    if region.len() < 3 {
        return Vec::new();
    }

    let area = polygon_area(&region).abs();
    let raw_spacing = (area / members.len() as f64).sqrt() * params.junction_spacing_factor;
    let spacing = raw_spacing.clamp(params.units(params.junction_spacing_min), params.units(params.junction_spacing_max));

    let center = members.iter().map(|&i| ctx.buildings[i].centroid).sum::<DVec2>() / members.len() as f64;
    let (lo, hi) = region.iter().fold(
        (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    );
    let i_range = ((lo.x - center.x) / spacing).floor() as i64..=((hi.x - center.x) / spacing).ceil() as i64;
    let j_range = ((lo.y - center.y) / spacing).floor() as i64..=((hi.y - center.y) / spacing).ceil() as i64;

    // junction jitter, seeded per cluster
    let mut rng = StdRng::seed_from_u64(params.seed ^ cluster_idx as u64);
    let jitter = (params.junction_jitter > 0.0)
        .then(|| Normal::new(0.0, params.units(params.junction_jitter)).ok())
        .flatten();

    let mut junctions: HashMap<(i64, i64), DVec2> = HashMap::new();
    for j in j_range.clone() {
        for i in i_range.clone() {
            let mut p = center + DVec2::new(i as f64, j as f64) * spacing;
            if let Some(normal) = &jitter {
                p += DVec2::new(rng.sample(normal), rng.sample(normal));
            }
            if point_in_polygon(&p, &region)
                && ctx.boundary.contains(p, 0.0)
                && !ctx.zones.contains_point(p)
            {
                junctions.insert((i, j), p);
            }
        }
    }

    // connect neighbours along the grid lines, lines through the cluster center are connectors
    let mut segments = Vec::new();
    for j in j_range.clone() {
        for i in i_range.clone() {
            let Some(&p) = junctions.get(&(i, j)) else { continue };
            for (di, dj) in [(1, 0), (0, 1)] {
                let Some(&q) = junctions.get(&(i + di, j + dj)) else { continue };
                if ctx.zones.intersects_segment(p, q) {
                    continue;
                }
                let central = if dj == 0 { j == 0 } else { i == 0 };
                let role = if central { SegmentRole::ClusterConnector } else { SegmentRole::Street };
                segments.push(Segment::line(p, q, role));
            }
        }
    }

    debug!(
        "cluster {}: {} buildings, spacing {:.6}, {} junctions, {} links",
        cluster_idx,
        members.len(),
        spacing,
        junctions.len(),
        segments.len()
    );
    segments
}
