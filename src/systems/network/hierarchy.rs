use std::ops::RangeInclusive;

use bevy_math::DVec2;
use rand::prelude::*;
use rand::rngs::StdRng;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};

use super::graph::NetworkGraph;
use super::poly::utils::polyline_polygon_distance;
use super::strategy::NetworkStrategy;
use super::{GenerationContext, Polyline, Segment, SegmentRole};

const PRIMARY_NAMES: [&str; 7] = [
    "Main Street", "High Street", "Market Road", "Castle Way",
    "King's Road", "Queen's Avenue", "Cathedral Street",
];
const SECONDARY_NAMES: [&str; 7] = [
    "Church Lane", "Mill Road", "Merchant Street", "Guild Way",
    "Harbor Road", "Smith Street", "Workshop Alley",
];
const TERTIARY_NAMES: [&str; 7] = [
    "Baker Street", "Well Lane", "Tanner Row", "Chapel Walk",
    "Weaver Street", "Cooper Lane", "Fishmonger Row",
];
const LOCAL_NAMES: [&str; 7] = [
    "Oak Lane", "Rose Street", "River Road", "Hill Path",
    "Garden Way", "Cottage Lane", "Narrow Alley",
];

/// Road class, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadTier {
    Local,
    Tertiary,
    Secondary,
    Primary,
}

impl RoadTier {
    /// Render width in meters
    pub fn width(&self) -> f64 {
        match self {
            RoadTier::Primary => 10.0,
            RoadTier::Secondary => 7.0,
            RoadTier::Tertiary => 5.0,
            RoadTier::Local => 4.0,
        }
    }

    pub fn importance_range(&self) -> RangeInclusive<u8> {
        match self {
            RoadTier::Primary => 8..=10,
            RoadTier::Secondary => 5..=7,
            RoadTier::Tertiary => 4..=5,
            RoadTier::Local => 1..=3,
        }
    }

    pub fn default_importance(&self) -> u8 {
        match self {
            RoadTier::Primary => 9,
            RoadTier::Secondary => 6,
            RoadTier::Tertiary => 4,
            RoadTier::Local => 3,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RoadTier::Primary => "primary",
            RoadTier::Secondary => "secondary",
            RoadTier::Tertiary => "tertiary",
            RoadTier::Local => "local",
        }
    }

    fn names(&self) -> &'static [&'static str] {
        match self {
            RoadTier::Primary => &PRIMARY_NAMES,
            RoadTier::Secondary => &SECONDARY_NAMES,
            RoadTier::Tertiary => &TERTIARY_NAMES,
            RoadTier::Local => &LOCAL_NAMES,
        }
    }

    // tier implied by the stage that produced a segment
    pub fn for_role(role: SegmentRole) -> Self {
        match role {
            SegmentRole::Backbone | SegmentRole::Route => RoadTier::Primary,
            SegmentRole::ClusterConnector | SegmentRole::Bridge => RoadTier::Secondary,
            SegmentRole::Street => RoadTier::Tertiary,
            SegmentRole::Access => RoadTier::Local,
        }
    }

    // tier implied by a nearby building of this importance
    pub fn for_building_importance(importance: u8) -> Option<Self> {
        match importance {
            i if i >= 8 => Some(RoadTier::Primary),
            5..=7 => Some(RoadTier::Secondary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRoad {
    pub id: String,
    pub points: Polyline,
    pub role: SegmentRole,
    pub tier: RoadTier,
    pub width: f64,
    pub importance: u8,
    pub name: String,
    pub algorithm: String,
    pub building: Option<usize>,
    pub start_node: Option<usize>,
    pub end_node: Option<usize>,
}

/// Assigns tier, width, importance and a seeded name to every segment
pub fn classify_roads(
    segments: &[Segment],
    graph: &NetworkGraph,
    ctx: &GenerationContext,
    strategy: NetworkStrategy,
) -> Vec<ClassifiedRoad> {
    let params = ctx.params;
    let reach = params.units(params.proximity_distance);

    // only buildings that can promote a road are indexed
    let notable: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
        ctx.buildings
            .iter()
            .enumerate()
            .filter(|(_, b)| RoadTier::for_building_importance(b.importance).is_some())
            .map(|(idx, b)| {
                let (lo, hi) = b.bounds();
                GeomWithData::new(Rectangle::from_corners([lo.x - reach, lo.y - reach], [hi.x + reach, hi.y + reach]), idx)
            })
            .collect(),
    );

    let mut role_counters = std::collections::HashMap::new();
    segments
        .iter()
        .enumerate()
        .map(|(counter, segment)| {
            let role_tier = RoadTier::for_role(segment.role);
            let driver = nearest_notable(&segment.points, &notable, ctx, reach);
            let proximity_tier = driver.and_then(|idx| RoadTier::for_building_importance(ctx.buildings[idx].importance));

            let (tier, importance) = match proximity_tier {
                Some(p) if p >= role_tier => {
                    let range = p.importance_range();
                    let building_importance = driver.map(|idx| ctx.buildings[idx].importance).unwrap_or(p.default_importance());
                    (p, building_importance.clamp(*range.start(), *range.end()))
                }
                _ => (role_tier, role_tier.default_importance()),
            };

            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(counter as u64));
            let name = tier.names().choose(&mut rng).copied().unwrap_or("Unnamed Road").to_string();

            let per_role = role_counters.entry(segment.role).or_insert(0usize);
            let id = format!("{}_{}", segment.role.tag(), per_role);
            *per_role += 1;

            ClassifiedRoad {
                id,
                points: segment.points.clone(),
                role: segment.role,
                tier,
                width: tier.width(),
                importance,
                name,
                algorithm: format!("{}_{}", strategy.tag(), segment.role.tag()),
                building: segment.building,
                start_node: graph.node_of(segment.start()),
                end_node: graph.node_of(segment.end()),
            }
        })
        .collect()
}

// most important building within reach, lowest index on ties
fn nearest_notable(
    points: &[DVec2],
    notable: &RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
    ctx: &GenerationContext,
    reach: f64,
) -> Option<usize> {
    let (lo, hi) = points.iter().fold(
        (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    );
    let envelope = AABB::from_corners([lo.x, lo.y], [hi.x, hi.y]);

    let mut best: Option<usize> = None;
    for entry in notable.locate_in_envelope_intersecting(&envelope) {
        let idx = entry.data;
        let building = &ctx.buildings[idx];
        if polyline_polygon_distance(points, &building.footprint) > reach {
            continue;
        }
        best = match best {
            Some(current) => {
                let incumbent = ctx.buildings[current].importance;
                if building.importance > incumbent || (building.importance == incumbent && idx < current) {
                    Some(idx)
                } else {
                    Some(current)
                }
            }
            None => Some(idx),
        };
    }
    best
}
