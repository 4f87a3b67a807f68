use bevy_math::DVec2;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::RoadGenError;
use super::poly::utils::{polygon_area, polygon_centroid};
use super::Polygon;

// type keywords, matched as substrings of the building type
const IMPORTANT_BUILDINGS: [&str; 11] = [
    "Keep", "Town Hall", "Market Square", "Cathedral", "Temple", "Castle",
    "Palace", "Guildhall", "Bank", "Harbor", "Fort",
];
const SECONDARY_BUILDINGS: [&str; 12] = [
    "Church", "Inn", "Tavern", "Shop", "Merchant", "Workshop",
    "School", "Library", "Barracks", "Warehouse", "Mill", "Forge",
];

#[derive(Debug, Clone)]
pub struct Building {
    pub id: String,
    pub index: usize,
    pub kind: String,
    pub footprint: Polygon,
    pub centroid: DVec2,
    pub importance: u8,
}

impl Building {
    /// Builds a building from its outer ring.
    /// A closing duplicate vertex is removed; rings with fewer than 3 distinct vertices or no area give `None`.
    pub fn from_footprint(index: usize, mut footprint: Polygon) -> Option<Self> {
        if footprint.len() > 1 && footprint.first() == footprint.last() {
            footprint.pop();
        }
        footprint.dedup();
        if footprint.len() < 3 || footprint.iter().any(|p| !p.is_finite()) {
            return None;
        }

        let area = polygon_area(&footprint);
        if area == 0.0 {
            return None;
        }
        let centroid = polygon_centroid(&footprint, area);

        Some(Self {
            id: format!("building_{}", index),
            index,
            kind: "residential".to_string(),
            footprint,
            centroid,
            importance: 2,
        })
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance = importance.clamp(1, 10);
        self
    }

    /// Axis aligned bounds of the footprint
    pub fn bounds(&self) -> (DVec2, DVec2) {
        self.footprint.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        )
    }
}

/// A named settlement and its buildings, read-only once parsed
#[derive(Debug, Clone)]
pub struct Settlement {
    pub name: String,
    pub buildings: Vec<Building>,
}

impl Settlement {
    pub fn new(name: impl Into<String>, buildings: Vec<Building>) -> Self {
        Self { name: name.into(), buildings }
    }

    /// Reads a GeoJSON FeatureCollection of building polygons.
    /// Malformed features are skipped; no usable building at all is an `Input` error.
    pub fn from_feature_collection(name: &str, collection: &Value) -> Result<Self, RoadGenError> {
        let features = collection
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| RoadGenError::Input("buildings must be a FeatureCollection with a features array".to_string()))?;

        let mut buildings = Vec::with_capacity(features.len());
        let mut skipped = 0;

        for (feature_idx, feature) in features.iter().enumerate() {
            let Some(ring) = feature.get("geometry").and_then(parse_outer_ring) else {
                skipped += 1;
                debug!("skipping feature {} without a usable polygon", feature_idx);
                continue;
            };

            let index = buildings.len();
            let Some(mut building) = Building::from_footprint(index, ring) else {
                skipped += 1;
                debug!("skipping feature {} with a degenerate footprint", feature_idx);
                continue;
            };

            let empty = Map::new();
            let props = feature.get("properties").and_then(Value::as_object).unwrap_or(&empty);

            if let Some(id) = property_string(props, "id").or_else(|| feature.get("id").and_then(value_to_string)) {
                building.id = id;
            }
            if let Some(kind) = property_string(props, "specific_type").or_else(|| property_string(props, "type")) {
                building.kind = kind;
            }
            building.importance = classify_building_importance(props);

            buildings.push(building);
        }

        if skipped > 0 {
            warn!("{}: skipped {} malformed building features", name, skipped);
        }
        if buildings.is_empty() {
            return Err(RoadGenError::Input(format!("{} has no usable building footprints", name)));
        }

        Ok(Self::new(name, buildings))
    }
}

/// Importance tier 1-10 from building properties.
/// An explicit `importance` wins, then type keywords, then occupant count.
pub fn classify_building_importance(props: &Map<String, Value>) -> u8 {
    if let Some(explicit) = props.get("importance").and_then(Value::as_f64) {
        if (1.0..=10.0).contains(&explicit) {
            return explicit.round() as u8;
        }
    }

    let kind = property_string(props, "specific_type")
        .or_else(|| property_string(props, "type"))
        .unwrap_or_default();

    if IMPORTANT_BUILDINGS.iter().any(|k| kind.contains(k)) {
        return 10;
    }
    if SECONDARY_BUILDINGS.iter().any(|k| kind.contains(k)) {
        return 6;
    }

    let occupants = props.get("occupants").and_then(Value::as_f64).unwrap_or(0.0);
    match occupants {
        o if o > 50.0 => 7,
        o if o > 20.0 => 5,
        o if o > 10.0 => 4,
        o if o > 5.0 => 3,
        _ => 2,
    }
}

fn property_string(props: &Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(value_to_string).filter(|s| !s.is_empty())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// outer ring of a Polygon, or of the largest part of a MultiPolygon
fn parse_outer_ring(geometry: &Value) -> Option<Polygon> {
    let coords = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Polygon" => parse_ring(coords.as_array()?.first()?),
        "MultiPolygon" => coords
            .as_array()?
            .iter()
            .filter_map(|part| parse_ring(part.as_array()?.first()?))
            .max_by(|a, b| polygon_area(a).abs().total_cmp(&polygon_area(b).abs())),
        _ => None,
    }
}

fn parse_ring(ring: &Value) -> Option<Polygon> {
    ring.as_array()?
        .iter()
        .map(|pos| {
            let pos = pos.as_array()?;
            Some(DVec2::new(pos.first()?.as_f64()?, pos.get(1)?.as_f64()?))
        })
        .collect()
}
