// saves the road network as a GeoJSON FeatureCollection
// one LineString feature per classified road

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::RoadGenError;
use crate::systems::network::hierarchy::{ClassifiedRoad, RoadTier};
use crate::systems::network::{GenerationReport, RoadNetwork};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadFeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<RoadFeature>,
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub diagnostics: Option<GenerationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: LineGeometry,
    pub properties: RoadProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadProperties {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub tier: RoadTier,
    pub width: f64,
    pub importance: u8,
    pub city: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_node: Option<usize>,
}

impl RoadFeature {
    pub fn from_road(road: &ClassifiedRoad, city: &str) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: LineGeometry {
                kind: "LineString".to_string(),
                coordinates: road.points.iter().map(|p| [p.x, p.y]).collect(),
            },
            properties: RoadProperties {
                id: road.id.clone(),
                name: road.name.clone(),
                tier: road.tier,
                width: road.width,
                importance: road.importance,
                city: city.to_string(),
                algorithm: road.algorithm.clone(),
                start_node: road.start_node,
                end_node: road.end_node,
            },
        }
    }
}

impl RoadFeatureCollection {
    pub fn from_network(network: &RoadNetwork, with_diagnostics: bool) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: network.roads.iter().map(|r| RoadFeature::from_road(r, &network.city)).collect(),
            diagnostics: with_diagnostics.then(|| network.report.clone()),
        }
    }
}

pub fn to_geojson_string(network: &RoadNetwork, with_diagnostics: bool) -> Result<String, RoadGenError> {
    Ok(serde_json::to_string(&RoadFeatureCollection::from_network(network, with_diagnostics))?)
}

// write the network to disk
pub fn write_geojson(network: &RoadNetwork, path: &Path) -> Result<(), RoadGenError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, &RoadFeatureCollection::from_network(network, true))?;
    writeln!(writer)?;
    writer.flush()?;

    info!("exported {} roads to {}", network.roads.len(), path.display());
    Ok(())
}
