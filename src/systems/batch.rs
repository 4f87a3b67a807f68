// batch driver, one settlement per worker thread with a hard timeout

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::RoadGenError;
use crate::systems::export::write_geojson;
use crate::systems::network::settlement::Settlement;
use crate::systems::network::{generate_road_network, Params, RoadNetwork};

// most processed variant first
pub const BUILDING_FILE_PATTERNS: [&str; 4] = [
    "buildings_{city}.geojson_fixed.geojson_poly.geojson",
    "buildings_{city}.geojson_poly.geojson",
    "buildings_{city}.geojson.geojson",
    "buildings_{city}.geojson",
];

pub const REPORT_FILE: &str = "batch_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub city: String,
    pub status: BatchStatus,
    pub roads_generated: usize,
    pub processing_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub total_roads: usize,
    pub processing_ms: u64,
    pub results: Vec<SettlementResult>,
}

pub fn output_file_name(city: &str) -> String {
    format!("{}_roads.geojson", city.to_lowercase())
}

/// First existing building file for `city`, trying the most processed variant first
pub fn resolve_building_file(input_dir: &Path, city: &str) -> Option<PathBuf> {
    let city = city.to_lowercase();
    BUILDING_FILE_PATTERNS
        .iter()
        .map(|pattern| input_dir.join(pattern.replace("{city}", &city)))
        .find(|path| path.is_file())
}

// city name and pattern rank of a building file name
fn match_building_file(file_name: &str) -> Option<(String, usize)> {
    let rest = file_name.strip_prefix("buildings_")?;
    BUILDING_FILE_PATTERNS.iter().enumerate().find_map(|(rank, pattern)| {
        let suffix = pattern.strip_prefix("buildings_{city}")?;
        let city = rest.strip_suffix(suffix)?;
        (!city.is_empty() && !city.contains(".geojson")).then(|| (city.to_string(), rank))
    })
}

/// Every settlement with a building file, keeping the most processed file per city
pub fn find_settlement_files(input_dir: &Path) -> Result<Vec<(String, PathBuf)>, RoadGenError> {
    let mut best: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        let Some((city, rank)) = match_building_file(name) else { continue };
        match best.get(&city) {
            Some((current, _)) if *current <= rank => {}
            _ => {
                best.insert(city, (rank, path));
            }
        }
    }
    Ok(best.into_iter().map(|(city, (_, path))| (city, path)).collect())
}

pub fn load_settlement(path: &Path, city: &str) -> Result<Settlement, RoadGenError> {
    let text = fs::read_to_string(path)?;
    let collection: serde_json::Value = serde_json::from_str(&text)?;
    Settlement::from_feature_collection(city, &collection)
}

pub fn generate_settlement_file(city: &str, path: &Path, params: &Params) -> Result<RoadNetwork, RoadGenError> {
    let settlement = load_settlement(path, city)?;
    generate_road_network(&settlement, params)
}

/// Writes `<city>_roads.geojson` into `output_dir`
/// # Returns the number of roads written
pub fn write_settlement_roads(city: &str, network: &RoadNetwork, output_dir: &Path) -> Result<usize, RoadGenError> {
    fs::create_dir_all(output_dir)?;
    write_geojson(network, &output_dir.join(output_file_name(city)))?;
    Ok(network.roads.len())
}

/// Loads, generates and writes one settlement
/// # Returns the number of roads written
pub fn process_settlement_file(city: &str, path: &Path, output_dir: &Path, params: &Params) -> Result<usize, RoadGenError> {
    let network = generate_settlement_file(city, path, params)?;
    write_settlement_roads(city, &network, output_dir)
}

/// Processes every settlement in `input_dir`, failures are recorded and never retried.
/// Workers only generate; roads are written here, so a timed-out worker's late result
/// is dropped with its channel and never reaches the output directory.
pub fn run_batch(input_dir: &Path, output_dir: &Path, params: &Params, timeout: Duration) -> Result<BatchReport, RoadGenError> {
    let started = Instant::now();
    let files = find_settlement_files(input_dir)?;
    info!("batch: {} settlements in {}", files.len(), input_dir.display());

    let mut report = BatchReport { total: files.len(), ..Default::default() };

    for (city, path) in files {
        let city_started = Instant::now();
        let (tx, rx) = mpsc::channel();
        let worker_city = city.clone();
        let worker_params = params.clone();
        thread::spawn(move || {
            let result = generate_settlement_file(&worker_city, &path, &worker_params);
            // receiver is gone after a timeout
            let _ = tx.send(result);
        });

        let outcome = match rx.recv_timeout(timeout) {
            Ok(Ok(network)) => Ok(write_settlement_roads(&city, &network, output_dir).map_err(|e| e.to_string())),
            Ok(Err(e)) => Ok(Err(e.to_string())),
            Err(e) => Err(e),
        };
        let processing_ms = city_started.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(Ok(roads)) => {
                info!("{}: {} roads in {} ms", city, roads, processing_ms);
                report.successful += 1;
                report.total_roads += roads;
                SettlementResult { city, status: BatchStatus::Success, roads_generated: roads, processing_ms, error: None }
            }
            Ok(Err(message)) => {
                error!("{}: {}", city, message);
                report.failed += 1;
                SettlementResult { city, status: BatchStatus::Failed, roads_generated: 0, processing_ms, error: Some(message) }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("{}: timed out after {:?}", city, timeout);
                report.timed_out += 1;
                SettlementResult {
                    city,
                    status: BatchStatus::TimedOut,
                    roads_generated: 0,
                    processing_ms,
                    error: Some(format!("timed out after {:?}", timeout)),
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                error!("{}: worker panicked", city);
                report.failed += 1;
                SettlementResult {
                    city,
                    status: BatchStatus::Failed,
                    roads_generated: 0,
                    processing_ms,
                    error: Some("worker panicked".to_string()),
                }
            }
        };
        report.results.push(result);
    }

    report.processing_ms = started.elapsed().as_millis() as u64;
    Ok(report)
}

pub fn write_report(report: &BatchReport, output_dir: &Path) -> Result<PathBuf, RoadGenError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(REPORT_FILE);
    fs::write(&path, serde_json::to_string_pretty(report)?)?;
    Ok(path)
}
