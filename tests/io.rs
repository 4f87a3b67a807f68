mod common;

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use roadnet_gen::systems::batch::{self, BatchStatus};
use roadnet_gen::systems::export::{to_geojson_string, RoadFeatureCollection};
use roadnet_gen::{generate_road_network, Params, Settlement};
use serde_json::{json, Value};

// three ~8 m buildings around a 50 m triangle, in degrees
fn village_collection() -> Value {
    let square = |x: f64, y: f64, props: Value| {
        let h = 4.0 / 111_000.0;
        json!({
            "type": "Feature",
            "properties": props,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x - h, y - h], [x + h, y - h], [x + h, y + h], [x - h, y + h], [x - h, y - h]]]
            }
        })
    };
    let step = 50.0 / 111_000.0;
    json!({
        "type": "FeatureCollection",
        "features": [
            square(10.0, 50.0, json!({"id": "keep", "type": "Keep"})),
            square(10.0 + step, 50.0, json!({"type": "Cottage", "occupants": 4})),
            square(10.0 + step / 2.0, 50.0 + step * 0.86, json!({"specific_type": "Village Inn"})),
            {"type": "Feature", "properties": {}, "geometry": null}
        ]
    })
}

// `cols x rows` squares at a 60 m pitch, in degrees
fn lattice_collection(cols: usize, rows: usize) -> Value {
    let h = 4.0 / 111_000.0;
    let pitch = 60.0 / 111_000.0;
    let mut features = Vec::new();
    for j in 0..rows {
        for i in 0..cols {
            let (x, y) = (10.0 + i as f64 * pitch, 50.0 + j as f64 * pitch);
            features.push(json!({
                "type": "Feature",
                "properties": {"type": "House"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x - h, y - h], [x + h, y - h], [x + h, y + h], [x - h, y + h], [x - h, y - h]]]
                }
            }));
        }
    }
    json!({"type": "FeatureCollection", "features": features})
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rn_gen_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_feature_collection_end_to_end() {
    let settlement = Settlement::from_feature_collection("Oakvale", &village_collection()).unwrap();
    assert_eq!(settlement.buildings.len(), 3);
    assert_eq!(settlement.buildings[0].id, "keep");
    assert_eq!(settlement.buildings[0].importance, 10);
    assert_eq!(settlement.buildings[2].importance, 6);

    let params = Params::default();
    let network = generate_road_network(&settlement, &params).unwrap();
    common::assert_network_invariants(&settlement, &network, &params);

    let text = to_geojson_string(&network, true).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "FeatureCollection");
    assert_eq!(value["diagnostics"]["strategy_used"], "grid");

    let features = value["features"].as_array().unwrap();
    assert_eq!(features.len(), network.roads.len());
    for feature in features {
        assert_eq!(feature["geometry"]["type"], "LineString");
        let props = &feature["properties"];
        assert_eq!(props["city"], "Oakvale");
        assert!(props["algorithm"].as_str().unwrap().starts_with("grid_"));
        // coordinates stay in degrees
        let first = &feature["geometry"]["coordinates"][0];
        assert!((first[0].as_f64().unwrap() - 10.0).abs() < 0.05);
        assert!((first[1].as_f64().unwrap() - 50.0).abs() < 0.05);
    }

    // roads next to the keep are promoted
    assert!(network.roads.iter().any(|r| r.tier == roadnet_gen::RoadTier::Primary && r.importance == 10));

    let parsed: RoadFeatureCollection = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed.features, RoadFeatureCollection::from_network(&network, false).features);
}

#[test]
fn test_json_mode_prints_roads() {
    let request = json!({"cityName": "Oakvale", "buildings": village_collection()}).to_string();
    let mut child = Command::new(env!("CARGO_BIN_EXE_rn_gen"))
        .arg("json")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(request.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["type"], "FeatureCollection");
    assert!(!value["features"].as_array().unwrap().is_empty());
}

#[test]
fn test_json_mode_reports_errors_as_json() {
    let request = json!({"cityName": "Ghost", "buildings": {"type": "FeatureCollection", "features": []}});
    let output = Command::new(env!("CARGO_BIN_EXE_rn_gen"))
        .arg("json")
        .arg(request.to_string())
        .stderr(Stdio::null())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["error"].is_string());
}

#[test]
fn test_json_mode_defaults_city_name() {
    let request = json!({"buildings": village_collection()});
    let output = Command::new(env!("CARGO_BIN_EXE_rn_gen"))
        .arg("json")
        .arg(request.to_string())
        .stderr(Stdio::null())
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["features"][0]["properties"]["city"], "Unknown");
}

#[test]
fn test_file_mode_prefers_processed_variant() {
    let input = scratch_dir("file_in");
    let output = scratch_dir("file_out");
    fs::write(input.join("buildings_oakvale.geojson"), "not json").unwrap();
    fs::write(
        input.join("buildings_oakvale.geojson_poly.geojson"),
        village_collection().to_string(),
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_rn_gen"))
        .args(["file", "Oakvale", "--input-dir"])
        .arg(&input)
        .arg("--output-dir")
        .arg(&output)
        .stderr(Stdio::null())
        .output()
        .unwrap();

    assert!(status.status.success());
    let stdout = String::from_utf8_lossy(&status.stdout);
    assert!(stdout.starts_with("Successfully generated"));
    assert!(stdout.contains("roads for Oakvale"));
    assert!(output.join("oakvale_roads.geojson").is_file());
}

#[test]
fn test_batch_records_failures_and_successes() {
    let input = scratch_dir("batch_in");
    let output = scratch_dir("batch_out");
    fs::write(input.join("buildings_oakvale.geojson.geojson"), village_collection().to_string()).unwrap();
    fs::write(input.join("buildings_oakvale.geojson"), "not json").unwrap();
    fs::write(input.join("buildings_emptyton.geojson"), json!({"type": "FeatureCollection", "features": []}).to_string()).unwrap();
    fs::write(input.join("notes.txt"), "ignored").unwrap();

    let report = batch::run_batch(&input, &output, &Params::default(), Duration::from_secs(60)).unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.timed_out, 0);

    // results are ordered by city
    assert_eq!(report.results[0].city, "emptyton");
    assert_eq!(report.results[0].status, BatchStatus::Failed);
    assert!(report.results[0].error.is_some());
    assert_eq!(report.results[1].city, "oakvale");
    assert_eq!(report.results[1].status, BatchStatus::Success);
    assert_eq!(report.total_roads, report.results[1].roads_generated);

    let path = batch::write_report(&report, &output).unwrap();
    let written: batch::BatchReport = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written.results.len(), 2);
    assert!(output.join("oakvale_roads.geojson").is_file());
}

#[test]
fn test_batch_timeout_discards_late_result() {
    let input = scratch_dir("timeout_in");
    let output = scratch_dir("timeout_out");
    let collection = lattice_collection(10, 6);
    fs::write(input.join("buildings_slowtown.geojson"), collection.to_string()).unwrap();

    // how long the worker needs on its own
    let settlement = Settlement::from_feature_collection("slowtown", &collection).unwrap();
    let started = Instant::now();
    generate_road_network(&settlement, &Params::default()).unwrap();
    let generation = started.elapsed();

    let report = batch::run_batch(&input, &output, &Params::default(), Duration::ZERO).unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.timed_out, 1);
    assert_eq!(report.successful, 0);
    assert_eq!(report.results[0].status, BatchStatus::TimedOut);
    assert_eq!(report.results[0].roads_generated, 0);

    // let the abandoned worker finish, its roads must not be written
    thread::sleep(generation * 3 + Duration::from_millis(500));
    assert!(!output.join("slowtown_roads.geojson").exists());
}
