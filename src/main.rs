use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::Deserialize;

use roadnet_gen::config::BATCH_TIMEOUT_SECS;
use roadnet_gen::systems::batch;
use roadnet_gen::systems::export;
use roadnet_gen::{generate_road_network, NetworkStrategy, Params, Settlement};

#[derive(Parser)]
#[command(name = "rn_gen")]
#[command(about = "Generates hierarchical road networks from building footprints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON file with generation parameters (missing fields use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for names, point of interest sampling and junction jitter
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Force a candidate strategy instead of choosing by building count
    #[arg(long, global = true, value_enum)]
    strategy: Option<StrategyArg>,

    /// Meters per input coordinate unit (111000 for degrees)
    #[arg(long, global = true)]
    meters_per_unit: Option<f64>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Read {"cityName", "buildings"} JSON from stdin or the argument, print road GeoJSON
    Json {
        /// Inline JSON request, stdin is read when omitted
        input: Option<String>,
    },
    /// Generate roads for one settlement from its building file
    File {
        city: String,
        #[arg(long, default_value = ".")]
        input_dir: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Generate roads for every settlement in a directory
    Batch {
        #[arg(long, default_value = ".")]
        input_dir: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        /// Per-settlement timeout in seconds
        #[arg(long, default_value_t = BATCH_TIMEOUT_SECS)]
        timeout: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Grid,
    Voronoi,
    Cluster,
    Pathfinder,
}

impl From<StrategyArg> for NetworkStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Grid => NetworkStrategy::Grid,
            StrategyArg::Voronoi => NetworkStrategy::Voronoi,
            StrategyArg::Cluster => NetworkStrategy::Cluster,
            StrategyArg::Pathfinder => NetworkStrategy::Pathfinder,
        }
    }
}

#[derive(Deserialize)]
struct JsonRequest {
    #[serde(rename = "cityName", default = "unknown_city")]
    city_name: String,
    #[serde(default = "empty_collection")]
    buildings: serde_json::Value,
}

fn unknown_city() -> String {
    "Unknown".to_string()
}

fn empty_collection() -> serde_json::Value {
    serde_json::json!({ "type": "FeatureCollection", "features": [] })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = load_params(&cli).and_then(|params| match &cli.command {
        Command::Json { input } => run_json(input.as_deref(), &params),
        Command::File { city, input_dir, output_dir } => run_file(city, input_dir, output_dir, &params),
        Command::Batch { input_dir, output_dir, timeout } => {
            run_batch(input_dir, output_dir, Duration::from_secs(*timeout), &params)
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(cli.command, Command::Json { .. }) {
                // callers of the json mode parse stdout, errors included
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_params(cli: &Cli) -> Result<Params> {
    let mut params = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => Params::default(),
    };

    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(strategy) = cli.strategy {
        params.strategy = Some(strategy.into());
    }
    if let Some(scale) = cli.meters_per_unit {
        params.meters_per_unit = scale;
    }
    Ok(params)
}

fn run_json(input: Option<&str>, params: &Params) -> Result<()> {
    let text = match input {
        Some(inline) if inline.trim_start().starts_with('{') => inline.to_string(),
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).context("failed to read stdin")?;
            buffer
        }
    };

    let request: JsonRequest = serde_json::from_str(&text).context("invalid request, expected {cityName, buildings}")?;
    let settlement = Settlement::from_feature_collection(&request.city_name, &request.buildings)?;
    let network = generate_road_network(&settlement, params)?;

    println!("{}", export::to_geojson_string(&network, true)?);
    Ok(())
}

fn run_file(city: &str, input_dir: &Path, output_dir: &Path, params: &Params) -> Result<()> {
    let path = batch::resolve_building_file(input_dir, city)
        .with_context(|| format!("no building file for {} in {}", city, input_dir.display()))?;
    info!("reading {}", path.display());

    let roads = batch::process_settlement_file(city, &path, output_dir, params)?;
    println!("Successfully generated {} roads for {}", roads, city);
    Ok(())
}

fn run_batch(input_dir: &Path, output_dir: &Path, timeout: Duration, params: &Params) -> Result<()> {
    let report = batch::run_batch(input_dir, output_dir, params, timeout)?;
    let path = batch::write_report(&report, output_dir)?;

    println!(
        "Processed {} settlements: {} succeeded, {} failed, {} timed out, {} roads",
        report.total, report.successful, report.failed, report.timed_out, report.total_roads
    );
    println!("Report written to {}", path.display());
    Ok(())
}
