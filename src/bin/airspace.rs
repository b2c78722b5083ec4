//! FAA airspace data pipeline CLI.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sitekit::airspace::dataset::{self, DATASET_ORDER, DIR_DATA, DIR_GEOJSON, DIR_PMTILES};
use sitekit::airspace::sync::{self, SyncOptions, SyncStatus};
use sitekit::airspace::tiler::select_tiler;
use sitekit::airspace::{download, manifest, pipeline, upload};
use sitekit::util::{cancel, format, http};
use std::{fs, path::Path, process::ExitCode, time::SystemTime};

/// Manage FAA airspace data: sync, tile, manifest, upload
#[derive(Parser, Debug)]
#[command(name = "airspace", version, about, arg_required_else_help = true)]
struct Cli {
    /// Re-download and re-tile even when nothing changed
    #[arg(long)]
    force: bool,

    /// Tile engine
    #[arg(long, default_value = "auto")]
    tiler: String,

    /// Restrict to a single dataset
    #[arg(long)]
    dataset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run sync, tile and manifest in one pass
    Pipeline,
    /// Download changed datasets (ETag change detection)
    Sync,
    /// Generate PMTiles from downloaded GeoJSON
    Tile,
    /// Generate the global and regional manifests
    Manifest,
    /// Show local data file status
    Status,
    /// Show recent sync runs
    History,
    /// Show aggregate sync statistics
    Summary,
    /// Probe published endpoints
    Check,
    /// Download datasets unconditionally
    Download,
    /// Upload PMTiles and manifests to the object store
    Upload,
}

fn main() -> ExitCode {
    cancel::install();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Pipeline => run_pipeline(cli),
        Commands::Sync => run_sync(cli),
        Commands::Tile => run_tile(cli),
        Commands::Manifest => {
            manifest::generate_default_manifests()?;
            println!("Manifests written to {DIR_DATA}");
            Ok(())
        }
        Commands::Status => run_status(),
        Commands::History => run_history(),
        Commands::Summary => run_summary(),
        Commands::Check => upload::check_endpoints(),
        Commands::Download => run_download(cli),
        Commands::Upload => upload::upload_to_r2(),
    }
}

/// Dataset keys selected by `--dataset`, or the canonical order.
fn selected_datasets(cli: &Cli) -> Result<Vec<String>> {
    match &cli.dataset {
        Some(key) => {
            if dataset::dataset(key).is_none() {
                anyhow::bail!(
                    "unknown dataset: {key} (available: {})",
                    dataset::ALL_DATASETS.join(", ")
                );
            }
            Ok(vec![key.clone()])
        }
        None => Ok(DATASET_ORDER.iter().map(|s| s.to_string()).collect()),
    }
}

fn run_pipeline(cli: &Cli) -> Result<()> {
    let tiler = select_tiler(&cli.tiler)?;
    let opts = pipeline::PipelineOptions { force: cli.force };

    let result = pipeline::pipeline(&opts, tiler.as_ref())?;

    if result.skipped {
        println!("No changes detected, pipeline skipped");
        return Ok(());
    }
    println!(
        "Pipeline complete: {} updated, {} skipped, {} tiled",
        result.sync.updated, result.sync.skipped, result.tile_count
    );
    Ok(())
}

fn run_sync(cli: &Cli) -> Result<()> {
    let opts = SyncOptions {
        force: cli.force,
        datasets: selected_datasets(cli)?,
        ..Default::default()
    };
    let result = sync::sync(&opts)?;

    println!();
    println!(
        "Sync complete in {}: {} updated, {} unchanged ({:.1} MB)",
        result.duration, result.updated, result.skipped, result.total_size_mb
    );
    for (key, ds) in &result.datasets {
        if ds.status == SyncStatus::Error {
            println!("  {key}: ERROR {}", ds.error);
        }
    }
    Ok(())
}

fn run_tile(cli: &Cli) -> Result<()> {
    let tiler = select_tiler(&cli.tiler)?;
    let keys = selected_datasets(cli)?;
    let tiled = pipeline::tile_all(tiler.as_ref(), cli.force, Some(keys.as_slice()))?;
    println!("Tiled {tiled} dataset(s) with {}", tiler.name());
    Ok(())
}

fn run_download(cli: &Cli) -> Result<()> {
    let client = http::client(http::SYNC_TIMEOUT)?;
    let keys = selected_datasets(cli)?;
    download::download_all(&client, Path::new(DIR_GEOJSON), &keys)?;
    println!("Downloaded {} dataset(s)", keys.len());
    Ok(())
}

fn run_status() -> Result<()> {
    println!("{:<12} {:>12} {:>14} {:>12}", "Dataset", "GeoJSON", "Age", "PMTiles");
    println!("{:<12} {:>12} {:>14} {:>12}", "-------", "-------", "---", "-------");

    for key in DATASET_ORDER {
        let ds = dataset::dataset(key).expect("registry covers the canonical order");
        let geojson = fs::metadata(Path::new(DIR_GEOJSON).join(ds.geojson)).ok();
        let pmtiles = fs::metadata(Path::new(DIR_PMTILES).join(ds.pmtiles)).ok();

        let geojson_size = geojson
            .as_ref()
            .map_or_else(|| "missing".to_string(), |m| format!("{:.1} MB", format::mb(m.len())));
        let age = geojson
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map_or_else(|| "-".to_string(), describe_age);
        let pmtiles_size = pmtiles
            .map_or_else(|| "missing".to_string(), |m| format!("{:.1} MB", format::mb(m.len())));

        println!("{key:<12} {geojson_size:>12} {age:>14} {pmtiles_size:>12}");
    }

    let store = sync::load_etags(Path::new(DIR_DATA));
    println!();
    println!(
        "ETag store: {} entries, updated {}",
        store.etags.len(),
        format::format_time_since(store.updated_at)
    );
    Ok(())
}

fn describe_age(mtime: SystemTime) -> String {
    let dt: DateTime<Utc> = mtime.into();
    format::format_age((Utc::now() - dt).num_milliseconds().max(0))
}

fn run_history() -> Result<()> {
    let history = sync::load_history(Path::new(DIR_DATA));

    if history.runs.is_empty() {
        println!("No sync history yet");
        return Ok(());
    }

    println!(
        "{:<22} {:>9} {:>9} {:>10} {:>8}",
        "Timestamp", "Updated", "Skipped", "Size", "Duration"
    );
    for run in &history.runs {
        let stamp = run
            .timestamp
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        println!(
            "{stamp:<22} {:>9} {:>9} {:>7.1} MB {:>8}",
            run.updated, run.skipped, run.total_size_mb, run.duration
        );
    }
    Ok(())
}

fn run_summary() -> Result<()> {
    let history = sync::load_history(Path::new(DIR_DATA));
    let last = sync::load_last_result(Path::new(DIR_DATA));

    println!("Total runs:    {}", history.total_runs);
    println!("Changes seen:  {}", history.change_count);
    println!(
        "Last change:   {}",
        format::format_time_since(history.last_change)
    );
    println!("Avg duration:  {}", history.avg_duration);

    if last.timestamp.is_some() {
        println!();
        println!(
            "Last run:      {} updated, {} unchanged, {:.1} MB",
            last.updated, last.skipped, last.total_size_mb
        );
        for (key, ds) in &last.datasets {
            let status = serde_json::to_string(&ds.status)?;
            println!("  {key:<12} {}", status.trim_matches('"'));
        }
    }
    Ok(())
}
