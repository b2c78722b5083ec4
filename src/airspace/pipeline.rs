//! Pipeline orchestration: sync, tile, manifest.
//!
//! The tile stage only runs when sync reported changes or the caller
//! forced it; a dataset is only re-tiled when its GeoJSON is newer than
//! its PMTiles.

use crate::airspace::dataset::{self, DATASET_ORDER, DIR_GEOJSON, DIR_PMTILES};
use crate::airspace::manifest;
use crate::airspace::sync::{self, SyncOptions, SyncResult};
use crate::airspace::tiler::Tiler;
use crate::log;
use crate::util::cancel;
use anyhow::{Context, Result, bail};
use std::{fs, path::Path, time::SystemTime};

/// Pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub force: bool,
}

/// Outcome of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub sync: SyncResult,
    pub tile_count: usize,
    /// True when no changes were detected and nothing was forced.
    pub skipped: bool,
}

/// Run the full sync, tile, manifest pipeline.
pub fn pipeline(opts: &PipelineOptions, tiler: &dyn Tiler) -> Result<PipelineResult> {
    let sync_opts = SyncOptions {
        force: opts.force,
        ..Default::default()
    };
    let sync_result = sync::sync(&sync_opts).context("sync")?;

    if !sync_result.has_changes && !opts.force {
        return Ok(PipelineResult {
            sync: sync_result,
            skipped: true,
            ..Default::default()
        });
    }

    let tile_count = tile_all(tiler, opts.force, None).context("tile")?;

    manifest::generate_default_manifests().context("manifest")?;

    Ok(PipelineResult {
        sync: sync_result,
        tile_count,
        skipped: false,
    })
}

/// Generate PMTiles for the given datasets (canonical order by default).
///
/// Returns how many datasets were tiled; up-to-date and missing inputs
/// are skipped.
pub fn tile_all(tiler: &dyn Tiler, force: bool, keys: Option<&[String]>) -> Result<usize> {
    fs::create_dir_all(DIR_PMTILES).context("creating tiles dir")?;

    let default_keys: Vec<String> = DATASET_ORDER.iter().map(|s| s.to_string()).collect();
    let keys = keys.unwrap_or(&default_keys);

    let mut tiled = 0;
    for key in keys {
        cancel::check()?;

        let Some(ds) = dataset::dataset(key) else {
            bail!("unknown dataset: {key}");
        };
        let geojson_path = Path::new(DIR_GEOJSON).join(ds.geojson);
        let pmtiles_path = Path::new(DIR_PMTILES).join(ds.pmtiles);

        let Ok(geojson_meta) = fs::metadata(&geojson_path) else {
            continue; // Not synced yet
        };

        let pmtiles_mtime = fs::metadata(&pmtiles_path)
            .and_then(|m| m.modified())
            .ok();
        let geojson_mtime = geojson_meta
            .modified()
            .with_context(|| format!("mtime of {}", geojson_path.display()))?;

        if up_to_date(geojson_mtime, pmtiles_mtime, force) {
            log!("tile"; "{}: up to date", ds.key);
            continue;
        }

        log!("tile"; "{}: tiling with {}", ds.key, tiler.name());
        tiler
            .tile(&geojson_path, &pmtiles_path, &dataset::tile_config(key))
            .with_context(|| format!("tiling {key}"))?;
        tiled += 1;
    }

    Ok(tiled)
}

/// Generate PMTiles for a single dataset.
pub fn tile_one(tiler: &dyn Tiler, key: &str, force: bool) -> Result<()> {
    if dataset::dataset(key).is_none() {
        bail!("unknown dataset: {key}");
    }
    let keys = [key.to_string()];
    tile_all(tiler, force, Some(keys.as_slice()))?;
    Ok(())
}

/// Skip rule: the PMTiles output is strictly newer than its input.
#[inline]
pub fn up_to_date(geojson_mtime: SystemTime, pmtiles_mtime: Option<SystemTime>, force: bool) -> bool {
    if force {
        return false;
    }
    pmtiles_mtime.is_some_and(|t| t > geojson_mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_up_to_date_newer_output() {
        let geojson = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let pmtiles = SystemTime::UNIX_EPOCH + Duration::from_secs(2000);
        assert!(up_to_date(geojson, Some(pmtiles), false));
    }

    #[test]
    fn test_up_to_date_stale_output() {
        let geojson = SystemTime::UNIX_EPOCH + Duration::from_secs(2000);
        let pmtiles = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        assert!(!up_to_date(geojson, Some(pmtiles), false));
    }

    #[test]
    fn test_up_to_date_equal_mtimes_retiles() {
        // Strictly newer is required
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        assert!(!up_to_date(t, Some(t), false));
    }

    #[test]
    fn test_up_to_date_missing_output() {
        let geojson = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        assert!(!up_to_date(geojson, None, false));
    }

    #[test]
    fn test_up_to_date_force_overrides() {
        let geojson = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let pmtiles = SystemTime::UNIX_EPOCH + Duration::from_secs(2000);
        assert!(!up_to_date(geojson, Some(pmtiles), true));
    }
}
