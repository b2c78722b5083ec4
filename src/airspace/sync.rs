//! Dataset sync with ETag-based change detection.
//!
//! Each run walks the configured datasets in canonical order, skips
//! unchanged ones via HEAD validator checks, downloads the rest, and
//! records the outcome in three atomically written state files: the ETag
//! store, the last result, and a bounded head-first history ring.

use crate::airspace::dataset::{
    self, DATASET_ORDER, FILE_SYNC_ETAGS, FILE_SYNC_HISTORY, FILE_SYNC_RESULT, MAX_HISTORY_RUNS,
};
use crate::airspace::download;
use crate::log;
use crate::util::{cancel, format, fsio, http};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// ============================================================================
// State Types
// ============================================================================

/// Last observed validator per dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtagStore {
    #[serde(default)]
    pub etags: BTreeMap<String, String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-dataset sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Unchanged,
    Updated,
    Missing,
    Error,
}

/// Per-dataset sync metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSync {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub duration_ms: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub size_bytes: i64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub size_mb: f64,
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub features: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub etag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}
fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}
fn is_zero_usize(v: &usize) -> bool {
    *v == 0
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResult {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub has_changes: bool,
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetSync>,
    #[serde(default)]
    pub total_bytes: i64,
    #[serde(default)]
    pub total_size_mb: f64,
}

/// Rolling log of sync runs, head-first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHistory {
    #[serde(default)]
    pub last_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub change_count: usize,
    #[serde(default)]
    pub total_runs: usize,
    #[serde(default)]
    pub avg_duration: String,
    #[serde(default)]
    pub avg_duration_ms: i64,
    #[serde(default)]
    pub runs: Vec<SyncResult>,
}

// ============================================================================
// Options
// ============================================================================

/// Sync behavior configuration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub force: bool,
    pub timeout: Duration,
    pub datasets: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(dataset::DIR_GEOJSON),
            data_dir: PathBuf::from(dataset::DIR_DATA),
            force: false,
            timeout: http::SYNC_TIMEOUT,
            datasets: DATASET_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Sync
// ============================================================================

/// Download FAA data with ETag-based change detection.
pub fn sync(opts: &SyncOptions) -> Result<SyncResult> {
    let sync_start = Instant::now();

    fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("creating {}", opts.output_dir.display()))?;
    fs::create_dir_all(&opts.data_dir)
        .with_context(|| format!("creating {}", opts.data_dir.display()))?;

    let etag_file = opts.data_dir.join(FILE_SYNC_ETAGS);
    let history_file = opts.data_dir.join(FILE_SYNC_HISTORY);
    let result_file = opts.data_dir.join(FILE_SYNC_RESULT);

    let mut store: EtagStore = fsio::read_json_or_default(&etag_file);
    let mut history: SyncHistory = fsio::read_json_or_default(&history_file);
    let client = http::client(opts.timeout)?;

    let mut result = SyncResult {
        timestamp: Some(Utc::now()),
        ..Default::default()
    };
    let mut total_bytes = 0i64;

    for key in &opts.datasets {
        cancel::check()?;

        let ds_start = Instant::now();
        let Some(ds) = dataset::dataset(key) else {
            anyhow::bail!("unknown dataset: {key}");
        };
        let out_path = opts.output_dir.join(ds.geojson);
        let mut ds_result = DatasetSync::default();

        // Decide whether a download is needed
        let mut needs_download = opts.force;
        let mut new_etag = None;

        if !needs_download && !out_path.exists() {
            needs_download = true;
            ds_result.status = SyncStatus::Missing;
        }

        if !needs_download {
            let old = store.etags.get(key.as_str()).map_or("", String::as_str);
            let (etag, changed) = http::check_validator(&client, ds.check_url(), old);
            new_etag = etag;
            if changed {
                needs_download = true;
            } else {
                ds_result.status = SyncStatus::Unchanged;
                ds_result.etag = old.to_string();
                ds_result.duration_ms = ds_start.elapsed().as_millis() as i64;
                result.datasets.insert(key.clone(), ds_result);
                result.skipped += 1;
                log!("sync"; "{}: unchanged", ds.key);
                continue;
            }
        }

        // Download
        let download_result = if ds.paginated {
            download::download_paginated(&client, ds, &out_path)
        } else {
            http::download_to_file(&client, ds.base_url, &out_path).map(|_| ())
        };

        if let Err(err) = download_result {
            ds_result.status = SyncStatus::Error;
            ds_result.error = err.to_string();
            ds_result.duration_ms = ds_start.elapsed().as_millis() as i64;
            result.datasets.insert(key.clone(), ds_result);
            log!("error"; "{}: {err:#}", ds.key);
            continue;
        }

        // Record the validator for next run's change check
        if new_etag.is_none() {
            // Paginated and force paths never saw a HEAD response
            let (etag, _) = http::check_validator(&client, ds.check_url(), "");
            new_etag = etag;
        }
        if let Some(etag) = new_etag {
            store.etags.insert(key.clone(), etag.clone());
            ds_result.etag = etag;
        }

        if let Ok(info) = fs::metadata(&out_path) {
            let size = info.len() as i64;
            total_bytes += size;
            ds_result.size_bytes = size;
            ds_result.size_mb = format::mb(info.len());
        }

        ds_result.status = SyncStatus::Updated;
        ds_result.duration_ms = ds_start.elapsed().as_millis() as i64;
        log!("sync"; "{}: updated ({:.1} MB)", ds.key, ds_result.size_mb);
        result.datasets.insert(key.clone(), ds_result);
        result.updated += 1;
    }

    // Finalize
    let elapsed = sync_start.elapsed();
    result.duration_ms = elapsed.as_millis() as i64;
    result.duration = format::format_duration_ms(result.duration_ms);
    result.has_changes = result.updated > 0;
    result.total_bytes = total_bytes;
    result.total_size_mb = format::mb(total_bytes.max(0) as u64);

    store.updated_at = Some(Utc::now());
    fsio::write_json_atomic(&etag_file, &store).context("saving etags")?;

    record_run(&mut history, result.clone());
    fsio::write_json_atomic(&history_file, &history).context("saving history")?;
    fsio::write_json_atomic(&result_file, &result).context("saving result")?;

    Ok(result)
}

/// Extend the history ring at the head and refresh aggregates.
pub fn record_run(history: &mut SyncHistory, result: SyncResult) {
    if result.has_changes {
        history.last_change = result.timestamp;
        history.change_count += 1;
    }
    history.total_runs += 1;

    history.runs.insert(0, result);
    history.runs.truncate(MAX_HISTORY_RUNS);

    let total_ms: i64 = history.runs.iter().map(|r| r.duration_ms).sum();
    history.avg_duration_ms = total_ms / history.runs.len() as i64;
    history.avg_duration = format::format_duration_ms(history.avg_duration_ms);
}

/// Load the ETag store (empty when missing).
pub fn load_etags(data_dir: &Path) -> EtagStore {
    fsio::read_json_or_default(&data_dir.join(FILE_SYNC_ETAGS))
}

/// Load sync history (empty when missing).
pub fn load_history(data_dir: &Path) -> SyncHistory {
    fsio::read_json_or_default(&data_dir.join(FILE_SYNC_HISTORY))
}

/// Load the last sync result (default when missing).
pub fn load_last_result(data_dir: &Path) -> SyncResult {
    fsio::read_json_or_default(&data_dir.join(FILE_SYNC_RESULT))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(duration_ms: i64, has_changes: bool) -> SyncResult {
        SyncResult {
            timestamp: Some(Utc::now()),
            duration_ms,
            has_changes,
            updated: usize::from(has_changes),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_run_head_first() {
        let mut history = SyncHistory::default();
        record_run(&mut history, run_with(100, false));
        record_run(&mut history, run_with(200, true));

        assert_eq!(history.total_runs, 2);
        assert_eq!(history.change_count, 1);
        // Newest first
        assert_eq!(history.runs[0].duration_ms, 200);
        assert_eq!(history.runs[1].duration_ms, 100);
        assert_eq!(history.avg_duration_ms, 150);
    }

    #[test]
    fn test_record_run_ring_bound() {
        let mut history = SyncHistory::default();
        for i in 0..25 {
            record_run(&mut history, run_with(i, false));
        }

        assert_eq!(history.runs.len(), MAX_HISTORY_RUNS);
        assert_eq!(history.total_runs, 25);
        // Head is the most recent run
        assert_eq!(history.runs[0].duration_ms, 24);
        // Oldest five runs fell off the tail
        assert_eq!(history.runs.last().unwrap().duration_ms, 5);
    }

    #[test]
    fn test_record_run_tracks_last_change() {
        let mut history = SyncHistory::default();
        record_run(&mut history, run_with(10, false));
        assert!(history.last_change.is_none());

        let changed = run_with(10, true);
        let stamp = changed.timestamp;
        record_run(&mut history, changed);
        assert_eq!(history.last_change, stamp);

        // A quiet run afterwards keeps the marker
        record_run(&mut history, run_with(10, false));
        assert_eq!(history.last_change, stamp);
    }

    #[test]
    fn test_sync_status_serialization() {
        let json = serde_json::to_string(&SyncStatus::Unchanged).unwrap();
        assert_eq!(json, "\"unchanged\"");
        let status: SyncStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(status, SyncStatus::Error);
    }

    #[test]
    fn test_history_tolerates_missing_fields() {
        // A file written by an older schema still loads
        let history: SyncHistory =
            serde_json::from_str(r#"{"runs": [{"duration_ms": 5}]}"#).unwrap();
        assert_eq!(history.runs.len(), 1);
        assert_eq!(history.total_runs, 0);
        assert!(history.last_change.is_none());
    }

    #[test]
    fn test_dataset_sync_omits_empty_fields() {
        let ds = DatasetSync {
            status: SyncStatus::Unchanged,
            ..Default::default()
        };
        let json = serde_json::to_string(&ds).unwrap();
        assert_eq!(json, r#"{"status":"unchanged"}"#);
    }

    #[test]
    fn test_default_options_follow_canonical_order() {
        let opts = SyncOptions::default();
        assert_eq!(
            opts.datasets,
            DATASET_ORDER
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
        assert_eq!(opts.timeout, http::SYNC_TIMEOUT);
        assert!(!opts.force);
    }
}
