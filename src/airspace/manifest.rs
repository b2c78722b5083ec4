//! Manifest generation.
//!
//! Two documents are emitted: a global manifest listing regions and a
//! USA regional manifest with one entry per layer carrying render rules
//! and a legend. Layer sizes come from the PMTiles files on disk at
//! emission time; feature counts from the GeoJSON.

use crate::airspace::dataset::{
    self, DATASET_ORDER, DIR_DATA, DIR_GEOJSON, DIR_PMTILES, FILE_MANIFEST, FILE_USA_MANIFEST,
};
use crate::util::{format, fsio};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

// ============================================================================
// Manifest Types
// ============================================================================

/// Top-level manifest listing available regions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalManifest {
    pub version: u32,
    pub updated: String,
    pub regions: BTreeMap<String, ManifestRegion>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// A geographic region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestRegion {
    pub name: String,
    pub bbox: Vec<f64>,
    pub tiles_path: String,
    pub manifest_file: String,
    pub default_layers: Vec<String>,
}

/// Regional manifest listing layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionManifest {
    pub region: String,
    pub name: String,
    pub version: u32,
    pub updated: String,
    pub bbox: Vec<f64>,
    pub layers: BTreeMap<String, ManifestLayer>,
    pub source: ManifestSource,
}

/// A data layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestLayer {
    pub name: String,
    pub file: String,
    pub pmtiles_layer: String,
    /// polygon, point or line
    pub geom_type: String,
    pub size_mb: f64,
    pub features: usize,
    pub zoom_range: Vec<i32>,
    pub default_visible: bool,
    pub render_rules: Vec<RenderRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legend: Vec<LegendEntry>,
}

/// Feature styling. Rules are evaluated in order; a trailing rule with
/// no filter property is the fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter_prop: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter_value: String,
    pub fill: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stroke: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub width: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub radius: f64,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Legend entry for UI layer toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// Data source attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestSource {
    pub authority: String,
    pub urls: BTreeMap<String, String>,
    pub update_cycle: String,
}

/// Computed metrics for a layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerMetrics {
    pub size_mb: f64,
    pub features: usize,
}

// ============================================================================
// Generation
// ============================================================================

/// Generate both manifests into `data_dir` and copy them to the static
/// dir for local development.
pub fn generate_manifests(data_dir: &Path, tiles_dir: &Path, geojson_dir: &Path) -> Result<()> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut metrics: BTreeMap<&str, LayerMetrics> = BTreeMap::new();
    for key in DATASET_ORDER {
        let ds = dataset::dataset(key).expect("registry covers the canonical order");
        let size_mb = fs::metadata(tiles_dir.join(ds.pmtiles))
            .map(|info| format::mb(info.len()))
            .unwrap_or(0.0);
        let features = count_geojson_features(&geojson_dir.join(ds.geojson));
        metrics.insert(*key, LayerMetrics { size_mb, features });
    }

    let global = global_manifest(&timestamp);
    let usa = usa_manifest(&timestamp, &metrics);

    let global_path = data_dir.join(FILE_MANIFEST);
    let usa_path = data_dir.join(FILE_USA_MANIFEST);
    fsio::write_json_atomic(&global_path, &global)?;
    fsio::write_json_atomic(&usa_path, &usa)?;

    // Copies for local dev next to the published artifacts
    copy_file(&global_path, &geojson_dir.join(FILE_MANIFEST))?;
    copy_file(&usa_path, &geojson_dir.join(FILE_USA_MANIFEST))?;

    Ok(())
}

/// Generate manifests at the default locations.
pub fn generate_default_manifests() -> Result<()> {
    generate_manifests(
        Path::new(DIR_DATA),
        Path::new(DIR_PMTILES),
        Path::new(DIR_GEOJSON),
    )
}

fn global_manifest(timestamp: &str) -> GlobalManifest {
    let mut regions = BTreeMap::new();
    regions.insert(
        "usa".to_string(),
        ManifestRegion {
            name: "United States".into(),
            bbox: vec![-125.0, 24.0, -66.0, 50.0],
            tiles_path: "tiles".into(),
            manifest_file: FILE_USA_MANIFEST.into(),
            default_layers: vec!["boundary".into(), "sua".into()],
        },
    );

    let mut notes = BTreeMap::new();
    notes.insert("bbox_format".into(), "[west, south, east, north]".into());
    notes.insert("tiles_path".into(), "Relative to /airspace/ in R2".into());
    notes.insert(
        "future_regions".into(),
        "europe, canada, australia, japan".into(),
    );

    GlobalManifest {
        version: 1,
        updated: timestamp.to_string(),
        regions,
        notes,
    }
}

fn usa_manifest(timestamp: &str, metrics: &BTreeMap<&str, LayerMetrics>) -> RegionManifest {
    let metric = |key: &str| metrics.get(key).copied().unwrap_or_default();

    let mut urls = BTreeMap::new();
    urls.insert(
        "adds".to_string(),
        "https://adds-faa.opendata.arcgis.com".to_string(),
    );
    urls.insert(
        "udds".to_string(),
        "https://udds-faa.opendata.arcgis.com".to_string(),
    );

    let mut layers = BTreeMap::new();

    let boundary = metric("boundary");
    layers.insert(
        "boundary".to_string(),
        ManifestLayer {
            name: "Airspace Boundary".into(),
            file: "faa_airspace_boundary.pmtiles".into(),
            pmtiles_layer: "boundary".into(),
            geom_type: "polygon".into(),
            size_mb: boundary.size_mb,
            features: boundary.features,
            zoom_range: vec![4, 14],
            default_visible: true,
            render_rules: vec![
                class_rule("CLASS", "A", "#0066cc", 0.15, 1.0),
                class_rule("CLASS", "C", "#cc00cc", 0.2, 2.0),
                class_rule("CLASS", "D", "#0099cc", 0.15, 2.0),
                class_rule("CLASS", "E", "#00cc99", 0.1, 1.0),
                class_rule("CLASS", "G", "#999999", 0.05, 1.0),
                fallback_rule(),
            ],
            legend: vec![
                legend("Class A", "#0066cc"),
                legend("Class C", "#cc00cc"),
                legend("Class D", "#0099cc"),
                legend("Class E", "#00cc99"),
            ],
        },
    );

    let sua = metric("sua");
    layers.insert(
        "sua".to_string(),
        ManifestLayer {
            name: "Special Use Airspace".into(),
            file: "faa_special_use_airspace.pmtiles".into(),
            pmtiles_layer: "sua".into(),
            geom_type: "polygon".into(),
            size_mb: sua.size_mb,
            features: sua.features,
            zoom_range: vec![4, 14],
            default_visible: true,
            render_rules: vec![
                class_rule("TYPE_CODE", "R", "#cc0000", 0.3, 2.0),
                class_rule("TYPE_CODE", "P", "#ff0000", 0.4, 2.0),
                class_rule("TYPE_CODE", "MOA", "#ff9900", 0.2, 1.0),
                class_rule("TYPE_CODE", "A", "#ffcc00", 0.2, 1.0),
                class_rule("TYPE_CODE", "W", "#996600", 0.15, 1.0),
                fallback_rule(),
            ],
            legend: vec![
                legend("Restricted", "#cc0000"),
                legend("Prohibited", "#ff0000"),
                legend("MOA", "#ff9900"),
                legend("Alert", "#ffcc00"),
                legend("Warning", "#996600"),
            ],
        },
    );

    let uas = metric("uas");
    layers.insert(
        "laanc".to_string(),
        ManifestLayer {
            name: "LAANC/UAS Facility Map".into(),
            file: "faa_uas_facility_map.pmtiles".into(),
            pmtiles_layer: "uas".into(),
            geom_type: "polygon".into(),
            size_mb: uas.size_mb,
            features: uas.features,
            zoom_range: vec![6, 14],
            default_visible: false,
            render_rules: vec![RenderRule {
                fill: "#ffff00".into(),
                stroke: "#cc9900".into(),
                opacity: 0.5,
                width: 1.0,
                ..Default::default()
            }],
            legend: vec![legend("LAANC Grid", "#ffff00")],
        },
    );

    let airports = metric("airports");
    layers.insert(
        "airports".to_string(),
        ManifestLayer {
            name: "Airports".into(),
            file: "faa_airports.pmtiles".into(),
            pmtiles_layer: "airports".into(),
            geom_type: "point".into(),
            size_mb: airports.size_mb,
            features: airports.features,
            zoom_range: vec![0, 10],
            default_visible: false,
            render_rules: vec![RenderRule {
                fill: "#00ff00".into(),
                stroke: "#006600".into(),
                width: 1.0,
                radius: 5.0,
                ..Default::default()
            }],
            legend: vec![legend("Airport", "#00ff00")],
        },
    );

    let navaids = metric("navaids");
    layers.insert(
        "navaids".to_string(),
        ManifestLayer {
            name: "Navigation Aids".into(),
            file: "faa_navaids.pmtiles".into(),
            pmtiles_layer: "navaids".into(),
            geom_type: "point".into(),
            size_mb: navaids.size_mb,
            features: navaids.features,
            zoom_range: vec![0, 10],
            default_visible: false,
            render_rules: vec![RenderRule {
                fill: "#ff00ff".into(),
                stroke: "#660066".into(),
                width: 1.0,
                radius: 4.0,
                ..Default::default()
            }],
            legend: vec![legend("VOR/NDB", "#ff00ff")],
        },
    );

    RegionManifest {
        region: "usa".into(),
        name: "United States".into(),
        version: 1,
        updated: timestamp.to_string(),
        bbox: vec![-125.0, 24.0, -66.0, 50.0],
        layers,
        source: ManifestSource {
            authority: "FAA".into(),
            urls,
            update_cycle: "28-day AIRAC".into(),
        },
    }
}

fn class_rule(prop: &str, value: &str, color: &str, opacity: f64, width: f64) -> RenderRule {
    RenderRule {
        filter_prop: prop.into(),
        filter_value: value.into(),
        fill: color.into(),
        stroke: color.into(),
        opacity,
        width,
        ..Default::default()
    }
}

/// Trailing rule with no filter property: applies when none match.
fn fallback_rule() -> RenderRule {
    RenderRule {
        fill: "#666666".into(),
        stroke: "#666666".into(),
        opacity: 0.1,
        width: 1.0,
        ..Default::default()
    }
}

fn legend(label: &str, color: &str) -> LegendEntry {
    LegendEntry {
        label: label.into(),
        color: color.into(),
    }
}

/// Count features in a GeoJSON file by occurrence counting.
///
/// The files are machine-emitted with compact keys, so a substring scan
/// is reliable and avoids parsing hundreds of megabytes.
pub fn count_geojson_features(path: &Path) -> usize {
    let Ok(data) = fs::read_to_string(path) else {
        return 0;
    };
    data.matches(r#""type":"Feature""#).count()
}

/// Load the USA regional manifest.
pub fn load_usa_manifest(path: &Path) -> Result<RegionManifest> {
    fsio::read_json(path).context("loading regional manifest")
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let data = fs::read(src).with_context(|| format!("reading {}", src.display()))?;
    fsio::write_atomic(dst, &data)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_count_geojson_features() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.geojson");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature"},{"type":"Feature"}]}"#,
        )
        .unwrap();
        assert_eq!(count_geojson_features(&path), 2);
        assert_eq!(count_geojson_features(&dir.path().join("missing")), 0);
    }

    #[test]
    fn test_generate_manifests_layer_sizes_match_disk() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let tiles_dir = dir.path().join("tiles");
        let geojson_dir = dir.path().join("geojson");
        fs::create_dir_all(&tiles_dir).unwrap();
        fs::create_dir_all(&geojson_dir).unwrap();

        // Fake PMTiles of a known size, plus a two-feature GeoJSON
        let pmtiles_bytes = vec![0u8; 3 * 1024 * 1024];
        fs::write(tiles_dir.join("faa_airspace_boundary.pmtiles"), &pmtiles_bytes).unwrap();
        fs::write(
            geojson_dir.join("faa_airspace_boundary.geojson"),
            r#"{"features":[{"type":"Feature"},{"type":"Feature"}]}"#,
        )
        .unwrap();

        generate_manifests(&data_dir, &tiles_dir, &geojson_dir).unwrap();

        let manifest = load_usa_manifest(&data_dir.join(FILE_USA_MANIFEST)).unwrap();
        let boundary = &manifest.layers["boundary"];
        let on_disk = fs::metadata(tiles_dir.join(&boundary.file)).unwrap().len();
        assert!((boundary.size_mb * 1024.0 * 1024.0 - on_disk as f64).abs() < 1.0);
        assert_eq!(boundary.features, 2);

        // Layers with no artifacts report zero, not garbage
        assert_eq!(manifest.layers["navaids"].size_mb, 0.0);

        // Both manifests copied next to the artifacts
        assert!(geojson_dir.join(FILE_MANIFEST).exists());
        assert!(geojson_dir.join(FILE_USA_MANIFEST).exists());
    }

    #[test]
    fn test_render_rules_end_with_fallback() {
        let manifest = usa_manifest("2026-01-01T00:00:00Z", &BTreeMap::new());
        for key in ["boundary", "sua"] {
            let rules = &manifest.layers[key].render_rules;
            let last = rules.last().unwrap();
            assert!(last.filter_prop.is_empty(), "{key} fallback has a filter");
            for rule in &rules[..rules.len() - 1] {
                assert!(!rule.filter_prop.is_empty());
            }
        }
    }

    #[test]
    fn test_global_manifest_lists_usa() {
        let manifest = global_manifest("2026-01-01T00:00:00Z");
        let usa = &manifest.regions["usa"];
        assert_eq!(usa.bbox, vec![-125.0, 24.0, -66.0, 50.0]);
        assert_eq!(usa.manifest_file, FILE_USA_MANIFEST);
        assert_eq!(usa.default_layers, vec!["boundary", "sua"]);
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest_usa.json");
        let manifest = usa_manifest("2026-01-01T00:00:00Z", &BTreeMap::new());

        fsio::write_json_atomic(&path, &manifest).unwrap();
        let loaded = load_usa_manifest(&path).unwrap();

        assert_eq!(loaded.layers.len(), manifest.layers.len());
        assert_eq!(loaded.source.authority, "FAA");
        assert_eq!(loaded.layers["boundary"].render_rules.len(), 6);
    }
}
