//! Dataset registry and file locations.
//!
//! Single source of truth for FAA data sources, processing order, tile
//! settings and every file path the pipeline reads or writes.

use crate::airspace::tiler::TileConfig;

// ============================================================================
// Directory Paths
// ============================================================================

/// GeoJSON output directory.
pub const DIR_GEOJSON: &str = "static/airspace";
/// PMTiles output directory.
pub const DIR_PMTILES: &str = "static/airspace/tiles";
/// Data/metadata directory.
pub const DIR_DATA: &str = "data/airspace";

// ============================================================================
// Data Files (in DIR_DATA)
// ============================================================================

/// ETag cache for change detection.
pub const FILE_SYNC_ETAGS: &str = "sync_etags.json";
/// Last sync result (for pipeline idempotency).
pub const FILE_SYNC_RESULT: &str = "sync_result.json";
/// Rolling sync history.
pub const FILE_SYNC_HISTORY: &str = "sync_history.json";
/// Global manifest.
pub const FILE_MANIFEST: &str = "manifest.json";
/// USA regional manifest.
pub const FILE_USA_MANIFEST: &str = "manifest_usa.json";

// ============================================================================
// Object Store
// ============================================================================

pub const R2_BUCKET: &str = "site-map-assets";
pub const R2_PUBLIC_URL: &str = "https://pub-3f61c9a07f2b4ab8a1a7c42d57e6b0ce.r2.dev";

/// Maximum sync history entries to keep.
pub const MAX_HISTORY_RUNS: usize = 20;

// ============================================================================
// Datasets
// ============================================================================

/// A FAA data source.
pub struct Dataset {
    /// Dataset key ("uas", "boundary", ...)
    pub key: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// GeoJSON filename (in DIR_GEOJSON)
    pub geojson: &'static str,
    /// PMTiles filename (in DIR_PMTILES)
    pub pmtiles: &'static str,
    /// Layer name in the tiles
    pub layer: &'static str,
    /// Download URL
    pub base_url: &'static str,
    /// FeatureServer APIs require pagination
    pub paginated: bool,
    /// Page size for paginated APIs
    pub page_size: usize,
    /// URL to check for ETag/Last-Modified (paginated APIs)
    pub etag_url: Option<&'static str>,
}

impl Dataset {
    /// URL used for validator checks.
    pub fn check_url(&self) -> &'static str {
        self.etag_url.unwrap_or(self.base_url)
    }
}

/// Registry of all FAA data sources.
pub const DATASETS: &[Dataset] = &[
    Dataset {
        key: "uas",
        name: "UAS Facility Map",
        geojson: "faa_uas_facility_map.geojson",
        pmtiles: "faa_uas_facility_map.pmtiles",
        layer: "uas",
        base_url: "https://services6.arcgis.com/ssFJjBXIUyZDrSYZ/arcgis/rest/services/FAA_UAS_FacilityMap_Data/FeatureServer/0/query",
        paginated: true,
        page_size: 2000,
        etag_url: Some("https://services6.arcgis.com/ssFJjBXIUyZDrSYZ/arcgis/rest/services/FAA_UAS_FacilityMap_Data/FeatureServer/0"),
    },
    Dataset {
        key: "boundary",
        name: "Airspace Boundary",
        geojson: "faa_airspace_boundary.geojson",
        pmtiles: "faa_airspace_boundary.pmtiles",
        layer: "boundary",
        base_url: "https://adds-faa.opendata.arcgis.com/api/download/v1/items/67885972e4e940b2aa6d74024901c561/geojson?layers=0",
        paginated: false,
        page_size: 0,
        etag_url: None,
    },
    Dataset {
        key: "sua",
        name: "Special Use Airspace",
        geojson: "faa_special_use_airspace.geojson",
        pmtiles: "faa_special_use_airspace.pmtiles",
        layer: "sua",
        base_url: "https://adds-faa.opendata.arcgis.com/api/download/v1/items/dd0d1b726e504137ab3c41b21835d05b/geojson?layers=0",
        paginated: false,
        page_size: 0,
        etag_url: None,
    },
    Dataset {
        key: "airports",
        name: "Airports",
        geojson: "faa_airports.geojson",
        pmtiles: "faa_airports.pmtiles",
        layer: "airports",
        base_url: "https://adds-faa.opendata.arcgis.com/api/download/v1/items/e747ab91a11045e8b3f8a3efd093d3b5/geojson?layers=0",
        paginated: false,
        page_size: 0,
        etag_url: None,
    },
    Dataset {
        key: "navaids",
        name: "Navigation Aids",
        geojson: "faa_navaids.geojson",
        pmtiles: "faa_navaids.pmtiles",
        layer: "navaids",
        base_url: "https://adds-faa.opendata.arcgis.com/api/download/v1/items/990e238991b44dd08af27d7b43e70b92/geojson?layers=0",
        paginated: false,
        page_size: 0,
        etag_url: None,
    },
    Dataset {
        key: "obstacles",
        name: "Obstacles",
        geojson: "faa_obstacles.geojson",
        pmtiles: "faa_obstacles.pmtiles",
        layer: "obstacles",
        base_url: "https://adds-faa.opendata.arcgis.com/api/download/v1/items/c6a62360338e408cb1512366ad61559e/geojson?layers=0",
        paginated: false,
        page_size: 0,
        etag_url: None,
    },
];

/// Default processing order. Obstacles is excluded by default due to its
/// file size.
pub const DATASET_ORDER: &[&str] = &["uas", "boundary", "sua", "airports", "navaids"];

/// All datasets, for commands that need obstacles too.
pub const ALL_DATASETS: &[&str] = &["uas", "boundary", "sua", "airports", "navaids", "obstacles"];

/// Look up a dataset by key.
pub fn dataset(key: &str) -> Option<&'static Dataset> {
    DATASETS.iter().find(|d| d.key == key)
}

/// Tile generation settings per dataset.
///
/// Negative zooms request auto-zoom (`-zg` on the CLI tiler, 0/10 on the
/// native tiler).
pub fn tile_config(key: &str) -> TileConfig {
    let ds = dataset(key);
    let layer = ds.map_or("", |d| d.layer);
    match key {
        "uas" | "airports" | "navaids" => TileConfig {
            min_zoom: 0,
            max_zoom: 10,
            layer,
            reduce_rate: 1,
            no_feature_limit: true,
            no_tile_size_limit: true,
            drop_densest: false,
        },
        "obstacles" => TileConfig {
            min_zoom: -1,
            max_zoom: -1,
            layer,
            reduce_rate: 0,
            no_feature_limit: false,
            no_tile_size_limit: false,
            drop_densest: true,
        },
        // boundary, sua: auto zoom, default limits
        _ => TileConfig {
            min_zoom: -1,
            max_zoom: -1,
            layer,
            reduce_rate: 0,
            no_feature_limit: false,
            no_tile_size_limit: false,
            drop_densest: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_lookup() {
        assert_eq!(dataset("uas").unwrap().name, "UAS Facility Map");
        assert!(dataset("nope").is_none());
    }

    #[test]
    fn test_default_order_excludes_obstacles() {
        assert!(!DATASET_ORDER.contains(&"obstacles"));
        assert!(ALL_DATASETS.contains(&"obstacles"));
        for key in DATASET_ORDER {
            assert!(dataset(key).is_some(), "unknown key in order: {key}");
        }
    }

    #[test]
    fn test_check_url_prefers_etag_url() {
        let uas = dataset("uas").unwrap();
        assert_eq!(uas.check_url(), uas.etag_url.unwrap());

        let boundary = dataset("boundary").unwrap();
        assert_eq!(boundary.check_url(), boundary.base_url);
    }

    #[test]
    fn test_tile_configs() {
        let uas = tile_config("uas");
        assert_eq!((uas.min_zoom, uas.max_zoom), (0, 10));
        assert!(uas.no_feature_limit);
        assert_eq!(uas.layer, "uas");

        let boundary = tile_config("boundary");
        assert_eq!((boundary.min_zoom, boundary.max_zoom), (-1, -1));
        assert!(!boundary.drop_densest);

        let obstacles = tile_config("obstacles");
        assert!(obstacles.drop_densest);
    }

    #[test]
    fn test_paginated_datasets_have_page_size() {
        for ds in DATASETS {
            if ds.paginated {
                assert!(ds.page_size > 0, "{} needs a page size", ds.key);
                assert!(ds.etag_url.is_some(), "{} needs an etag url", ds.key);
            }
        }
    }
}
