//! Pure in-process tile engine.
//!
//! Writes PMTiles v3 archives without external tools: features are
//! bucketed into tiles by bounding box for every zoom level, the root
//! directory is varint-encoded per the spec, and the 127-byte header
//! carries the magic, version, zoom range and entry counts. Tile
//! payloads hold the bucketed features as plain GeoJSON; vector-tile
//! encoding stays behind the `Tiler` trait.
//!
//! PMTiles v3 format: https://github.com/protomaps/PMTiles/blob/main/spec/v3/spec.md

use super::{TileConfig, Tiler};
use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::{
    collections::BTreeMap,
    f64::consts::PI,
    fs,
    io::Write,
    path::Path,
};

/// Header size fixed by the spec.
pub const HEADER_LEN: usize = 127;

/// Magic bytes opening every archive.
pub const MAGIC: &[u8; 7] = b"PMTiles";

/// Spec version byte.
pub const SPEC_VERSION: u8 = 3;

/// Zoom ceiling for the native engine.
const MAX_NATIVE_ZOOM: i32 = 14;

/// Default zoom range substituted for auto-zoom requests.
const AUTO_MIN_ZOOM: i32 = 0;
const AUTO_MAX_ZOOM: i32 = 10;

/// Web Mercator latitude limit.
const MAX_LAT: f64 = 85.051_128_78;

#[derive(Debug)]
pub struct NativeTiler;

impl Tiler for NativeTiler {
    fn name(&self) -> &'static str {
        "native"
    }

    fn available(&self) -> bool {
        true
    }

    fn tile(&self, input: &Path, output: &Path, config: &TileConfig) -> Result<()> {
        let data = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let collection: Value = serde_json::from_slice(&data).context("parsing GeoJSON")?;

        let features = collection
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("not a FeatureCollection"))?;

        let (min_zoom, max_zoom) = normalize_zooms(config.min_zoom, config.max_zoom);

        // Bounding box per feature, skipping geometry-less entries
        let bboxes: Vec<(usize, BBox)> = features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| feature_bbox(f).map(|b| (i, b)))
            .collect();

        if bboxes.is_empty() {
            bail!("no tiles to write");
        }

        // Bucket features into tiles for every zoom level
        let mut buckets: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for z in min_zoom..=max_zoom {
            for (idx, bbox) in &bboxes {
                let (x0, y0) = lonlat_to_tile(bbox.min_lon, bbox.max_lat, z as u8);
                let (x1, y1) = lonlat_to_tile(bbox.max_lon, bbox.min_lat, z as u8);
                for x in x0..=x1 {
                    for y in y0..=y1 {
                        buckets
                            .entry(zxy_to_id(z as u8, x, y))
                            .or_default()
                            .push(*idx);
                    }
                }
            }
        }

        // Encode payloads in tile-id order; offsets are cumulative
        let mut entries: Vec<Entry> = Vec::with_capacity(buckets.len());
        let mut tile_data: Vec<u8> = Vec::new();
        for (id, indices) in &buckets {
            let payload = tile_payload(features, indices, config.layer)?;
            entries.push(Entry {
                tile_id: *id,
                offset: tile_data.len() as u64,
                length: payload.len() as u32,
            });
            tile_data.extend_from_slice(&payload);
        }

        let root_dir = serialize_directory(&entries);
        let metadata = serde_json::to_vec(&json!({
            "name": config.layer,
            "format": "geojson",
            "minzoom": min_zoom,
            "maxzoom": max_zoom,
        }))?;

        let bounds = overall_bbox(&bboxes);
        let header = Header {
            root_dir_len: root_dir.len() as u64,
            metadata_len: metadata.len() as u64,
            tile_data_len: tile_data.len() as u64,
            entry_count: entries.len() as u64,
            min_zoom: min_zoom as u8,
            max_zoom: max_zoom as u8,
            bounds,
        };

        let mut file =
            fs::File::create(output).with_context(|| format!("creating {}", output.display()))?;
        file.write_all(&header.serialize())?;
        file.write_all(&root_dir)?;
        file.write_all(&metadata)?;
        file.write_all(&tile_data)?;
        Ok(())
    }
}

/// Substitute auto-zoom defaults and clamp to the engine ceiling.
fn normalize_zooms(min_zoom: i32, max_zoom: i32) -> (i32, i32) {
    let min = if min_zoom < 0 { AUTO_MIN_ZOOM } else { min_zoom };
    let mut max = if max_zoom < 0 { AUTO_MAX_ZOOM } else { max_zoom };
    max = max.min(MAX_NATIVE_ZOOM);
    (min, max.max(min))
}

/// Per-tile payload: the bucketed features as a feature collection.
fn tile_payload(features: &[Value], indices: &[usize], layer: &str) -> Result<Vec<u8>> {
    let selected: Vec<&Value> = indices.iter().map(|i| &features[*i]).collect();
    Ok(serde_json::to_vec(&json!({
        "type": "FeatureCollection",
        "name": layer,
        "features": selected,
    }))?)
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct BBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl BBox {
    const EMPTY: Self = Self {
        min_lon: f64::INFINITY,
        min_lat: f64::INFINITY,
        max_lon: f64::NEG_INFINITY,
        max_lat: f64::NEG_INFINITY,
    };

    fn extend(&mut self, lon: f64, lat: f64) {
        self.min_lon = self.min_lon.min(lon);
        self.min_lat = self.min_lat.min(lat);
        self.max_lon = self.max_lon.max(lon);
        self.max_lat = self.max_lat.max(lat);
    }

    fn is_valid(&self) -> bool {
        self.min_lon.is_finite() && self.max_lat.is_finite()
    }
}

/// Bounding box of a GeoJSON feature's geometry.
fn feature_bbox(feature: &Value) -> Option<BBox> {
    let coordinates = feature.get("geometry")?.get("coordinates")?;
    let mut bbox = BBox::EMPTY;
    collect_positions(coordinates, &mut bbox);
    bbox.is_valid().then_some(bbox)
}

/// Recursively walk nested coordinate arrays down to [lon, lat] leaves.
fn collect_positions(value: &Value, bbox: &mut BBox) {
    let Some(array) = value.as_array() else {
        return;
    };
    if let [Value::Number(lon), Value::Number(lat), ..] = array.as_slice() {
        if let (Some(lon), Some(lat)) = (lon.as_f64(), lat.as_f64()) {
            bbox.extend(lon, lat);
        }
        return;
    }
    for item in array {
        collect_positions(item, bbox);
    }
}

/// Union of all feature boxes.
fn overall_bbox(bboxes: &[(usize, BBox)]) -> BBox {
    let mut total = BBox::EMPTY;
    for (_, b) in bboxes {
        total.extend(b.min_lon, b.min_lat);
        total.extend(b.max_lon, b.max_lat);
    }
    total
}

/// Web Mercator tile coordinates for a position.
fn lonlat_to_tile(lon: f64, lat: f64, z: u8) -> (u32, u32) {
    let n = (1u64 << z) as f64;
    let lat = lat.clamp(-MAX_LAT, MAX_LAT);
    let lat_rad = lat.to_radians();

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    let limit = n - 1.0;
    (x.clamp(0.0, limit) as u32, y.clamp(0.0, limit) as u32)
}

// ============================================================================
// Tile IDs
// ============================================================================

/// PMTiles tile id: zoom-cumulative offset plus the Hilbert index.
pub fn zxy_to_id(z: u8, x: u32, y: u32) -> u64 {
    let mut acc = 0u64;
    for t in 0..z {
        acc += 1u64 << (2 * t);
    }

    let n = 1u64 << z;
    let (mut tx, mut ty) = (x as u64, y as u64);
    let mut d = 0u64;
    let mut s = n / 2;
    while s > 0 {
        let rx = u64::from(tx & s > 0);
        let ry = u64::from(ty & s > 0);
        d += s * s * ((3 * rx) ^ ry);

        // Rotate the quadrant
        if ry == 0 {
            if rx == 1 {
                tx = s - 1 - tx;
                ty = s - 1 - ty;
            }
            std::mem::swap(&mut tx, &mut ty);
        }
        s /= 2;
    }
    acc + d
}

// ============================================================================
// Serialization
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Entry {
    tile_id: u64,
    offset: u64,
    length: u32,
}

/// Serialize the root directory: entry count, delta-encoded tile ids,
/// run lengths, lengths, then offsets (offset + 1).
fn serialize_directory(entries: &[Entry]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, entries.len() as u64);

    let mut last_id = 0u64;
    for e in entries {
        write_varint(&mut buf, e.tile_id - last_id);
        last_id = e.tile_id;
    }
    for _ in entries {
        write_varint(&mut buf, 1); // run length
    }
    for e in entries {
        write_varint(&mut buf, e.length as u64);
    }
    for e in entries {
        write_varint(&mut buf, e.offset + 1);
    }
    buf
}

fn write_varint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Compression ids from the spec.
const COMPRESSION_NONE: u8 = 1;
/// Tile type id: unknown (payloads are GeoJSON, not MVT).
const TILE_TYPE_UNKNOWN: u8 = 0;

struct Header {
    root_dir_len: u64,
    metadata_len: u64,
    tile_data_len: u64,
    entry_count: u64,
    min_zoom: u8,
    max_zoom: u8,
    bounds: BBox,
}

impl Header {
    fn serialize(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..7].copy_from_slice(MAGIC);
        buf[7] = SPEC_VERSION;

        let root_dir_offset = HEADER_LEN as u64;
        let metadata_offset = root_dir_offset + self.root_dir_len;
        let tile_data_offset = metadata_offset + self.metadata_len;

        buf[8..16].copy_from_slice(&root_dir_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.root_dir_len.to_le_bytes());
        buf[24..32].copy_from_slice(&metadata_offset.to_le_bytes());
        buf[32..40].copy_from_slice(&self.metadata_len.to_le_bytes());
        // Leaf directories: none for archives this size
        buf[40..48].copy_from_slice(&0u64.to_le_bytes());
        buf[48..56].copy_from_slice(&0u64.to_le_bytes());
        buf[56..64].copy_from_slice(&tile_data_offset.to_le_bytes());
        buf[64..72].copy_from_slice(&self.tile_data_len.to_le_bytes());
        // Addressed tiles == entries == contents (run length 1, no dedup)
        buf[72..80].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[80..88].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[88..96].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[96] = 1; // clustered
        buf[97] = COMPRESSION_NONE; // internal compression
        buf[98] = COMPRESSION_NONE; // tile compression
        buf[99] = TILE_TYPE_UNKNOWN;
        buf[100] = self.min_zoom;
        buf[101] = self.max_zoom;

        buf[102..106].copy_from_slice(&to_e7(self.bounds.min_lon).to_le_bytes());
        buf[106..110].copy_from_slice(&to_e7(self.bounds.min_lat).to_le_bytes());
        buf[110..114].copy_from_slice(&to_e7(self.bounds.max_lon).to_le_bytes());
        buf[114..118].copy_from_slice(&to_e7(self.bounds.max_lat).to_le_bytes());
        buf[118] = self.min_zoom; // center zoom
        buf[119..123].copy_from_slice(
            &to_e7((self.bounds.min_lon + self.bounds.max_lon) / 2.0).to_le_bytes(),
        );
        buf[123..127].copy_from_slice(
            &to_e7((self.bounds.min_lat + self.bounds.max_lat) / 2.0).to_le_bytes(),
        );
        buf
    }
}

fn to_e7(v: f64) -> i32 {
    (v * 10_000_000.0) as i32
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_geojson() -> String {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"CLASS": "D"},
                    "geometry": {"type": "Point", "coordinates": [-97.0, 32.9]}
                },
                {
                    "type": "Feature",
                    "properties": {"CLASS": "C"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-98.0, 33.0], [-97.5, 33.0], [-97.5, 33.5], [-98.0, 33.0]]]
                    }
                }
            ]
        })
        .to_string()
    }

    fn read_u64(buf: &[u8], at: usize) -> u64 {
        u64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
    }

    #[test]
    fn test_zxy_to_id_known_values() {
        assert_eq!(zxy_to_id(0, 0, 0), 0);
        assert_eq!(zxy_to_id(1, 0, 0), 1);
        assert_eq!(zxy_to_id(1, 0, 1), 2);
        assert_eq!(zxy_to_id(1, 1, 1), 3);
        assert_eq!(zxy_to_id(1, 1, 0), 4);
        assert_eq!(zxy_to_id(2, 0, 0), 5);
    }

    #[test]
    fn test_zxy_to_id_monotonic_base_per_zoom() {
        // Each zoom's ids start after the previous zoom's 4^z tiles
        assert_eq!(zxy_to_id(3, 0, 0), 1 + 4 + 16);
    }

    #[test]
    fn test_lonlat_to_tile() {
        assert_eq!(lonlat_to_tile(0.0, 0.0, 0), (0, 0));
        // Null island at z1 sits in the south-east quadrant boundary
        assert_eq!(lonlat_to_tile(0.0, 0.0, 1), (1, 1));
        // Western hemisphere, northern latitude
        let (x, y) = lonlat_to_tile(-97.0, 32.9, 4);
        assert_eq!((x, y), (3, 6));
    }

    #[test]
    fn test_lonlat_to_tile_clamps_poles() {
        let (_, y) = lonlat_to_tile(0.0, 89.9, 4);
        assert_eq!(y, 0);
        let (_, y) = lonlat_to_tile(0.0, -89.9, 4);
        assert_eq!(y, 15);
    }

    #[test]
    fn test_normalize_zooms() {
        assert_eq!(normalize_zooms(-1, -1), (0, 10));
        assert_eq!(normalize_zooms(2, 8), (2, 8));
        assert_eq!(normalize_zooms(0, 20), (0, 14));
        assert_eq!(normalize_zooms(5, -1), (5, 10));
    }

    #[test]
    fn test_write_varint() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 0);
        write_varint(&mut buf, 127);
        write_varint(&mut buf, 128);
        assert_eq!(buf, vec![0x00, 0x7f, 0x80, 0x01]);
    }

    #[test]
    fn test_feature_bbox_polygon() {
        let feature = json!({
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[-98.0, 33.0], [-97.5, 33.5], [-98.0, 33.0]]]
            }
        });
        let bbox = feature_bbox(&feature).unwrap();
        assert_eq!(bbox.min_lon, -98.0);
        assert_eq!(bbox.max_lon, -97.5);
        assert_eq!(bbox.max_lat, 33.5);
    }

    #[test]
    fn test_feature_bbox_missing_geometry() {
        assert!(feature_bbox(&json!({"type": "Feature"})).is_none());
    }

    #[test]
    fn test_tile_writes_valid_header() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.geojson");
        let output = dir.path().join("out.pmtiles");
        fs::write(&input, sample_geojson()).unwrap();

        let config = TileConfig {
            min_zoom: 0,
            max_zoom: 3,
            layer: "test",
            reduce_rate: 0,
            drop_densest: false,
            no_feature_limit: false,
            no_tile_size_limit: false,
        };
        NativeTiler.tile(&input, &output, &config).unwrap();

        let data = fs::read(&output).unwrap();
        assert!(data.len() > HEADER_LEN);
        assert_eq!(&data[0..7], MAGIC);
        assert_eq!(data[7], SPEC_VERSION);
        assert_eq!(data[100], 0, "min zoom");
        assert_eq!(data[101], 3, "max zoom");

        // Entry count: both features share tiles at low zooms, so at
        // least one tile per zoom level exists
        let entries = read_u64(&data, 80);
        assert!(entries >= 4, "expected >= 4 entries, got {entries}");
        assert_eq!(read_u64(&data, 72), entries);
        assert_eq!(read_u64(&data, 88), entries);

        // Offsets are self-consistent
        let root_offset = read_u64(&data, 8);
        let root_len = read_u64(&data, 16);
        let metadata_offset = read_u64(&data, 24);
        assert_eq!(root_offset, HEADER_LEN as u64);
        assert_eq!(metadata_offset, root_offset + root_len);
        let tile_data_offset = read_u64(&data, 56);
        let tile_data_len = read_u64(&data, 64);
        assert_eq!(tile_data_offset + tile_data_len, data.len() as u64);
    }

    #[test]
    fn test_tile_auto_zoom_normalized() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.geojson");
        let output = dir.path().join("out.pmtiles");
        fs::write(&input, sample_geojson()).unwrap();

        let config = TileConfig {
            min_zoom: -1,
            max_zoom: -1,
            layer: "test",
            reduce_rate: 0,
            drop_densest: false,
            no_feature_limit: false,
            no_tile_size_limit: false,
        };
        NativeTiler.tile(&input, &output, &config).unwrap();

        let data = fs::read(&output).unwrap();
        assert_eq!(data[100], 0);
        assert_eq!(data[101], 10);
    }

    #[test]
    fn test_tile_empty_collection_fails() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.geojson");
        fs::write(&input, r#"{"type": "FeatureCollection", "features": []}"#).unwrap();

        let config = TileConfig {
            min_zoom: 0,
            max_zoom: 1,
            layer: "test",
            reduce_rate: 0,
            drop_densest: false,
            no_feature_limit: false,
            no_tile_size_limit: false,
        };
        let result = NativeTiler.tile(&input, &dir.path().join("out.pmtiles"), &config);
        assert!(result.is_err());
    }
}
