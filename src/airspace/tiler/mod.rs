//! Tile generation engines.
//!
//! A `Tiler` turns a GeoJSON file into a PMTiles archive. Two engines
//! exist: the external `tippecanoe` CLI and a pure in-process writer.
//! Selection policy: `auto` prefers tippecanoe when installed, falling
//! back to the native engine; naming one explicitly is unconditional.

pub mod native;
pub mod tippecanoe;

use anyhow::{Result, bail};
use std::path::Path;

/// Settings for tile generation.
///
/// Negative zoom values request auto-zoom: the CLI engine maps them to
/// its auto-zoom flag, the native engine normalizes them to 0/10.
#[derive(Debug, Clone, Copy)]
pub struct TileConfig {
    pub min_zoom: i32,
    pub max_zoom: i32,
    /// Layer name in the tiles
    pub layer: &'static str,
    /// Point-thinning rate (0 = engine default)
    pub reduce_rate: u32,
    /// Drop features in dense tiles
    pub drop_densest: bool,
    /// Don't limit features per tile
    pub no_feature_limit: bool,
    /// Don't limit tile size
    pub no_tile_size_limit: bool,
}

/// Generates PMTiles from GeoJSON.
pub trait Tiler: std::fmt::Debug {
    /// Engine name ("tippecanoe", "native").
    fn name(&self) -> &'static str;

    /// Whether this engine can be used right now.
    fn available(&self) -> bool;

    /// Convert a GeoJSON file to PMTiles.
    fn tile(&self, input: &Path, output: &Path, config: &TileConfig) -> Result<()>;
}

/// Select a tiler by name.
///
/// `auto` tries tippecanoe first and falls back to the native engine.
pub fn select_tiler(name: &str) -> Result<Box<dyn Tiler>> {
    match name {
        "tippecanoe" => {
            let tiler = tippecanoe::Tippecanoe;
            if !tiler.available() {
                bail!("tippecanoe not found in PATH");
            }
            Ok(Box::new(tiler))
        }
        "native" => Ok(Box::new(native::NativeTiler)),
        "auto" | "" => {
            let tippecanoe = tippecanoe::Tippecanoe;
            if tippecanoe.available() {
                Ok(Box::new(tippecanoe))
            } else {
                Ok(Box::new(native::NativeTiler))
            }
        }
        _ => bail!("unknown tiler: {name} (valid: auto, tippecanoe, native)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_tiler_native() {
        let tiler = select_tiler("native").unwrap();
        assert_eq!(tiler.name(), "native");
        assert!(tiler.available());
    }

    #[test]
    fn test_select_tiler_auto_always_resolves() {
        // Native is the fallback, so auto never fails
        let tiler = select_tiler("auto").unwrap();
        assert!(tiler.available());
    }

    #[test]
    fn test_select_tiler_unknown() {
        let err = select_tiler("mapnik").unwrap_err();
        assert!(err.to_string().contains("unknown tiler"));
    }
}
