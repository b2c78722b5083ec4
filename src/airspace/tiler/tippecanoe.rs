//! Tippecanoe CLI engine.
//!
//! Config flags map 1:1 onto tippecanoe switches; auto-zoom is `-zg`.

use super::{TileConfig, Tiler};
use crate::exec_streamed;
use anyhow::{Result, bail};
use std::path::Path;

#[derive(Debug)]
pub struct Tippecanoe;

impl Tiler for Tippecanoe {
    fn name(&self) -> &'static str {
        "tippecanoe"
    }

    fn available(&self) -> bool {
        which::which("tippecanoe").is_ok()
    }

    fn tile(&self, input: &Path, output: &Path, config: &TileConfig) -> Result<()> {
        if !self.available() {
            bail!("tippecanoe not found in PATH");
        }

        let mut cmd = vec!["tippecanoe".to_string()];
        cmd.extend(build_args(input, output, config));
        exec_streamed!(&cmd;)
    }
}

/// Translate a tile config into tippecanoe arguments.
fn build_args(input: &Path, output: &Path, config: &TileConfig) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
        "--force".to_string(),
    ];

    if !config.layer.is_empty() {
        args.push(format!("--layer={}", config.layer));
    }

    if config.min_zoom >= 0 && config.max_zoom >= 0 {
        args.push(format!("-Z{}", config.min_zoom));
        args.push(format!("-z{}", config.max_zoom));
    } else {
        args.push("-zg".to_string());
    }

    if config.reduce_rate > 0 {
        args.push(format!("-r{}", config.reduce_rate));
    }
    if config.drop_densest {
        args.push("--drop-densest-as-needed".to_string());
    }
    if config.no_feature_limit {
        args.push("--no-feature-limit".to_string());
    }
    if config.no_tile_size_limit {
        args.push("--no-tile-size-limit".to_string());
    }

    args.push(input.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TileConfig {
        TileConfig {
            min_zoom: 0,
            max_zoom: 10,
            layer: "uas",
            reduce_rate: 1,
            drop_densest: false,
            no_feature_limit: true,
            no_tile_size_limit: true,
        }
    }

    #[test]
    fn test_build_args_explicit_zoom() {
        let args = build_args(Path::new("in.geojson"), Path::new("out.pmtiles"), &config());
        assert!(args.contains(&"-Z0".to_string()));
        assert!(args.contains(&"-z10".to_string()));
        assert!(args.contains(&"-r1".to_string()));
        assert!(args.contains(&"--layer=uas".to_string()));
        assert!(args.contains(&"--no-feature-limit".to_string()));
        assert!(args.contains(&"--no-tile-size-limit".to_string()));
        assert_eq!(args.last().unwrap(), "in.geojson");
    }

    #[test]
    fn test_build_args_auto_zoom() {
        let mut cfg = config();
        cfg.min_zoom = -1;
        cfg.max_zoom = -1;
        cfg.reduce_rate = 0;
        cfg.drop_densest = true;

        let args = build_args(Path::new("a"), Path::new("b"), &cfg);
        assert!(args.contains(&"-zg".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-Z")));
        assert!(!args.iter().any(|a| a.starts_with("-r")));
        assert!(args.contains(&"--drop-densest-as-needed".to_string()));
    }
}
