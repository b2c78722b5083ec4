//! Object-store upload and endpoint checks.
//!
//! Uploads every PMTiles listed in the regional manifest plus both
//! manifests to the R2 bucket via the `wrangler` CLI, and probes the
//! public URLs with HEAD requests.

use crate::airspace::dataset::{
    DIR_DATA, DIR_PMTILES, FILE_MANIFEST, FILE_USA_MANIFEST, R2_BUCKET, R2_PUBLIC_URL,
};
use crate::airspace::manifest;
use crate::exec_streamed;
use crate::log;
use crate::util::{cancel, format, http};
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Whether the uploader CLI is installed.
pub fn uploader_available() -> bool {
    which::which("wrangler").is_ok()
}

/// Upload manifest-listed PMTiles and both manifests to the bucket.
pub fn upload_to_r2() -> Result<()> {
    let manifest_path = Path::new(DIR_DATA).join(FILE_USA_MANIFEST);
    if !manifest_path.exists() {
        bail!(
            "manifest not found: {} (run 'airspace manifest' first)",
            manifest_path.display()
        );
    }
    if !uploader_available() {
        bail!("wrangler not found in PATH (npm install -g wrangler)");
    }

    let manifest = manifest::load_usa_manifest(&manifest_path)?;

    log!("upload"; "uploading airspace data to r2://{R2_BUCKET}/airspace/");

    for layer in manifest.layers.values() {
        cancel::check()?;

        let file_path = Path::new(DIR_PMTILES).join(&layer.file);
        let Ok(info) = std::fs::metadata(&file_path) else {
            log!("upload"; "skip {} (file not found)", layer.file);
            continue;
        };

        log!("upload"; "{} ({:.1} MB)", layer.file, format::mb(info.len()));
        let key = format!("{R2_BUCKET}/airspace/tiles/{}", layer.file);
        wrangler_put(&key, &file_path).with_context(|| format!("uploading {}", layer.file))?;
    }

    for name in [FILE_MANIFEST, FILE_USA_MANIFEST] {
        let file_path = Path::new(DIR_DATA).join(name);
        if !file_path.exists() {
            continue;
        }
        log!("upload"; "{name}");
        let key = format!("{R2_BUCKET}/airspace/{name}");
        wrangler_put(&key, &file_path).with_context(|| format!("uploading {name}"))?;
    }

    log!("upload"; "done, files available at {R2_PUBLIC_URL}/airspace/");
    Ok(())
}

/// Probe every published endpoint; error if any is unreachable.
pub fn check_endpoints() -> Result<()> {
    let manifest_path = Path::new(DIR_DATA).join(FILE_USA_MANIFEST);
    let manifest = manifest::load_usa_manifest(&manifest_path)?;

    let client = http::client(http::HEAD_TIMEOUT)?;
    let mut all_ok = true;

    for layer in manifest.layers.values() {
        let url = format!("{R2_PUBLIC_URL}/airspace/tiles/{}", layer.file);
        let (status, length) = http::probe(&client, &url);

        if status == 200 {
            let size = length.map_or_else(|| "?".to_string(), describe_size);
            log!("check"; "ok {} ({status}, {size})", layer.name);
        } else {
            log!("error"; "{} unreachable ({status})", layer.name);
            all_ok = false;
        }
    }

    if !all_ok {
        bail!("some endpoints failed");
    }
    Ok(())
}

fn wrangler_put(key: &str, file: &Path) -> Result<()> {
    exec_streamed!(
        ["wrangler", "r2", "object", "put"];
        key,
        "--file",
        file.to_string_lossy().into_owned(),
        "--remote",
    )
}

fn describe_size(bytes: u64) -> String {
    if bytes > 1024 * 1024 {
        format!("{:.1} MB", format::mb(bytes))
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_size() {
        assert_eq!(describe_size(512), "512 bytes");
        assert_eq!(describe_size(3 * 1024 * 1024), "3.0 MB");
    }
}
