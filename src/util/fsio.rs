//! Atomic state-file writes and JSON helpers.
//!
//! Every state file (ETag store, sync history, snapshots, manifests) is
//! written via "write sibling temp + rename" so a crashed run never
//! leaves a half-written file behind.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Write bytes to a file atomically (temp sibling + rename).
///
/// The parent directory is created if missing.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Serialize a value as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value).context("serializing JSON")?;
    data.push(b'\n');
    write_atomic(path, &data)
}

/// Read a JSON file, returning the type's default when the file is
/// missing or unreadable.
///
/// State files tolerate absence (first run) and schema drift; `serde`
/// defaults on the target type cover missing fields.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read(path) {
        Ok(data) => serde_json::from_slice(&data).unwrap_or_default(),
        Err(_) => T::default(),
    }
}

/// Read a JSON file, failing on absence or parse errors.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Sibling temp path for an atomic write.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
