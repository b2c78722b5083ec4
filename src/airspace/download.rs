//! Dataset downloads, direct and paginated.
//!
//! ArcGIS FeatureServer endpoints cap response sizes, so paginated
//! datasets are fetched page by page via `resultOffset` and merged into
//! one feature collection. Memory stays bounded to a page of features at
//! a time plus the accumulated collection.

use crate::airspace::dataset::Dataset;
use crate::util::{cancel, http};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{fs, path::Path};

/// One FeatureServer page.
#[derive(Debug, Default, Deserialize)]
struct Page {
    #[serde(default)]
    features: Vec<Value>,
    /// ArcGIS sets this when a response was truncated server-side
    #[serde(rename = "exceededTransferLimit", default)]
    exceeded_transfer_limit: Option<bool>,
}

/// Download a paginated FeatureServer dataset into one GeoJSON file.
pub fn download_paginated(client: &Client, ds: &Dataset, out_path: &Path) -> Result<()> {
    let mut features: Vec<Value> = Vec::new();
    let mut offset = 0usize;

    loop {
        cancel::check()?;

        let url = page_url(ds.base_url, ds.page_size, offset);
        let resp = client
            .get(&url)
            .send()
            .with_context(|| format!("fetch page at offset {offset}"))?;

        if !resp.status().is_success() {
            anyhow::bail!("HTTP {} at offset {offset}", resp.status().as_u16());
        }

        let page: Page = resp
            .json()
            .with_context(|| format!("decode page at offset {offset}"))?;

        let page_len = page.features.len();
        features.extend(page.features);

        if page_complete(page_len, ds.page_size, page.exceeded_transfer_limit) {
            break;
        }
        offset += ds.page_size;
    }

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });

    let file = fs::File::create(out_path)
        .with_context(|| format!("creating {}", out_path.display()))?;
    serde_json::to_writer(file, &collection)
        .with_context(|| format!("writing {}", out_path.display()))?;
    Ok(())
}

/// Whether pagination is done after a page of `page_len` features.
///
/// A short page normally means the end. Servers that report
/// `exceededTransferLimit` override the heuristic in both directions: a
/// full page with the flag unset is final, and a page with the flag set
/// always has more behind it.
fn page_complete(page_len: usize, page_size: usize, exceeded: Option<bool>) -> bool {
    match exceeded {
        Some(true) => false,
        Some(false) => true,
        None => page_len < page_size,
    }
}

/// Query URL for one page.
fn page_url(base_url: &str, page_size: usize, offset: usize) -> String {
    format!(
        "{base_url}?where={}&outFields={}&f=geojson&resultRecordCount={page_size}&resultOffset={offset}",
        urlencoding::encode("1=1"),
        urlencoding::encode("*"),
    )
}

/// Download the given datasets unconditionally (no change detection).
pub fn download_all(client: &Client, output_dir: &Path, keys: &[String]) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    for key in keys {
        cancel::check()?;

        let ds = crate::airspace::dataset::dataset(key)
            .ok_or_else(|| anyhow::anyhow!("unknown dataset: {key}"))?;
        let out_path = output_dir.join(ds.geojson);

        let result = if ds.paginated {
            download_paginated(client, ds, &out_path)
        } else {
            http::download_to_file(client, ds.base_url, &out_path).map(|_| ())
        };
        result.with_context(|| format!("downloading {}", ds.name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_complete_short_page() {
        assert!(page_complete(1500, 2000, None));
        assert!(!page_complete(2000, 2000, None));
    }

    #[test]
    fn test_page_complete_honors_transfer_limit_flag() {
        // Full page but server says nothing was truncated: final page
        assert!(page_complete(2000, 2000, Some(false)));
        // Short page but server says truncated: keep fetching
        assert!(!page_complete(1999, 2000, Some(true)));
    }

    #[test]
    fn test_page_url_encoding() {
        let url = page_url("https://example.test/query", 2000, 4000);
        assert!(url.contains("where=1%3D1"));
        assert!(url.contains("resultRecordCount=2000"));
        assert!(url.contains("resultOffset=4000"));
        assert!(url.contains("f=geojson"));
    }

    #[test]
    fn test_page_deserializes_without_flag() {
        let page: Page = serde_json::from_str(r#"{"features": [{}, {}]}"#).unwrap();
        assert_eq!(page.features.len(), 2);
        assert_eq!(page.exceeded_transfer_limit, None);
    }
}
