//! Shared HTTP helpers: client constructors, validator checks, downloads.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use std::{fs::File, path::Path, time::Duration};

/// Overall timeout for dataset sync downloads.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Overall timeout for translation provider calls.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Short timeout for HEAD validator checks and endpoint probes.
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a blocking client with the given overall timeout.
pub fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

/// Check a resource validator with a HEAD request.
///
/// Extracts `ETag`, falling back to `Last-Modified`. Returns the observed
/// validator and whether a download is needed. Network errors and absent
/// validators conservatively report "download needed".
pub fn check_validator(client: &Client, url: &str, old: &str) -> (Option<String>, bool) {
    let resp = match client.head(url).send() {
        Ok(resp) => resp,
        Err(_) => return (None, true),
    };

    let validator = header_value(&resp, "etag").or_else(|| header_value(&resp, "last-modified"));

    match validator {
        Some(v) => {
            let changed = v != old;
            (Some(v), changed)
        }
        None => (None, true),
    }
}

/// Stream a GET response body to a file.
pub fn download_to_file(client: &Client, url: &str, path: &Path) -> Result<u64> {
    let mut resp = client
        .get(url)
        .send()
        .with_context(|| format!("fetching {url}"))?;

    if !resp.status().is_success() {
        return Err(anyhow!("HTTP {} from {url}", resp.status().as_u16()));
    }

    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let written = resp
        .copy_to(&mut file)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(written)
}

/// Probe a URL with HEAD; returns (status, content length).
pub fn probe(client: &Client, url: &str) -> (u16, Option<u64>) {
    match client.head(url).send() {
        Ok(resp) => {
            let len = resp.content_length().or_else(|| {
                header_value(&resp, "content-length").and_then(|v| v.parse().ok())
            });
            (resp.status().as_u16(), len)
        }
        Err(_) => (0, None),
    }
}

fn header_value(resp: &reqwest::blocking::Response, name: &str) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
