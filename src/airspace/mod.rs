//! FAA airspace data pipeline.
//!
//! Idempotent sync with ETag change detection, PMTiles generation via a
//! pluggable tiler, manifest assembly and object-store upload. State
//! lives under `data/airspace/`, published artifacts under
//! `static/airspace/`.

pub mod dataset;
pub mod download;
pub mod manifest;
pub mod pipeline;
pub mod sync;
pub mod tiler;
pub mod upload;
