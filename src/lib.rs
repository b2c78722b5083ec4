//! Sitekit - command-line toolbox for a multilingual static site.
//!
//! Three independent pipelines share the same shape (detect change, act,
//! checkpoint) and a common substrate:
//!
//! | Module      | Responsibility                                         |
//! |-------------|--------------------------------------------------------|
//! | `translate` | Markdown/ARB translation, checkpoint change tracking   |
//! | `airspace`  | FAA dataset sync, PMTiles generation, manifests        |
//! | `analytics` | Cloudflare Web Analytics change detection              |
//! | `util`      | subprocess runner, HTTP, atomic writes, formatting     |
//!
//! Each pipeline is driven by its own binary under `src/bin/`.

pub mod airspace;
pub mod analytics;
pub mod logger;
pub mod translate;
pub mod util;
