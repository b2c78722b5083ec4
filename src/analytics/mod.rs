//! Cloudflare Web Analytics change detection.
//!
//! One run fetches a window of analytics, diffs it against the snapshot
//! from the previous run, and persists the new snapshot. Metric swings
//! beyond the threshold land in the report as significant changes.

pub mod cloudflare;
pub mod report;
