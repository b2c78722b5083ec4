//! Shared substrate for the pipeline binaries.

pub mod cancel;
pub mod exec;
pub mod format;
pub mod fsio;
pub mod http;
