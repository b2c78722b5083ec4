//! Ambient cancellation token.
//!
//! `install()` wires Ctrl-C to a process-wide flag. Pipelines call
//! `check()` between units of work (per dataset, per file, per batch) so
//! an interrupted run stops at the next boundary instead of mid-write.

use anyhow::{Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl-C handler. Call once at process start.
pub fn install() {
    // Second Ctrl-C falls back to the default handler (hard exit)
    ctrlc::set_handler(|| {
        if CANCELLED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .ok();
}

/// Whether cancellation was requested.
pub fn cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Return an error if cancellation was requested.
pub fn check() -> Result<()> {
    if cancelled() {
        bail!("interrupted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_passes_when_not_cancelled() {
        // The flag is process-global; tests never set it
        assert!(check().is_ok());
        assert!(!cancelled());
    }
}
