//! Provider that delegates to the `claude` CLI.
//!
//! Uses the logged-in session, so no API key is required. The binary is
//! resolved from PATH with fallbacks to common install locations.

use super::{Provider, claude::single_prompt};
use anyhow::{Result, bail};
use std::{
    path::{Path, PathBuf},
    process::Command,
};

/// Fallback install locations checked when PATH lookup fails.
const FALLBACK_PATHS: &[&str] = &[
    "~/.bun/bin/claude",
    "~/.local/bin/claude",
    "/usr/local/bin/claude",
];

/// Claude CLI provider.
#[derive(Debug)]
pub struct ClaudeCli {
    binary: PathBuf,
}

impl ClaudeCli {
    pub fn new() -> Result<Self> {
        match find_binary() {
            Some(binary) => Ok(Self { binary }),
            None => bail!("claude CLI not found (install: bun add -g @anthropic-ai/claude-code)"),
        }
    }

    /// Whether the CLI is installed.
    pub fn available() -> bool {
        find_binary().is_some()
    }

    /// Resolved binary path.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn call_cli(&self, prompt: &str) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--print")
            .arg("-p")
            .arg(prompt)
            .output()
            .map_err(|err| anyhow::anyhow!("failed to run claude CLI: {err}"))?;

        if !output.status.success() {
            bail!(
                "claude CLI error: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn find_binary() -> Option<PathBuf> {
    if let Ok(path) = which::which("claude") {
        return Some(path);
    }
    FALLBACK_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .find(|p| p.exists())
}

impl Provider for ClaudeCli {
    fn name(&self) -> &'static str {
        "claude-cli"
    }

    fn translate(&self, text: &str, _source_lang: &str, target_lang: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        self.call_cli(&single_prompt(text, target_lang))
    }

    fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        // The CLI round-trips a whole session per call; no batch endpoint
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                self.translate(text, source_lang, target_lang)
                    .map_err(|err| anyhow::anyhow!("translating text {i}: {err}"))
            })
            .collect()
    }

    fn supported_languages(&self) -> Vec<String> {
        super::known_language_codes()
    }

    fn supports_language(&self, code: &str) -> bool {
        super::is_known_language(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_paths_expand() {
        for raw in FALLBACK_PATHS {
            let expanded = shellexpand::tilde(raw).into_owned();
            assert!(!expanded.starts_with('~'), "unexpanded: {expanded}");
        }
    }
}
