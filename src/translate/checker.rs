//! Translation status checking.
//!
//! Read-only operations comparing the source content tree against the
//! target language trees and the git checkpoint, plus the two mutating
//! operations: `clean` (delete orphans) and `done` (move checkpoint).

use crate::translate::config::{Language, TranslateConfig};
use crate::translate::git;
use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use walkdir::WalkDir;

/// Source files below this size are never flagged stale.
const STALE_SOURCE_MIN_BYTES: u64 = 500;

pub struct Checker {
    pub config: TranslateConfig,
}

// ============================================================================
// Result Types
// ============================================================================

#[derive(Debug, Default)]
pub struct StatusReport {
    pub new_files: Vec<String>,
    pub uncommitted: Vec<String>,
    pub committed: Vec<String>,
    pub checkpoint_exists: bool,
}

impl StatusReport {
    pub fn has_changes(&self) -> bool {
        !self.new_files.is_empty() || !self.uncommitted.is_empty() || !self.committed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MissingReport {
    /// (language, missing relative paths)
    pub by_lang: Vec<(Language, Vec<String>)>,
    pub total: usize,
}

#[derive(Debug)]
pub struct StaleEntry {
    pub path: PathBuf,
    pub source_bytes: u64,
    pub target_bytes: u64,
}

#[derive(Debug, Default)]
pub struct OrphanReport {
    /// (language, orphaned target paths)
    pub by_lang: Vec<(Language, Vec<PathBuf>)>,
    pub total: usize,
}

#[derive(Debug)]
pub struct NextReport {
    pub total_possible: usize,
    pub total_missing: usize,
    pub next_file: Option<String>,
    pub missing_in: Vec<String>,
}

#[derive(Debug)]
pub struct FileDiff {
    pub rel_path: String,
    pub is_new: bool,
    pub committed: String,
    pub uncommitted: String,
    pub staged: String,
}

// ============================================================================
// Operations
// ============================================================================

impl Checker {
    pub fn new(config: TranslateConfig) -> Self {
        Self { config }
    }

    /// Source files changed since the last translation checkpoint.
    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            new_files: git::new_files(&self.config)?,
            uncommitted: git::worktree_changes(&self.config)?,
            committed: git::committed_changes(&self.config)?,
            checkpoint_exists: git::checkpoint_exists(&self.config.checkpoint_tag)?,
        })
    }

    /// Diff of one source file since the checkpoint.
    pub fn diff(&self, file: &str) -> Result<FileDiff> {
        let source_path = self.config.source_path();
        let (full_path, rel_path) = if let Some(rel) = file.strip_prefix(&format!("{source_path}/"))
        {
            (file.to_string(), rel.to_string())
        } else {
            (format!("{source_path}/{file}"), file.to_string())
        };

        if !PathBuf::from(&full_path).exists() {
            anyhow::bail!("File not found: {full_path}");
        }

        let tag = &self.config.checkpoint_tag;
        let is_new = !git::file_in_checkpoint(tag, &full_path);

        Ok(FileDiff {
            rel_path,
            is_new,
            committed: if is_new {
                String::new()
            } else {
                git::diff_since_checkpoint(tag, &full_path)?
            },
            uncommitted: git::diff_worktree(&full_path)?,
            staged: git::diff_staged(&full_path)?,
        })
    }

    /// Detailed committed changes for all files, with diffstat previews.
    pub fn changed(&self) -> Result<Vec<(String, String, Vec<String>)>> {
        let files = git::committed_changes(&self.config)?;
        let tag = &self.config.checkpoint_tag;
        let prefix = format!("{}/", self.config.source_path());

        let mut out = Vec::new();
        for file in files {
            let rel = file.strip_prefix(&prefix).unwrap_or(&file).to_string();
            let stat = git::diff_stat(tag, &file)?;
            let diff = git::diff_since_checkpoint(tag, &file)?;
            let preview: Vec<String> = diff
                .lines()
                .filter(|l| {
                    (l.starts_with('+') && !l.starts_with("+++"))
                        || (l.starts_with('-') && !l.starts_with("---"))
                })
                .map(str::to_owned)
                .collect();
            out.push((rel, stat, preview));
        }
        Ok(out)
    }

    /// Files present in the source tree but missing in target languages.
    pub fn missing(&self) -> MissingReport {
        let mut report = MissingReport::default();
        let source_files = self.source_files();

        for lang in &self.config.target_langs {
            let lang_path = self.config.lang_path(lang);
            let mut files = Vec::new();
            for rel in &source_files {
                if !PathBuf::from(&lang_path).join(rel).exists() {
                    files.push(rel.clone());
                    report.total += 1;
                }
            }
            report.by_lang.push((lang.clone(), files));
        }
        report
    }

    /// Target files suspiciously smaller than their source.
    pub fn stale(&self) -> Vec<StaleEntry> {
        let source_root = PathBuf::from(self.config.source_path());
        let mut entries = Vec::new();

        for rel in self.source_files() {
            let Ok(source_meta) = fs::metadata(source_root.join(&rel)) else {
                continue;
            };
            let source_bytes = source_meta.len();
            if source_bytes <= STALE_SOURCE_MIN_BYTES {
                continue;
            }

            for lang in &self.config.target_langs {
                let target = PathBuf::from(self.config.lang_path(lang)).join(&rel);
                let Ok(target_meta) = fs::metadata(&target) else {
                    continue;
                };
                if is_stale(source_bytes, target_meta.len()) {
                    entries.push(StaleEntry {
                        path: target,
                        source_bytes,
                        target_bytes: target_meta.len(),
                    });
                }
            }
        }
        entries
    }

    /// Target files whose source counterpart no longer exists.
    pub fn orphans(&self) -> OrphanReport {
        let source_root = PathBuf::from(self.config.source_path());
        let mut report = OrphanReport::default();

        for lang in &self.config.target_langs {
            let lang_root = PathBuf::from(self.config.lang_path(lang));
            let mut files = Vec::new();

            for entry in WalkDir::new(&lang_root).into_iter().flatten() {
                let path = entry.path();
                if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "md") {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&lang_root) else {
                    continue;
                };
                if !source_root.join(rel).exists() {
                    files.push(path.to_path_buf());
                    report.total += 1;
                }
            }
            report.by_lang.push((lang.clone(), files));
        }
        report
    }

    /// Delete orphaned files. Returns the deleted paths.
    pub fn clean(&self) -> Result<Vec<PathBuf>> {
        let report = self.orphans();
        let mut deleted = Vec::new();
        for (_, files) in report.by_lang {
            for path in files {
                fs::remove_file(&path)
                    .with_context(|| format!("deleting {}", path.display()))?;
                deleted.push(path);
            }
        }
        Ok(deleted)
    }

    /// Move the checkpoint to HEAD.
    pub fn done(&self) -> Result<()> {
        git::move_checkpoint(&self.config.checkpoint_tag)
    }

    /// Next file to translate, with overall progress.
    pub fn next(&self) -> NextReport {
        let mut source_files = self.source_files();
        source_files.sort();

        let missing = self.missing();
        let total_possible = source_files.len() * self.config.target_langs.len();

        let mut report = NextReport {
            total_possible,
            total_missing: missing.total,
            next_file: None,
            missing_in: Vec::new(),
        };

        for rel in &source_files {
            let missing_in: Vec<String> = self
                .config
                .target_langs
                .iter()
                .filter(|lang| !PathBuf::from(self.config.lang_path(lang)).join(rel).exists())
                .map(|lang| lang.dir_name.clone())
                .collect();
            if !missing_in.is_empty() {
                report.next_file = Some(rel.clone());
                report.missing_in = missing_in;
                break;
            }
        }
        report
    }

    /// Stray content directories not covered by the language config.
    pub fn stray_dirs(&self) -> Vec<(String, usize)> {
        let mut known: Vec<&str> = vec![&self.config.source_dir];
        known.extend(self.config.target_langs.iter().map(|l| l.dir_name.as_str()));

        let Ok(entries) = fs::read_dir(&self.config.content_dir) else {
            return Vec::new();
        };

        let mut strays = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !known.contains(&name.as_str()) {
                let count = WalkDir::new(entry.path())
                    .into_iter()
                    .flatten()
                    .filter(|e| {
                        e.file_type().is_file()
                            && e.path().extension().is_some_and(|ext| ext == "md")
                    })
                    .count();
                strays.push((name, count));
            }
        }
        strays.sort();
        strays
    }

    /// Relative paths of all Markdown files in the source tree.
    fn source_files(&self) -> Vec<String> {
        let root = PathBuf::from(self.config.source_path());
        WalkDir::new(&root)
            .into_iter()
            .flatten()
            .filter(|e| {
                e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "md")
            })
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&root)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect()
    }
}

/// Stale rule: target smaller than half the source.
#[inline]
pub fn is_stale(source_bytes: u64, target_bytes: u64) -> bool {
    target_bytes < source_bytes / 2
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Build a content tree and a config rooted inside a temp dir.
    fn test_checker(dir: &TempDir) -> Checker {
        let config = TranslateConfig {
            content_dir: dir.path().join("content").to_string_lossy().into_owned(),
            ..TranslateConfig::default()
        };
        fs::create_dir_all(format!("{}/english", config.content_dir)).unwrap();
        for lang in &config.target_langs {
            fs::create_dir_all(format!("{}/{}", config.content_dir, lang.dir_name)).unwrap();
        }
        Checker::new(config)
    }

    fn write(checker: &Checker, dir: &str, rel: &str, content: &str) {
        let path = PathBuf::from(&checker.config.content_dir)
            .join(dir)
            .join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_is_stale() {
        assert!(is_stale(1000, 400));
        assert!(!is_stale(1000, 500));
        assert!(!is_stale(1000, 900));
    }

    #[test]
    fn test_missing_counts_per_language() {
        let dir = TempDir::new().unwrap();
        let checker = test_checker(&dir);
        write(&checker, "english", "blog/a.md", "hello");
        write(&checker, "german", "blog/a.md", "hallo");

        let report = checker.missing();

        // One file, five targets, one translated
        assert_eq!(report.total, 4);
        let german = report
            .by_lang
            .iter()
            .find(|(l, _)| l.code == "de")
            .unwrap();
        assert!(german.1.is_empty());
        let swedish = report
            .by_lang
            .iter()
            .find(|(l, _)| l.code == "sv")
            .unwrap();
        assert_eq!(swedish.1, vec!["blog/a.md"]);
    }

    #[test]
    fn test_stale_detection_respects_size_gate() {
        let dir = TempDir::new().unwrap();
        let checker = test_checker(&dir);

        // Big source, tiny translation: stale
        write(&checker, "english", "big.md", &"x".repeat(2000));
        write(&checker, "german", "big.md", "kurz");
        // Small source, tiny translation: below the gate
        write(&checker, "english", "small.md", &"x".repeat(100));
        write(&checker, "german", "small.md", "k");

        let stale = checker.stale();
        assert_eq!(stale.len(), 1);
        assert!(stale[0].path.ends_with("german/big.md"));
        assert_eq!(stale[0].source_bytes, 2000);
    }

    #[test]
    fn test_orphans_and_clean() {
        let dir = TempDir::new().unwrap();
        let checker = test_checker(&dir);
        write(&checker, "english", "kept.md", "src");
        write(&checker, "german", "kept.md", "ok");
        write(&checker, "german", "gone.md", "orphan");
        write(&checker, "japanese", "gone.md", "orphan");

        let report = checker.orphans();
        assert_eq!(report.total, 2);

        let deleted = checker.clean().unwrap();
        assert_eq!(deleted.len(), 2);
        assert!(!PathBuf::from(checker.config.lang_path(
            checker.config.target("de").unwrap()
        ))
        .join("gone.md")
        .exists());

        // Idempotent
        assert_eq!(checker.orphans().total, 0);
    }

    #[test]
    fn test_next_reports_first_missing_in_order() {
        let dir = TempDir::new().unwrap();
        let checker = test_checker(&dir);
        write(&checker, "english", "a.md", "1");
        write(&checker, "english", "b.md", "2");
        // a.md fully translated
        for lang in &checker.config.target_langs.clone() {
            write(&checker, &lang.dir_name, "a.md", "t");
        }

        let next = checker.next();
        assert_eq!(next.next_file.as_deref(), Some("b.md"));
        assert_eq!(next.total_possible, 10);
        assert_eq!(next.total_missing, 5);
        assert_eq!(next.missing_in.len(), 5);
    }

    #[test]
    fn test_stray_dirs() {
        let dir = TempDir::new().unwrap();
        let checker = test_checker(&dir);
        write(&checker, "klingon", "a.md", "nuqneH");
        write(&checker, "klingon", "b.md", "qapla");

        let strays = checker.stray_dirs();
        assert_eq!(strays, vec![("klingon".to_string(), 2)]);
    }

    #[test]
    fn test_stray_dirs_none_when_all_configured() {
        let dir = TempDir::new().unwrap();
        let checker = test_checker(&dir);
        assert!(checker.stray_dirs().is_empty());
    }
}
