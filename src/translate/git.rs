//! Checkpoint tracking against the project's git history.
//!
//! The translation baseline is a git tag. Changed source files are the
//! union of untracked additions, working-tree modifications and commits
//! since the tag, scoped to the source content tree plus a small
//! allow-list of config files.

use crate::exec_quiet;
use crate::translate::config::TranslateConfig;
use anyhow::Result;

/// Extensions qualifying a path for translation tracking.
const TRACKED_EXTENSIONS: &[&str] = &[".md", ".toml", ".yaml"];

/// Extra files tracked alongside the content tree (menus, UI strings).
fn extra_pathspecs(config: &TranslateConfig) -> [String; 2] {
    [
        format!("config/_default/menus.{}.toml", config.source_lang),
        format!("{}/{}.yaml", config.i18n_dir, config.source_lang),
    ]
}

/// Untracked additions under the source content root.
pub fn new_files(config: &TranslateConfig) -> Result<Vec<String>> {
    let output = exec_quiet!(
        ["git", "ls-files", "--others", "--exclude-standard", "--"];
        format!("{}/", config.source_path()),
    )?;
    Ok(filter_tracked_paths(
        &String::from_utf8_lossy(&output.stdout),
        &[".md"],
    ))
}

/// Working-tree modifications (unstaged) to tracked translation inputs.
pub fn worktree_changes(config: &TranslateConfig) -> Result<Vec<String>> {
    let [menus, i18n] = extra_pathspecs(config);
    let output = exec_quiet!(
        ["git", "diff", "--name-only", "--"];
        format!("{}/", config.source_path()),
        menus,
        i18n,
    )?;
    Ok(filter_tracked_paths(
        &String::from_utf8_lossy(&output.stdout),
        TRACKED_EXTENSIONS,
    ))
}

/// Files that differ between the checkpoint tag and HEAD.
///
/// Returns an empty list when no checkpoint exists yet.
pub fn committed_changes(config: &TranslateConfig) -> Result<Vec<String>> {
    if !checkpoint_exists(&config.checkpoint_tag)? {
        return Ok(Vec::new());
    }
    let [menus, i18n] = extra_pathspecs(config);
    let output = exec_quiet!(
        ["git", "diff", "--name-only"];
        format!("{}..HEAD", config.checkpoint_tag),
        "--",
        format!("{}/", config.source_path()),
        menus,
        i18n,
    )?;
    Ok(filter_tracked_paths(
        &String::from_utf8_lossy(&output.stdout),
        TRACKED_EXTENSIONS,
    ))
}

/// Union of all changed source files since the checkpoint, sorted and
/// de-duplicated.
pub fn changed_files(config: &TranslateConfig) -> Result<Vec<String>> {
    let mut files = new_files(config)?;
    files.extend(worktree_changes(config)?);
    files.extend(committed_changes(config)?);
    files.sort();
    files.dedup();
    Ok(files)
}

/// Whether the checkpoint tag exists.
pub fn checkpoint_exists(tag: &str) -> Result<bool> {
    let output = exec_quiet!(["git", "tag", "-l"]; tag)?;
    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
}

/// Force-move the checkpoint tag to HEAD.
pub fn move_checkpoint(tag: &str) -> Result<()> {
    exec_quiet!(["git", "tag", "-f"]; tag, "HEAD")?;
    Ok(())
}

/// Whether a file existed at the checkpoint.
pub fn file_in_checkpoint(tag: &str, path: &str) -> bool {
    exec_quiet!(["git", "show"]; format!("{tag}:{path}")).is_ok()
}

/// Diff of a file between the checkpoint and HEAD.
pub fn diff_since_checkpoint(tag: &str, path: &str) -> Result<String> {
    let output = exec_quiet!(["git", "diff"]; format!("{tag}..HEAD"), "--", path)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Unstaged diff of a file against HEAD.
pub fn diff_worktree(path: &str) -> Result<String> {
    let output = exec_quiet!(["git", "diff", "HEAD", "--"]; path)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Staged-but-uncommitted diff of a file.
pub fn diff_staged(path: &str) -> Result<String> {
    let output = exec_quiet!(["git", "diff", "--cached", "--"]; path)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// One-line diffstat of a file between the checkpoint and HEAD.
pub fn diff_stat(tag: &str, path: &str) -> Result<String> {
    let output = exec_quiet!(["git", "diff", "--stat"]; format!("{tag}..HEAD"), "--", path)?;
    let text = String::from_utf8_lossy(&output.stdout);
    // The last non-empty line is the summary ("1 file changed, ...")
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .next_back()
        .unwrap_or("")
        .trim()
        .to_string())
}

/// Keep non-empty lines ending in one of the tracked extensions.
fn filter_tracked_paths(output: &str, extensions: &[&str]) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && extensions.iter().any(|ext| line.ends_with(ext)))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_tracked_paths() {
        let output = "content/english/blog/post.md\n\ncontent/english/img.png\ni18n/en.yaml\n";
        let files = filter_tracked_paths(output, TRACKED_EXTENSIONS);
        assert_eq!(
            files,
            vec!["content/english/blog/post.md", "i18n/en.yaml"]
        );
    }

    #[test]
    fn test_filter_tracked_paths_md_only() {
        let output = "a.md\nb.toml\nc.yaml\n";
        let files = filter_tracked_paths(output, &[".md"]);
        assert_eq!(files, vec!["a.md"]);
    }

    #[test]
    fn test_filter_tracked_paths_trims_whitespace() {
        let output = "  a.md  \n\t\n";
        let files = filter_tracked_paths(output, &[".md"]);
        assert_eq!(files, vec!["a.md"]);
    }

    #[test]
    fn test_extra_pathspecs() {
        let config = TranslateConfig::default();
        let [menus, i18n] = extra_pathspecs(&config);
        assert_eq!(menus, "config/_default/menus.en.toml");
        assert_eq!(i18n, "i18n/en.yaml");
    }
}
