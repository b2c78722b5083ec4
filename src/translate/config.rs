//! Language configuration.
//!
//! The set of languages is derived from the site's language config when
//! present (`config/_default/languages.toml`, weight 1 = source), and
//! from a built-in default list otherwise.

use anyhow::Result;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Site language configuration file, relative to the project root.
pub const LANGUAGES_FILE: &str = "config/_default/languages.toml";

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Language config parsing error")]
    Toml(#[from] toml::de::Error),
}

/// A configured language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1 code ("de")
    pub code: String,
    /// Display name ("German")
    pub name: String,
    /// Content directory name under `content/` ("german")
    pub dir_name: String,
}

/// Translation workflow configuration.
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub source_lang: String,
    pub source_dir: String,
    pub content_dir: String,
    pub i18n_dir: String,
    pub checkpoint_tag: String,
    pub target_langs: Vec<Language>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".into(),
            source_dir: "english".into(),
            content_dir: "content".into(),
            i18n_dir: "i18n".into(),
            checkpoint_tag: "last-translation".into(),
            target_langs: default_targets(),
        }
    }
}

fn default_targets() -> Vec<Language> {
    [
        ("de", "German", "german"),
        ("sv", "Swedish", "swedish"),
        ("zh", "Simplified Chinese", "chinese"),
        ("ja", "Japanese", "japanese"),
        ("th", "Thai", "thai"),
    ]
    .into_iter()
    .map(|(code, name, dir)| Language {
        code: code.into(),
        name: name.into(),
        dir_name: dir.into(),
    })
    .collect()
}

impl TranslateConfig {
    /// Load configuration, preferring the site language config when present.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Ok(parsed) = parse_languages_file(Path::new(LANGUAGES_FILE)) {
            config.apply(parsed);
        }
        config
    }

    /// Full path to the source content directory ("content/english").
    pub fn source_path(&self) -> String {
        format!("{}/{}", self.content_dir, self.source_dir)
    }

    /// Path to a target language's content directory.
    pub fn lang_path(&self, lang: &Language) -> String {
        format!("{}/{}", self.content_dir, lang.dir_name)
    }

    /// Find a target language by code.
    pub fn target(&self, code: &str) -> Option<&Language> {
        self.target_langs.iter().find(|l| l.code == code)
    }

    fn apply(&mut self, parsed: ParsedLanguages) {
        if let Some(source) = parsed.source {
            self.source_lang = source.code;
            self.source_dir = source.dir_name;
        }
        if !parsed.targets.is_empty() {
            self.target_langs = parsed.targets;
        }
    }
}

/// Whether the current directory looks like a site project.
pub fn is_site_project() -> bool {
    Path::new(LANGUAGES_FILE).exists()
}

/// Languages parsed from the site config.
#[derive(Debug, Default)]
pub struct ParsedLanguages {
    pub source: Option<Language>,
    pub targets: Vec<Language>,
}

#[derive(Deserialize)]
struct LangEntry {
    #[serde(rename = "languageName", default)]
    language_name: String,
    #[serde(rename = "contentDir", default)]
    content_dir: String,
    #[serde(default)]
    weight: i64,
}

/// Parse the site language config.
///
/// Weight 1 designates the source language; all others are targets,
/// ordered by weight.
pub fn parse_languages_file(path: &Path) -> Result<ParsedLanguages> {
    let content =
        fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
    parse_languages(&content)
}

/// Parse language config TOML content.
pub fn parse_languages(content: &str) -> Result<ParsedLanguages> {
    let raw: BTreeMap<String, LangEntry> =
        toml::from_str(content).map_err(ConfigError::Toml)?;

    let mut parsed = ParsedLanguages::default();
    let mut weighted: Vec<(i64, Language)> = Vec::new();

    for (code, entry) in raw {
        let dir_name = entry
            .content_dir
            .strip_prefix("content/")
            .unwrap_or(&entry.content_dir)
            .to_string();
        if dir_name.is_empty() {
            continue;
        }
        let lang = Language {
            code,
            name: entry.language_name,
            dir_name,
        };
        if entry.weight == 1 {
            parsed.source = Some(lang);
        } else {
            weighted.push((entry.weight, lang));
        }
    }

    weighted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.code.cmp(&b.1.code)));
    parsed.targets = weighted.into_iter().map(|(_, l)| l).collect();

    Ok(parsed)
}

/// Check the running configuration against the site config.
///
/// Returns a list of mismatches; empty means all good.
pub fn validate_against_site(config: &TranslateConfig) -> Vec<String> {
    let parsed = match parse_languages_file(Path::new(LANGUAGES_FILE)) {
        Ok(parsed) => parsed,
        Err(err) => return vec![format!("Cannot read site language config: {err}")],
    };

    let mut mismatches = Vec::new();

    let site_source = parsed.source.as_ref();
    if site_source.map(|l| l.code.as_str()) != Some(config.source_lang.as_str()) {
        mismatches.push(format!(
            "Source language mismatch: translator={}, site={}",
            config.source_lang,
            site_source.map_or("(none)", |l| &l.code)
        ));
    }
    if site_source.map(|l| l.dir_name.as_str()) != Some(config.source_dir.as_str()) {
        mismatches.push(format!(
            "Source directory mismatch: translator={}, site={}",
            config.source_dir,
            site_source.map_or("(none)", |l| &l.dir_name)
        ));
    }

    for lang in &config.target_langs {
        if !parsed.targets.iter().any(|l| l.code == lang.code) {
            mismatches.push(format!(
                "Language '{}' in translator but not in site config",
                lang.code
            ));
        }
    }
    for lang in &parsed.targets {
        if !config.target_langs.iter().any(|l| l.code == lang.code) {
            mismatches.push(format!(
                "Language '{}' in site config but not in translator",
                lang.code
            ));
        }
    }

    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[en]
languageName = "English"
contentDir = "content/english"
weight = 1

[de]
languageName = "German"
contentDir = "content/german"
weight = 2

[sv]
languageName = "Swedish"
contentDir = "content/swedish"
weight = 3
"#;

    #[test]
    fn test_parse_languages_source_and_targets() {
        let parsed = parse_languages(SAMPLE).unwrap();

        let source = parsed.source.unwrap();
        assert_eq!(source.code, "en");
        assert_eq!(source.dir_name, "english");

        let codes: Vec<&str> = parsed.targets.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["de", "sv"]);
        assert_eq!(parsed.targets[0].name, "German");
        assert_eq!(parsed.targets[0].dir_name, "german");
    }

    #[test]
    fn test_parse_languages_orders_by_weight() {
        let content = r#"
[zz]
languageName = "Last"
contentDir = "content/last"
weight = 9

[aa]
languageName = "First"
contentDir = "content/first"
weight = 2
"#;
        let parsed = parse_languages(content).unwrap();
        let codes: Vec<&str> = parsed.targets.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["aa", "zz"]);
    }

    #[test]
    fn test_parse_languages_skips_entries_without_dir() {
        let content = r#"
[de]
languageName = "German"
weight = 2
"#;
        let parsed = parse_languages(content).unwrap();
        assert!(parsed.targets.is_empty());
    }

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("languages.toml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("languages.toml"));
    }

    #[test]
    fn test_parse_languages_invalid_toml() {
        assert!(parse_languages("[en\nbroken").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TranslateConfig::default();
        assert_eq!(config.source_lang, "en");
        assert_eq!(config.source_path(), "content/english");
        assert_eq!(config.checkpoint_tag, "last-translation");
        assert_eq!(config.target_langs.len(), 5);
        assert!(config.target("de").is_some());
        assert!(config.target("fr").is_none());
    }

    #[test]
    fn test_lang_path() {
        let config = TranslateConfig::default();
        let de = config.target("de").unwrap().clone();
        assert_eq!(config.lang_path(&de), "content/german");
    }
}
