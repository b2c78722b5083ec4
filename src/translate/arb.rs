//! ARB message catalog handling.
//!
//! An ARB file maps stable message ids to ICU-format strings, with `@id`
//! metadata entries and `@@` top-level attributes. Emission order is
//! deterministic: `@@locale`, `@@last_modified`, sorted `@@x-*` keys,
//! then message ids sorted with each `@id` immediately after its id.

use crate::translate::provider::Provider;
use crate::util::fsio;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::{collections::BTreeMap, fs, path::Path};

/// Messages translated per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// An Application Resource Bundle catalog.
#[derive(Debug, Clone, Default)]
pub struct ArbFile {
    pub locale: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// message id -> ICU message
    pub messages: BTreeMap<String, String>,
    /// "@id" -> metadata (placeholders, description)
    pub metadata: BTreeMap<String, Value>,
    /// "@@x-..." attributes
    pub custom_attributes: BTreeMap<String, Value>,
}

/// Load an ARB file from disk.
pub fn load_arb(path: &Path) -> Result<ArbFile> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let raw: BTreeMap<String, Value> =
        serde_json::from_slice(&data).context("parsing ARB JSON")?;

    let mut arb = ArbFile::default();
    for (key, value) in raw {
        if key == "@@locale" {
            arb.locale = value.as_str().unwrap_or_default().to_string();
        } else if key == "@@last_modified" {
            arb.last_modified = value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc));
        } else if key.starts_with("@@") {
            arb.custom_attributes.insert(key, value);
        } else if key.starts_with('@') {
            arb.metadata.insert(key, value);
        } else {
            arb.messages
                .insert(key, value.as_str().unwrap_or_default().to_string());
        }
    }
    Ok(arb)
}

/// Write an ARB file with deterministic entry order, atomically.
///
/// `@@last_modified` is stamped with the current time.
pub fn save_arb(path: &Path, arb: &ArbFile) -> Result<()> {
    save_arb_at(path, arb, Utc::now())
}

/// Like [`save_arb`] with an explicit modification timestamp.
pub fn save_arb_at(path: &Path, arb: &ArbFile, now: DateTime<Utc>) -> Result<()> {
    let mut entries: Vec<(String, Value)> = vec![
        ("@@locale".to_string(), Value::String(arb.locale.clone())),
        (
            "@@last_modified".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ),
    ];

    for (key, value) in &arb.custom_attributes {
        entries.push((key.clone(), value.clone()));
    }

    for (id, message) in &arb.messages {
        entries.push((id.clone(), Value::String(message.clone())));
        let meta_key = format!("@{id}");
        if let Some(meta) = arb.metadata.get(&meta_key) {
            entries.push((meta_key, meta.clone()));
        }
    }

    let mut out = String::from("{\n");
    for (i, (key, value)) in entries.iter().enumerate() {
        let key_json = serde_json::to_string(key)?;
        let value_json = indented_value(value)?;
        out.push('\t');
        out.push_str(&key_json);
        out.push_str(": ");
        out.push_str(&value_json);
        if i < entries.len() - 1 {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("}\n");

    fsio::write_atomic(path, out.as_bytes())
}

/// Pretty-print a value with tab indentation, matching the file layout.
fn indented_value(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(value, &mut ser)?;
    let rendered = String::from_utf8(buf)?;
    // Indent continuation lines one level to sit under the key
    Ok(rendered.replace('\n', "\n\t"))
}

// ============================================================================
// ICU Escaping
// ============================================================================

/// Convert an ICU message back to plain text for translation.
///
/// A whole-string wrapping quote pair (used to suppress ICU
/// metacharacters) is stripped; doubled apostrophes collapse to one.
pub fn unescape_icu(s: &str) -> String {
    let s = if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        &s[1..s.len() - 1]
    } else {
        s
    };
    s.replace("''", "'")
}

/// Escape plain text for ICU message format.
///
/// Apostrophes are doubled; when the string contains any of `{ } # |`
/// the whole string is wrapped in single quotes.
pub fn escape_icu(s: &str) -> String {
    let has_special = s.contains(['{', '}', '#', '|']);
    let has_apostrophe = s.contains('\'');

    if !has_special && !has_apostrophe {
        return s.to_string();
    }

    let escaped = s.replace('\'', "''");
    if has_special {
        format!("'{escaped}'")
    } else {
        escaped
    }
}

// ============================================================================
// Catalog Translation
// ============================================================================

/// Catalog completeness statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbStats {
    pub total: usize,
    pub translated: usize,
    pub empty: usize,
}

impl ArbStats {
    pub fn completeness(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.translated as f64 / self.total as f64 * 100.0
    }
}

/// Compute completeness statistics for a catalog.
pub fn arb_stats(arb: &ArbFile) -> ArbStats {
    let mut stats = ArbStats {
        total: arb.messages.len(),
        ..Default::default()
    };
    for message in arb.messages.values() {
        if message.is_empty() {
            stats.empty += 1;
        } else {
            stats.translated += 1;
        }
    }
    stats
}

/// Merge message ids from the source into the target, so every source
/// entry is present (empty string = untranslated). Metadata for new ids
/// is carried over.
pub fn merge_source_ids(source: &ArbFile, target: &mut ArbFile) {
    for id in source.messages.keys() {
        target.messages.entry(id.clone()).or_default();
        let meta_key = format!("@{id}");
        if let Some(meta) = source.metadata.get(&meta_key) {
            target
                .metadata
                .entry(meta_key)
                .or_insert_with(|| meta.clone());
        }
    }
}

/// Batched catalog translator.
pub struct ArbTranslator<'a> {
    provider: &'a dyn Provider,
    batch_size: usize,
}

impl<'a> ArbTranslator<'a> {
    pub fn new(provider: &'a dyn Provider) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[cfg(test)]
    fn with_batch_size(provider: &'a dyn Provider, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size,
        }
    }

    /// Translate entries that are empty in the target and non-empty in
    /// the source. Translations land in the target as batches complete,
    /// so the caller can persist partial progress when a batch fails.
    ///
    /// Returns the number of entries translated.
    pub fn translate_arb(
        &self,
        source: &ArbFile,
        target: &mut ArbFile,
        target_lang: &str,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize> {
        let work: Vec<(&String, &String)> = source
            .messages
            .iter()
            .filter(|(id, text)| {
                !text.is_empty() && target.messages.get(*id).is_none_or(|m| m.is_empty())
            })
            .collect();

        if work.is_empty() {
            return Ok(0);
        }

        let total = work.len();
        let mut translated = 0;

        for (batch_idx, batch) in work.chunks(self.batch_size).enumerate() {
            crate::util::cancel::check()?;

            let texts: Vec<String> = batch
                .iter()
                .map(|(_, text)| unescape_icu(text))
                .collect();

            let start = batch_idx * self.batch_size;
            let translations = self
                .provider
                .translate_batch(&texts, "en", target_lang)
                .with_context(|| {
                    format!("translating batch {start}-{}", start + batch.len())
                })?;

            for ((id, _), translation) in batch.iter().zip(&translations) {
                if !translation.is_empty() {
                    target
                        .messages
                        .insert((*id).clone(), escape_icu(translation));
                    translated += 1;
                }
            }

            progress(start + batch.len(), total);
        }

        Ok(translated)
    }
}

// ============================================================================
// Tests
// ============================================================================
