//! Markdown document translation with content preservation.
//!
//! Front matter is split off and only a fixed set of fields is
//! translated. The body is masked before submission: fenced code,
//! shortcodes, images, link targets, inline code and HTML tags are each
//! replaced by a `[[NOTRANSLATE_<n>]]` sentinel and restored byte-exact
//! afterwards. A sentinel surviving the restore fails the file.

use crate::translate::provider::Provider;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::sync::OnceLock;

/// Sentinel markers for content that must not be translated.
pub const PLACEHOLDER_PREFIX: &str = "[[NOTRANSLATE_";
pub const PLACEHOLDER_SUFFIX: &str = "]]";

/// Front-matter fields that get translated.
const TRANSLATABLE_FIELDS: &[&str] = &["title", "meta_title", "description", "excerpt", "summary"];

/// Translates site Markdown files while preserving front matter
/// structure, shortcodes, code blocks and link targets.
pub struct MarkdownTranslator<'a> {
    provider: &'a dyn Provider,
}

impl<'a> MarkdownTranslator<'a> {
    pub fn new(provider: &'a dyn Provider) -> Self {
        Self { provider }
    }

    /// Translate a whole document.
    pub fn translate_file(
        &self,
        content: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let (front_matter, body) = split_front_matter(content);

        let front_matter = match front_matter {
            Some(fm) => Some(
                self.translate_front_matter(fm, source_lang, target_lang)
                    .context("translating front matter")?,
            ),
            None => None,
        };

        let body = self
            .translate_body(body, source_lang, target_lang)
            .context("translating body")?;

        Ok(assemble(front_matter.as_deref(), &body))
    }

    /// Translate the recognized front-matter fields, preserving all others.
    fn translate_front_matter(
        &self,
        front_matter: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let mut lines: Vec<String> = front_matter.lines().map(str::to_owned).collect();
        let mut texts = Vec::new();
        let mut line_indices = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some(colon) = line.find(':') else {
                continue;
            };
            let key = line[..colon].trim();
            let value = line[colon + 1..].trim();

            if TRANSLATABLE_FIELDS.contains(&key) && !value.is_empty() {
                let clean = value.trim_matches(|c| c == '"' || c == '\'');
                if !clean.is_empty() {
                    texts.push(clean.to_string());
                    line_indices.push(i);
                }
            }
        }

        if texts.is_empty() {
            return Ok(front_matter.to_string());
        }

        let translations = self
            .provider
            .translate_batch(&texts, source_lang, target_lang)?;

        for (idx, translated) in line_indices.into_iter().zip(translations) {
            let (indent, key) = {
                let line = &lines[idx];
                let colon = line.find(':').unwrap_or(0);
                let indent: String = line
                    .chars()
                    .take_while(|c| *c == ' ' || *c == '\t')
                    .collect();
                (indent, line[..colon].trim().to_string())
            };
            let escaped = translated.replace('"', "\\\"");
            lines[idx] = format!("{indent}{key}: \"{escaped}\"");
        }

        Ok(lines.join("\n"))
    }

    /// Translate the body with sentinel protection.
    fn translate_body(&self, body: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        if body.is_empty() {
            return Ok(String::new());
        }

        let (masked, protected) = mask_protected(body);

        let translated = self.provider.translate(&masked, source_lang, target_lang)?;

        let restored = unmask(&translated, &protected);
        if restored.contains(PLACEHOLDER_PREFIX) {
            bail!("untranslated sentinel left in output");
        }

        Ok(restored)
    }
}

/// Split YAML front matter from the Markdown body.
///
/// The document must open with `---` and contain a closing `\n---`;
/// anything else is treated as body-only.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let content = content.trim();
    let Some(rest) = content.strip_prefix("---") else {
        return (None, content);
    };
    let Some(idx) = rest.find("\n---") else {
        return (None, content);
    };
    let front_matter = rest[..idx].trim();
    let body = rest[idx + 4..].trim();
    (Some(front_matter), body)
}

/// Combine front matter and body back into a document.
pub fn assemble(front_matter: Option<&str>, body: &str) -> String {
    match front_matter {
        Some(fm) if !fm.is_empty() => format!("---\n{fm}\n---\n\n{body}\n"),
        _ => body.to_string(),
    }
}

/// Protected span table: (sentinel, original) pairs in masking order.
pub type ProtectedSpans = Vec<(String, String)>;

/// Ordered masking passes. Fenced code first (it can contain anything),
/// images before bare link targets, reference machinery before inline
/// code so backticks inside URLs stay intact.
fn mask_patterns() -> &'static [Regex; 8] {
    static PATTERNS: OnceLock<[Regex; 8]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Fenced code blocks
            Regex::new("(?s)```[a-z]*\\n.*?```").unwrap(),
            // Shortcodes: {{< name >}} or {{% name %}}
            Regex::new(r"\{\{[<%].*?[%>]\}\}").unwrap(),
            // Image references: ![alt](path)
            Regex::new(r"!\[[^\]]*\]\([^)]+\)").unwrap(),
            // Link definitions: [ref]: url
            Regex::new(r"(?m)^\[[^\]]+\]:\s+.*$").unwrap(),
            // Reference links: [text][ref]
            Regex::new(r"\[[^\]]+\]\[[^\]]*\]").unwrap(),
            // Markdown link targets: ](url)
            Regex::new(r"\]\([^)]+\)").unwrap(),
            // Inline code
            Regex::new("`[^`]+`").unwrap(),
            // HTML tags
            Regex::new(r"<[^>]+>").unwrap(),
        ]
    })
}

/// Replace protected regions with sentinels.
///
/// Later passes never touch earlier masks: the sentinel alphabet matches
/// none of the patterns.
pub fn mask_protected(body: &str) -> (String, ProtectedSpans) {
    let mut protected = ProtectedSpans::new();
    let mut counter = 0usize;
    let mut processed = body.to_string();

    for pattern in mask_patterns() {
        processed = pattern
            .replace_all(&processed, |caps: &regex::Captures| {
                let sentinel = format!("{PLACEHOLDER_PREFIX}{counter}{PLACEHOLDER_SUFFIX}");
                protected.push((sentinel.clone(), caps[0].to_string()));
                counter += 1;
                sentinel
            })
            .into_owned();
    }

    (processed, protected)
}

/// Restore protected regions by straight substring replacement.
///
/// Later masks are restored first: a later pass can swallow an earlier
/// sentinel (a stray backtick pair around one, say), and restoring in
/// reverse re-exposes such sentinels before their own turn comes.
pub fn unmask(text: &str, protected: &ProtectedSpans) -> String {
    let mut restored = text.to_string();
    for (sentinel, original) in protected.iter().rev() {
        restored = restored.replace(sentinel, original);
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::provider::tests::FakeProvider;

    #[test]
    fn test_split_front_matter_basic() {
        let doc = "---\ntitle: Hi\n---\n\nBody text";
        let (fm, body) = split_front_matter(doc);
        assert_eq!(fm, Some("title: Hi"));
        assert_eq!(body, "Body text");
    }

    #[test]
    fn test_split_front_matter_absent() {
        let (fm, body) = split_front_matter("Just a body");
        assert_eq!(fm, None);
        assert_eq!(body, "Just a body");
    }

    #[test]
    fn test_split_front_matter_unclosed() {
        let (fm, body) = split_front_matter("---\ntitle: Hi");
        assert_eq!(fm, None);
        assert_eq!(body, "---\ntitle: Hi");
    }

    #[test]
    fn test_assemble_round_trip() {
        let out = assemble(Some("title: Hi"), "Body");
        assert_eq!(out, "---\ntitle: Hi\n---\n\nBody\n");
        assert_eq!(assemble(None, "Body"), "Body");
    }

    #[test]
    fn test_mask_protects_inline_code() {
        let (masked, protected) = mask_protected("Hello `world`!");
        assert!(!masked.contains("`world`"));
        assert!(masked.contains(PLACEHOLDER_PREFIX));
        assert_eq!(protected.len(), 1);
        assert_eq!(protected[0].1, "`world`");
    }

    #[test]
    fn test_mask_order_fenced_before_inline() {
        // Inline backticks inside a fence must not be masked twice
        let body = "```rust\nlet x = `tick`;\n```\nand `code` after";
        let (masked, protected) = mask_protected(body);
        assert_eq!(protected.len(), 2);
        assert!(protected[0].1.starts_with("```rust"));
        assert_eq!(protected[1].1, "`code`");
        assert!(!masked.contains("```"));
    }

    #[test]
    fn test_mask_images_before_links() {
        let body = "![logo](img.png) and [docs](https://example.com)";
        let (_, protected) = mask_protected(body);
        assert_eq!(protected[0].1, "![logo](img.png)");
        assert_eq!(protected[1].1, "](https://example.com)");
    }

    #[test]
    fn test_mask_shortcodes_and_html() {
        let body = "Before {{< figure src=\"a.png\" >}} middle <br/> after";
        let (masked, protected) = mask_protected(body);
        assert!(!masked.contains("figure"));
        assert!(!masked.contains("<br/>"));
        assert_eq!(protected.len(), 2);
    }

    #[test]
    fn test_unmask_round_trip() {
        let body = "Text with `code`, [a link](https://x.test) and <b>html</b>.";
        let (masked, protected) = mask_protected(body);
        assert_eq!(unmask(&masked, &protected), body);
    }

    #[test]
    fn test_unmask_nested_sentinel() {
        // The inline-code pass swallows the second shortcode's sentinel;
        // reverse-order restore must still round-trip
        let body = "a {{< x >}} b ` {{< y >}} ` c";
        let (masked, protected) = mask_protected(body);
        assert_eq!(unmask(&masked, &protected), body);
    }

    #[test]
    fn test_unmask_double_digit_sentinels() {
        // Eleven inline codes force two-digit sentinel indices
        let body = (0..11)
            .map(|i| format!("`c{i}`"))
            .collect::<Vec<_>>()
            .join(" word ");
        let (masked, protected) = mask_protected(&body);
        assert_eq!(protected.len(), 11);
        assert_eq!(unmask(&masked, &protected), body);
    }

    #[test]
    fn test_translate_file_preserves_inline_code() {
        // Scenario: "Hello `world`!" keeps the inline code verbatim
        let provider = FakeProvider::prefixing("DE:");
        let mt = MarkdownTranslator::new(&provider);

        let out = mt.translate_file("Hello `world`!", "en", "de").unwrap();
        assert!(out.contains("`world`"));
        assert!(out.starts_with("DE:"));
    }

    #[test]
    fn test_translate_file_front_matter_field_selection() {
        // title translated and quoted, date byte-identical
        let doc = "---\ntitle: \"Widgets\"\ndate: 2024-01-02\n---\n\nHello world\n";
        let provider = FakeProvider::prefixing("X ");
        let mt = MarkdownTranslator::new(&provider);

        let out = mt.translate_file(doc, "en", "de").unwrap();
        assert!(out.contains("date: 2024-01-02"));
        assert!(out.contains("title: \"X Widgets\""));
    }

    #[test]
    fn test_translate_file_escapes_quotes_in_translation() {
        let doc = "---\ntitle: Widgets\n---\n\nBody\n";
        let provider = FakeProvider::replacing_with("say \"hi\"");
        let mt = MarkdownTranslator::new(&provider);

        let out = mt.translate_file(doc, "en", "de").unwrap();
        assert!(out.contains(r#"title: "say \"hi\"""#));
    }

    #[test]
    fn test_translate_file_fails_on_surviving_sentinel() {
        // A provider that invents a sentinel triggers the invariant check
        let provider = FakeProvider::replacing_with("[[NOTRANSLATE_99]] corrupted");
        let mt = MarkdownTranslator::new(&provider);

        let result = mt.translate_file("keep `this` code", "en", "de");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("body"));
    }

    #[test]
    fn test_translate_file_body_only_document() {
        let provider = FakeProvider::prefixing("");
        let mt = MarkdownTranslator::new(&provider);

        let out = mt.translate_file("plain body, no front matter", "en", "de").unwrap();
        assert_eq!(out, "plain body, no front matter");
    }
}
