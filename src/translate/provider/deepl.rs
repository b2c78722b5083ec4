//! DeepL REST provider.
//!
//! Free-tier keys end with ":fx" and use a different endpoint; the
//! usage endpoint backs quota reporting around batch runs.

use super::{Provider, Usage};
use crate::util::http;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

const PRO_URL: &str = "https://api.deepl.com/v2";
const FREE_URL: &str = "https://api-free.deepl.com/v2";

/// DeepL target-language codes keyed by ISO 639-1.
const LANG_MAP: &[(&str, &str)] = &[
    ("en", "EN"),
    ("de", "DE"),
    ("fr", "FR"),
    ("es", "ES"),
    ("it", "IT"),
    ("nl", "NL"),
    ("pl", "PL"),
    ("pt", "PT-PT"),
    ("ru", "RU"),
    ("ja", "JA"),
    ("zh", "ZH"),
    ("bg", "BG"),
    ("cs", "CS"),
    ("da", "DA"),
    ("el", "EL"),
    ("et", "ET"),
    ("fi", "FI"),
    ("hu", "HU"),
    ("lt", "LT"),
    ("lv", "LV"),
    ("ro", "RO"),
    ("sk", "SK"),
    ("sl", "SL"),
    ("sv", "SV"),
    ("id", "ID"),
    ("tr", "TR"),
    ("uk", "UK"),
    ("ko", "KO"),
    ("nb", "NB"),
    ("ar", "AR"),
    ("vi", "VI"),
];

fn deepl_lang(code: &str) -> Option<&'static str> {
    let lower = code.to_ascii_lowercase();
    LANG_MAP.iter().find(|(c, _)| *c == lower).map(|(_, d)| *d)
}

/// DeepL API provider.
#[derive(Debug)]
pub struct DeepL {
    api_key: String,
    base_url: &'static str,
    client: Client,
}

impl DeepL {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            bail!("DeepL API key is required");
        }
        let base_url = if api_key.ends_with(":fx") {
            FREE_URL
        } else {
            PRO_URL
        };
        Ok(Self {
            api_key,
            base_url,
            client: http::client(http::PROVIDER_TIMEOUT)?,
        })
    }

    /// Whether this key uses the free endpoint.
    pub fn is_free_tier(&self) -> bool {
        self.base_url == FREE_URL
    }

    fn request_translations(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        let target = deepl_lang(target_lang)
            .ok_or_else(|| anyhow!("unsupported target language: {target_lang}"))?;

        let mut body = json!({
            "text": texts,
            "target_lang": target,
            "preserve_formatting": true,
        });
        // Source language is optional (auto-detect when unmapped)
        if let Some(source) = deepl_lang(source_lang) {
            body["source_lang"] = json!(source);
        }

        let resp = self
            .client
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&body)
            .send()
            .context("DeepL request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            bail!("DeepL API error (status {}): {text}", status.as_u16());
        }

        #[derive(Deserialize)]
        struct TranslateResponse {
            translations: Vec<Translation>,
        }
        #[derive(Deserialize)]
        struct Translation {
            text: String,
        }

        let parsed: TranslateResponse = resp.json().context("decoding DeepL response")?;
        if parsed.translations.len() != texts.len() {
            bail!(
                "DeepL returned {} translations for {} texts",
                parsed.translations.len(),
                texts.len()
            );
        }
        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }
}

impl Provider for DeepL {
    fn name(&self) -> &'static str {
        "deepl"
    }

    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let mut results =
            self.request_translations(&[text.to_string()], source_lang, target_lang)?;
        results.pop().ok_or_else(|| anyhow!("empty DeepL response"))
    }

    fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_translations(texts, source_lang, target_lang)
    }

    fn supported_languages(&self) -> Vec<String> {
        LANG_MAP.iter().map(|(c, _)| c.to_string()).collect()
    }

    fn supports_language(&self, code: &str) -> bool {
        deepl_lang(code).is_some()
    }

    fn usage(&self) -> Option<Result<Usage>> {
        Some(self.fetch_usage())
    }
}

impl DeepL {
    fn fetch_usage(&self) -> Result<Usage> {
        #[derive(Deserialize)]
        struct UsageResponse {
            character_count: i64,
            character_limit: i64,
        }

        let resp = self
            .client
            .get(format!("{}/usage", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .send()
            .context("usage request failed")?;

        if !resp.status().is_success() {
            bail!("usage request returned status {}", resp.status().as_u16());
        }

        let parsed: UsageResponse = resp.json().context("decoding usage response")?;
        Ok(Usage {
            character_count: parsed.character_count,
            character_limit: parsed.character_limit,
        })
    }
}
