//! Claude messages-API provider.
//!
//! Batches are sent in a numbered format and split back apart; small
//! batches are translated one call at a time.

use super::{Provider, language_name};
use crate::util::http;
use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 4096;
const API_VERSION: &str = "2023-06-01";

/// Batches at or below this size are translated call-per-text.
const INLINE_BATCH_LIMIT: usize = 3;

/// Claude API provider.
#[derive(Debug)]
pub struct Claude {
    api_key: String,
    client: Client,
}

impl Claude {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            bail!("Claude API key is required");
        }
        Ok(Self {
            api_key,
            client: http::client(http::PROVIDER_TIMEOUT)?,
        })
    }

    fn call_api(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .client
            .post(API_URL)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .context("Claude request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            bail!("Claude API error (status {}): {text}", status.as_u16());
        }

        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }
        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: String,
        }

        let parsed: ApiResponse = resp.json().context("decoding Claude response")?;
        let first = parsed
            .content
            .first()
            .filter(|b| !b.text.is_empty())
            .ok_or_else(|| anyhow::anyhow!("no content in Claude response"))?;
        Ok(first.text.clone())
    }
}

/// Prompt for a single translation.
pub(crate) fn single_prompt(text: &str, target_lang: &str) -> String {
    let target_name = language_name(target_lang);
    format!(
        "Translate the following text from English to {target_name}.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. Return ONLY the translated text - no explanations, notes, or commentary\n\
         2. Preserve ALL markdown formatting exactly (headers, lists, bold, italic, links)\n\
         3. DO NOT translate:\n\
            - URLs and links (keep them exactly as-is)\n\
            - Code blocks (content between triple backticks)\n\
            - Inline code (content between single backticks)\n\
            - Template shortcodes (like {{{{< shortcode >}}}} and {{{{% shortcode %}}}})\n\
            - HTML tags\n\
         4. Maintain the same paragraph structure and line breaks\n\
         \n\
         Text to translate:\n\
         {text}"
    )
}

/// Prompt for a numbered batch.
fn batch_prompt(texts: &[String], target_lang: &str) -> String {
    let target_name = language_name(target_lang);
    let mut prompt = format!(
        "Translate each numbered text from English to {target_name}.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. Return translations in EXACTLY the same numbered format\n\
         2. Preserve ALL markdown formatting\n\
         3. DO NOT translate URLs, code blocks, shortcodes, or HTML tags\n\
         4. Return ONLY the numbered translations - no explanations\n\
         \n\
         Texts to translate:\n\n"
    );
    for (i, text) in texts.iter().enumerate() {
        prompt.push_str(&format!("[{}]\n{text}\n\n", i + 1));
    }
    prompt
}

/// Extract translations from the numbered response format.
pub(crate) fn parse_numbered_response(response: &str, count: usize) -> Result<Vec<String>> {
    let mut results = Vec::with_capacity(count);

    for i in 0..count {
        let start_marker = format!("[{}]", i + 1);
        let end_marker = format!("[{}]", i + 2);

        let start = response
            .find(&start_marker)
            .ok_or_else(|| anyhow::anyhow!("missing translation for item {}", i + 1))?
            + start_marker.len();

        let end = if i == count - 1 {
            response.len()
        } else {
            response[start..]
                .find(&end_marker)
                .map_or(response.len(), |idx| start + idx)
        };

        results.push(response[start..end].trim().to_string());
    }

    Ok(results)
}

impl Provider for Claude {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn translate(&self, text: &str, _source_lang: &str, target_lang: &str) -> Result<String> {
        self.call_api(&single_prompt(text, target_lang))
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

        if texts.len() <= INLINE_BATCH_LIMIT {
            return texts
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    self.translate(text, source_lang, target_lang)
                        .with_context(|| format!("translating text {i}"))
                })
                .collect();
        }

        let response = self.call_api(&batch_prompt(texts, target_lang))?;
        parse_numbered_response(&response, texts.len())
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
    fn test_new_rejects_empty_key() {
        assert!(Claude::new(String::new()).is_err());
    }

    #[test]
    fn test_parse_numbered_response() {
        let response = "[1]\nHallo\n\n[2]\nWelt";
        let parsed = parse_numbered_response(response, 2).unwrap();
        assert_eq!(parsed, vec!["Hallo", "Welt"]);
    }

    #[test]
    fn test_parse_numbered_response_last_takes_rest() {
        let response = "[1]\nEins\n\n[2]\nZwei\nund mehr";
        let parsed = parse_numbered_response(response, 2).unwrap();
        assert_eq!(parsed[1], "Zwei\nund mehr");
    }

    #[test]
    fn test_parse_numbered_response_missing_item() {
        let response = "[1]\nEins";
        let err = parse_numbered_response(response, 2).unwrap_err();
        assert!(err.to_string().contains("item 2"));
    }

    #[test]
    fn test_single_prompt_names_target_language() {
        let prompt = single_prompt("Hello", "de");
        assert!(prompt.contains("to German"));
        assert!(prompt.ends_with("Hello"));
    }

    #[test]
    fn test_batch_prompt_numbers_texts() {
        let texts = vec!["one".to_string(), "two".to_string()];
        let prompt = batch_prompt(&texts, "sv");
        assert!(prompt.contains("to Swedish"));
        assert!(prompt.contains("[1]\none"));
        assert!(prompt.contains("[2]\ntwo"));
    }
}
