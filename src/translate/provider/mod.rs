//! Translation provider abstraction.
//!
//! Providers expose single and batched translation plus a supported
//! language set. Selection is CLI-driven through a registry keyed by
//! variant name; construction fails fast when credentials are missing.

pub mod claude;
pub mod claude_cli;
pub mod deepl;

use anyhow::{Result, bail};

/// A translation backend.
pub trait Provider: std::fmt::Debug {
    /// Provider name ("deepl", "claude", "claude-cli").
    fn name(&self) -> &'static str;

    /// Translate one text. Language codes are ISO 639-1 ("en", "de").
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;

    /// Translate multiple texts, returning translations in input order.
    fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>>;

    /// Supported language codes.
    fn supported_languages(&self) -> Vec<String>;

    /// Whether a language code is supported.
    fn supports_language(&self, code: &str) -> bool;

    /// Current API usage, when the provider exposes a usage endpoint.
    fn usage(&self) -> Option<Result<Usage>> {
        None
    }
}

/// API usage statistics for quota tracking.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    /// Characters used this billing period.
    pub character_count: i64,
    /// Character limit for this billing period.
    pub character_limit: i64,
}

impl Usage {
    pub fn percent_used(&self) -> f64 {
        if self.character_limit == 0 {
            return 0.0;
        }
        self.character_count as f64 / self.character_limit as f64 * 100.0
    }
}

/// Options resolved from CLI flags and the environment.
#[derive(Debug, Default, Clone)]
pub struct ProviderOptions {
    /// Explicit API key; falls back to the provider's env variable.
    pub api_key: Option<String>,
}

type Factory = fn(&ProviderOptions) -> Result<Box<dyn Provider>>;

/// Registry of provider constructors, keyed by variant name.
const REGISTRY: &[(&str, Factory)] = &[
    ("deepl", new_deepl),
    ("claude", new_claude),
    ("claude-cli", new_claude_cli),
];

/// Registered provider names.
pub fn provider_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Construct a provider by name.
pub fn create(name: &str, opts: &ProviderOptions) -> Result<Box<dyn Provider>> {
    match REGISTRY.iter().find(|(n, _)| *n == name) {
        Some((_, factory)) => factory(opts),
        None => bail!(
            "unsupported provider: {name} (available: {})",
            provider_names().join(", ")
        ),
    }
}

fn new_deepl(opts: &ProviderOptions) -> Result<Box<dyn Provider>> {
    let key = resolve_key(opts, "DEEPL_API_KEY")?;
    Ok(Box::new(deepl::DeepL::new(key)?))
}

fn new_claude(opts: &ProviderOptions) -> Result<Box<dyn Provider>> {
    let key = resolve_key(opts, "CLAUDE_API_KEY")?;
    Ok(Box::new(claude::Claude::new(key)?))
}

fn new_claude_cli(_opts: &ProviderOptions) -> Result<Box<dyn Provider>> {
    // Uses the logged-in CLI session, no API key needed
    Ok(Box::new(claude_cli::ClaudeCli::new()?))
}

fn resolve_key(opts: &ProviderOptions, env_var: &str) -> Result<String> {
    if let Some(key) = &opts.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }
    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => bail!("{env_var} environment variable not set"),
    }
}

// ============================================================================
// Language Names
// ============================================================================

/// Language display names used in model prompts.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("de", "German"),
    ("fr", "French"),
    ("es", "Spanish"),
    ("it", "Italian"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("zh", "Chinese (Simplified)"),
    ("ko", "Korean"),
    ("vi", "Vietnamese"),
    ("id", "Indonesian"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("fi", "Finnish"),
    ("el", "Greek"),
    ("hu", "Hungarian"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("nb", "Norwegian (Bokmal)"),
    ("ro", "Romanian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sv", "Swedish"),
    ("bg", "Bulgarian"),
    ("et", "Estonian"),
    ("ar", "Arabic"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("th", "Thai"),
];

/// Display name for a language code, falling back to the code itself.
pub fn language_name(code: &str) -> &str {
    let lower = code.to_ascii_lowercase();
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == lower)
        .map_or(code, |(_, name)| name)
}

/// Codes with a known display name.
pub fn known_language_codes() -> Vec<String> {
    LANGUAGE_NAMES.iter().map(|(c, _)| c.to_string()).collect()
}

/// Whether a code has a known display name.
pub fn is_known_language(code: &str) -> bool {
    let lower = code.to_ascii_lowercase();
    LANGUAGE_NAMES.iter().any(|(c, _)| *c == lower)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::Cell;

    /// Scripted provider for tests; no network involved.
    #[derive(Debug)]
    pub struct FakeProvider {
        prefix: Option<String>,
        fixed: Option<String>,
        fail_after_batches: Option<usize>,
        batch_calls: Cell<usize>,
    }

    impl FakeProvider {
        /// Prefixes every translation with a marker.
        pub fn prefixing(prefix: &str) -> Self {
            Self {
                prefix: Some(prefix.to_string()),
                fixed: None,
                fail_after_batches: None,
                batch_calls: Cell::new(0),
            }
        }

        /// Returns a fixed string for every translation.
        pub fn replacing_with(text: &str) -> Self {
            Self {
                prefix: None,
                fixed: Some(text.to_string()),
                fail_after_batches: None,
                batch_calls: Cell::new(0),
            }
        }

        /// Prefixes translations, but errors once `n` batches completed.
        pub fn failing_after_batches(prefix: &str, n: usize) -> Self {
            Self {
                prefix: Some(prefix.to_string()),
                fixed: None,
                fail_after_batches: Some(n),
                batch_calls: Cell::new(0),
            }
        }

        fn render(&self, text: &str) -> String {
            match (&self.fixed, &self.prefix) {
                (Some(fixed), _) => fixed.clone(),
                (None, Some(prefix)) => format!("{prefix}{text}"),
                (None, None) => text.to_string(),
            }
        }
    }

    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
            Ok(self.render(text))
        }

        fn translate_batch(
            &self,
            texts: &[String],
            _source: &str,
            _target: &str,
        ) -> Result<Vec<String>> {
            let calls = self.batch_calls.get();
            self.batch_calls.set(calls + 1);
            if let Some(limit) = self.fail_after_batches {
                if calls >= limit {
                    bail!("quota exceeded");
                }
            }
            Ok(texts.iter().map(|t| self.render(t)).collect())
        }

        fn supported_languages(&self) -> Vec<String> {
            known_language_codes()
        }

        fn supports_language(&self, code: &str) -> bool {
            is_known_language(code)
        }
    }

    #[test]
    fn test_create_unknown_provider() {
        let err = create("babelfish", &ProviderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported provider"));
        assert!(err.to_string().contains("deepl"));
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(provider_names(), vec!["deepl", "claude", "claude-cli"]);
    }

    #[test]
    fn test_language_name_lookup() {
        assert_eq!(language_name("de"), "German");
        assert_eq!(language_name("DE"), "German");
        assert_eq!(language_name("xx"), "xx");
    }

    #[test]
    fn test_usage_percent() {
        let usage = Usage {
            character_count: 250_000,
            character_limit: 500_000,
        };
        assert_eq!(usage.percent_used(), 50.0);

        let zero = Usage {
            character_count: 0,
            character_limit: 0,
        };
        assert_eq!(zero.percent_used(), 0.0);
    }

    #[test]
    fn test_resolve_key_prefers_explicit() {
        let opts = ProviderOptions {
            api_key: Some("abc123".into()),
        };
        assert_eq!(
            resolve_key(&opts, "SITEKIT_TEST_UNSET_KEY").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_resolve_key_missing() {
        let err = resolve_key(&ProviderOptions::default(), "SITEKIT_TEST_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("SITEKIT_TEST_UNSET_KEY"));
    }
}
