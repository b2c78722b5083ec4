//! Machine-translation CLI: Markdown files and ARB catalogs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sitekit::translate::arb::{self, ArbFile, ArbTranslator};
use sitekit::translate::config::TranslateConfig;
use sitekit::translate::markdown::MarkdownTranslator;
use sitekit::translate::provider::{self, Provider, ProviderOptions, claude_cli::ClaudeCli};
use sitekit::util::{cancel, format};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};
use walkdir::WalkDir;

/// Automatic translation via an external provider
#[derive(Parser, Debug)]
#[command(name = "autotranslate", version, about, arg_required_else_help = true)]
struct Cli {
    /// Translation provider
    #[arg(long, default_value = "deepl")]
    provider: String,

    /// Show what would be translated without translating
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(long, short)]
    verbose: bool,

    /// API key (or use DEEPL_API_KEY/CLAUDE_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Path to the message bundle directory for ARB translation
    #[arg(long, default_value = "tokibundle")]
    bundle: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a single file
    File { source: PathBuf, lang: String },
    /// Translate all missing files for a language
    Missing { lang: String },
    /// Translate empty ARB catalog entries for a language
    Arb { lang: String },
    /// Show ARB translation status
    ArbStatus,
    /// List supported languages
    Languages,
    /// Show provider status and usage
    Status,
}

fn main() -> ExitCode {
    cancel::install();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::File { source, lang } => run_file(&cli, source, lang),
        Commands::Missing { lang } => run_missing(&cli, lang),
        Commands::Arb { lang } => run_arb(&cli, lang),
        Commands::ArbStatus => run_arb_status(&cli),
        Commands::Languages => run_languages(&cli),
        Commands::Status => run_status(&cli),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn get_provider(cli: &Cli) -> Result<Box<dyn Provider>> {
    let opts = ProviderOptions {
        api_key: cli.api_key.clone(),
    };
    provider::create(&cli.provider, &opts)
}

fn print_usage_line(provider: &dyn Provider, label: &str) {
    if let Some(Ok(usage)) = provider.usage() {
        println!(
            "API Usage {label}: {} / {} characters ({:.1}%)",
            format::format_count(usage.character_count),
            format::format_count(usage.character_limit),
            usage.percent_used()
        );
    }
}

// ============================================================================
// File Translation
// ============================================================================

fn run_file(cli: &Cli, source: &Path, lang: &str) -> Result<ExitCode> {
    let config = TranslateConfig::load();
    let content =
        fs::read_to_string(source).with_context(|| format!("reading {}", source.display()))?;
    let target_path = source_to_target_path(&config, source, lang);

    if cli.dry_run {
        println!("Would translate:");
        println!("  Source: {}", source.display());
        println!("  Target: {}", target_path.display());
        println!("  Lang:   {} -> {lang}", config.source_lang);
        println!("  Chars:  {}", content.len());
        return Ok(ExitCode::SUCCESS);
    }

    let provider = get_provider(cli)?;
    if !provider.supports_language(lang) {
        bail!("language '{lang}' not supported by {}", provider.name());
    }

    let mt = MarkdownTranslator::new(provider.as_ref());
    let translated = mt.translate_file(&content, &config.source_lang, lang)?;

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target_path, translated)
        .with_context(|| format!("writing {}", target_path.display()))?;

    println!("Translated: {} -> {}", source.display(), target_path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_missing(cli: &Cli, lang: &str) -> Result<ExitCode> {
    let config = TranslateConfig::load();
    let Some(target) = config.target(lang) else {
        let available: Vec<&str> = config.target_langs.iter().map(|l| l.code.as_str()).collect();
        bail!(
            "language '{lang}' not configured (available: {})",
            available.join(", ")
        );
    };
    let target_dir = PathBuf::from(config.lang_path(target));
    let source_dir = PathBuf::from(config.source_path());

    // Source files whose translation is absent
    let mut missing: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut total_chars = 0usize;
    for entry in WalkDir::new(&source_dir).into_iter().flatten() {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "md") {
            continue;
        }
        let rel = path.strip_prefix(&source_dir)?.to_path_buf();
        let target_path = target_dir.join(&rel);
        if !target_path.exists() {
            total_chars += fs::metadata(path).map(|m| m.len() as usize).unwrap_or(0);
            missing.push((path.to_path_buf(), target_path));
        }
    }
    missing.sort();

    if missing.is_empty() {
        println!("All files already translated to {lang}");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Found {} files missing translation to {lang}", missing.len());
    println!(
        "Total characters: ~{}\n",
        format::format_count(total_chars as i64)
    );

    if cli.dry_run {
        println!("Files to translate:");
        for (source, _) in &missing {
            let size = fs::metadata(source).map(|m| m.len()).unwrap_or(0);
            println!(
                "  {} ({} chars)",
                source.display(),
                format::format_count(size as i64)
            );
        }
        println!("\n(Actual usage may be lower - front matter and code blocks are not translated)");
        return Ok(ExitCode::SUCCESS);
    }

    let provider = get_provider(cli)?;
    if !provider.supports_language(lang) {
        bail!("language '{lang}' not supported by {}", provider.name());
    }
    print_usage_line(provider.as_ref(), "before");

    let mt = MarkdownTranslator::new(provider.as_ref());
    let total = missing.len();
    let mut success = 0;
    let mut errors = 0;

    for (i, (source, target_path)) in missing.iter().enumerate() {
        cancel::check()?;

        let rel = source.strip_prefix(&source_dir).unwrap_or(source);
        if cli.verbose {
            println!("[{}/{total}] Translating {}...", i + 1, rel.display());
        }

        let outcome = fs::read_to_string(source)
            .map_err(anyhow::Error::from)
            .and_then(|content| mt.translate_file(&content, &config.source_lang, lang))
            .and_then(|translated| {
                if let Some(parent) = target_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(target_path, translated)?;
                Ok(())
            });

        match outcome {
            Ok(()) => {
                success += 1;
                println!("ok [{}/{total}] {}", i + 1, rel.display());
            }
            Err(err) => {
                errors += 1;
                eprintln!("failed [{}/{total}] {}: {err:#}", i + 1, rel.display());
            }
        }
    }

    println!("\nComplete: {success} translated, {errors} errors");
    print_usage_line(provider.as_ref(), "after");

    Ok(ExitCode::SUCCESS)
}

/// Map a source content path to its target-language counterpart.
fn source_to_target_path(config: &TranslateConfig, source: &Path, lang: &str) -> PathBuf {
    let target_dir = config
        .target(lang)
        .map_or_else(|| lang.to_string(), |l| l.dir_name.clone());

    let source_root = PathBuf::from(config.source_path());
    if let Ok(rel) = source.strip_prefix(&source_root) {
        return PathBuf::from(&config.content_dir).join(target_dir).join(rel);
    }

    // Fallback: swap the source dir segment
    PathBuf::from(
        source
            .to_string_lossy()
            .replacen(&format!("/{}/", config.source_dir), &format!("/{target_dir}/"), 1),
    )
}

// ============================================================================
// ARB Translation
// ============================================================================

/// Catalog path inside the bundle, preferring the `catalog_` prefix.
fn arb_path(bundle: &Path, lang: &str) -> PathBuf {
    let prefixed = bundle.join(format!("catalog_{lang}.arb"));
    if prefixed.exists() {
        return prefixed;
    }
    let bare = bundle.join(format!("{lang}.arb"));
    if bare.exists() { bare } else { prefixed }
}

fn run_arb(cli: &Cli, lang: &str) -> Result<ExitCode> {
    if !cli.bundle.exists() {
        bail!(
            "bundle directory not found at {} (generate the ARB catalogs first)",
            cli.bundle.display()
        );
    }

    let source_path = arb_path(&cli.bundle, "en");
    let source = arb::load_arb(&source_path).context("loading source ARB")?;

    let target_path = arb_path(&cli.bundle, lang);
    let mut target = if target_path.exists() {
        arb::load_arb(&target_path).context("loading target ARB")?
    } else {
        ArbFile {
            locale: lang.to_string(),
            custom_attributes: source.custom_attributes.clone(),
            ..Default::default()
        }
    };
    arb::merge_source_ids(&source, &mut target);

    let source_stats = arb::arb_stats(&source);
    let target_stats = arb::arb_stats(&target);

    println!("ARB Translation: en -> {lang}");
    println!("Source (en):  {} messages", source_stats.total);
    println!(
        "Target ({lang}): {} translated, {} empty ({:.1}% complete)",
        target_stats.translated,
        target_stats.empty,
        target_stats.completeness()
    );

    if target_stats.empty == 0 {
        println!("\nAll messages already translated!");
        return Ok(ExitCode::SUCCESS);
    }

    if cli.dry_run {
        println!("\n[dry-run] Would translate {} messages", target_stats.empty);
        return Ok(ExitCode::SUCCESS);
    }

    let provider = get_provider(cli)?;
    if !provider.supports_language(lang) {
        bail!("language '{lang}' not supported by {}", provider.name());
    }

    println!(
        "\nTranslating {} messages using {}...\n",
        target_stats.empty,
        provider.name()
    );

    let verbose = cli.verbose;
    let translator = ArbTranslator::new(provider.as_ref());
    let outcome = translator.translate_arb(&source, &mut target, lang, |done, total| {
        if verbose {
            println!("  Translated {done}/{total} entries");
        } else {
            print!(
                "\r  Progress: {done}/{total} messages ({:.0}%)",
                done as f64 / total as f64 * 100.0
            );
            std::io::stdout().flush().ok();
        }
    });

    match outcome {
        Ok(translated) => {
            println!("\n");
            arb::save_arb(&target_path, &target).context("saving ARB")?;

            let final_stats = arb::arb_stats(&target);
            println!("Translated {translated} messages");
            println!("Saved to {}", target_path.display());
            println!(
                "  Completeness: {:.1}% ({}/{})",
                final_stats.completeness(),
                final_stats.translated,
                final_stats.total
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("\nError during translation: {err:#}");
            // Keep whatever the finished batches produced
            let partial = arb::arb_stats(&target).translated - target_stats.translated;
            if partial > 0 {
                println!("Saving {partial} translated messages...");
                arb::save_arb(&target_path, &target).context("saving partial ARB")?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_arb_status(cli: &Cli) -> Result<ExitCode> {
    if !cli.bundle.exists() {
        bail!(
            "bundle directory not found at {} (generate the ARB catalogs first)",
            cli.bundle.display()
        );
    }

    println!("========================================");
    println!("ARB Translation Status");
    println!("Bundle: {}", cli.bundle.display());
    println!("========================================");
    println!();

    let mut statuses: Vec<(String, arb::ArbStats)> = Vec::new();
    let mut found_source = false;

    let mut entries: Vec<_> = fs::read_dir(&cli.bundle)
        .with_context(|| format!("reading {}", cli.bundle.display()))?
        .flatten()
        .collect();
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = name.strip_suffix(".arb") else {
            continue;
        };
        let code = stem.strip_prefix("catalog_").unwrap_or(stem).to_string();

        match arb::load_arb(&entry.path()) {
            Ok(arb) => {
                if code == "en" {
                    found_source = true;
                }
                statuses.push((code, arb::arb_stats(&arb)));
            }
            Err(err) => eprintln!("Warning: could not load {name}: {err:#}"),
        }
    }

    if !found_source {
        bail!("no catalog_en.arb or en.arb found in bundle");
    }

    println!(
        "{:<10} {:>8} {:>8} {:>8} {:>12}",
        "Language", "Total", "Done", "Empty", "Complete"
    );
    println!(
        "{:<10} {:>8} {:>8} {:>8} {:>12}",
        "--------", "-----", "----", "-----", "--------"
    );
    for (code, stats) in &statuses {
        let bar = if stats.completeness() == 100.0 {
            "Complete".to_string()
        } else if stats.translated == 0 {
            "Not started".to_string()
        } else {
            format!("{:.0}%", stats.completeness())
        };
        println!(
            "{code:<10} {:>8} {:>8} {:>8} {bar:>12}",
            stats.total, stats.translated, stats.empty
        );
    }

    println!();
    println!("Commands:");
    println!("  autotranslate arb <lang>   Translate empty entries for language");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Provider Info
// ============================================================================

fn run_languages(cli: &Cli) -> Result<ExitCode> {
    match get_provider(cli) {
        Ok(provider) => {
            println!("Supported languages ({}):", provider.name());
            let mut langs = provider.supported_languages();
            langs.sort();
            for lang in langs {
                println!("  {lang}");
            }
        }
        Err(_) => {
            // No credentials: list the known set anyway
            println!("Supported languages:");
            let mut langs = provider::known_language_codes();
            langs.sort();
            for lang in langs {
                println!("  {lang}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_status(cli: &Cli) -> Result<ExitCode> {
    println!("========================================");
    println!("Translation Provider Status");
    println!("========================================");
    println!();

    let deepl_key = std::env::var("DEEPL_API_KEY").unwrap_or_default();
    println!("--- DeepL ---");
    if deepl_key.is_empty() {
        println!("Status: Not configured");
        println!("Set DEEPL_API_KEY for 500k free chars/month");
    } else {
        println!("Status: Configured");
        if deepl_key.ends_with(":fx") {
            println!("Plan: Free (500k chars/month)");
        } else {
            println!("Plan: Pro");
        }
        println!("API Key: {}", mask_key(&deepl_key));
        if let Ok(provider) = provider::deepl::DeepL::new(deepl_key) {
            print_usage_line(&provider, "");
        }
    }
    println!();

    let claude_key = std::env::var("CLAUDE_API_KEY").unwrap_or_default();
    println!("--- Claude (API) ---");
    if claude_key.is_empty() {
        println!("Status: Not configured");
        println!("Set CLAUDE_API_KEY for API-based translation");
    } else {
        println!("Status: Configured");
        println!("Plan: Requires API credits");
        println!("API Key: {}", mask_key(&claude_key));
    }
    println!();

    println!("--- Claude (CLI) ---");
    if ClaudeCli::available() {
        println!("Status: Available");
        println!("Plan: Uses logged-in session");
    } else {
        println!("Status: Not available");
        println!("Install: bun add -g @anthropic-ai/claude-code");
    }
    println!();

    println!("========================================");
    println!("Current provider: {}", cli.provider);
    println!("Use --provider={}", provider::provider_names().join("|"));
    println!("========================================");
    Ok(ExitCode::SUCCESS)
}

/// Shorten a key to its first and last characters.
fn mask_key(key: &str) -> String {
    if key.len() > 12 {
        format!("{}...{}", &key[..8], &key[key.len() - 4..])
    } else {
        "(set)".to_string()
    }
}
