//! Translation workflow CLI for multilingual site content.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sitekit::translate::checker::Checker;
use sitekit::translate::config::{self, TranslateConfig};
use sitekit::util::{cancel, format};
use std::io::{BufRead, Write, stdin, stdout};
use std::process::ExitCode;

/// Track source changes and translation problems
#[derive(Parser, Debug)]
#[command(name = "translate", version, about, arg_required_else_help = true)]
struct Cli {
    /// Output markdown for a GitHub issue (exit 1 if action needed)
    #[arg(long)]
    github_issue: bool,

    /// Skip confirmation prompts (for CI)
    #[arg(long)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Track source changes and find translation problems
    Content {
        #[command(subcommand)]
        op: ContentOp,
    },

    /// Inspect and validate language configuration
    Lang {
        #[command(subcommand)]
        op: LangOp,
    },
}

#[derive(Subcommand, Debug)]
enum ContentOp {
    /// Show what source files changed since last translation
    Status,
    /// Show diff for a specific file since the checkpoint
    Diff { path: String },
    /// Show detailed changes for all files
    Changed,
    /// Show next file to translate with progress
    Next,
    /// Mark translations complete (move the checkpoint)
    Done,
    /// Show files missing in target languages
    Missing,
    /// Show potentially outdated translations (target < 50% of source)
    Stale,
    /// Show target files with no source counterpart
    Orphans,
    /// Delete orphaned files (prompts unless --force)
    Clean,
}

#[derive(Subcommand, Debug)]
enum LangOp {
    /// Check translator config matches the site config
    Validate,
    /// Show configured languages and detect stray directories
    Langs,
}

fn main() -> ExitCode {
    cancel::install();
    let cli = Cli::parse();
    let checker = Checker::new(TranslateConfig::load());

    let result = match &cli.command {
        Commands::Content { op } => run_content(&cli, &checker, op),
        Commands::Lang { op } => run_lang(&checker, op),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_content(cli: &Cli, checker: &Checker, op: &ContentOp) -> Result<ExitCode> {
    match op {
        ContentOp::Status => run_status(checker, cli.github_issue),
        ContentOp::Diff { path } => run_diff(checker, path),
        ContentOp::Changed => run_changed(checker),
        ContentOp::Next => run_next(checker),
        ContentOp::Done => {
            checker.done()?;
            println!("OK: Translation checkpoint updated to current commit");
            Ok(ExitCode::SUCCESS)
        }
        ContentOp::Missing => run_missing(checker, cli.github_issue),
        ContentOp::Stale => run_stale(checker, cli.github_issue),
        ContentOp::Orphans => run_orphans(checker, cli.github_issue),
        ContentOp::Clean => run_clean(checker, cli.force),
    }
}

fn run_lang(checker: &Checker, op: &LangOp) -> Result<ExitCode> {
    match op {
        LangOp::Validate => run_validate(checker),
        LangOp::Langs => run_langs(checker),
    }
}

fn banner(title: &str) {
    println!("========================================");
    println!("{title}");
    println!("========================================");
    println!();
}

fn footer(message: &str) {
    println!("========================================");
    println!("{message}");
    println!("========================================");
}

fn run_status(checker: &Checker, github_issue: bool) -> Result<ExitCode> {
    let report = checker.status()?;

    if github_issue {
        if !report.has_changes() {
            return Ok(ExitCode::SUCCESS);
        }
        println!("## Translation Status\n");
        for (title, files) in [
            ("New (untracked) files", &report.new_files),
            ("Uncommitted changes", &report.uncommitted),
            ("Committed since last translation", &report.committed),
        ] {
            if !files.is_empty() {
                println!("### {title}");
                for f in files {
                    println!("- `{f}`");
                }
                println!();
            }
        }
        return Ok(ExitCode::FAILURE);
    }

    banner("Translation Status");
    for (title, files) in [
        ("New (untracked) files", &report.new_files),
        ("Uncommitted changes (modified)", &report.uncommitted),
        ("Committed since last translation", &report.committed),
    ] {
        println!("=== {title} ===");
        if files.is_empty() {
            if title.starts_with("Committed") && !report.checkpoint_exists {
                println!("(No checkpoint tag yet - run 'translate content done' to set baseline)");
            } else {
                println!("(none)");
            }
        } else {
            for f in files {
                println!("{f}");
            }
        }
        println!();
    }
    footer("After translating: translate content done");
    Ok(ExitCode::SUCCESS)
}

fn run_diff(checker: &Checker, path: &str) -> Result<ExitCode> {
    let diff = checker.diff(path)?;

    banner(&format!("Diff for: {}", diff.rel_path));

    if diff.is_new {
        println!("STATUS: NEW FILE (did not exist at last translation checkpoint)");
    } else if diff.committed.is_empty() && diff.uncommitted.is_empty() && diff.staged.is_empty() {
        println!("STATUS: NO CHANGES since last translation");
    } else {
        if !diff.committed.is_empty() {
            println!("STATUS: MODIFIED since last translation (committed)");
            println!();
            println!("----------------------------------------");
            print!("{}", diff.committed);
            println!("----------------------------------------");
        }
        if !diff.uncommitted.is_empty() || !diff.staged.is_empty() {
            println!("STATUS: UNCOMMITTED CHANGES (not yet committed)");
            println!();
            println!("----------------------------------------");
            print!("{}{}", diff.staged, diff.uncommitted);
            println!("----------------------------------------");
        }
    }

    println!();
    println!("========================================");
    Ok(ExitCode::SUCCESS)
}

fn run_changed(checker: &Checker) -> Result<ExitCode> {
    let changes = checker.changed()?;

    banner("Detailed Changes Since Last Translation");

    if changes.is_empty() {
        println!("No source files changed since last translation.");
        println!("========================================");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Found {} changed file(s):", changes.len());
    println!();
    for (rel, stat, preview) in changes {
        println!("--- {rel} ---");
        if !stat.is_empty() {
            println!("  {stat}");
        }
        if !preview.is_empty() {
            println!("  Preview:");
            for line in preview.iter().take(10) {
                println!("    {line}");
            }
            if preview.len() > 10 {
                println!("    ... and {} more lines", preview.len() - 10);
            }
        }
        println!();
    }
    footer("To see full diff for a file: translate content diff <path>");
    Ok(ExitCode::SUCCESS)
}

fn run_missing(checker: &Checker, github_issue: bool) -> Result<ExitCode> {
    let report = checker.missing();

    if github_issue {
        if report.total == 0 {
            return Ok(ExitCode::SUCCESS);
        }
        println!("## Missing Translations\n");
        for (lang, files) in &report.by_lang {
            if !files.is_empty() {
                println!("### {} ({} files)", lang.name, files.len());
                for f in files {
                    println!("- `{f}`");
                }
                println!();
            }
        }
        return Ok(ExitCode::FAILURE);
    }

    banner("Missing Content Files by Language");
    for (lang, files) in &report.by_lang {
        if files.is_empty() {
            println!("OK: {}: Complete", lang.name);
        } else {
            println!("MISSING: {}: Missing {} files", lang.name, files.len());
            for f in files {
                println!("  - {f}");
            }
            println!();
        }
    }
    println!("========================================");
    Ok(ExitCode::SUCCESS)
}

fn run_stale(checker: &Checker, github_issue: bool) -> Result<ExitCode> {
    let stale = checker.stale();

    if github_issue {
        if stale.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
        println!("## Potentially Stale Translations\n");
        println!("These files are less than 50% the size of the source:\n");
        for entry in &stale {
            println!(
                "- `{}` (source: {} bytes, target: {} bytes)",
                entry.path.display(),
                entry.source_bytes,
                entry.target_bytes
            );
        }
        return Ok(ExitCode::FAILURE);
    }

    banner("Potentially Stale Translations");
    if stale.is_empty() {
        println!("OK: No stale translations found");
    } else {
        for entry in &stale {
            println!(
                "STALE: {} (source: {} bytes, target: {} bytes)",
                entry.path.display(),
                entry.source_bytes,
                entry.target_bytes
            );
        }
        println!();
        println!("Found {} potentially stale files", stale.len());
        println!("Review and re-translate if needed");
    }
    println!("========================================");
    Ok(ExitCode::SUCCESS)
}

fn run_orphans(checker: &Checker, github_issue: bool) -> Result<ExitCode> {
    let report = checker.orphans();

    if github_issue {
        if report.total == 0 {
            return Ok(ExitCode::SUCCESS);
        }
        println!("## Orphaned Translation Files\n");
        println!("These files exist in target languages but not in the source:\n");
        for (lang, files) in &report.by_lang {
            if !files.is_empty() {
                println!("### {}", lang.name);
                for f in files {
                    println!("- `{}`", f.display());
                }
                println!();
            }
        }
        return Ok(ExitCode::FAILURE);
    }

    banner("Orphaned Files (exist in target but not in source)");
    for (lang, files) in &report.by_lang {
        if files.is_empty() {
            println!("OK: {}: No orphans", lang.name);
        } else {
            println!(
                "ORPHANS: {}: {} orphaned files (DELETE THESE)",
                lang.name,
                files.len()
            );
            for f in files {
                println!("  - {}", f.display());
            }
            println!();
        }
    }
    println!("========================================");
    if report.total > 0 {
        println!("Run 'translate content clean' to delete all orphaned files");
        println!("========================================");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_clean(checker: &Checker, force: bool) -> Result<ExitCode> {
    let report = checker.orphans();
    if report.total == 0 {
        println!("OK: No orphaned files to delete");
        return Ok(ExitCode::SUCCESS);
    }

    for (lang, files) in &report.by_lang {
        for f in files {
            println!("{} ({})", f.display(), lang.name);
        }
    }

    if !force {
        print!("\nDelete these {} files? [y/N]: ", report.total);
        stdout().flush().ok();
        let mut response = String::new();
        stdin().lock().read_line(&mut response).ok();
        if !matches!(response.trim(), "y" | "Y") {
            println!("Cancelled");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let deleted = checker.clean()?;
    println!("\nOK: Deleted {} orphaned files", deleted.len());
    Ok(ExitCode::SUCCESS)
}

fn run_next(checker: &Checker) -> Result<ExitCode> {
    let report = checker.next();

    if report.total_missing == 0 {
        banner("All files translated!");
        return Ok(ExitCode::SUCCESS);
    }

    let completed = report.total_possible - report.total_missing;
    println!("========================================");
    println!(
        "Progress: {}/{} translations complete ({} remaining)",
        format::format_count(completed as i64),
        format::format_count(report.total_possible as i64),
        report.total_missing
    );
    println!();
    if let Some(file) = &report.next_file {
        println!("Next file to translate:");
        println!("  {file}");
        println!();
        println!("Missing in: {}", report.missing_in.join(" "));
    }
    println!("========================================");
    Ok(ExitCode::SUCCESS)
}

fn run_validate(checker: &Checker) -> Result<ExitCode> {
    let config = &checker.config;
    banner("Validating Translator Configuration");

    if !config::is_site_project() {
        println!("Mode: Standalone (no site language config found)");
        println!();
        println!("Current configuration:");
        println!(
            "  Source: {} -> content/{}",
            config.source_lang, config.source_dir
        );
        for lang in &config.target_langs {
            println!(
                "  Target: {} ({}) -> content/{}",
                lang.code, lang.name, lang.dir_name
            );
        }
        println!();
        footer("OK: Using default configuration");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Mode: site project detected");
    println!();
    println!(
        "Source: {} -> content/{}",
        config.source_lang, config.source_dir
    );
    for lang in &config.target_langs {
        println!(
            "Target: {} ({}) -> content/{}",
            lang.code, lang.name, lang.dir_name
        );
    }
    println!();

    let mismatches = config::validate_against_site(config);
    if !mismatches.is_empty() {
        println!("========================================");
        println!("WARNING: {} mismatch(es) found", mismatches.len());
        println!("========================================");
        for m in &mismatches {
            println!("  - {m}");
        }
        println!();
        println!("Languages are auto-loaded from the site config.");
        println!("Check if {} changed after the binary was built.", config::LANGUAGES_FILE);
        return Ok(ExitCode::FAILURE);
    }

    footer("OK: Configuration loaded from site config");
    Ok(ExitCode::SUCCESS)
}

fn run_langs(checker: &Checker) -> Result<ExitCode> {
    let config = &checker.config;
    banner("Language Configuration");

    println!(
        "SOURCE: {} -> content/{}/",
        config.source_lang, config.source_dir
    );
    println!();
    println!("TARGETS:");
    for lang in &config.target_langs {
        let exists = std::path::Path::new(&config.lang_path(lang)).exists();
        let marker = if exists { "ok" } else { "missing directory" };
        println!(
            "  {} ({}) -> content/{}/ [{marker}]",
            lang.code, lang.name, lang.dir_name
        );
    }
    println!();

    let strays = checker.stray_dirs();
    if strays.is_empty() {
        footer("OK: All content directories are configured");
        return Ok(ExitCode::SUCCESS);
    }

    println!("WARNING: Stray directories (not in config):");
    for (dir, count) in &strays {
        println!("  content/{dir}/ ({count} .md files)");
    }
    println!();
    println!("These directories may be from a removed language.");
    println!("If they should be deleted, remove them manually:");
    for (dir, _) in &strays {
        println!("  rm -rf content/{dir}/");
    }
    println!();
    footer("ACTION NEEDED: Stray directories found");
    Ok(ExitCode::FAILURE)
}
