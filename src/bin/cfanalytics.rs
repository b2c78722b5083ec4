//! Cloudflare Web Analytics change detector CLI.

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::Parser;
use sitekit::analytics::cloudflare::{self, STATE_FILE};
use sitekit::analytics::report;
use sitekit::util::cancel;
use std::{path::Path, process::ExitCode};

/// Fetch web analytics and report significant changes
#[derive(Parser, Debug)]
#[command(name = "cfanalytics", version, about)]
struct Cli {
    /// Webhook URL to post changes to (Slack/Discord)
    #[arg(long)]
    webhook: Option<String>,

    /// Number of days to analyze
    #[arg(long, default_value_t = 7)]
    days: i64,

    /// Output markdown for a GitHub issue (exits 1 if changes detected)
    #[arg(long)]
    github_issue: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    cancel::install();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let token = std::env::var("CLOUDFLARE_API_TOKEN").unwrap_or_default();
    if token.is_empty() {
        bail!(
            "CLOUDFLARE_API_TOKEN environment variable not set\n\n\
             Create a token at: https://dash.cloudflare.com/profile/api-tokens\n\
             Required permissions: Account Analytics:Read"
        );
    }

    // Window ends at the current UTC midnight
    let until = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    let since = until - Duration::days(cli.days);

    if cli.verbose {
        println!(
            "Fetching analytics for {} to {}...",
            since.format("%Y-%m-%d"),
            until.format("%Y-%m-%d")
        );
    }

    let mut current =
        cloudflare::fetch_analytics(&token, since, until).context("fetching analytics")?;
    current.period = format!("{} to {}", since.format("%b %-d"), until.format("%b %-d"));

    let state_path = Path::new(STATE_FILE);
    let previous = cloudflare::load_state(state_path);
    if previous.is_none() && cli.verbose {
        println!("No previous state found (first run)");
    }

    let rep = report::generate_report(&current, previous.as_ref());

    if cli.github_issue {
        println!("{}", report::markdown_report(&current, previous.as_ref(), &rep));
        save_state(state_path, &current);
        return Ok(if rep.has_changes {
            ExitCode::FAILURE // Signal the workflow to open an issue
        } else {
            ExitCode::SUCCESS
        });
    }

    println!("{}", rep.summary);
    if !rep.changes.is_empty() {
        println!("\nSignificant Changes:");
        for change in &rep.changes {
            println!("  {change}");
        }
    }

    save_state(state_path, &current);

    if let Some(webhook) = &cli.webhook {
        if !rep.changes.is_empty() {
            match report::post_webhook(webhook, &rep) {
                Ok(()) => {
                    if cli.verbose {
                        println!("Posted to webhook");
                    }
                }
                Err(err) => eprintln!("Warning: failed to post to webhook: {err:#}"),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn save_state(path: &Path, snapshot: &cloudflare::Snapshot) {
    if let Err(err) = cloudflare::save_state(path, snapshot) {
        eprintln!("Warning: failed to save state: {err:#}");
    }
}
