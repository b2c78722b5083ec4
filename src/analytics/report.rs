//! Report generation and delivery.

use crate::analytics::cloudflare::{Snapshot, top_n};
use crate::util::http;
use anyhow::{Context, Result, bail};
use serde_json::json;
use std::fmt::Write;

/// Relative change at which a metric difference is significant.
pub const CHANGE_THRESHOLD: f64 = 0.20;

/// Comparison outcome for one run.
#[derive(Debug, Default)]
pub struct Report {
    pub summary: String,
    pub changes: Vec<String>,
    pub has_changes: bool,
}

/// Relative change in percent.
///
/// A zero prior counts as +100% when the current value is positive and
/// 0% when it is zero.
pub fn percent_change(old: i64, new: i64) -> f64 {
    if old == 0 {
        return if new > 0 { 100.0 } else { 0.0 };
    }
    (new - old) as f64 / old as f64 * 100.0
}

/// Build the report comparing the current window with the prior snapshot.
pub fn generate_report(current: &Snapshot, previous: Option<&Snapshot>) -> Report {
    let mut report = Report::default();

    let mut summary = String::new();
    let _ = writeln!(summary, "Analytics Report ({})", current.period);
    let _ = writeln!(summary, "{}", "=".repeat(40));
    let _ = writeln!(summary, "Visits:     {}", current.visits);
    let _ = writeln!(summary, "Page Views: {}", current.pageviews);

    if !current.top_pages.is_empty() {
        let _ = writeln!(summary, "\nTop Pages:");
        for (page, count) in top_n(&current.top_pages, 5) {
            let _ = writeln!(summary, "  {page}: {count}");
        }
    }
    if !current.countries.is_empty() {
        let _ = writeln!(summary, "\nTop Countries:");
        for (country, count) in top_n(&current.countries, 5) {
            let _ = writeln!(summary, "  {country}: {count}");
        }
    }
    report.summary = summary;

    if let Some(previous) = previous {
        check_metric(
            &mut report,
            "Visits",
            previous.visits,
            current.visits,
        );
        check_metric(
            &mut report,
            "Page views",
            previous.pageviews,
            current.pageviews,
        );
    }

    report
}

/// Record a metric as significant when its swing is at or above the
/// threshold.
fn check_metric(report: &mut Report, label: &str, old: i64, new: i64) {
    let change = percent_change(old, new);
    if change.abs() >= CHANGE_THRESHOLD * 100.0 {
        let direction = if change < 0.0 { "decreased" } else { "increased" };
        report.changes.push(format!(
            "{label} {direction} {:.0}% ({old} -> {new})",
            change.abs()
        ));
        report.has_changes = true;
    }
}

/// Markdown variant suitable for posting as an issue.
pub fn markdown_report(current: &Snapshot, previous: Option<&Snapshot>, report: &Report) -> String {
    let mut md = String::new();

    md.push_str("## Analytics Change Detected\n\n");
    let _ = writeln!(md, "**Period:** {}\n", current.period);

    if !report.changes.is_empty() {
        md.push_str("### Changes\n");
        for change in &report.changes {
            let _ = writeln!(md, "- **{change}**");
        }
        md.push('\n');
    }

    md.push_str("### Current Stats\n\n");
    md.push_str("| Metric | Previous | Current | Change |\n");
    md.push_str("|--------|----------|---------|--------|\n");
    if let Some(previous) = previous {
        let _ = writeln!(
            md,
            "| Visits | {} | {} | {:+.0}% |",
            previous.visits,
            current.visits,
            percent_change(previous.visits, current.visits)
        );
        let _ = writeln!(
            md,
            "| Page Views | {} | {} | {:+.0}% |",
            previous.pageviews,
            current.pageviews,
            percent_change(previous.pageviews, current.pageviews)
        );
    } else {
        let _ = writeln!(md, "| Visits | - | {} | (first run) |", current.visits);
        let _ = writeln!(
            md,
            "| Page Views | - | {} | (first run) |",
            current.pageviews
        );
    }

    if !current.top_pages.is_empty() {
        md.push_str("\n### Top Pages\n");
        for (i, (page, count)) in top_n(&current.top_pages, 5).iter().enumerate() {
            let _ = writeln!(md, "{}. `{page}` - {count} views", i + 1);
        }
    }
    if !current.countries.is_empty() {
        md.push_str("\n### Top Countries\n");
        for (i, (country, count)) in top_n(&current.countries, 5).iter().enumerate() {
            let _ = writeln!(md, "{}. {country} - {count}", i + 1);
        }
    }

    md.push_str("\n---\n*Generated by analytics change detection workflow*\n");
    md
}

/// Post the report to a Slack/Discord-compatible webhook.
pub fn post_webhook(url: &str, report: &Report) -> Result<()> {
    let payload = json!({
        "text": format!(
            "*Analytics Alert*\n{}\n\n*Changes:*\n{}",
            report.summary,
            report.changes.join("\n")
        ),
    });

    let client = http::client(http::HEAD_TIMEOUT)?;
    let resp = client
        .post(url)
        .json(&payload)
        .send()
        .context("posting to webhook")?;

    let status = resp.status();
    if status.as_u16() >= 400 {
        let body = resp.text().unwrap_or_default();
        bail!("webhook returned {}: {body}", status.as_u16());
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
