//! Output formatting for the command-line reports.
//!
//! Supports a table view for terminals and JSON for scripting.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{IndexRepair, SyncReport, UserStats};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables.
    #[default]
    Table,
    /// JSON for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Pretty-prints any report as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Formats a sync report: one row per attempted domain plus a summary line.
pub fn format_sync_report(report: &SyncReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Domain", "Status", "Cookies", "Error"]);

    for outcome in &report.results {
        let status = if outcome.success { "ok" } else { "failed" };
        let saved = outcome
            .saved_count
            .map_or_else(|| "-".to_string(), |n| n.to_string());

        table.add_row(vec![
            truncate(&outcome.domain, 40),
            status.to_string(),
            saved,
            outcome.error.as_deref().map_or_else(|| "-".to_string(), |e| truncate(e, 50)),
        ]);
    }

    let summary = format!(
        "Synced {}/{} domains",
        report.synced_count, report.total_domains
    );
    let summary = if report.failed_count() == 0 {
        summary.green()
    } else {
        summary.yellow()
    };

    format!("{table}\n{summary}")
}

/// Formats per-user statistics.
pub fn format_stats(stats: &UserStats) -> String {
    let mut out = format!(
        "{}\n  Domains: {}\n  Cookies: {}",
        "📊 Statistics".bold(),
        stats.total_domains.to_string().cyan(),
        stats.total_cookies.to_string().cyan(),
    );

    if stats.domains.is_empty() {
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Domain", "Cookies", "First saved", "Updated"]);

    for d in &stats.domains {
        table.add_row(vec![
            truncate(&d.domain, 40),
            d.cookie_count.to_string(),
            d.saved_at.format("%Y-%m-%d %H:%M").to_string(),
            d.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    out.push_str(&format!("\n\n{table}"));
    out
}

/// Formats a domain listing.
pub fn format_domains(domains: &[String]) -> String {
    if domains.is_empty() {
        return "No saved domains".dimmed().to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Domain"]);
    for (i, domain) in domains.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), domain.clone()]);
    }
    table.to_string()
}

/// Formats the outcome of an index sweep; clean users are left out.
pub fn format_repairs(repairs: &[IndexRepair]) -> String {
    let dirty: Vec<&IndexRepair> = repairs.iter().filter(|r| !r.is_clean()).collect();
    if dirty.is_empty() {
        return format!(
            "{} ({} users checked)",
            "✓ Domain index consistent".green(),
            repairs.len()
        );
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["User", "Added", "Removed"]);
    for r in &dirty {
        table.add_row(vec![
            truncate(&r.user_id, 28),
            r.added.join(", "),
            r.removed.join(", "),
        ]);
    }

    format!(
        "{table}\n{}",
        format!("Repaired {} of {} users", dirty.len(), repairs.len()).yellow()
    )
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
