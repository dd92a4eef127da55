//! Report generation.
//!
//! This module renders research results as a Markdown report, a JSON
//! document or a CSV export of the raw keyword rows.

use crate::cli::OutputFormat;
use crate::models::{
    AccountStatus, AggregatedRow, FetchNote, Report, ReportMetadata, ResearchSummary, SeedReport,
    TargetUrl, NOT_AVAILABLE,
};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Render a report in the requested format.
pub fn render_report(
    report: &Report,
    format: OutputFormat,
    include_raw_data: bool,
) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(report, include_raw_data)),
        OutputFormat::Json => generate_json_report(report),
        OutputFormat::Csv => generate_csv_report(report),
    }
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, include_raw_data: bool) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Keyword Research Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    if let Some(ref account) = report.account {
        output.push_str(&generate_account_section(account));
    }

    output.push_str(&generate_summary_section(&report.summary));

    for seed in &report.seeds {
        output.push_str(&generate_seed_section(seed, include_raw_data));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Search:** {} (gl={}, hl={})\n",
        metadata.google_domain, metadata.country, metadata.language
    ));
    section.push_str(&format!("- **Keyword Database:** {}\n", metadata.database));
    section.push_str(&format!("- **Targets:** {}\n", metadata.selection));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the account status section.
fn generate_account_section(account: &AccountStatus) -> String {
    let mut section = String::new();

    section.push_str("## Search API Account\n\n");
    section.push_str(&format!("- **Plan:** {}\n", account.plan_name));
    section.push_str(&format!(
        "- **Searches Left:** {}\n\n",
        account.total_searches_left
    ));

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &ResearchSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Seeds | Target URLs | Not Ranked | Keyword Rows | Top Keywords | Failed Lookups |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        summary.seeds,
        summary.targets,
        summary.placeholders,
        summary.raw_rows,
        summary.top_keywords,
        summary.failed_lookups
    ));

    if summary.quota_exhausted > 0 {
        section.push_str(&format!(
            "> **Warning:** {} lookup(s) failed because an API quota ran out. \
             Results below are incomplete.\n\n",
            summary.quota_exhausted
        ));
    }

    section
}

/// Generate the section for one seed keyword.
fn generate_seed_section(seed: &SeedReport, include_raw_data: bool) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", escape_cell(&seed.seed_keyword)));

    if let Some(ref snapshot) = seed.snapshot {
        section.push_str(&format!("[SERP snapshot]({})\n\n", snapshot));
    }

    section.push_str(&generate_targets_table(&seed.targets, &seed.keyword_counts));
    section.push_str(&generate_top_keywords_table(seed));

    if !seed.notes.is_empty() {
        section.push_str(&generate_notes_section(&seed.notes));
    }

    if include_raw_data && !seed.raw_rows.is_empty() {
        section.push_str("<details>\n<summary>Raw Data</summary>\n\n");
        section.push_str(&generate_raw_table(&seed.raw_rows));
        section.push_str("</details>\n\n");
    }

    section
}

/// Generate the target URLs table.
fn generate_targets_table(targets: &[TargetUrl], keyword_counts: &[usize]) -> String {
    let mut table = String::new();

    table.push_str("### Target URLs\n\n");

    if targets.is_empty() {
        table.push_str("No ranking URLs were found.\n\n");
        return table;
    }

    table.push_str("| Website | Ranking URL | Position | Keywords |\n");
    table.push_str("|:---|:---|:---:|:---:|\n");

    for (i, target) in targets.iter().enumerate() {
        let count = keyword_counts.get(i).copied().unwrap_or(0);
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&target.website),
            escape_cell(target.ranking_url.as_deref().unwrap_or(NOT_AVAILABLE)),
            target.position,
            count
        ));
    }
    table.push('\n');

    table
}

/// Generate the most frequent keywords table.
fn generate_top_keywords_table(seed: &SeedReport) -> String {
    let mut table = String::new();

    table.push_str("### Most Frequent & 2nd Most Frequent Keywords\n\n");

    if seed.top_keywords.is_empty() {
        table.push_str("No keyword data available.\n\n");
        return table;
    }

    let tiers = match (seed.highest_frequency, seed.second_frequency) {
        (Some(highest), Some(second)) => format!("{} and {}", highest, second),
        (Some(highest), None) => highest.to_string(),
        _ => String::new(),
    };
    if !tiers.is_empty() {
        table.push_str(&format!("*Frequencies shown: {}*\n\n", tiers));
    }

    table.push_str("| Seed Keyword | Keyword | Frequency | Search Volume | CPC | Competition |\n");
    table.push_str("|:---|:---|:---:|---:|---:|---:|\n");

    for row in &seed.top_keywords {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&row.seed_keyword),
            escape_cell(&row.keyword),
            row.frequency,
            row.search_volume,
            row.cpc_display(),
            row.competition_display()
        ));
    }
    table.push('\n');

    table
}

/// Generate the failed lookups list.
fn generate_notes_section(notes: &[FetchNote]) -> String {
    let mut section = String::new();

    section.push_str("### Failed Lookups\n\n");
    for note in notes {
        section.push_str(&format!(
            "- **{}** `{}` ({}): {}\n",
            note.stage, note.subject, note.kind, note.message
        ));
    }
    section.push('\n');

    section
}

/// Generate the raw merged keyword table.
fn generate_raw_table(rows: &[AggregatedRow]) -> String {
    let mut table = String::new();

    table.push_str(
        "| Seed Keyword | Website | Ranking URL | Keyword | Frequency | Position | Search Volume | CPC | Competition |\n",
    );
    table.push_str("|:---|:---|:---|:---|:---:|:---:|---:|---:|---:|\n");

    for row in rows {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            escape_cell(&row.seed_keyword),
            escape_cell(&row.website),
            escape_cell(row.ranking_url_display()),
            escape_cell(&row.keyword),
            row.frequency,
            row.position,
            row.search_volume,
            row.cpc_display(),
            row.competition_display()
        ));
    }
    table.push('\n');

    table
}

/// Escape characters that would break a Markdown table cell.
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by kwresearch*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// One line of the CSV export.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Seed Keyword")]
    seed_keyword: &'a str,
    #[serde(rename = "Website")]
    website: &'a str,
    #[serde(rename = "Ranking URL")]
    ranking_url: &'a str,
    #[serde(rename = "Keyword")]
    keyword: &'a str,
    #[serde(rename = "Frequency")]
    frequency: usize,
    #[serde(rename = "Position")]
    position: String,
    #[serde(rename = "Search Volume")]
    search_volume: u64,
    #[serde(rename = "CPC")]
    cpc: String,
    #[serde(rename = "Competition")]
    competition: String,
}

impl<'a> From<&'a AggregatedRow> for CsvRow<'a> {
    fn from(row: &'a AggregatedRow) -> Self {
        Self {
            seed_keyword: &row.seed_keyword,
            website: &row.website,
            ranking_url: row.ranking_url_display(),
            keyword: &row.keyword,
            frequency: row.frequency,
            position: row.position.to_string(),
            search_volume: row.search_volume,
            cpc: row.cpc_display(),
            competition: row.competition_display(),
        }
    }
}

/// Generate a CSV export of every seed's raw keyword rows.
pub fn generate_csv_report(report: &Report) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for row in report.seeds.iter().flat_map(|s| s.raw_rows.iter()) {
        writer.serialize(CsvRow::from(row))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {}", e.error()))?;

    Ok(String::from_utf8(bytes)?)
}
