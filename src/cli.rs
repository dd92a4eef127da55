//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and collection of seed keywords and websites.

use crate::analysis::MAX_TARGET_WEBSITES;
use crate::domain::site_of;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum number of seed keywords per run.
pub const MAX_SEED_KEYWORDS: usize = 10;

/// kwresearch - competitor keyword research from live SERPs
///
/// Finds the pages ranking for each seed keyword, pulls the keywords those
/// pages rank for and surfaces the terms most competitors share.
///
/// Examples:
///   kwresearch -k "coffee table"
///   kwresearch -k "coffee table" -k "side table" --country au --google-domain google.com.au
///   kwresearch --keywords-file seeds.txt -w hipvan.com -w urbanmood.sg --format json
///   kwresearch --account
///   kwresearch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Seed keyword to research (repeatable, up to 10 in total)
    #[arg(short = 'k', long = "keyword", value_name = "KEYWORD")]
    pub keywords: Vec<String>,

    /// File with one seed keyword per line
    #[arg(long, value_name = "FILE")]
    pub keywords_file: Option<PathBuf>,

    /// Target website to look up instead of the top results (repeatable, up to 5)
    ///
    /// Accepts bare hosts or URLs, e.g. hipvan.com or https://urbanmood.sg/.
    #[arg(short = 'w', long = "website", value_name = "SITE")]
    pub websites: Vec<String>,

    /// File with one target website per line
    #[arg(long, value_name = "FILE")]
    pub websites_file: Option<PathBuf>,

    /// Number of top-ranked URLs to use when no websites are given
    #[arg(long, value_name = "N")]
    pub top: Option<u32>,

    /// Country code for search results (gl), e.g. sg, au, nz, us
    #[arg(long, value_name = "CODE")]
    pub country: Option<String>,

    /// Interface language (hl), e.g. en, zh-tw
    #[arg(long, value_name = "CODE")]
    pub language: Option<String>,

    /// Google domain to search on, e.g. google.com.sg
    #[arg(long, value_name = "DOMAIN")]
    pub google_domain: Option<String>,

    /// Keyword database to query (defaults to the country code)
    #[arg(long, value_name = "CODE")]
    pub database: Option<String>,

    /// Search API key
    #[arg(long, env = "SERPAPI_API_KEY", hide_env_values = true)]
    pub serpapi_key: Option<String>,

    /// Keyword database API key
    #[arg(long, env = "SEMRUSH_API_KEY", hide_env_values = true)]
    pub semrush_key: Option<String>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Keyword lookups in flight per seed keyword
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .kwresearch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Show the search API plan and remaining searches, then exit
    #[arg(long)]
    pub account: bool,

    /// Generate a default .kwresearch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV of the raw keyword rows
    Csv,
}

impl OutputFormat {
    /// File extension for reports in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Seed keywords from flags and file, trimmed, blank lines dropped.
    pub fn seed_keywords(&self) -> Result<Vec<String>, String> {
        let mut raw = self.keywords.clone();
        if let Some(ref path) = self.keywords_file {
            raw.extend(read_lines(path)?);
        }

        Ok(dedupe(
            raw.iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        ))
    }

    /// Target websites from flags and file, normalized to hosts.
    pub fn target_websites(&self) -> Result<Vec<String>, String> {
        let mut raw = self.websites.clone();
        if let Some(ref path) = self.websites_file {
            raw.extend(read_lines(path)?);
        }

        let mut sites = Vec::new();
        for entry in raw.iter().map(|w| w.trim()).filter(|w| !w.is_empty()) {
            let site = site_of(entry).ok_or_else(|| format!("Invalid website: {}", entry))?;
            sites.push(site);
        }

        Ok(dedupe(sites))
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if !has_value(&self.serpapi_key) {
            return Err(
                "A search API key is required (--serpapi-key or SERPAPI_API_KEY)".to_string(),
            );
        }

        // --account only needs the search API key
        if self.account {
            return Ok(());
        }

        if !has_value(&self.semrush_key) {
            return Err(
                "A keyword database API key is required (--semrush-key or SEMRUSH_API_KEY)"
                    .to_string(),
            );
        }

        let seeds = self.seed_keywords()?;
        if seeds.is_empty() {
            return Err("Provide at least one seed keyword (-k or --keywords-file)".to_string());
        }
        if seeds.len() > MAX_SEED_KEYWORDS {
            return Err(format!(
                "Please provide no more than {} keywords (got {})",
                MAX_SEED_KEYWORDS,
                seeds.len()
            ));
        }

        let websites = self.target_websites()?;
        if websites.len() > MAX_TARGET_WEBSITES {
            return Err(format!(
                "Please provide no more than {} websites (got {})",
                MAX_TARGET_WEBSITES,
                websites.len()
            ));
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
