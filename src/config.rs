//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.kwresearch.toml` files. API keys are never read from the file; they
//! come from the command line or the environment.

use crate::analysis::{ResearchConfig, Selection};
use crate::api::semrush::DEFAULT_KEYWORDS_URL;
use crate::api::serpapi::{DEFAULT_ACCOUNT_URL, DEFAULT_SEARCH_URL, MAX_RESULTS};
use crate::api::{KeywordSettings, SearchSettings};
use crate::cli::{Args, OutputFormat};
use crate::domain::DEFAULT_TRACKING_PARAMS;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".kwresearch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Search API settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Keyword database settings.
    #[serde(default)]
    pub keywords: KeywordsConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Keyword lookups in flight per seed keyword.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "keyword_research.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout() -> u64 {
    60
}

/// Search-results API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint URL.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Account endpoint URL.
    #[serde(default = "default_account_url")]
    pub account_url: String,

    /// Search engine.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Google domain to search on.
    #[serde(default = "default_google_domain")]
    pub google_domain: String,

    /// Country code (gl).
    #[serde(default = "default_country")]
    pub country: String,

    /// Interface language (hl).
    #[serde(default = "default_language")]
    pub language: String,

    /// Organic results requested per seed keyword (at most 30).
    #[serde(default = "default_num_results")]
    pub num_results: usize,

    /// Top-ranked URLs used when no websites are given.
    #[serde(default = "default_top_n")]
    pub top_n: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            account_url: default_account_url(),
            engine: default_engine(),
            google_domain: default_google_domain(),
            country: default_country(),
            language: default_language(),
            num_results: default_num_results(),
            top_n: default_top_n(),
        }
    }
}

fn default_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_account_url() -> String {
    DEFAULT_ACCOUNT_URL.to_string()
}

fn default_engine() -> String {
    "google".to_string()
}

fn default_google_domain() -> String {
    "google.com.sg".to_string()
}

fn default_country() -> String {
    "sg".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_num_results() -> usize {
    MAX_RESULTS
}

fn default_top_n() -> u32 {
    5
}

/// Keyword database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordsConfig {
    /// Keyword API endpoint URL.
    #[serde(default = "default_keywords_url")]
    pub base_url: String,

    /// Regional database; the search country when unset.
    #[serde(default)]
    pub database: Option<String>,

    /// Rows requested per URL.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,

    /// Keywords ranked below this position are dropped.
    #[serde(default = "default_max_position")]
    pub max_position: u32,

    /// Query parameters stripped before lookups (`*` suffix matches a prefix).
    #[serde(default = "default_tracking_params")]
    pub tracking_params: Vec<String>,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            base_url: default_keywords_url(),
            database: None,
            display_limit: default_display_limit(),
            max_position: default_max_position(),
            tracking_params: default_tracking_params(),
        }
    }
}

fn default_keywords_url() -> String {
    DEFAULT_KEYWORDS_URL.to_string()
}

fn default_display_limit() -> usize {
    30
}

fn default_max_position() -> u32 {
    20
}

fn default_tracking_params() -> Vec<String> {
    DEFAULT_TRACKING_PARAMS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Include the raw merged keyword table in Markdown reports.
    #[serde(default = "default_true")]
    pub include_raw_data: bool,

    /// Fetch and show the search API account status.
    #[serde(default = "default_true")]
    pub show_account: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            include_raw_data: true,
            show_account: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref country) = args.country {
            self.search.country = country.clone();
        }
        if let Some(ref language) = args.language {
            self.search.language = language.clone();
        }
        if let Some(ref domain) = args.google_domain {
            self.search.google_domain = domain.clone();
        }
        if let Some(top) = args.top {
            self.search.top_n = top;
        }
        if let Some(ref database) = args.database {
            self.keywords.database = Some(database.clone());
        }

        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout {
            self.general.timeout_seconds = timeout;
        }

        // A format without an explicit output keeps the default name but
        // switches its extension.
        if let Some(format) = args.format {
            self.report.format = format;
            if args.output.is_none() && self.general.output == default_output() {
                self.general.output = format!("keyword_research.{}", format.extension());
            }
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged configuration for values that would make a run
    /// silently produce nothing.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            bail!("general.concurrency must be at least 1");
        }
        if self.general.timeout_seconds == 0 {
            bail!("general.timeout_seconds must be at least 1");
        }
        if self.search.top_n == 0 {
            bail!("search.top_n must be at least 1");
        }
        if !(1..=MAX_RESULTS).contains(&self.search.num_results) {
            bail!("search.num_results must be between 1 and {}", MAX_RESULTS);
        }
        if self.keywords.display_limit == 0 {
            bail!("keywords.display_limit must be at least 1");
        }
        if self.keywords.max_position == 0 {
            bail!("keywords.max_position must be at least 1");
        }

        Ok(())
    }

    /// Effective keyword database: explicit setting or the search country.
    pub fn database(&self) -> String {
        self.keywords
            .database
            .clone()
            .unwrap_or_else(|| self.search.country.clone())
    }

    /// Build the immutable research configuration for a run.
    pub fn research_config(&self, args: &Args, websites: Vec<String>) -> ResearchConfig {
        let selection = if websites.is_empty() {
            Selection::TopRanked(self.search.top_n)
        } else {
            Selection::Websites(websites)
        };

        ResearchConfig {
            search: SearchSettings {
                base_url: self.search.base_url.clone(),
                account_url: self.search.account_url.clone(),
                api_key: args.serpapi_key.clone().unwrap_or_default(),
                engine: self.search.engine.clone(),
                google_domain: self.search.google_domain.clone(),
                country: self.search.country.clone(),
                language: self.search.language.clone(),
                num_results: self.search.num_results,
                timeout_seconds: self.general.timeout_seconds,
            },
            keywords: KeywordSettings {
                base_url: self.keywords.base_url.clone(),
                api_key: args.semrush_key.clone().unwrap_or_default(),
                database: self.database(),
                display_limit: self.keywords.display_limit,
                max_position: self.keywords.max_position,
                tracking_params: self.keywords.tracking_params.clone(),
                timeout_seconds: self.general.timeout_seconds,
            },
            selection,
            concurrency: self.general.concurrency,
            show_progress: !args.quiet,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
