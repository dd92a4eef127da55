//! kwresearch - competitor keyword research from live search results
//!
//! A CLI tool that finds the pages ranking for each seed keyword, pulls the
//! keywords those pages rank for and reports the terms most of them share.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, config, report write, etc.)
//!   2 - An API quota ran out (the report is still written)

mod analysis;
mod api;
mod cli;
mod config;
mod domain;
mod models;
mod report;

use analysis::Researcher;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use models::{Report, ReportMetadata, ResearchSummary};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can turn on verbose output
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {}", e);
        std::process::exit(1);
    }

    init_logging(&args, &config);

    info!("kwresearch v{}", env!("CARGO_PKG_VERSION"));
    match config_source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    let result = if args.account {
        run_account(&args, &config).await
    } else {
        run_research(&args, &config).await
    };

    match result {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Research failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .kwresearch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize country, database, concurrency, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over the flags when set.
fn init_logging(args: &Args, config: &Config) {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Handle --account: print the search API plan and exit.
async fn run_account(args: &Args, config: &Config) -> Result<i32> {
    let researcher = build_researcher(args, config, Vec::new())?;

    let account = match researcher.account_status().await {
        Ok(account) => account,
        Err(e) if e.is_quota_exhausted() => {
            eprintln!("⛔ {}", e);
            return Ok(2);
        }
        Err(e) => return Err(e).context("Failed to fetch account status"),
    };

    println!("📇 Search API account");
    println!("   Plan: {}", account.plan_name);
    println!("   Searches left: {}", account.total_searches_left);

    Ok(0)
}

/// Run the complete research workflow. Returns exit code (0 or 2).
async fn run_research(args: &Args, config: &Config) -> Result<i32> {
    let start_time = Instant::now();

    // Validated already; these only fail on unreadable files
    let seeds = args.seed_keywords().map_err(anyhow::Error::msg)?;
    let websites = args.target_websites().map_err(anyhow::Error::msg)?;

    let researcher = build_researcher(args, config, websites)?;
    let search = researcher.search_settings();
    let keywords = researcher.keyword_settings();

    println!("🔎 Researching {} seed keyword(s)", seeds.len());
    println!(
        "   Search: {} (gl={}, hl={})",
        search.google_domain, search.country, search.language
    );
    println!("   Keyword database: {}", keywords.database);
    println!("   Targets: {}", researcher.selection());
    println!("   Concurrency: {}", config.general.concurrency);

    // Step 1: Account status (informational only)
    let account = if config.report.show_account {
        match researcher.account_status().await {
            Ok(account) => {
                info!(
                    "Plan '{}', {} searches left",
                    account.plan_name, account.total_searches_left
                );
                Some(account)
            }
            Err(e) => {
                warn!("Could not fetch account status: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Step 2: Research every seed
    println!();
    let seed_reports = researcher.run(&seeds).await;

    // Step 3: Build the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let summary = ResearchSummary::from_seeds(&seed_reports);

    let metadata = ReportMetadata {
        generated_at: Utc::now(),
        country: search.country.clone(),
        language: search.language.clone(),
        google_domain: search.google_domain.clone(),
        database: keywords.database.clone(),
        selection: researcher.selection().to_string(),
        duration_seconds: duration,
    };

    let report = Report {
        metadata,
        account,
        summary: summary.clone(),
        seeds: seed_reports,
    };

    // Step 4: Render and save
    let output = report::render_report(
        &report,
        config.report.format,
        config.report.include_raw_data,
    )?;

    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&output, &output_path)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Research Summary:");
    println!("   Seed keywords: {}", summary.seeds);
    println!(
        "   Target URLs: {} ({} not ranked)",
        summary.targets, summary.placeholders
    );
    println!("   Keyword rows: {}", summary.raw_rows);
    println!("   Top-tier keywords: {}", summary.top_keywords);
    if summary.failed_lookups > 0 {
        println!("   ⚠️  Failed lookups: {}", summary.failed_lookups);
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Research complete! Report saved to: {}",
        output_path.display()
    );

    if summary.quota_exhausted > 0 {
        eprintln!(
            "\n⛔ {} lookup(s) hit an exhausted API quota. Results are incomplete (exit code 2).",
            summary.quota_exhausted
        );
        return Ok(2);
    }

    Ok(0)
}

/// Build the researcher from the merged configuration.
fn build_researcher(args: &Args, config: &Config, websites: Vec<String>) -> Result<Researcher> {
    let research_config = config.research_config(args, websites);
    Researcher::new(research_config).context("Failed to initialize HTTP clients")
}

/// Load configuration from file or use defaults.
///
/// Returns the path the configuration was read from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.clone())));
    }

    // Try default location; a broken default file is an error too
    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        None => Ok((Config::default(), None)),
    }
}
