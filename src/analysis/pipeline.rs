//! Per-seed research pipeline.
//!
//! Seeds are processed one at a time: search, select targets, look up the
//! keywords of every target on a bounded pool, then aggregate. Lookups that
//! fail degrade to empty data and leave a [`FetchNote`] on the seed report.

use crate::analysis::aggregator::{aggregate, keywords_per_target};
use crate::analysis::selector::{select_targets, Selection};
use crate::api::{ApiError, KeywordClient, KeywordSettings, SearchClient, SearchSettings};
use crate::models::{AccountStatus, FetchNote, FetchStage, KeywordHit, SeedReport};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Immutable configuration for a research run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub search: SearchSettings,
    pub keywords: KeywordSettings,
    pub selection: Selection,
    /// Maximum keyword lookups in flight per seed keyword.
    pub concurrency: usize,
    pub show_progress: bool,
}

/// Runs keyword research for seed keywords.
pub struct Researcher {
    search: SearchClient,
    keywords: KeywordClient,
    selection: Selection,
    concurrency: usize,
    show_progress: bool,
}

fn fetch_note(stage: FetchStage, subject: &str, error: &ApiError) -> FetchNote {
    FetchNote {
        stage,
        subject: subject.to_string(),
        kind: error.failure_kind(),
        message: error.to_string(),
    }
}

impl Researcher {
    pub fn new(config: ResearchConfig) -> Result<Self, ApiError> {
        info!(
            "Initializing researcher ({}, concurrency {})",
            config.selection, config.concurrency
        );

        Ok(Self {
            search: SearchClient::new(config.search)?,
            keywords: KeywordClient::new(config.keywords)?,
            selection: config.selection,
            concurrency: config.concurrency.max(1),
            show_progress: config.show_progress,
        })
    }

    pub fn search_settings(&self) -> &SearchSettings {
        self.search.settings()
    }

    pub fn keyword_settings(&self) -> &KeywordSettings {
        self.keywords.settings()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Account plan and remaining searches on the search API.
    pub async fn account_status(&self) -> Result<AccountStatus, ApiError> {
        self.search.account().await
    }

    /// Research every seed keyword in order.
    pub async fn run(&self, seeds: &[String]) -> Vec<SeedReport> {
        let progress = self.show_progress.then(|| {
            let pb = ProgressBar::new(seeds.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .map(|style| style.progress_chars("#>-"))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        });

        let mut reports = Vec::with_capacity(seeds.len());

        for (i, seed) in seeds.iter().enumerate() {
            if let Some(ref pb) = progress {
                pb.set_message(seed.clone());
            }
            info!("[{}/{}] Researching seed keyword: {}", i + 1, seeds.len(), seed);

            reports.push(self.research_seed(seed).await);

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        reports
    }

    /// Research a single seed keyword start to finish.
    pub async fn research_seed(&self, seed_keyword: &str) -> SeedReport {
        let mut notes = Vec::new();

        let results = match self.search.search(seed_keyword).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Search failed for '{}': {}", seed_keyword, e);
                notes.push(fetch_note(FetchStage::Search, seed_keyword, &e));
                Vec::new()
            }
        };

        let snapshot = results.iter().find_map(|r| r.snapshot.clone());
        let targets = select_targets(&results, &self.selection);
        info!(
            "'{}': {} results, {} target URLs",
            seed_keyword,
            results.len(),
            targets.len()
        );

        let keywords = &self.keywords;
        let outcomes: Vec<_> = stream::iter(targets.iter().enumerate())
            .map(|(index, target)| async move {
                (target, keywords.keywords_for_target(index, target).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut hits: Vec<KeywordHit> = Vec::new();
        for (target, outcome) in outcomes {
            match outcome {
                Ok(target_hits) => {
                    debug!("{}: {} keyword rows", target.website, target_hits.len());
                    hits.extend(target_hits);
                }
                Err(e) => {
                    let subject = target.ranking_url.as_deref().unwrap_or(&target.website);
                    warn!("Keyword lookup failed for {}: {}", subject, e);
                    notes.push(fetch_note(FetchStage::Keywords, subject, &e));
                }
            }
        }

        let keyword_counts = keywords_per_target(&hits, targets.len());
        let aggregate = aggregate(seed_keyword, &hits);

        SeedReport {
            seed_keyword: seed_keyword.to_string(),
            snapshot,
            targets,
            keyword_counts,
            top_keywords: aggregate.top,
            highest_frequency: aggregate.highest_frequency,
            second_frequency: aggregate.second_frequency,
            raw_rows: aggregate.raw,
            notes,
        }
    }
}
