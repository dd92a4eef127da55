//! Data models for keyword research.
//!
//! This module contains the core data structures that flow through the
//! research pipeline: search results, selected target URLs, ranked keywords
//! and the aggregated rows that end up in the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Placeholder text for values that do not exist (e.g. an unranked site).
pub const NOT_AVAILABLE: &str = "N/A";

/// Display value for a site that is not in the fetched results.
pub const NOT_RANKED_LABEL: &str = "30+";

/// Rank of a page on the search results page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// 1-based rank.
    Ranked(u32),
    /// Not present in the fetched results.
    NotRanked,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Ranked(rank) => write!(f, "{}", rank),
            Position::NotRanked => write!(f, "{}", NOT_RANKED_LABEL),
        }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Position::Ranked(rank) => serializer.serialize_u32(*rank),
            Position::NotRanked => serializer.serialize_str(NOT_RANKED_LABEL),
        }
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPosition {
            Number(u32),
            Text(String),
        }

        match RawPosition::deserialize(deserializer)? {
            RawPosition::Number(rank) => Ok(Position::Ranked(rank)),
            RawPosition::Text(text) if text == NOT_RANKED_LABEL => Ok(Position::NotRanked),
            RawPosition::Text(text) => text
                .parse::<u32>()
                .map(Position::Ranked)
                .map_err(|_| serde::de::Error::custom(format!("invalid position: {}", text))),
        }
    }
}

/// One organic result from the search-results API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Lower-cased host name of the result link.
    pub website: String,
    /// Full result URL as returned by the API.
    pub ranking_url: String,
    /// 1-based position in the API's ranking order.
    pub position: u32,
    /// Link to the rendered result page, when the API provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

/// A page selected for keyword lookup.
///
/// Placeholders stand in for requested sites that were not found in the
/// results; they carry no URL and are never looked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetUrl {
    pub website: String,
    pub ranking_url: Option<String>,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

impl TargetUrl {
    /// Creates a placeholder row for a site missing from the results.
    pub fn placeholder(website: impl Into<String>, snapshot: Option<String>) -> Self {
        Self {
            website: website.into(),
            ranking_url: None,
            position: Position::NotRanked,
            snapshot,
        }
    }

    /// Whether this row is a "not found" placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.ranking_url.is_none()
    }
}

impl From<&SearchResult> for TargetUrl {
    fn from(result: &SearchResult) -> Self {
        Self {
            website: result.website.clone(),
            ranking_url: Some(result.ranking_url.clone()),
            position: Position::Ranked(result.position),
            snapshot: result.snapshot.clone(),
        }
    }
}

/// A keyword a URL ranks for, according to the keyword database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedKeyword {
    pub keyword: String,
    pub position: u32,
    pub search_volume: u64,
    pub cpc: f64,
    pub competition: f64,
}

/// A keyword row attributed to one target, before frequencies are known.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    /// Index of the target in the seed keyword's target list.
    pub target_index: usize,
    pub website: String,
    pub ranking_url: Option<String>,
    pub keyword: String,
    pub position: Position,
    pub search_volume: u64,
    pub cpc: Option<f64>,
    pub competition: Option<f64>,
}

impl KeywordHit {
    /// Creates a hit from a keyword-database record for a looked-up URL.
    pub fn ranked(
        target_index: usize,
        website: &str,
        ranking_url: &str,
        keyword: RankedKeyword,
    ) -> Self {
        Self {
            target_index,
            website: website.to_string(),
            ranking_url: Some(ranking_url.to_string()),
            keyword: keyword.keyword,
            position: Position::Ranked(keyword.position),
            search_volume: keyword.search_volume,
            cpc: Some(keyword.cpc),
            competition: Some(keyword.competition),
        }
    }

    /// Creates the sentinel row emitted for a placeholder target.
    pub fn placeholder(target_index: usize, target: &TargetUrl) -> Self {
        Self {
            target_index,
            website: target.website.clone(),
            ranking_url: None,
            keyword: NOT_AVAILABLE.to_string(),
            position: target.position,
            search_volume: 0,
            cpc: None,
            competition: None,
        }
    }
}

/// A keyword row joined with its frequency across a seed keyword's targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub seed_keyword: String,
    pub website: String,
    pub ranking_url: Option<String>,
    pub keyword: String,
    /// Number of distinct targets whose keyword list contains `keyword`.
    pub frequency: usize,
    pub position: Position,
    pub search_volume: u64,
    pub cpc: Option<f64>,
    pub competition: Option<f64>,
}

impl AggregatedRow {
    /// Ranking URL for display, or `N/A`.
    pub fn ranking_url_display(&self) -> &str {
        self.ranking_url.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    /// CPC for display, or `N/A`.
    pub fn cpc_display(&self) -> String {
        format_metric(self.cpc)
    }

    /// Competition for display, or `N/A`.
    pub fn competition_display(&self) -> String {
        format_metric(self.competition)
    }
}

fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Pipeline stage a lookup failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    Search,
    Keywords,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStage::Search => write!(f, "Search"),
            FetchStage::Keywords => write!(f, "Keywords"),
        }
    }
}

/// Kind of lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailure {
    /// Connection, timeout or body-read failure.
    TransportError,
    /// The API reported an exhausted quota or credit balance.
    QuotaExhausted,
    /// Any other error status or error body.
    Api,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::TransportError => write!(f, "Transport error"),
            FetchFailure::QuotaExhausted => write!(f, "Quota exhausted"),
            FetchFailure::Api => write!(f, "API error"),
        }
    }
}

/// A lookup that degraded to empty data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNote {
    pub stage: FetchStage,
    /// Seed keyword (search stage) or URL/site (keyword stage).
    pub subject: String,
    pub kind: FetchFailure,
    pub message: String,
}

/// Research results for a single seed keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedReport {
    pub seed_keyword: String,
    /// Link to the rendered results page for this seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    pub targets: Vec<TargetUrl>,
    /// Ranking keywords found per target, aligned with `targets`.
    pub keyword_counts: Vec<usize>,
    /// Most and second-most frequent keywords, deduplicated.
    pub top_keywords: Vec<AggregatedRow>,
    pub highest_frequency: Option<usize>,
    pub second_frequency: Option<usize>,
    /// Full merged table, unfiltered.
    pub raw_rows: Vec<AggregatedRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<FetchNote>,
}

impl SeedReport {
    /// Whether any lookup for this seed hit an exhausted quota.
    pub fn has_quota_exhaustion(&self) -> bool {
        self.notes
            .iter()
            .any(|n| n.kind == FetchFailure::QuotaExhausted)
    }
}

/// Account information from the search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub total_searches_left: i64,
}

/// Summary counts across all seed keywords.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub seeds: usize,
    pub targets: usize,
    pub placeholders: usize,
    pub raw_rows: usize,
    pub top_keywords: usize,
    pub failed_lookups: usize,
    pub quota_exhausted: usize,
}

impl ResearchSummary {
    /// Creates a summary from the per-seed reports.
    pub fn from_seeds(seeds: &[SeedReport]) -> Self {
        let mut summary = Self {
            seeds: seeds.len(),
            ..Self::default()
        };

        for seed in seeds {
            summary.targets += seed.targets.len();
            summary.placeholders += seed.targets.iter().filter(|t| t.is_placeholder()).count();
            summary.raw_rows += seed.raw_rows.len();
            summary.top_keywords += seed.top_keywords.len();
            summary.failed_lookups += seed.notes.len();
            summary.quota_exhausted += seed
                .notes
                .iter()
                .filter(|n| n.kind == FetchFailure::QuotaExhausted)
                .count();
        }

        summary
    }
}

/// Metadata about the research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub country: String,
    pub language: String,
    pub google_domain: String,
    pub database: String,
    /// Human-readable target selection mode.
    pub selection: String,
    pub duration_seconds: f64,
}

/// The complete keyword research report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountStatus>,
    pub summary: ResearchSummary,
    pub seeds: Vec<SeedReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(kind: FetchFailure) -> FetchNote {
        FetchNote {
            stage: FetchStage::Keywords,
            subject: "https://example.com/".to_string(),
            kind,
            message: "boom".to_string(),
        }
    }

    fn seed_report(targets: Vec<TargetUrl>, notes: Vec<FetchNote>) -> SeedReport {
        SeedReport {
            seed_keyword: "coffee table".to_string(),
            snapshot: None,
            keyword_counts: vec![0; targets.len()],
            targets,
            top_keywords: Vec::new(),
            highest_frequency: None,
            second_frequency: None,
            raw_rows: Vec::new(),
            notes,
        }
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::Ranked(3).to_string(), "3");
        assert_eq!(Position::NotRanked.to_string(), "30+");
    }

    #[test]
    fn test_position_serde() {
        assert_eq!(serde_json::to_string(&Position::Ranked(4)).unwrap(), "4");
        assert_eq!(
            serde_json::to_string(&Position::NotRanked).unwrap(),
            "\"30+\""
        );

        let ranked: Position = serde_json::from_str("12").unwrap();
        assert_eq!(ranked, Position::Ranked(12));
        let text: Position = serde_json::from_str("\"8\"").unwrap();
        assert_eq!(text, Position::Ranked(8));
        let unranked: Position = serde_json::from_str("\"30+\"").unwrap();
        assert_eq!(unranked, Position::NotRanked);
        assert!(serde_json::from_str::<Position>("\"top\"").is_err());
    }

    #[test]
    fn test_placeholder_target() {
        let target = TargetUrl::placeholder("hipvan.com", Some("snap.html".to_string()));
        assert!(target.is_placeholder());
        assert_eq!(target.position, Position::NotRanked);

        let hit = KeywordHit::placeholder(2, &target);
        assert_eq!(hit.keyword, NOT_AVAILABLE);
        assert_eq!(hit.search_volume, 0);
        assert_eq!(hit.target_index, 2);
        assert!(hit.cpc.is_none());
    }

    #[test]
    fn test_row_display_helpers() {
        let row = AggregatedRow {
            seed_keyword: "coffee table".to_string(),
            website: "hipvan.com".to_string(),
            ranking_url: None,
            keyword: NOT_AVAILABLE.to_string(),
            frequency: 1,
            position: Position::NotRanked,
            search_volume: 0,
            cpc: None,
            competition: Some(1.0),
        };
        assert_eq!(row.ranking_url_display(), "N/A");
        assert_eq!(row.cpc_display(), "N/A");
        assert_eq!(row.competition_display(), "1.00");
    }

    #[test]
    fn test_research_summary() {
        let seeds = vec![
            seed_report(
                vec![
                    TargetUrl::placeholder("a.com", None),
                    TargetUrl {
                        website: "b.com".to_string(),
                        ranking_url: Some("https://b.com/".to_string()),
                        position: Position::Ranked(1),
                        snapshot: None,
                    },
                ],
                vec![note(FetchFailure::QuotaExhausted)],
            ),
            seed_report(Vec::new(), vec![note(FetchFailure::TransportError)]),
        ];

        let summary = ResearchSummary::from_seeds(&seeds);
        assert_eq!(summary.seeds, 2);
        assert_eq!(summary.targets, 2);
        assert_eq!(summary.placeholders, 1);
        assert_eq!(summary.failed_lookups, 2);
        assert_eq!(summary.quota_exhausted, 1);
        assert!(seeds[0].has_quota_exhaustion());
        assert!(!seeds[1].has_quota_exhaustion());
    }
}
