//! Keyword aggregation and frequency ranking.
//!
//! This module merges the keyword lists of a seed keyword's targets,
//! counts how many targets share each keyword and selects the most and
//! second-most frequent tiers.

use crate::models::{AggregatedRow, KeywordHit};
use std::collections::{HashMap, HashSet};

/// Aggregated keywords for one seed keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordAggregate {
    /// Most and second-most frequent keywords, one row per keyword.
    pub top: Vec<AggregatedRow>,
    /// Every row with its frequency, in input order.
    pub raw: Vec<AggregatedRow>,
    pub highest_frequency: Option<usize>,
    pub second_frequency: Option<usize>,
}

/// Count, per keyword, the distinct targets that contain it.
pub fn keyword_frequencies(hits: &[KeywordHit]) -> HashMap<&str, usize> {
    let mut sources: HashMap<&str, HashSet<usize>> = HashMap::new();

    for hit in hits {
        sources
            .entry(hit.keyword.as_str())
            .or_default()
            .insert(hit.target_index);
    }

    sources
        .into_iter()
        .map(|(keyword, targets)| (keyword, targets.len()))
        .collect()
}

/// Highest frequency and the next-lower distinct frequency, if any.
pub fn frequency_tiers(rows: &[AggregatedRow]) -> (Option<usize>, Option<usize>) {
    let highest = rows.iter().map(|r| r.frequency).max();
    let second = highest.and_then(|max| {
        rows.iter()
            .map(|r| r.frequency)
            .filter(|&f| f < max)
            .max()
    });

    (highest, second)
}

/// Select the rows in the given tiers, sort them and deduplicate by keyword.
///
/// Rows are ordered by frequency then search volume, both descending; the
/// first row for each keyword wins.
pub fn top_tier(
    rows: &[AggregatedRow],
    highest: Option<usize>,
    second: Option<usize>,
) -> Vec<AggregatedRow> {
    let tiers: Vec<usize> = highest.into_iter().chain(second).collect();

    let mut selected: Vec<AggregatedRow> = rows
        .iter()
        .filter(|r| tiers.contains(&r.frequency))
        .cloned()
        .collect();

    selected.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| b.search_volume.cmp(&a.search_volume))
    });

    let mut seen = HashSet::new();
    selected.retain(|row| seen.insert(row.keyword.clone()));

    selected
}

/// Aggregate all keyword hits collected for one seed keyword.
pub fn aggregate(seed_keyword: &str, hits: &[KeywordHit]) -> KeywordAggregate {
    let frequencies = keyword_frequencies(hits);

    let raw: Vec<AggregatedRow> = hits
        .iter()
        .map(|hit| AggregatedRow {
            seed_keyword: seed_keyword.to_string(),
            website: hit.website.clone(),
            ranking_url: hit.ranking_url.clone(),
            keyword: hit.keyword.clone(),
            frequency: frequencies.get(hit.keyword.as_str()).copied().unwrap_or(1),
            position: hit.position,
            search_volume: hit.search_volume,
            cpc: hit.cpc,
            competition: hit.competition,
        })
        .collect();

    let (highest_frequency, second_frequency) = frequency_tiers(&raw);
    let top = top_tier(&raw, highest_frequency, second_frequency);

    KeywordAggregate {
        top,
        raw,
        highest_frequency,
        second_frequency,
    }
}

/// Number of ranking keywords found for each target, in target order.
///
/// Placeholder sentinel rows are not counted.
pub fn keywords_per_target(hits: &[KeywordHit], target_count: usize) -> Vec<usize> {
    let mut counts = vec![0; target_count];

    for hit in hits.iter().filter(|h| h.ranking_url.is_some()) {
        if let Some(count) = counts.get_mut(hit.target_index) {
            *count += 1;
        }
    }

    counts
}
