//! Target URL selection.
//!
//! Picks the pages whose ranking keywords get looked up for a seed keyword:
//! either the top-ranked results or one result per requested website.

use crate::models::{SearchResult, TargetUrl};
use std::fmt;

/// Maximum number of websites a user may target.
pub const MAX_TARGET_WEBSITES: usize = 5;

/// How target URLs are chosen from the search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Results ranked 1..=n.
    TopRanked(u32),
    /// One result per normalized host, in the given order.
    Websites(Vec<String>),
}

impl Default for Selection {
    fn default() -> Self {
        Selection::TopRanked(5)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::TopRanked(n) => write!(f, "Top {} ranking URLs", n),
            Selection::Websites(sites) => write!(f, "Specific websites: {}", sites.join(", ")),
        }
    }
}

/// Select target URLs from the search results.
///
/// In websites mode the output has exactly one row per site: the first
/// matching result, or a `30+` placeholder carrying the first available
/// snapshot when the site is absent.
pub fn select_targets(results: &[SearchResult], selection: &Selection) -> Vec<TargetUrl> {
    match selection {
        Selection::TopRanked(n) => results
            .iter()
            .filter(|r| (1..=*n).contains(&r.position))
            .map(TargetUrl::from)
            .collect(),
        Selection::Websites(sites) => {
            let snapshot = results.iter().find_map(|r| r.snapshot.clone());
            sites
                .iter()
                .map(|site| {
                    results
                        .iter()
                        .find(|r| r.website == *site)
                        .map(TargetUrl::from)
                        .unwrap_or_else(|| TargetUrl::placeholder(site.clone(), snapshot.clone()))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;

    fn result(website: &str, path: &str, position: u32) -> SearchResult {
        SearchResult {
            website: website.to_string(),
            ranking_url: format!("https://{}{}", website, path),
            position,
            snapshot: Some("https://serpapi.com/searches/abc.html".to_string()),
        }
    }

    fn serp() -> Vec<SearchResult> {
        vec![
            result("www.hipvan.com", "/coffee-tables", 1),
            result("urbanmood.sg", "/tables", 2),
            result("www.hipvan.com", "/side-tables", 3),
            result("www.ikea.com", "/sg/en/tables", 4),
            result("www.fortytwo.sg", "/coffee", 5),
            result("www.castlery.com", "/sg/coffee-tables", 6),
            result("www.islandliving.sg", "/collections/coffee-side-tables", 7),
        ]
    }

    #[test]
    fn test_top_ranked() {
        let targets = select_targets(&serp(), &Selection::TopRanked(5));

        assert_eq!(targets.len(), 5);
        let positions: Vec<Position> = targets.iter().map(|t| t.position).collect();
        assert_eq!(
            positions,
            (1..=5).map(Position::Ranked).collect::<Vec<_>>()
        );
        assert!(targets.iter().all(|t| !t.is_placeholder()));
    }

    #[test]
    fn test_top_ranked_with_short_results() {
        let results: Vec<SearchResult> = serp().into_iter().take(3).collect();
        assert_eq!(select_targets(&results, &Selection::TopRanked(5)).len(), 3);
        assert!(select_targets(&[], &Selection::TopRanked(5)).is_empty());
    }

    #[test]
    fn test_websites_first_match_and_placeholder() {
        let selection = Selection::Websites(vec![
            "www.islandliving.sg".to_string(),
            "www.hipvan.com".to_string(),
            "www.comfortfurniture.com.sg".to_string(),
        ]);
        let targets = select_targets(&serp(), &selection);

        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].website, "www.islandliving.sg");
        assert_eq!(targets[0].position, Position::Ranked(7));

        // First hipvan row wins, not the one at position 3.
        assert_eq!(
            targets[1].ranking_url.as_deref(),
            Some("https://www.hipvan.com/coffee-tables")
        );

        let missing = &targets[2];
        assert!(missing.is_placeholder());
        assert_eq!(missing.website, "www.comfortfurniture.com.sg");
        assert_eq!(missing.position.to_string(), "30+");
        assert_eq!(
            missing.snapshot.as_deref(),
            Some("https://serpapi.com/searches/abc.html")
        );
    }

    #[test]
    fn test_websites_without_results() {
        let selection = Selection::Websites(vec!["a.com".to_string(), "b.com".to_string()]);
        let targets = select_targets(&[], &selection);

        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.is_placeholder() && t.snapshot.is_none()));
    }

    #[test]
    fn test_selection_display() {
        assert_eq!(Selection::default().to_string(), "Top 5 ranking URLs");
        assert_eq!(
            Selection::Websites(vec!["a.com".to_string(), "b.com".to_string()]).to_string(),
            "Specific websites: a.com, b.com"
        );
    }
}
