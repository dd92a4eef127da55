//! Search-results API client (SerpApi-compatible).

use crate::api::{build_http_client, read_success_body, truncate_body, ApiError};
use crate::domain::site_of;
use crate::models::{AccountStatus, SearchResult};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_SEARCH_URL: &str = "https://serpapi.com/search.json";
pub const DEFAULT_ACCOUNT_URL: &str = "https://serpapi.com/account";

/// Upper bound on organic results requested per query.
pub const MAX_RESULTS: usize = 30;

/// Immutable settings for the search client.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub base_url: String,
    pub account_url: String,
    pub api_key: String,
    pub engine: String,
    pub google_domain: String,
    /// Country code (`gl`).
    pub country: String,
    /// Interface language (`hl`).
    pub language: String,
    pub num_results: usize,
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_URL.to_string(),
            account_url: DEFAULT_ACCOUNT_URL.to_string(),
            api_key: String::new(),
            engine: "google".to_string(),
            google_domain: "google.com.sg".to_string(),
            country: "sg".to_string(),
            language: "en".to_string(),
            num_results: MAX_RESULTS,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    search_metadata: Option<SearchMetadata>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchMetadata {
    #[serde(default)]
    raw_html_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(flatten)]
    status: AccountStatus,
    #[serde(default)]
    error: Option<String>,
}

/// Client for organic search results.
pub struct SearchClient {
    settings: SearchSettings,
    http: reqwest::Client,
}

impl SearchClient {
    pub fn new(settings: SearchSettings) -> Result<Self, ApiError> {
        let http = build_http_client(settings.timeout_seconds)?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Fetch the organic results for one seed keyword.
    pub async fn search(&self, seed_keyword: &str) -> Result<Vec<SearchResult>, ApiError> {
        let num = self.settings.num_results.min(MAX_RESULTS).to_string();
        debug!(
            "Searching '{}' on {} (gl={}, hl={})",
            seed_keyword, self.settings.google_domain, self.settings.country, self.settings.language
        );

        let response = self
            .http
            .get(&self.settings.base_url)
            .query(&[
                ("engine", self.settings.engine.as_str()),
                ("api_key", self.settings.api_key.as_str()),
                ("q", seed_keyword),
                ("google_domain", self.settings.google_domain.as_str()),
                ("gl", self.settings.country.as_str()),
                ("hl", self.settings.language.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let body = read_success_body(response).await?;
        let results = parse_search_response(&body, self.settings.num_results)?;
        debug!("'{}' returned {} organic results", seed_keyword, results.len());

        Ok(results)
    }

    /// Fetch the account plan and remaining searches.
    pub async fn account(&self) -> Result<AccountStatus, ApiError> {
        let response = self
            .http
            .get(&self.settings.account_url)
            .query(&[("api_key", self.settings.api_key.as_str())])
            .send()
            .await?;

        let body = read_success_body(response).await?;
        let parsed: AccountResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ApiError::Api(error));
        }

        Ok(parsed.status)
    }
}

fn is_quota_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("run out of searches") || message.contains("throughput limit")
}

fn is_no_results_message(message: &str) -> bool {
    message.to_lowercase().contains("hasn't returned any results")
}

/// Parse a search API body into ordered results.
///
/// At most `limit` (capped at 30) organic results are considered; those
/// without a usable link are skipped and positions are numbered 1, 2, 3...
/// in the API's order.
pub fn parse_search_response(body: &str, limit: usize) -> Result<Vec<SearchResult>, ApiError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;

    if let Some(error) = parsed.error {
        if is_no_results_message(&error) {
            return Ok(Vec::new());
        }
        if is_quota_message(&error) {
            return Err(ApiError::QuotaExhausted(error));
        }
        return Err(ApiError::Api(truncate_body(&error)));
    }

    let snapshot = parsed.search_metadata.and_then(|m| m.raw_html_file);

    let results = parsed
        .organic_results
        .into_iter()
        .take(limit.min(MAX_RESULTS))
        .filter_map(|result| {
            let link = result.link.filter(|l| !l.trim().is_empty())?;
            let website = site_of(&link)?;
            Some((website, link))
        })
        .enumerate()
        .map(|(index, (website, ranking_url))| SearchResult {
            website,
            ranking_url,
            position: index as u32 + 1,
            snapshot: snapshot.clone(),
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchFailure;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_body(links: &[&str]) -> String {
        let organic: Vec<_> = links
            .iter()
            .enumerate()
            .map(|(i, link)| json!({ "position": i + 1, "link": link }))
            .collect();
        json!({
            "search_metadata": { "raw_html_file": "https://serpapi.com/searches/abc.html" },
            "organic_results": organic,
        })
        .to_string()
    }

    fn settings_for(server: &MockServer) -> SearchSettings {
        SearchSettings {
            base_url: format!("{}/search.json", server.uri()),
            account_url: format!("{}/account", server.uri()),
            api_key: "test-key".to_string(),
            timeout_seconds: 5,
            ..SearchSettings::default()
        }
    }

    #[test]
    fn test_parse_search_response() {
        let body = search_body(&[
            "https://www.hipvan.com/furniture/coffee-tables",
            "https://urbanmood.sg/collections/coffee-tables?srsltid=abc",
        ]);
        let results = parse_search_response(&body, 30).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].website, "www.hipvan.com");
        assert_eq!(results[0].position, 1);
        assert_eq!(results[1].website, "urbanmood.sg");
        assert_eq!(results[1].position, 2);
        assert_eq!(
            results[1].snapshot.as_deref(),
            Some("https://serpapi.com/searches/abc.html")
        );
    }

    #[test]
    fn test_parse_skips_missing_links() {
        let body = json!({
            "organic_results": [
                { "position": 1 },
                { "position": 2, "link": "https://a.com/one" },
                { "position": 3, "link": "" },
                { "position": 4, "link": "https://b.com/two" },
            ]
        })
        .to_string();

        let results = parse_search_response(&body, 30).unwrap();
        let positions: Vec<u32> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2]);
        assert!(results.iter().all(|r| r.snapshot.is_none()));
    }

    #[test]
    fn test_parse_caps_at_thirty() {
        let links: Vec<String> = (0..40).map(|i| format!("https://site{}.com/", i)).collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let results = parse_search_response(&search_body(&refs), 100).unwrap();

        assert_eq!(results.len(), MAX_RESULTS);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.position, i as u32 + 1);
        }
    }

    #[test]
    fn test_parse_error_bodies() {
        let empty = json!({ "error": "Google hasn't returned any results for this query." });
        assert!(parse_search_response(&empty.to_string(), 30)
            .unwrap()
            .is_empty());

        let quota = json!({ "error": "Your account has run out of searches." });
        let err = parse_search_response(&quota.to_string(), 30).unwrap_err();
        assert!(err.is_quota_exhausted());

        let invalid = json!({ "error": "Invalid API key." });
        assert!(matches!(
            parse_search_response(&invalid.to_string(), 30),
            Err(ApiError::Api(_))
        ));

        assert!(matches!(
            parse_search_response("<html>", 30),
            Err(ApiError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_search_sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("engine", "google"))
            .and(query_param("q", "coffee table"))
            .and(query_param("google_domain", "google.com.sg"))
            .and(query_param("gl", "sg"))
            .and(query_param("hl", "en"))
            .and(query_param("num", "30"))
            .and(query_param("api_key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(search_body(&["https://a.com/x"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new(settings_for(&server)).unwrap();
        let results = client.search("coffee table").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].website, "a.com");
    }

    #[tokio::test]
    async fn test_search_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "quota"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let client = SearchClient::new(settings_for(&server)).unwrap();

        let quota = client.search("quota").await.unwrap_err();
        assert!(quota.is_quota_exhausted());

        match client.search("broken").await.unwrap_err() {
            ApiError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "oops");
            }
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let settings = SearchSettings {
            base_url: format!("http://127.0.0.1:{}/search.json", port),
            api_key: "test-key".to_string(),
            timeout_seconds: 5,
            ..SearchSettings::default()
        };
        let client = SearchClient::new(settings).unwrap();

        let err = client.search("coffee table").await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.failure_kind(), FetchFailure::TransportError);
        assert!(!err.is_quota_exhausted());
    }

    #[tokio::test]
    async fn test_account_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "plan_name": "Free Plan",
                "total_searches_left": 87,
                "account_email": "someone@example.com",
            })))
            .mount(&server)
            .await;

        let client = SearchClient::new(settings_for(&server)).unwrap();
        let account = client.account().await.unwrap();

        assert_eq!(account.plan_name, "Free Plan");
        assert_eq!(account.total_searches_left, 87);
    }
}
