//! Keyword-database API client (SEMrush-compatible).
//!
//! The API answers with a semicolon-delimited table: a header row followed
//! by one row per keyword, CRLF line endings. Errors come back as a
//! `ERROR <code> :: <message>` body, usually with a 200 status.

use crate::api::{build_http_client, read_success_body, truncate_body, ApiError};
use crate::domain::{canonicalize_url, DEFAULT_TRACKING_PARAMS};
use crate::models::{KeywordHit, RankedKeyword, TargetUrl};
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_KEYWORDS_URL: &str = "https://api.semrush.com/";

/// Columns requested: keyword, position, volume, CPC, competition.
pub const EXPORT_COLUMNS: &str = "Ph,Po,Nq,Cp,Co";

pub const COLUMN_KEYWORD: &str = "Keyword";
pub const COLUMN_POSITION: &str = "Position";
pub const COLUMN_SEARCH_VOLUME: &str = "Search Volume";
pub const COLUMN_CPC: &str = "CPC";
pub const COLUMN_COMPETITION: &str = "Competition";

/// "Nothing found" is a successful empty answer.
const ERROR_NOTHING_FOUND: u32 = 50;

/// Units balance is zero, trial over, total limit exceeded.
const QUOTA_ERROR_CODES: &[u32] = &[132, 133, 134];

/// One data row keyed by header name.
pub type KeywordRecord = BTreeMap<String, String>;

/// Immutable settings for the keyword client.
#[derive(Debug, Clone)]
pub struct KeywordSettings {
    pub base_url: String,
    pub api_key: String,
    /// Regional database, e.g. `sg`.
    pub database: String,
    pub display_limit: usize,
    /// Keywords ranked below this position are dropped.
    pub max_position: u32,
    pub tracking_params: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_KEYWORDS_URL.to_string(),
            api_key: String::new(),
            database: "sg".to_string(),
            display_limit: 30,
            max_position: 20,
            tracking_params: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_seconds: 60,
        }
    }
}

/// Client for per-URL ranking keywords.
pub struct KeywordClient {
    settings: KeywordSettings,
    http: reqwest::Client,
}

impl KeywordClient {
    pub fn new(settings: KeywordSettings) -> Result<Self, ApiError> {
        let http = build_http_client(settings.timeout_seconds)?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &KeywordSettings {
        &self.settings
    }

    /// Fetch the keywords `url` ranks for, keeping positions <= `max_position`.
    pub async fn ranking_keywords(&self, url: &str) -> Result<Vec<RankedKeyword>, ApiError> {
        let limit = self.settings.display_limit.to_string();
        debug!("Looking up ranking keywords for {}", url);

        let response = self
            .http
            .get(&self.settings.base_url)
            .query(&[
                ("type", "subfolder_organic"),
                ("key", self.settings.api_key.as_str()),
                ("display_limit", limit.as_str()),
                ("export_columns", EXPORT_COLUMNS),
                ("subfolder", url),
                ("database", self.settings.database.as_str()),
            ])
            .send()
            .await?;

        let body = read_success_body(response).await?;
        if !has_data(&body)? {
            debug!("No ranking keywords for {}", url);
            return Ok(Vec::new());
        }

        let keywords: Vec<RankedKeyword> = parse_keyword_table(&body)?
            .iter()
            .filter_map(ranked_keyword)
            .filter(|k| k.position <= self.settings.max_position)
            .collect();
        debug!("{} ranks for {} keywords", url, keywords.len());

        Ok(keywords)
    }

    /// Keyword rows for one selected target.
    ///
    /// Placeholders skip the API and yield the single `N/A` sentinel row.
    pub async fn keywords_for_target(
        &self,
        target_index: usize,
        target: &TargetUrl,
    ) -> Result<Vec<KeywordHit>, ApiError> {
        let Some(ranking_url) = target.ranking_url.as_deref() else {
            return Ok(vec![KeywordHit::placeholder(target_index, target)]);
        };

        let canonical = canonicalize_url(ranking_url, &self.settings.tracking_params);
        let keywords = self.ranking_keywords(&canonical).await?;

        Ok(keywords
            .into_iter()
            .map(|keyword| KeywordHit::ranked(target_index, &target.website, &canonical, keyword))
            .collect())
    }
}

/// Inspect a body for an `ERROR nn :: message` answer.
///
/// Returns `Ok(false)` when the database found nothing for the URL.
fn has_data(body: &str) -> Result<bool, ApiError> {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("ERROR") else {
        return Ok(true);
    };

    let code = rest
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse::<u32>().ok());

    match code {
        Some(ERROR_NOTHING_FOUND) => Ok(false),
        Some(code) if QUOTA_ERROR_CODES.contains(&code) => {
            Err(ApiError::QuotaExhausted(truncate_body(trimmed)))
        }
        _ => Err(ApiError::Api(truncate_body(trimmed))),
    }
}

/// Parse a semicolon-delimited table into records keyed by header.
///
/// Blank rows are skipped. Rows shorter than the header only carry the
/// columns they have.
pub fn parse_keyword_table(body: &str) -> Result<Vec<KeywordRecord>, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push(
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }

    Ok(records)
}

/// Convert a raw record into a typed keyword.
///
/// Records without a keyword or a numeric position are skipped; missing
/// metrics default to zero.
pub fn ranked_keyword(record: &KeywordRecord) -> Option<RankedKeyword> {
    let keyword = record.get(COLUMN_KEYWORD).filter(|k| !k.is_empty())?;
    let position = match record.get(COLUMN_POSITION)?.parse::<u32>() {
        Ok(position) => position,
        Err(_) => {
            debug!("Skipping '{}': unparsable position", keyword);
            return None;
        }
    };

    let number = |column: &str| record.get(column).and_then(|v| v.parse::<f64>().ok());

    Some(RankedKeyword {
        keyword: keyword.clone(),
        position,
        search_volume: record
            .get(COLUMN_SEARCH_VOLUME)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0),
        cpc: number(COLUMN_CPC).unwrap_or(0.0),
        competition: number(COLUMN_COMPETITION).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, NOT_AVAILABLE};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HEADER: &str = "Keyword;Position;Search Volume;CPC;Competition";

    fn settings_for(server: &MockServer) -> KeywordSettings {
        KeywordSettings {
            base_url: format!("{}/", server.uri()),
            api_key: "semrush-key".to_string(),
            timeout_seconds: 5,
            ..KeywordSettings::default()
        }
    }

    #[test]
    fn test_parse_single_row() {
        let body = format!("{}\r\ntable;1;5400;0.73;1.00\r\n", HEADER);
        let records = parse_keyword_table(&body).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.len(), 5);
        assert_eq!(record["Keyword"], "table");
        assert_eq!(record["Position"], "1");
        assert_eq!(record["Search Volume"], "5400");
        assert_eq!(record["CPC"], "0.73");
        assert_eq!(record["Competition"], "1.00");
    }

    #[test]
    fn test_parse_empty_and_header_only() {
        assert!(parse_keyword_table("").unwrap().is_empty());
        assert!(parse_keyword_table(HEADER).unwrap().is_empty());
        assert!(parse_keyword_table(&format!("{}\r\n\r\n", HEADER))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_bom_short_rows_and_quotes() {
        let body = format!(
            "\u{feff}{}\r\n  \"cheap\" table ; 7 ;880\r\n;;;;\r\n",
            HEADER
        );
        let records = parse_keyword_table(&body).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["Keyword"], "\"cheap\" table");
        assert_eq!(record["Position"], "7");
        assert_eq!(record["Search Volume"], "880");
        assert!(!record.contains_key("CPC"));
    }

    #[test]
    fn test_ranked_keyword_conversion() {
        let body = format!(
            "{}\r\ncoffee table;1;5400;0.73;1.00\r\nbroken;n/a;10;0.1;0.1\r\nside table;4;2900;;1.00",
            HEADER
        );
        let keywords: Vec<RankedKeyword> = parse_keyword_table(&body)
            .unwrap()
            .iter()
            .filter_map(ranked_keyword)
            .collect();

        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].keyword, "coffee table");
        assert_eq!(keywords[0].search_volume, 5400);
        assert_eq!(keywords[0].cpc, 0.73);
        assert_eq!(keywords[1].keyword, "side table");
        assert_eq!(keywords[1].cpc, 0.0);
    }

    #[test]
    fn test_has_data() {
        assert!(has_data(HEADER).unwrap());
        assert!(!has_data("ERROR 50 :: NOTHING FOUND\n").unwrap());
        assert!(has_data("ERROR 132 :: API UNITS BALANCE IS ZERO")
            .unwrap_err()
            .is_quota_exhausted());
        assert!(matches!(
            has_data("ERROR 120 :: WRONG KEY - ID PAIR"),
            Err(ApiError::Api(_))
        ));
    }

    #[tokio::test]
    async fn test_ranking_keywords_filters_positions() {
        let server = MockServer::start().await;
        let body = format!(
            "{}\r\ncoffee table;1;5400;0.73;1.00\r\nside table;20;2900;0.72;1.00\r\nsmall table;21;1600;0.47;1.00\r\n",
            HEADER
        );
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("type", "subfolder_organic"))
            .and(query_param("key", "semrush-key"))
            .and(query_param("display_limit", "30"))
            .and(query_param("export_columns", "Ph,Po,Nq,Cp,Co"))
            .and(query_param("subfolder", "https://www.hipvan.com/coffee-tables"))
            .and(query_param("database", "sg"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = KeywordClient::new(settings_for(&server)).unwrap();
        let keywords = client
            .ranking_keywords("https://www.hipvan.com/coffee-tables")
            .await
            .unwrap();

        let names: Vec<&str> = keywords.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(names, vec!["coffee table", "side table"]);
    }

    #[tokio::test]
    async fn test_ranking_keywords_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("subfolder", "https://nothing.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ERROR 50 :: NOTHING FOUND"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("subfolder", "https://quota.com/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("ERROR 132 :: API UNITS BALANCE IS ZERO"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("subfolder", "https://down.com/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = KeywordClient::new(settings_for(&server)).unwrap();

        assert!(client
            .ranking_keywords("https://nothing.com/")
            .await
            .unwrap()
            .is_empty());
        assert!(client
            .ranking_keywords("https://quota.com/")
            .await
            .unwrap_err()
            .is_quota_exhausted());
        assert!(matches!(
            client.ranking_keywords("https://down.com/").await,
            Err(ApiError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_keywords_for_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("subfolder", "https://urbanmood.sg/tables"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("{}\r\ncoffee table;3;5400;0.73;1.00\r\n", HEADER)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = KeywordClient::new(settings_for(&server)).unwrap();

        let target = TargetUrl {
            website: "urbanmood.sg".to_string(),
            ranking_url: Some("https://urbanmood.sg/tables?srsltid=xyz".to_string()),
            position: Position::Ranked(2),
            snapshot: None,
        };
        let hits = client.keywords_for_target(0, &target).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ranking_url.as_deref(), Some("https://urbanmood.sg/tables"));
        assert_eq!(hits[0].position, Position::Ranked(3));

        let placeholder = TargetUrl::placeholder("hipvan.com", None);
        let hits = client.keywords_for_target(1, &placeholder).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].keyword, NOT_AVAILABLE);
        assert_eq!(hits[0].search_volume, 0);
        assert_eq!(hits[0].position, Position::NotRanked);
    }
}
