//! Site and URL normalization.

use url::{form_urlencoded, Url};

/// Tracking parameters removed before keyword lookups.
///
/// Entries ending in `*` match by prefix.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &["srsltid", "gclid", "fbclid", "msclkid", "utm_*"];

/// Returns the lower-cased host of a URL or bare site string.
///
/// Accepts inputs with or without a scheme, e.g. `www.hipvan.com/furniture`
/// and `https://urbanmood.sg/` both normalize to their host.
pub fn site_of(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let parsed = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!("https://{}", input))
    };

    let url = parsed.ok()?;
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn is_tracking_param(key: &str, tracking_params: &[String]) -> bool {
    let key = key.to_lowercase();
    tracking_params.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    })
}

/// Strips tracking query parameters from a URL.
///
/// The keyword database indexes canonical URLs, so click ids would make
/// lookups miss. URLs without tracking parameters (or that fail to parse)
/// are returned unchanged.
pub fn canonicalize_url(raw: &str, tracking_params: &[String]) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };

    // Kept segments are copied verbatim so their encoding is untouched.
    let (removed, kept) = match url.query() {
        Some(query) => {
            let segments: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();
            let kept: Vec<&str> = segments
                .iter()
                .copied()
                .filter(|segment| !is_tracking_param(&segment_key(segment), tracking_params))
                .collect();
            (kept.len() < segments.len(), kept.join("&"))
        }
        None => return raw.to_string(),
    };

    if !removed {
        return raw.to_string();
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&kept));
    }

    url.to_string()
}

/// Decoded key of a raw `key=value` query segment.
fn segment_key(segment: &str) -> String {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        DEFAULT_TRACKING_PARAMS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_site_of() {
        assert_eq!(
            site_of("https://urbanmood.sg/").as_deref(),
            Some("urbanmood.sg")
        );
        assert_eq!(
            site_of("www.hipvan.com/furniture-all").as_deref(),
            Some("www.hipvan.com")
        );
        assert_eq!(
            site_of("  WWW.ComfortFurniture.com.sg  ").as_deref(),
            Some("www.comfortfurniture.com.sg")
        );
        assert_eq!(site_of(""), None);
        assert_eq!(site_of("   "), None);
    }

    #[test]
    fn test_canonicalize_strips_click_id() {
        let url = "https://www.hipvan.com/furniture/coffee-tables?srsltid=AfmBOoq123";
        assert_eq!(
            canonicalize_url(url, &defaults()),
            "https://www.hipvan.com/furniture/coffee-tables"
        );
    }

    #[test]
    fn test_canonicalize_keeps_other_params() {
        let url = "https://shop.example.com/list?color=red&utm_source=google&page=2";
        assert_eq!(
            canonicalize_url(url, &defaults()),
            "https://shop.example.com/list?color=red&page=2"
        );
    }

    #[test]
    fn test_canonicalize_preserves_kept_encoding() {
        let url = "https://shop.example.com/search?q=coffee%20table&gclid=abc&tag=a%2Bb";
        assert_eq!(
            canonicalize_url(url, &defaults()),
            "https://shop.example.com/search?q=coffee%20table&tag=a%2Bb"
        );

        let encoded_key = "https://shop.example.com/list?utm%5Fsource=x&page=2";
        assert_eq!(
            canonicalize_url(encoded_key, &defaults()),
            "https://shop.example.com/list?page=2"
        );
    }

    #[test]
    fn test_canonicalize_unchanged() {
        let url = "https://www.islandliving.sg/collections/coffee-side-tables";
        assert_eq!(canonicalize_url(url, &defaults()), url);

        let with_query = "https://example.com/search?q=table";
        assert_eq!(canonicalize_url(with_query, &defaults()), with_query);

        assert_eq!(canonicalize_url("not a url", &defaults()), "not a url");
    }
}
