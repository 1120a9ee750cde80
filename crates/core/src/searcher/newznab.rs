//! Newznab API client.
//!
//! One client shared across indexers; per-call parameters come from the
//! indexer row. Responses are accepted in both the RSS/XML and JSON shapes,
//! since "Newznab-compatible" covers a wide spread of implementations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::redact::redact;
use crate::registry::Indexer;

use super::types::{IndexerQuery, RawRelease, SearchError};

const RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 8_000;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub struct NewznabClient {
    client: Client,
}

impl NewznabClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Run one query against one indexer with retry on transient failures.
    pub async fn search(
        &self,
        indexer: &Indexer,
        query: &IndexerQuery,
        maxage_days: u32,
        limit: u32,
    ) -> Result<Vec<RawRelease>, SearchError> {
        let url = self.build_url(indexer, query, maxage_days, limit);
        let correlation_id = Uuid::new_v4();
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut last_err = SearchError::Unavailable("retries exhausted".to_string());

        for attempt in 1..=RETRIES {
            debug!(
                indexer = %indexer.name,
                correlation_id = %correlation_id,
                attempt,
                query = query.q(),
                "Newznab search"
            );
            match self.try_search(indexer, &url).await {
                Ok(items) => {
                    debug!(
                        indexer = %indexer.name,
                        correlation_id = %correlation_id,
                        results = items.len(),
                        "Newznab search complete"
                    );
                    return Ok(items);
                }
                Err(e) if e.is_retryable() && attempt < RETRIES => {
                    warn!(
                        indexer = %indexer.name,
                        correlation_id = %correlation_id,
                        attempt,
                        error = %redact(&e.to_string()),
                        "Newznab search failed, retrying"
                    );
                    tokio::time::sleep(with_jitter(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_MS);
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn try_search(
        &self,
        indexer: &Indexer,
        url: &str,
    ) -> Result<Vec<RawRelease>, SearchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SearchError::AuthRejected)
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(SearchError::RateLimited),
            s if s.is_server_error() => {
                return Err(SearchError::Unavailable(format!("HTTP {s}")))
            }
            s if s.is_client_error() => {
                return Err(SearchError::BadRequest(format!("HTTP {s}")))
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        let trimmed = body.trim_start();
        if content_type.contains("json") || trimmed.starts_with('{') {
            parse_json_items(&body, indexer)
        } else {
            parse_rss_items(&body, indexer)
        }
    }

    fn build_url(
        &self,
        indexer: &Indexer,
        query: &IndexerQuery,
        maxage_days: u32,
        limit: u32,
    ) -> String {
        let base = indexer.base_url.trim_end_matches('/');
        let mut url = match query {
            IndexerQuery::Text { q } => format!(
                "{base}/api?t=search&q={}",
                urlencoding::encode(q)
            ),
            IndexerQuery::Tv { q, season, ep } => format!(
                "{base}/api?t=tvsearch&q={}&season={season}&ep={ep}",
                urlencoding::encode(q)
            ),
        };
        if let Some(key) = &indexer.api_key {
            url.push_str(&format!("&apikey={}", urlencoding::encode(key)));
        }
        if !indexer.category_ids.is_empty() {
            let cats = indexer
                .category_ids
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",");
            url.push_str(&format!("&cat={cats}"));
        }
        url.push_str(&format!("&maxage={maxage_days}&limit={limit}&offset=0"));
        url
    }

    /// `t=caps` probe, plus a lightweight authenticated search when an API
    /// key is configured (a caps page alone does not validate the key on
    /// most indexers).
    pub async fn test_connection(&self, indexer: &Indexer) -> Result<(), SearchError> {
        let base = indexer.base_url.trim_end_matches('/');
        let mut url = format!("{base}/api?t=caps");
        if let Some(key) = &indexer.api_key {
            url.push_str(&format!("&apikey={}", urlencoding::encode(key)));
        }

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Unavailable(e.to_string())
            }
        })?;

        if response.status() != StatusCode::OK {
            return Err(SearchError::Unavailable(format!(
                "HTTP {} from caps",
                response.status()
            )));
        }
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;
        let lower = body.to_lowercase();

        if content_type.contains("text/html") {
            return Err(SearchError::Parse(
                "HTML response; check API URL".to_string(),
            ));
        }
        if lower.contains("<error") || (lower.contains("apikey") && lower.contains("invalid")) {
            return Err(SearchError::AuthRejected);
        }
        if !lower.contains("<caps") && !lower.contains("\"caps\"") {
            return Err(SearchError::Parse(
                "response carries no caps element".to_string(),
            ));
        }

        if indexer.api_key.is_some() {
            let probe = IndexerQuery::Text {
                q: "f1".to_string(),
            };
            self.search(indexer, &probe, 30, 1).await?;
        }
        Ok(())
    }
}

impl Default for NewznabClient {
    fn default() -> Self {
        Self::new()
    }
}

fn with_jitter(backoff_ms: u64) -> Duration {
    // +/- 25%
    let jitter = backoff_ms / 4;
    let low = backoff_ms - jitter;
    let high = backoff_ms + jitter;
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

/// Parse the RSS/XML response shape.
fn parse_rss_items(xml: &str, indexer: &Indexer) -> Result<Vec<RawRelease>, SearchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_item = false;
    let mut current_tag: Option<String> = None;
    let mut title = String::new();
    let mut link = String::new();
    let mut pub_date: Option<DateTime<Utc>> = None;
    let mut size: Option<u64> = None;
    let mut category: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    in_item = true;
                    title.clear();
                    link.clear();
                    pub_date = None;
                    size = None;
                    category = None;
                } else if in_item {
                    current_tag = Some(name);
                }
            }
            Ok(XmlEvent::Empty(e)) if in_item => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                // <enclosure url=... length=...> and <newznab:attr name=... value=...>
                let mut attr_name = None;
                let mut attr_value = None;
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match (name.as_str(), key.as_str()) {
                        ("enclosure", "url") if link.is_empty() => link = value,
                        ("enclosure", "length") => size = size.or_else(|| value.parse().ok()),
                        (_, "name") => attr_name = Some(value),
                        (_, "value") => attr_value = Some(value),
                        _ => {}
                    }
                }
                if name.ends_with("attr") {
                    if let (Some(n), Some(v)) = (attr_name, attr_value) {
                        match n.as_str() {
                            "size" => size = size.or_else(|| v.parse().ok()),
                            "category" => category = category.or(Some(v)),
                            _ => {}
                        }
                    }
                }
            }
            Ok(XmlEvent::Text(e)) if in_item => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_tag.as_deref() {
                    Some("title") => title = text,
                    Some("link") => link = text,
                    Some("pubDate") => {
                        pub_date = DateTime::parse_from_rfc2822(&text)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc))
                            .or_else(|| {
                                DateTime::parse_from_rfc3339(&text)
                                    .ok()
                                    .map(|dt| dt.with_timezone(&Utc))
                            });
                    }
                    Some("size") => size = size.or_else(|| text.parse().ok()),
                    Some("category") => category = category.or(Some(text)),
                    _ => {}
                }
            }
            Ok(XmlEvent::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    in_item = false;
                    if !title.is_empty() && !link.is_empty() {
                        items.push(RawRelease {
                            title: title.clone(),
                            nzb_url: link.clone(),
                            indexer_id: indexer.id,
                            indexer_name: indexer.name.clone(),
                            size_bytes: size.unwrap_or(0),
                            pub_date,
                            category: category.clone(),
                        });
                    }
                } else {
                    current_tag = None;
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(SearchError::Parse(e.to_string())),
            _ => {}
        }
    }

    Ok(items)
}

/// Parse the JSON response shape some indexers serve.
fn parse_json_items(json: &str, indexer: &Indexer) -> Result<Vec<RawRelease>, SearchError> {
    #[derive(Deserialize)]
    struct JsonResponse {
        #[serde(default)]
        channel: Option<JsonChannel>,
        #[serde(default)]
        item: Option<Vec<JsonItem>>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    }

    #[derive(Deserialize)]
    struct JsonChannel {
        #[serde(default)]
        item: Option<Vec<JsonItem>>,
    }

    #[derive(Deserialize)]
    struct JsonItem {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        link: Option<String>,
        #[serde(default, rename = "pubDate")]
        pub_date: Option<String>,
        #[serde(default)]
        size: Option<serde_json::Value>,
        #[serde(default)]
        category: Option<serde_json::Value>,
        #[serde(default)]
        enclosure: Option<JsonEnclosure>,
    }

    #[derive(Deserialize)]
    struct JsonEnclosure {
        #[serde(default)]
        #[serde(rename = "@attributes")]
        attributes: Option<JsonEnclosureAttrs>,
        #[serde(default)]
        url: Option<String>,
    }

    #[derive(Deserialize)]
    struct JsonEnclosureAttrs {
        #[serde(default)]
        url: Option<String>,
    }

    let parsed: JsonResponse =
        serde_json::from_str(json).map_err(|e| SearchError::Parse(e.to_string()))?;
    if let Some(error) = parsed.error {
        return Err(SearchError::BadRequest(error.to_string()));
    }

    let items = parsed
        .channel
        .and_then(|c| c.item)
        .or(parsed.item)
        .unwrap_or_default();

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let title = item.title?;
            let link = item
                .link
                .or_else(|| {
                    item.enclosure.and_then(|e| {
                        e.url.or_else(|| e.attributes.and_then(|a| a.url))
                    })
                })?;
            let size_bytes = item
                .size
                .and_then(|v| match v {
                    serde_json::Value::Number(n) => n.as_u64(),
                    serde_json::Value::String(s) => s.parse().ok(),
                    _ => None,
                })
                .unwrap_or(0);
            Some(RawRelease {
                title,
                nzb_url: link,
                indexer_id: indexer.id,
                indexer_name: indexer.name.clone(),
                size_bytes,
                pub_date: item.pub_date.and_then(|d| {
                    DateTime::parse_from_rfc2822(&d)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc))
                }),
                category: item.category.map(|c| match c {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IndexerKind;

    fn indexer() -> Indexer {
        Indexer {
            id: 1,
            name: "nzbfinder".to_string(),
            kind: IndexerKind::Newznab,
            base_url: "https://nzbfinder.example/".to_string(),
            api_key: Some("secret-key".to_string()),
            category_ids: vec![5070, 5080],
            priority: 0,
            enabled: true,
            last_error: None,
        }
    }

    #[test]
    fn test_build_url_text_search() {
        let client = NewznabClient::new();
        let query = IndexerQuery::Text {
            q: "Formula 1 2025 Bahrain Qualifying".to_string(),
        };
        let url = client.build_url(&indexer(), &query, 14, 50);

        assert!(url.starts_with("https://nzbfinder.example/api?t=search"));
        assert!(url.contains("q=Formula%201%202025%20Bahrain%20Qualifying"));
        assert!(url.contains("apikey=secret-key"));
        assert!(url.contains("cat=5070,5080"));
        assert!(url.contains("maxage=14"));
        assert!(url.contains("limit=50"));
    }

    #[test]
    fn test_build_url_tvsearch() {
        let client = NewznabClient::new();
        let query = IndexerQuery::Tv {
            q: "Formula 1 Qualifying".to_string(),
            season: 2025,
            ep: 3,
        };
        let url = client.build_url(&indexer(), &query, 7, 50);
        assert!(url.contains("t=tvsearch"));
        assert!(url.contains("season=2025"));
        assert!(url.contains("ep=3"));
    }

    #[test]
    fn test_parse_rss_items() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:newznab="http://www.newznab.com/DTD/2010/feeds/attributes/">
  <channel>
    <item>
      <title>Formula.1.2025.Round03.Bahrain.Qualifying.1080p.x265-NTb</title>
      <link>https://nzbfinder.example/get/abc123</link>
      <pubDate>Sat, 15 Mar 2025 17:01:00 +0000</pubDate>
      <enclosure url="https://nzbfinder.example/get/abc123.nzb" length="2147483648" type="application/x-nzb"/>
      <newznab:attr name="size" value="2147483648"/>
      <newznab:attr name="category" value="5080"/>
    </item>
    <item>
      <title>F1 2025 Bahrain Qualifying Preview 720p</title>
      <link>https://nzbfinder.example/get/def456</link>
      <size>734003200</size>
    </item>
  </channel>
</rss>"#;
        let items = parse_rss_items(xml, &indexer()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].title,
            "Formula.1.2025.Round03.Bahrain.Qualifying.1080p.x265-NTb"
        );
        assert_eq!(items[0].nzb_url, "https://nzbfinder.example/get/abc123");
        assert_eq!(items[0].size_bytes, 2147483648);
        assert!(items[0].pub_date.is_some());
        assert_eq!(items[1].size_bytes, 734003200);
    }

    #[test]
    fn test_parse_rss_skips_incomplete_items() {
        let xml = r#"<rss><channel><item><title>no link here</title></item></channel></rss>"#;
        let items = parse_rss_items(xml, &indexer()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_json_items() {
        let json = r#"{
  "channel": {
    "item": [
      {
        "title": "Formula.1.2025.Round03.Bahrain.Race.1080p.x264-F1C",
        "link": "https://nzbfinder.example/get/xyz",
        "pubDate": "Sun, 16 Mar 2025 17:05:00 +0000",
        "size": "3221225472"
      }
    ]
  }
}"#;
        let items = parse_json_items(json, &indexer()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].size_bytes, 3221225472);
    }

    #[test]
    fn test_parse_json_error_payload() {
        let json = r#"{"error": {"code": 100, "description": "Incorrect user credentials"}}"#;
        let result = parse_json_items(json, &indexer());
        assert!(matches!(result, Err(SearchError::BadRequest(_))));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        for _ in 0..100 {
            let d = with_jitter(1000).as_millis() as u64;
            assert!((750..=1250).contains(&d));
        }
    }
}
