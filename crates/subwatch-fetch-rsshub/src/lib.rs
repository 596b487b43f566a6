// # RSSHub Fetcher
//
// This crate provides a Fetcher backed by an RSSHub-style HTTP endpoint.
//
// ## Purpose
//
// RSSHub exposes hundreds of routes (live rooms, user timelines) under one
// base URL and can serve each route as `{title, item: [...]}` JSON. This
// fetcher requests `{base_url}{fetch_key}` and maps the payload into the
// engine's item model. No page scraping happens here; the endpoint does the
// aggregation.
//
// ## Architecture
//
// One HTTP request per fetch, no retries, no caching: the engine owns the
// schedule and treats the next tick as the retry.

use subwatch_core::ComponentRegistry;
use subwatch_core::config::FetcherConfig;
use subwatch_core::traits::{FetchResult, Fetcher, FetcherFactory, Item};
use subwatch_core::{Error, Result};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// HTTP request timeout for the underlying client
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Wire payload served by an RSSHub endpoint in JSON mode
#[derive(Debug, Deserialize)]
struct FeedPayload {
    #[serde(default)]
    #[allow(dead_code)]
    title: String,
    #[serde(default)]
    item: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(default)]
    link: String,
}

/// Fetcher backed by an RSSHub-style endpoint
pub struct RsshubFetcher {
    /// Base URL of the endpoint (no trailing slash)
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl RsshubFetcher {
    /// Create a new RSSHub fetcher
    ///
    /// # Parameters
    ///
    /// - `base_url`: Endpoint base URL (e.g., "http://localhost:1200")
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/{}", self.base_url, key)
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for RsshubFetcher {
    async fn fetch(&self, key: &str) -> Result<FetchResult> {
        let url = self.url_for(key);

        let response = self
            .client
            .get(&url)
            .query(&[("format", "json")])
            .send()
            .await
            .map_err(|e| Error::fetch(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::fetch(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let payload: FeedPayload = response
            .json()
            .await
            .map_err(|e| Error::fetch(format!("bad payload from {}: {}", url, e)))?;

        Ok(FetchResult::new(key, to_items(payload)))
    }

    fn fetcher_name(&self) -> &'static str {
        "rsshub"
    }
}

/// Map a wire payload into items, most-recent first
fn to_items(payload: FeedPayload) -> Vec<Item> {
    let mut items: Vec<Item> = payload
        .item
        .into_iter()
        .map(|entry| Item {
            published_at: parse_pub_date(entry.pub_date.as_deref()),
            title: entry.title,
            author: entry.author,
            description: entry.description,
            link: entry.link,
        })
        .collect();

    // Feeds usually arrive newest-first already; enforce it anyway since the
    // engine compares against items[0]. Stable, so equal times keep wire order.
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items
}

/// Parse an RSS `pubDate` (RFC 2822, with an RFC 3339 fallback)
///
/// An unparseable date degrades to the Unix epoch rather than dropping the
/// item: toggle sources only care that the item exists, and a zero timestamp
/// can never falsely win a strictly-greater comparison.
fn parse_pub_date(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    tracing::warn!("unparseable pubDate {:?}, treating as epoch", raw);
    DateTime::<Utc>::UNIX_EPOCH
}

/// Factory for creating RSSHub fetchers
pub struct RsshubFactory;

impl FetcherFactory for RsshubFactory {
    fn create(&self, config: &FetcherConfig) -> Result<Box<dyn Fetcher>> {
        match config {
            FetcherConfig::Rsshub { base_url } => Ok(Box::new(RsshubFetcher::new(base_url))),
            _ => Err(Error::config("invalid config for RSSHub fetcher")),
        }
    }
}

/// Register the RSSHub fetcher with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_fetcher("rsshub", Box::new(RsshubFactory));
}
