// # Fetcher Trait
//
// Defines the interface for retrieving the latest items for a watched source.
//
// ## Implementations
//
// - RSSHub endpoint: `subwatch-fetch-rsshub` crate
// - Future: JSON Feed endpoints, platform APIs
//
// ## Usage
//
// ```rust,ignore
// use subwatch_core::Fetcher;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let fetcher = /* Fetcher implementation */;
//
//     let result = fetcher.fetch("/bilibili/live/room/2529408").await?;
//     println!("{} item(s)", result.items.len());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a watched source
///
/// Produced by the Fetcher, immutable, used only for comparison and message
/// formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item title
    pub title: String,
    /// Item author
    pub author: String,
    /// Item description/body
    pub description: String,
    /// Publish time
    pub published_at: DateTime<Utc>,
    /// Link to the item
    pub link: String,
}

/// Result of one fetch for a source
///
/// `items` is ordered most-recent first; an empty list is a valid result
/// (e.g., a live room that is currently offline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// The fetch key this result was produced for
    pub key: String,
    /// Items, most-recent first
    pub items: Vec<Item>,
}

impl FetchResult {
    /// Create a new fetch result
    pub fn new(key: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            key: key.into(),
            items,
        }
    }

    /// The most recent item, if any
    pub fn newest(&self) -> Option<&Item> {
        self.items.first()
    }
}

/// Trait for fetcher implementations
///
/// Implementations must be thread-safe and usable across async tasks; the
/// engine calls `fetch` concurrently for independent sources.
///
/// Fetchers are **observers, not decision-makers**:
///
/// - ✅ Perform the network/API call for one key and map the payload
/// - ❌ Implement retry logic (the next scheduled tick is the retry)
/// - ❌ Access the state store or decide whether something changed
/// - ❌ Spawn background tasks (the engine owns the polling schedule)
///
/// A fetcher that cannot produce a result returns [`crate::Error::Fetch`];
/// the engine additionally wraps every call in a timeout.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the current items for a source key
    ///
    /// # Parameters
    ///
    /// - `key`: The fetch key from the source configuration
    ///
    /// # Returns
    ///
    /// - `Ok(FetchResult)`: The current items, most-recent first
    /// - `Err(Error)`: If the fetch failed (network, payload, upstream)
    async fn fetch(&self, key: &str) -> Result<FetchResult, crate::Error>;

    /// Get the fetcher name (for logging/debugging)
    fn fetcher_name(&self) -> &'static str;
}

/// Helper trait for constructing fetchers from configuration
pub trait FetcherFactory: Send + Sync {
    /// Create a Fetcher instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this fetcher type
    ///
    /// # Returns
    ///
    /// A boxed Fetcher trait object
    fn create(
        &self,
        config: &crate::config::FetcherConfig,
    ) -> Result<Box<dyn Fetcher>, crate::Error>;
}
