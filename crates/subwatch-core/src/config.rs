//! Configuration types for the subscription watcher
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Fetcher configuration
    pub fetcher: FetcherConfig,

    /// Broadcaster configuration
    pub broadcaster: BroadcasterConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Sources to watch
    pub sources: Vec<SourceConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WatchConfig {
    /// Validate the configuration
    ///
    /// Configuration errors are fatal: they are reported before the engine
    /// spawns any polling task.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.sources.is_empty() {
            return Err(crate::Error::config("no sources configured"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.id.as_str()) {
                return Err(crate::Error::config(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
        }

        self.fetcher.validate()?;
        self.broadcaster.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// RSSHub-style HTTP endpoint returning `{title, item[]}` JSON
    Rsshub {
        /// Base URL of the endpoint (e.g., "http://localhost:1200")
        base_url: String,
    },

    /// Custom fetcher
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl FetcherConfig {
    /// Validate the fetcher configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            FetcherConfig::Rsshub { base_url } => {
                if base_url.is_empty() {
                    return Err(crate::Error::config("fetcher base URL cannot be empty"));
                }
                Ok(())
            }
            FetcherConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "custom fetcher factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config("custom fetcher config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the fetcher type name
    pub fn type_name(&self) -> &str {
        match self {
            FetcherConfig::Rsshub { .. } => "rsshub",
            FetcherConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Broadcaster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcasterConfig {
    /// Webhook broadcaster: POSTs the message text to every URL
    Webhook {
        /// Webhook endpoints to deliver to
        urls: Vec<String>,
    },

    /// Custom broadcaster
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl BroadcasterConfig {
    /// Validate the broadcaster configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BroadcasterConfig::Webhook { urls } => {
                if urls.is_empty() {
                    return Err(crate::Error::config(
                        "webhook broadcaster needs at least one URL",
                    ));
                }
                for url in urls {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err(crate::Error::config(format!(
                            "webhook URL must use http or https: {}",
                            url
                        )));
                    }
                }
                Ok(())
            }
            BroadcasterConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "custom broadcaster factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "custom broadcaster config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the broadcaster type name
    pub fn type_name(&self) -> &str {
        match self {
            BroadcasterConfig::Webhook { .. } => "webhook",
            BroadcasterConfig::Custom { factory, .. } => factory,
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store (survives restarts)
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

/// Comparison policy for a source
///
/// Decides how a freshly fetched result is compared against the stored value:
/// a boolean flip (both transitions reportable) or a strictly increasing
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonPolicy {
    /// State is "has items" vs "has none"; any flip is reportable
    Toggle,
    /// State is the newest item's publish time; only strictly newer values fire
    MonotonicTimestamp,
}

/// Configuration for one watched source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source id (state store key)
    pub id: String,

    /// Key passed to the Fetcher (e.g., "/bilibili/live/room/2529408")
    pub fetch_key: String,

    /// Polling interval in seconds
    pub interval_secs: u64,

    /// Comparison policy used to detect a reportable change
    pub policy: ComparisonPolicy,

    /// Display name used in notification text (defaults to `id`)
    #[serde(default)]
    pub label: Option<String>,

    /// Whether this source is polled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceConfig {
    /// Create a new source configuration
    pub fn new(
        id: impl Into<String>,
        fetch_key: impl Into<String>,
        interval_secs: u64,
        policy: ComparisonPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            fetch_key: fetch_key.into(),
            interval_secs,
            policy,
            label: None,
            enabled: true,
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Enable or disable the source
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Polling interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Display name used in notification text
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.id.is_empty() {
            return Err(crate::Error::config("source id cannot be empty"));
        }
        if self.fetch_key.is_empty() {
            return Err(crate::Error::config(format!(
                "source {} has an empty fetch key",
                self.id
            )));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config(format!(
                "source {} interval must be > 0 seconds",
                self.id
            )));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout applied to every Fetcher call (in seconds)
    ///
    /// The external Fetcher is inherently unreliable; a hung fetch must not
    /// stall its source's schedule forever.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log) rather
    /// than blocking a polling cycle.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("fetch timeout must be > 0 seconds"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Fetch timeout as a [`Duration`]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}
