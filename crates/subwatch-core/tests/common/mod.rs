//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without implementing real functionality.

#![allow(dead_code)]

use chrono::DateTime;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use subwatch_core::config::{
    BroadcasterConfig, ComparisonPolicy, EngineConfig, FetcherConfig, SourceConfig,
    StateStoreConfig, WatchConfig,
};
use subwatch_core::error::Result;
use subwatch_core::traits::{
    Broadcaster, ComparisonValue, FetchResult, Fetcher, Item, SourceState, StateStore,
};

/// A fetcher whose per-key responses, failures and latency are controlled by
/// the test while the engine runs
pub struct ControlledFetcher {
    /// Current response per key
    responses: Arc<std::sync::Mutex<HashMap<String, std::result::Result<Vec<Item>, String>>>>,
    /// Fetch calls per key (counted when the fetch starts)
    fetch_counts: Arc<std::sync::Mutex<HashMap<String, usize>>>,
    /// Artificial latency per key
    delays: Arc<std::sync::Mutex<HashMap<String, Duration>>>,
    /// Currently in-flight fetches per key
    in_flight: Arc<std::sync::Mutex<HashMap<String, usize>>>,
    /// High-water mark of concurrent fetches per key
    max_in_flight: Arc<std::sync::Mutex<HashMap<String, usize>>>,
}

impl ControlledFetcher {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(std::sync::Mutex::new(HashMap::new())),
            fetch_counts: Arc::new(std::sync::Mutex::new(HashMap::new())),
            delays: Arc::new(std::sync::Mutex::new(HashMap::new())),
            in_flight: Arc::new(std::sync::Mutex::new(HashMap::new())),
            max_in_flight: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    /// Make fetches for `key` return these items
    pub fn set_items(&self, key: &str, items: Vec<Item>) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), Ok(items));
    }

    /// Make fetches for `key` fail
    pub fn set_failure(&self, key: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), Err(message.to_string()));
    }

    /// Add artificial latency to fetches for `key`
    pub fn set_delay(&self, key: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
    }

    /// How many fetches started for `key`
    pub fn fetch_count(&self, key: &str) -> usize {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// The most fetches ever in flight at once for `key`
    pub fn max_in_flight(&self, key: &str) -> usize {
        self.max_in_flight
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Create a new ControlledFetcher that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            responses: Arc::clone(&other.responses),
            fetch_counts: Arc::clone(&other.fetch_counts),
            delays: Arc::clone(&other.delays),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for ControlledFetcher {
    async fn fetch(&self, key: &str) -> Result<FetchResult> {
        {
            let mut counts = self.fetch_counts.lock().unwrap();
            *counts.entry(key.to_string()).or_insert(0) += 1;

            let mut in_flight = self.in_flight.lock().unwrap();
            let current = in_flight.entry(key.to_string()).or_insert(0);
            *current += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            let high = max.entry(key.to_string()).or_insert(0);
            if *current > *high {
                *high = *current;
            }
        }

        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.responses.lock().unwrap().get(key).cloned();

        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(current) = in_flight.get_mut(key) {
                *current -= 1;
            }
        }

        match outcome {
            Some(Ok(items)) => Ok(FetchResult::new(key, items)),
            Some(Err(message)) => Err(subwatch_core::Error::fetch(message)),
            None => Err(subwatch_core::Error::fetch("no response configured")),
        }
    }

    fn fetcher_name(&self) -> &'static str {
        "controlled"
    }
}

/// A broadcaster that records delivered messages and can be told to fail
pub struct CountingBroadcaster {
    /// Messages that were delivered
    messages: Arc<std::sync::Mutex<Vec<String>>>,
    /// Delivery attempts (including failed ones)
    attempts: Arc<AtomicUsize>,
    /// When set, every send fails
    fail_all: Arc<AtomicBool>,
}

impl CountingBroadcaster {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(std::sync::Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            fail_all: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the delivered messages
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Get the number of delivery attempts
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make every send fail (or succeed again)
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Create a new CountingBroadcaster that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            messages: Arc::clone(&other.messages),
            attempts: Arc::clone(&other.attempts),
            fail_all: Arc::clone(&other.fail_all),
        }
    }
}

#[async_trait::async_trait]
impl Broadcaster for CountingBroadcaster {
    async fn send(&self, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(subwatch_core::Error::broadcast("delivery refused"));
        }

        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn broadcaster_name(&self) -> &'static str {
        "counting"
    }
}

/// A mock StateStore that tracks calls
pub struct MockStateStore {
    /// Comparison values (seedable by tests to simulate a durable store)
    comparisons: Arc<std::sync::Mutex<HashMap<String, ComparisonValue>>>,
    /// Full states, populated only through commit()
    states: Arc<std::sync::Mutex<HashMap<String, SourceState>>>,
    /// Call counter for commit()
    commit_count: Arc<AtomicUsize>,
    /// Call counter for flush()
    flush_count: Arc<AtomicUsize>,
    /// When set, every commit fails
    fail_commits: Arc<AtomicBool>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self {
            comparisons: Arc::new(std::sync::Mutex::new(HashMap::new())),
            states: Arc::new(std::sync::Mutex::new(HashMap::new())),
            commit_count: Arc::new(AtomicUsize::new(0)),
            flush_count: Arc::new(AtomicUsize::new(0)),
            fail_commits: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pre-populate a committed baseline, as a durable store would hold
    /// after a previous run
    pub fn seed_comparison(&self, source_id: &str, value: ComparisonValue) {
        self.comparisons
            .lock()
            .unwrap()
            .insert(source_id.to_string(), value);
    }

    /// The committed comparison value for a source, if any
    pub fn comparison(&self, source_id: &str) -> Option<ComparisonValue> {
        self.comparisons.lock().unwrap().get(source_id).copied()
    }

    /// Get the number of times commit() was called
    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Get the number of times flush() was called
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }

    /// Make every commit fail (or succeed again)
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Create a new MockStateStore that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            comparisons: Arc::clone(&other.comparisons),
            states: Arc::clone(&other.states),
            commit_count: Arc::clone(&other.commit_count),
            flush_count: Arc::clone(&other.flush_count),
            fail_commits: Arc::clone(&other.fail_commits),
        }
    }
}

#[async_trait::async_trait]
impl StateStore for MockStateStore {
    async fn get_comparison(&self, source_id: &str) -> Result<Option<ComparisonValue>> {
        Ok(self.comparisons.lock().unwrap().get(source_id).copied())
    }

    async fn get(&self, source_id: &str) -> Result<Option<SourceState>> {
        Ok(self.states.lock().unwrap().get(source_id).cloned())
    }

    async fn commit(&self, source_id: &str, state: &SourceState) -> Result<()> {
        self.commit_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(subwatch_core::Error::state_store("commit refused"));
        }

        self.comparisons
            .lock()
            .unwrap()
            .insert(source_id.to_string(), state.comparison);
        self.states
            .lock()
            .unwrap()
            .insert(source_id.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, source_id: &str) -> Result<()> {
        self.comparisons.lock().unwrap().remove(source_id);
        self.states.lock().unwrap().remove(source_id);
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        Ok(self.comparisons.lock().unwrap().keys().cloned().collect())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An item published at the given Unix timestamp
pub fn item_at(title: &str, secs: i64) -> Item {
    Item {
        title: title.to_string(),
        author: "someone".to_string(),
        description: "body".to_string(),
        published_at: DateTime::from_timestamp(secs, 0).unwrap(),
        link: format!("https://example.com/{}", title),
    }
}

/// A toggle source polling every second
pub fn toggle_source(id: &str, key: &str) -> SourceConfig {
    SourceConfig::new(id, key, 1, ComparisonPolicy::Toggle)
}

/// A timestamp source polling every second
pub fn timestamp_source(id: &str, key: &str) -> SourceConfig {
    SourceConfig::new(id, key, 1, ComparisonPolicy::MonotonicTimestamp)
}

/// Helper to create a minimal WatchConfig for testing
pub fn minimal_config(sources: Vec<SourceConfig>) -> WatchConfig {
    minimal_config_with_engine(sources, EngineConfig::default())
}

/// Helper to create a minimal WatchConfig with explicit engine settings
pub fn minimal_config_with_engine(
    sources: Vec<SourceConfig>,
    engine: EngineConfig,
) -> WatchConfig {
    WatchConfig {
        fetcher: FetcherConfig::Rsshub {
            base_url: "http://localhost:1200".to_string(),
        },
        broadcaster: BroadcasterConfig::Webhook {
            urls: vec!["https://hooks.example.com/test".to_string()],
        },
        state_store: StateStoreConfig::Memory,
        sources,
        engine,
    }
}
