// # State Store Trait
//
// Defines the interface for the per-source last-confirmed state.
//
// ## Purpose
//
// The state store is what makes notifications fire exactly once: it tracks,
// per source, the comparison value that was last committed by the notifier.
// A value that was observed but never committed is never stored.
//
// ## Implementations
//
// - In-memory: fast, lost on restart
// - File-based: JSON with atomic writes and backup recovery
// - Future: SQLite, Redis, etc.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::ComparisonPolicy;
use crate::traits::fetcher::Item;

/// The stored comparison value for a source
///
/// Tagged so a durable store can tell which policy produced it after a
/// restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonValue {
    /// Boolean state (e.g., "is live now")
    Toggle {
        /// Whether the source currently has items
        active: bool,
    },
    /// Newest observed publish time
    Timestamp {
        /// Publish time of the newest committed item
        newest: DateTime<Utc>,
    },
}

impl ComparisonValue {
    /// Whether this value was produced by the given policy
    ///
    /// A mismatch means the operator changed a source's policy between runs
    /// of a durable store; the engine re-seeds such sources.
    pub fn matches_policy(&self, policy: ComparisonPolicy) -> bool {
        matches!(
            (self, policy),
            (ComparisonValue::Toggle { .. }, ComparisonPolicy::Toggle)
                | (
                    ComparisonValue::Timestamp { .. },
                    ComparisonPolicy::MonotonicTimestamp
                )
        )
    }
}

/// Committed state for one source
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceState {
    /// The last-committed comparison value
    pub comparison: ComparisonValue,
    /// The item that accompanied the last commit, if any
    pub last_item: Option<Item>,
    /// Timestamp of the last commit
    pub committed_at: DateTime<Utc>,
}

impl SourceState {
    /// Create a new source state
    ///
    /// # Visibility
    ///
    /// This is `pub(crate)` so state is only created by the engine during
    /// initialization or after a confirmed change, never by external callers.
    pub(crate) fn new(comparison: ComparisonValue, last_item: Option<Item>) -> Self {
        Self {
            comparison,
            last_item,
            committed_at: Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// This trait defines the interface for per-source state storage.
/// Implementations must be thread-safe: independent source cycles read and
/// commit concurrently (per-source keys, so per-key mutual exclusion is
/// sufficient).
///
/// Implementation guidelines:
///
/// - **Async I/O only**: never block the runtime
/// - **Atomic commit**: a reader never observes a partially-written state
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: whether something changed is decided by the
///   engine, not the store
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the last-committed comparison value for a source
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ComparisonValue))`: The committed value
    /// - `Ok(None)`: The source was never initialized
    /// - `Err(Error)`: Storage error
    async fn get_comparison(
        &self,
        source_id: &str,
    ) -> Result<Option<ComparisonValue>, crate::Error>;

    /// Get the full state for a source
    ///
    /// # Returns
    ///
    /// - `Ok(Some(SourceState))`: The full committed state
    /// - `Ok(None)`: The source was never initialized
    /// - `Err(Error)`: Storage error
    async fn get(&self, source_id: &str) -> Result<Option<SourceState>, crate::Error>;

    /// Atomically replace the stored state for a source
    ///
    /// Used both for the initial seed and for every confirmed change.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully committed
    /// - `Err(Error)`: Storage error
    async fn commit(&self, source_id: &str, state: &SourceState) -> Result<(), crate::Error>;

    /// Remove the stored state for a source
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully removed (or didn't exist)
    /// - `Err(Error)`: Storage error
    async fn remove(&self, source_id: &str) -> Result<(), crate::Error>;

    /// List all source ids in the store
    async fn list_sources(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures all changes are
    /// flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
///
/// Creation is async: durable stores load and validate their backing file
/// while being constructed.
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this state store
    ///
    /// # Returns
    ///
    /// A boxed StateStore trait object
    async fn create(&self, config: &serde_json::Value)
    -> Result<Box<dyn StateStore>, crate::Error>;
}
