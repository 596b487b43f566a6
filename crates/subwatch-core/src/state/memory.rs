// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple, fast state store that doesn't persist across restarts.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - Every source is re-seeded from its first successful fetch on the next run
// - A change that happened while the process was down is not detected
//
// ## When to Use
//
// - Testing environments
// - Deployments where a silent re-baseline after restart is acceptable

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::Error;
use crate::traits::state_store::{ComparisonValue, SourceState, StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// State lives in a HashMap behind a RwLock; independent source cycles can
/// read concurrently while commits take the write lock per call.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, SourceState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of sources in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all state from the store
    pub async fn clear(&self) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.clear();
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_comparison(&self, source_id: &str) -> Result<Option<ComparisonValue>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(source_id).map(|state| state.comparison))
    }

    async fn get(&self, source_id: &str) -> Result<Option<SourceState>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(source_id).cloned())
    }

    async fn commit(&self, source_id: &str, state: &SourceState) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(source_id.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, source_id: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(source_id);
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for creating memory state stores
pub struct MemoryStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
