//! Plugin-based component registry
//!
//! The registry allows fetchers, broadcasters and state stores to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use subwatch_core::registry::ComponentRegistry;
//! use subwatch_core::config::FetcherConfig;
//!
//! // Create a registry
//! let registry = ComponentRegistry::new();
//!
//! // Register fetchers
//! registry.register_fetcher("rsshub", Box::new(rsshub_factory));
//!
//! // Create a fetcher from config
//! let config = FetcherConfig::Rsshub { base_url: "http://localhost:1200".into() };
//! let fetcher = registry.create_fetcher(&config)?;
//! ```
//!
//! ## Registration
//!
//! Implementation crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In subwatch-fetch-rsshub
//! pub fn register(registry: &ComponentRegistry) {
//!     registry.register_fetcher("rsshub", Box::new(RsshubFactory));
//! }
//! ```

use crate::config::{BroadcasterConfig, FetcherConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::traits::{Broadcaster, BroadcasterFactory, Fetcher, FetcherFactory};
use crate::traits::{StateStore, StateStoreFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry for plugin-based component creation
///
/// The registry maintains maps of type names to factory objects, allowing
/// dynamic instantiation of components based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered fetcher factories
    fetchers: RwLock<HashMap<String, Box<dyn FetcherFactory>>>,

    /// Registered broadcaster factories
    broadcasters: RwLock<HashMap<String, Box<dyn BroadcasterFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, std::sync::Arc<dyn StateStoreFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher factory
    ///
    /// # Parameters
    ///
    /// - `name`: Fetcher type name (e.g., "rsshub")
    /// - `factory`: Factory object for creating fetcher instances
    pub fn register_fetcher(&self, name: impl Into<String>, factory: Box<dyn FetcherFactory>) {
        let name = name.into();
        let mut fetchers = self.fetchers.write().unwrap();
        fetchers.insert(name, factory);
    }

    /// Register a broadcaster factory
    ///
    /// # Parameters
    ///
    /// - `name`: Broadcaster type name (e.g., "webhook")
    /// - `factory`: Factory object for creating broadcaster instances
    pub fn register_broadcaster(
        &self,
        name: impl Into<String>,
        factory: Box<dyn BroadcasterFactory>,
    ) {
        let name = name.into();
        let mut broadcasters = self.broadcasters.write().unwrap();
        broadcasters.insert(name, factory);
    }

    /// Register a state store factory
    ///
    /// # Parameters
    ///
    /// - `name`: State store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating state store instances
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        let name = name.into();
        let mut stores = self.state_stores.write().unwrap();
        stores.insert(name, std::sync::Arc::from(factory));
    }

    /// Create a fetcher from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Fetcher>)`: Created fetcher instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_fetcher(&self, config: &FetcherConfig) -> Result<Box<dyn Fetcher>> {
        let fetcher_type = config.type_name();
        let fetchers = self.fetchers.read().unwrap();

        let factory = fetchers
            .get(fetcher_type)
            .ok_or_else(|| Error::config(format!("unknown fetcher type: {}", fetcher_type)))?;

        factory.create(config)
    }

    /// Create a broadcaster from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Broadcaster>)`: Created broadcaster instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_broadcaster(&self, config: &BroadcasterConfig) -> Result<Box<dyn Broadcaster>> {
        let broadcaster_type = config.type_name();
        let broadcasters = self.broadcasters.read().unwrap();

        let factory = broadcasters.get(broadcaster_type).ok_or_else(|| {
            Error::config(format!("unknown broadcaster type: {}", broadcaster_type))
        })?;

        factory.create(config)
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StateStore>)`: Created state store instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub async fn create_state_store(
        &self,
        config: &StateStoreConfig,
    ) -> Result<Box<dyn StateStore>> {
        let store_type = match config {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        };

        let factory = {
            let stores = self.state_stores.read().unwrap();
            stores
                .get(store_type)
                .ok_or_else(|| Error::config(format!("unknown state store type: {}", store_type)))?
                .clone()
            // Lock released here, before the async create
        };

        let config_json = serde_json::to_value(config)?;
        factory.create(&config_json).await
    }

    /// List all registered fetcher types
    pub fn list_fetchers(&self) -> Vec<String> {
        let fetchers = self.fetchers.read().unwrap();
        fetchers.keys().cloned().collect()
    }

    /// List all registered broadcaster types
    pub fn list_broadcasters(&self) -> Vec<String> {
        let broadcasters = self.broadcasters.read().unwrap();
        broadcasters.keys().cloned().collect()
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self.state_stores.read().unwrap();
        stores.keys().cloned().collect()
    }

    /// Check if a fetcher type is registered
    pub fn has_fetcher(&self, name: &str) -> bool {
        let fetchers = self.fetchers.read().unwrap();
        fetchers.contains_key(name)
    }

    /// Check if a broadcaster type is registered
    pub fn has_broadcaster(&self, name: &str) -> bool {
        let broadcasters = self.broadcasters.read().unwrap();
        broadcasters.contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        let stores = self.state_stores.read().unwrap();
        stores.contains_key(name)
    }
}
