// # subwatch-core
//
// Core library for the subwatch change-detection and notification engine.
//
// ## Architecture Overview
//
// This library provides the core functionality for polling-based change
// detection over external sources (live-stream status, feed timelines):
// - **Fetcher**: Trait for retrieving the latest items for a source
// - **Broadcaster**: Trait for delivering a notification to all recipients
// - **StateStore**: Trait for the per-source last-confirmed state
// - **WatchEngine**: Per-source polling, change detection and notification
// - **ComponentRegistry**: Plugin-based registry for the traits above
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Per-Source Scheduling**: Every source polls on its own independent timer
// 3. **Plugin-Based**: Components are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Exactly-Once Detection**: The state store only ever holds committed
//    baselines, so a change notifies once, never twice

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ComparisonPolicy, SourceConfig, WatchConfig};
pub use detector::{Change, Detection};
pub use engine::{EngineEvent, WatchEngine};
pub use error::{Error, Result};
pub use registry::ComponentRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{Broadcaster, FetchResult, Fetcher, Item, StateStore};
