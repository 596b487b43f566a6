//! Core traits for the subscription watcher
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Fetcher`]: Retrieve the latest items for a source
//! - [`Broadcaster`]: Deliver a notification to all recipients
//! - [`StateStore`]: Per-source last-confirmed state

pub mod broadcaster;
pub mod fetcher;
pub mod state_store;

pub use broadcaster::{Broadcaster, BroadcasterFactory};
pub use fetcher::{FetchResult, Fetcher, FetcherFactory, Item};
pub use state_store::{ComparisonValue, SourceState, StateStore, StateStoreFactory};
