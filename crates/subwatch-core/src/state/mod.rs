// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStoreFactory};
pub use memory::{MemoryStateStore, MemoryStoreFactory};

use crate::registry::ComponentRegistry;

/// Register the built-in state stores with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_state_store("memory", Box::new(MemoryStoreFactory));
    registry.register_state_store("file", Box::new(FileStoreFactory));
}
