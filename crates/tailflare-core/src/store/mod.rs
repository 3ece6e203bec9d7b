// # Record Store Implementations
//
// Record stores that ship with the core. Remote providers live in their own
// crates and register themselves with the `ProviderRegistry`.

pub mod memory;

pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory, StoredRecord};

use crate::registry::ProviderRegistry;

/// Register the built-in stores
pub fn register(registry: &ProviderRegistry) {
    registry.register_store("memory", Box::new(MemoryRecordStoreFactory));
}
