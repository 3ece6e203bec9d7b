// # tailflare-core
//
// Core library for syncing mesh-network device addresses into DNS A records.
//
// ## Architecture Overview
//
// - **AddressDirectory**: Trait for reading the device directory
// - **RecordStore**: Trait for listing and batch-editing A records at a DNS provider
// - **diff / RecordKeyer**: Pure three-way split between current and desired records
// - **ZoneResolver**: Resolves the zone id once and caches it
// - **SyncOrchestrator**: Reconciles every configured alias and aggregates failures
// - **ProviderRegistry**: Plugin-based registry for stores and directories
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider crates
// 2. **Minimal Churn**: Records are keyed by address, so unchanged records keep their ids
// 3. **Fail Open Per Alias**: One alias failing never stops the others
// 4. **Plugin-Based**: Backends are registered by name, no hard-coded if-else
// 5. **Library-First**: The binary is a thin wrapper over this crate

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod store;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{DirectoryConfig, EngineConfig, StoreConfig, SyncConfig};
pub use directory::{DirectorySnapshot, Resolution};
pub use engine::{AliasOutcome, AliasState, RunReport, SyncEvent, SyncOrchestrator};
pub use error::{Error, Result};
pub use reconcile::{ByAddress, RecordKeyer, Reconciliation, diff};
pub use record::AddressRecord;
pub use registry::ProviderRegistry;
pub use store::MemoryRecordStore;
pub use traits::{AddressDirectory, RecordStore};
pub use zone::{ZoneHandle, ZoneResolver};
