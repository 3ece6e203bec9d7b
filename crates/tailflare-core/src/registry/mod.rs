//! Plugin-based provider registry
//!
//! The registry lets record stores and device directories be registered at
//! runtime, so the binary picks a backend by name instead of matching on a
//! hardcoded list.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tailflare_core::registry::ProviderRegistry;
//! use tailflare_core::config::StoreConfig;
//!
//! let registry = ProviderRegistry::new();
//! tailflare_provider_cloudflare::register(&registry);
//!
//! let config = StoreConfig::Cloudflare { api_token: token, dry_run: false };
//! let store = registry.create_store(&config)?;
//! ```
//!
//! ## Registration
//!
//! Backend crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_store("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use crate::config::{DirectoryConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressDirectory, AddressDirectoryFactory, RecordStore, RecordStoreFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of record store and directory factories
///
/// ## Thread Safety
///
/// Interior mutability with `RwLock`: concurrent lookups, exclusive
/// registration.
#[derive(Default)]
pub struct ProviderRegistry {
    stores: RwLock<HashMap<String, Box<dyn RecordStoreFactory>>>,
    directories: RwLock<HashMap<String, Box<dyn AddressDirectoryFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in in-memory store registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::store::register(&registry);
        registry
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "cloudflare", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn RecordStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Register a device directory factory
    ///
    /// # Parameters
    ///
    /// - `name`: Directory type name (e.g., "tailscale")
    /// - `factory`: Factory object for creating directory instances
    pub fn register_directory(
        &self,
        name: impl Into<String>,
        factory: Box<dyn AddressDirectoryFactory>,
    ) {
        let mut directories = self
            .directories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        directories.insert(name.into(), factory);
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        let store_type = config.type_name();
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create a device directory from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AddressDirectory>)`: Created directory instance
    /// - `Err(Error)`: If the directory type is not registered or creation fails
    pub fn create_directory(&self, config: &DirectoryConfig) -> Result<Box<dyn AddressDirectory>> {
        let directory_type = config.type_name();
        let directories = self
            .directories
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = directories
            .get(directory_type)
            .ok_or_else(|| Error::config(format!("Unknown directory type: {}", directory_type)))?;

        factory.create(config)
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// List all registered directory types
    pub fn list_directories(&self) -> Vec<String> {
        let directories = self
            .directories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        directories.keys().cloned().collect()
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }

    /// Check if a directory type is registered
    pub fn has_directory(&self, name: &str) -> bool {
        let directories = self
            .directories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        directories.contains_key(name)
    }
}
