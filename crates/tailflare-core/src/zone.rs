//! Zone resolution
//!
//! The zone name from configuration is resolved to the store's zone identifier
//! once per process. The result is cached for the lifetime of the resolver and
//! never invalidated; picking up a renamed zone requires a restart.

use crate::error::{Error, Result};
use crate::traits::RecordStore;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A resolved zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneHandle {
    /// Store-internal zone identifier
    pub id: String,
    /// Zone name the identifier was resolved from
    pub name: String,
}

impl ZoneHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Resolves a zone name to a [`ZoneHandle`] at most once
///
/// # Concurrency
///
/// The cache is a [`tokio::sync::OnceCell`]: concurrent callers wait on the
/// single in-flight lookup and share its result. A failed lookup leaves the
/// cache empty, so a later call tries again.
#[derive(Debug)]
pub struct ZoneResolver {
    zone_name: String,
    cached: OnceCell<ZoneHandle>,
}

impl ZoneResolver {
    /// Create a resolver for `zone_name`
    pub fn new(zone_name: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            cached: OnceCell::new(),
        }
    }

    /// The zone name this resolver was built for
    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    /// The cached handle, if resolution already succeeded
    pub fn cached(&self) -> Option<&ZoneHandle> {
        self.cached.get()
    }

    /// Resolve the zone, using the cache after the first success
    ///
    /// # Errors
    ///
    /// - `Error::ZoneNotFound`: the store returned no zone for the name
    /// - `Error::Transport`: the lookup itself failed
    pub async fn resolve(&self, store: &dyn RecordStore) -> Result<&ZoneHandle> {
        self.cached
            .get_or_try_init(|| self.lookup(store))
            .await
    }

    async fn lookup(&self, store: &dyn RecordStore) -> Result<ZoneHandle> {
        debug!("Looking up zone {} via {}", self.zone_name, store.store_name());

        let zones = store.find_zones(&self.zone_name).await.map_err(|e| match e {
            Error::ZoneNotFound(_) | Error::Canceled(_) => e,
            other => Error::transport(format!(
                "zone lookup for name {} failed: {}",
                self.zone_name, other
            )),
        })?;

        // several matches: the store's first answer wins
        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::zone_not_found(&self.zone_name))?;

        info!("Resolved zone {} -> {}", zone.name, zone.id);
        Ok(zone)
    }
}
