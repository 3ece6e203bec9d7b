// # Record Store Trait
//
// Defines the boundary to the remote DNS provider.
//
// ## Implementations
//
// - Cloudflare: `tailflare-provider-cloudflare` crate
// - In-memory: `tailflare_core::store::MemoryRecordStore`
//
// ## Usage
//
// ```rust,ignore
// use tailflare_core::traits::{RecordStore, collect_records};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RecordStore implementation */;
//
//     let zone = store.find_zones("example.com").await?.remove(0);
//
//     // Drain every page before looking at the records
//     let current = collect_records(store.list_records(&zone.id, "www.example.com")).await?;
//
//     Ok(())
// }
// ```

use crate::error::{Error, Result};
use crate::reconcile::Reconciliation;
use crate::record::AddressRecord;
use crate::zone::ZoneHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};

/// Lazily produced, finite sequence of current records
///
/// Implementations page through the provider as the stream is polled. The
/// first `Err` item ends the listing.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<AddressRecord>> + Send + 'static>>;

/// Drain a [`RecordStream`] completely
///
/// A failure on any page fails the whole listing; partial results are dropped.
pub async fn collect_records(mut stream: RecordStream) -> Result<Vec<AddressRecord>> {
    let mut records = Vec::new();
    while let Some(record) = stream.next().await {
        records.push(record?);
    }
    Ok(records)
}

/// TTL policy for managed records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ttl {
    /// Provider's automatic / shortest TTL
    #[default]
    Automatic,
    /// Explicit TTL in seconds
    Seconds(u32),
}

/// Metadata applied to every managed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPolicy {
    pub ttl: Ttl,
    pub proxied: bool,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self {
            ttl: Ttl::Automatic,
            proxied: false,
        }
    }
}

/// A record to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecordSpec {
    /// Fully-qualified record name
    pub name: String,
    pub address: IpAddr,
    pub ttl: Ttl,
    pub proxied: bool,
    /// Human-readable comment naming the source device
    pub comment: String,
}

/// A metadata refresh for an existing record
///
/// Address and name never change through a patch: the address is the
/// record's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpec {
    pub id: String,
    pub ttl: Ttl,
    pub proxied: bool,
}

/// A record to remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSpec {
    pub id: String,
}

/// Create, patch and delete operations for one record name, submitted together
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordBatch {
    /// Fully-qualified record name the batch targets
    pub name: String,
    pub creates: Vec<NewRecordSpec>,
    pub patches: Vec<PatchSpec>,
    pub deletes: Vec<DeleteSpec>,
}

impl RecordBatch {
    /// Build the batch that converges `name` according to `reconciliation`
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` when a record to patch or delete has no id.
    pub fn from_reconciliation(
        name: &str,
        reconciliation: &Reconciliation<AddressRecord>,
        policy: &RecordPolicy,
    ) -> Result<Self> {
        let creates = reconciliation
            .create
            .iter()
            .map(|record| NewRecordSpec {
                name: name.to_string(),
                address: record.address,
                ttl: policy.ttl,
                proxied: policy.proxied,
                comment: record.comment(),
            })
            .collect();

        let patches = reconciliation
            .update
            .iter()
            .map(|record| {
                Ok(PatchSpec {
                    id: require_id(record)?,
                    ttl: policy.ttl,
                    proxied: policy.proxied,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let deletes = reconciliation
            .delete
            .iter()
            .map(|record| Ok(DeleteSpec { id: require_id(record)? }))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            creates,
            patches,
            deletes,
        })
    }

    /// Total number of operations
    pub fn len(&self) -> usize {
        self.creates.len() + self.patches.len() + self.deletes.len()
    }

    /// True when the batch holds no operations
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn require_id(record: &AddressRecord) -> Result<String> {
    record
        .id
        .clone()
        .ok_or_else(|| Error::invalid_input(format!("current record {record} has no id")))
}

/// Counts reported by a successful batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub created: usize,
    pub patched: usize,
    pub deleted: usize,
}

impl BatchOutcome {
    /// The counts a store reports after applying `batch` in full
    pub fn of(batch: &RecordBatch) -> Self {
        Self {
            created: batch.creates.len(),
            patched: batch.patches.len(),
            deleted: batch.deletes.len(),
        }
    }
}

/// Trait for DNS record store implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Page through listings lazily as the stream is polled
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the orchestrator owns failure policy)
/// - ❌ Decide what to change (owned by the reconciliation step)
/// - ❌ Cache zones (owned by `ZoneResolver`)
/// - ❌ Spawn tasks or threads
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up zones by exact name
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ZoneHandle>)`: Matching zones, empty when there is none
    /// - `Err(Error)`: If the lookup failed
    async fn find_zones(&self, zone_name: &str) -> Result<Vec<ZoneHandle>>;

    /// List every A record named exactly `name` in the zone
    ///
    /// The returned stream pages through the provider until exhausted. A
    /// transport error mid-listing is yielded as an `Err` item.
    fn list_records(&self, zone_id: &str, name: &str) -> RecordStream;

    /// Apply creates, patches and deletes together
    ///
    /// Stores apply the batch atomically when the provider supports it, or
    /// report `Error::PartialApply` when it does not.
    ///
    /// # Returns
    ///
    /// - `Ok(BatchOutcome)`: Every operation was applied
    /// - `Err(Error)`: The batch failed; the caller must not assume any part succeeded
    async fn apply_batch(&self, zone_id: &str, batch: RecordBatch) -> Result<BatchOutcome>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this store
    ///
    /// # Returns
    ///
    /// A boxed RecordStore trait object
    fn create(&self, config: &crate::config::StoreConfig) -> Result<Box<dyn RecordStore>>;
}
