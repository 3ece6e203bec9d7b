// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Rehearse a configuration without touching a real DNS provider
// (`TAILFLARE_STORE=memory`), and back the contract tests.
//
// ## Behaviour
//
// - Zones are seeded at construction and get ids `zone-1`, `zone-2`, ...
// - Records get ids `rec-1`, `rec-2`, ... in creation order
// - Listings are served in pages of `page_size` records
// - Batches are atomic: every patch and delete id is checked before anything
//   changes, and a failed check leaves the store untouched
//
// ## Crash Behavior
//
// All state is lost on restart. Every run against a fresh store creates
// every record.

use crate::error::{Error, Result};
use crate::record::{AddressRecord, source_from_comment};
use crate::traits::{
    BatchOutcome, RecordBatch, RecordStore, RecordStoreFactory, RecordStream, Ttl,
};
use crate::zone::ZoneHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 100;

/// A record as held by [`MemoryRecordStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub name: String,
    pub address: IpAddr,
    pub ttl: Ttl,
    pub proxied: bool,
    pub comment: Option<String>,
}

impl StoredRecord {
    fn to_address_record(&self) -> AddressRecord {
        let source = self
            .comment
            .as_deref()
            .and_then(source_from_comment)
            .unwrap_or(&self.name);
        AddressRecord::existing(self.id.clone(), self.address, source)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    zones: Vec<ZoneHandle>,
    records: HashMap<String, Vec<StoredRecord>>,
    next_id: u64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("rec-{}", self.next_id)
    }
}

/// In-memory record store implementation
///
/// Clones share the same state, so a test can keep a handle while the
/// orchestrator owns another.
///
/// # Example
///
/// ```rust,no_run
/// use tailflare_core::store::MemoryRecordStore;
/// use tailflare_core::traits::{RecordStore, collect_records};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new(["example.com"]);
///
///     let zone = store.find_zones("example.com").await?.remove(0);
///     let records = collect_records(store.list_records(&zone.id, "www.example.com")).await?;
///     assert!(records.is_empty());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<MemoryState>>,
    page_size: usize,
}

impl MemoryRecordStore {
    /// Create a store that knows about `zones`
    pub fn new<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let zones = zones
            .into_iter()
            .enumerate()
            .map(|(i, name)| ZoneHandle::new(format!("zone-{}", i + 1), name))
            .collect();

        Self {
            inner: Arc::new(RwLock::new(MemoryState {
                zones,
                ..MemoryState::default()
            })),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Serve listings in pages of `page_size` records (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Id of a seeded zone
    pub async fn zone_id(&self, zone_name: &str) -> Option<String> {
        let state = self.inner.read().await;
        state
            .zones
            .iter()
            .find(|z| names_match(&z.name, zone_name))
            .map(|z| z.id.clone())
    }

    /// Insert a record directly, bypassing batches
    ///
    /// Returns the generated id.
    pub async fn insert(
        &self,
        zone_id: &str,
        name: &str,
        address: IpAddr,
        comment: Option<&str>,
    ) -> Result<String> {
        let mut state = self.inner.write().await;
        if !state.zones.iter().any(|z| z.id == zone_id) {
            return Err(Error::zone_not_found(zone_id));
        }

        let id = state.allocate_id();
        state
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(StoredRecord {
                id: id.clone(),
                name: name.to_string(),
                address,
                ttl: Ttl::Automatic,
                proxied: false,
                comment: comment.map(str::to_string),
            });
        Ok(id)
    }

    /// Records currently stored under `name`, in creation order
    pub async fn records(&self, zone_id: &str, name: &str) -> Vec<StoredRecord> {
        let state = self.inner.read().await;
        state
            .records
            .get(zone_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| names_match(&r.name, name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of records across all zones
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.values().map(Vec::len).sum()
    }

    /// Check if the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn names_match(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_zones(&self, zone_name: &str) -> Result<Vec<ZoneHandle>> {
        let state = self.inner.read().await;
        Ok(state
            .zones
            .iter()
            .filter(|z| names_match(&z.name, zone_name))
            .cloned()
            .collect())
    }

    fn list_records(&self, zone_id: &str, name: &str) -> RecordStream {
        let inner = Arc::clone(&self.inner);
        let page_size = self.page_size;
        let zone_id = zone_id.to_string();
        let name = name.to_string();

        Box::pin(async_stream::try_stream! {
            let mut page = 0;
            loop {
                // each page takes the lock separately, like a remote page fetch
                let batch: Vec<AddressRecord> = {
                    let state = inner.read().await;
                    if !state.zones.iter().any(|z| z.id == zone_id) {
                        Err::<(), Error>(Error::zone_not_found(zone_id.clone()))?;
                    }
                    state
                        .records
                        .get(&zone_id)
                        .into_iter()
                        .flatten()
                        .filter(|r| names_match(&r.name, &name))
                        .skip(page * page_size)
                        .take(page_size)
                        .map(StoredRecord::to_address_record)
                        .collect()
                };

                debug!("memory: page {} of {} holds {} records", page + 1, name, batch.len());

                let short = batch.len() < page_size;
                for record in batch {
                    yield record;
                }
                if short {
                    break;
                }
                page += 1;
            }
        })
    }

    async fn apply_batch(&self, zone_id: &str, batch: RecordBatch) -> Result<BatchOutcome> {
        let mut state = self.inner.write().await;

        if !state.zones.iter().any(|z| z.id == zone_id) {
            return Err(Error::zone_not_found(zone_id));
        }

        let known: HashSet<String> = state
            .records
            .get(zone_id)
            .into_iter()
            .flatten()
            .map(|r| r.id.clone())
            .collect();

        let targeted = batch
            .patches
            .iter()
            .map(|p| &p.id)
            .chain(batch.deletes.iter().map(|d| &d.id));
        for id in targeted {
            if !known.contains(id) {
                return Err(Error::provider(
                    "memory",
                    format!("record {} does not exist in zone {}", id, zone_id),
                ));
            }
        }

        let outcome = BatchOutcome::of(&batch);

        let mut new_records = Vec::with_capacity(batch.creates.len());
        for create in batch.creates {
            new_records.push(StoredRecord {
                id: state.allocate_id(),
                name: create.name,
                address: create.address,
                ttl: create.ttl,
                proxied: create.proxied,
                comment: Some(create.comment),
            });
        }

        let records = state.records.entry(zone_id.to_string()).or_default();

        let deleted: HashSet<&str> = batch.deletes.iter().map(|d| d.id.as_str()).collect();
        records.retain(|r| !deleted.contains(r.id.as_str()));

        for patch in &batch.patches {
            if let Some(record) = records.iter_mut().find(|r| r.id == patch.id) {
                record.ttl = patch.ttl;
                record.proxied = patch.proxied;
            }
        }

        records.extend(new_records);

        debug!(
            "memory: applied batch for {} (+{} ~{} -{})",
            batch.name, outcome.created, outcome.patched, outcome.deleted
        );
        Ok(outcome)
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemoryRecordStore`]
pub struct MemoryRecordStoreFactory;

impl RecordStoreFactory for MemoryRecordStoreFactory {
    fn create(&self, config: &crate::config::StoreConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            crate::config::StoreConfig::Memory { zones } => {
                Ok(Box::new(MemoryRecordStore::new(zones.iter().cloned())))
            }
            other => Err(Error::config(format!(
                "memory store cannot be built from a {} config",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{DeleteSpec, NewRecordSpec, PatchSpec, collect_records};

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([100, 64, 0, last])
    }

    fn create(name: &str, address: IpAddr, device: &str) -> NewRecordSpec {
        NewRecordSpec {
            name: name.to_string(),
            address,
            ttl: Ttl::Automatic,
            proxied: false,
            comment: crate::record::device_comment(device),
        }
    }

    #[tokio::test]
    async fn test_find_zones() {
        let store = MemoryRecordStore::new(["example.com", "example.org"]);

        let zones = store.find_zones("EXAMPLE.org.").await.unwrap();
        assert_eq!(zones, vec![ZoneHandle::new("zone-2", "example.org")]);
        assert!(store.find_zones("example.net").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_pages_through_everything() {
        let store = MemoryRecordStore::new(["example.com"]).with_page_size(2);
        for last in 1..=5 {
            store
                .insert("zone-1", "www.example.com", ip(last), None)
                .await
                .unwrap();
        }
        store
            .insert("zone-1", "other.example.com", ip(9), None)
            .await
            .unwrap();

        let records = collect_records(store.list_records("zone-1", "www.example.com"))
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        // no comment: the record name stands in for the device
        assert!(records.iter().all(|r| r.source_name == "www.example.com"));
    }

    #[tokio::test]
    async fn test_listing_unknown_zone_fails() {
        let store = MemoryRecordStore::new(["example.com"]);
        let result = collect_records(store.list_records("zone-9", "www.example.com")).await;
        assert!(matches!(result, Err(Error::ZoneNotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_batch() {
        let store = MemoryRecordStore::new(["example.com"]);
        let keep = store
            .insert("zone-1", "www.example.com", ip(1), None)
            .await
            .unwrap();
        let drop = store
            .insert("zone-1", "www.example.com", ip(2), None)
            .await
            .unwrap();

        let batch = RecordBatch {
            name: "www.example.com".to_string(),
            creates: vec![create("www.example.com", ip(3), "pi")],
            patches: vec![PatchSpec {
                id: keep.clone(),
                ttl: Ttl::Seconds(300),
                proxied: false,
            }],
            deletes: vec![DeleteSpec { id: drop }],
        };

        let outcome = store.apply_batch("zone-1", batch).await.unwrap();
        assert_eq!(
            outcome,
            BatchOutcome {
                created: 1,
                patched: 1,
                deleted: 1
            }
        );

        let records = store.records("zone-1", "www.example.com").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, keep);
        assert_eq!(records[0].ttl, Ttl::Seconds(300));
        assert_eq!(records[1].address, ip(3));
        assert_eq!(records[1].comment.as_deref(), Some("Address of device 'pi'"));

        let listed = collect_records(store.list_records("zone-1", "www.example.com"))
            .await
            .unwrap();
        assert_eq!(listed[1].source_name, "pi");
    }

    #[tokio::test]
    async fn test_batch_is_atomic() {
        let store = MemoryRecordStore::new(["example.com"]);
        store
            .insert("zone-1", "www.example.com", ip(1), None)
            .await
            .unwrap();

        let batch = RecordBatch {
            name: "www.example.com".to_string(),
            creates: vec![create("www.example.com", ip(3), "pi")],
            patches: vec![],
            deletes: vec![DeleteSpec {
                id: "rec-404".to_string(),
            }],
        };

        let result = store.apply_batch("zone-1", batch).await;
        assert!(matches!(result, Err(Error::Provider { .. })));
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn test_factory_rejects_other_configs() {
        let config = crate::config::StoreConfig::Cloudflare {
            api_token: "token".to_string(),
            dry_run: false,
        };
        assert!(MemoryRecordStoreFactory.create(&config).is_err());
    }
}
