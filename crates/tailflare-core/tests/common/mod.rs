//! Test doubles and common utilities for behavioural contract tests
//!
//! The record store double wraps the real `MemoryRecordStore` and adds call
//! counters and fault injection, so the contract tests exercise the same
//! listing and batch code the binary uses for rehearsals.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tailflare_core::config::SyncConfig;
use tailflare_core::error::{Error, Result};
use tailflare_core::store::MemoryRecordStore;
use tailflare_core::traits::{
    AddressDirectory, BatchOutcome, Device, RecordBatch, RecordStore, RecordStream,
};
use tailflare_core::zone::ZoneHandle;
use tokio_stream::StreamExt;

/// Mesh address `100.64.0.<last>`
pub fn ip(last: u8) -> IpAddr {
    IpAddr::from([100, 64, 0, last])
}

/// A device with one IPv4 address
pub fn device(hostname: &str, last: u8) -> Device {
    Device::new(hostname, vec![ip(last)])
}

/// Minimal valid configuration for tests
pub fn minimal_config(zone: &str) -> SyncConfig {
    let mut config = SyncConfig::new(zone);
    config.engine.call_timeout_secs = 5;
    config
}

/// A directory returning a fixed device list
#[derive(Clone)]
pub struct StaticDirectory {
    devices: Vec<Device>,
    list_calls: Arc<AtomicUsize>,
}

impl StaticDirectory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times list_devices() was called
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressDirectory for StaticDirectory {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.clone())
    }

    fn directory_name(&self) -> &'static str {
        "static"
    }
}

/// A directory whose fetch always fails
pub struct FailingDirectory;

#[async_trait::async_trait]
impl AddressDirectory for FailingDirectory {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        Err(Error::auth("oauth token rejected"))
    }

    fn directory_name(&self) -> &'static str {
        "failing"
    }
}

#[derive(Default)]
struct Faults {
    zone_failures: usize,
    zone_delay: Option<Duration>,
    broken_listings: HashSet<String>,
    rejected_batches: HashSet<String>,
    hanging_batches: HashSet<String>,
}

/// A `MemoryRecordStore` with call counters and fault injection
///
/// Clones share counters, faults and records.
#[derive(Clone)]
pub struct InstrumentedStore {
    inner: MemoryRecordStore,
    zone_lookups: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
    apply_calls: Arc<AtomicUsize>,
    applied: Arc<Mutex<Vec<RecordBatch>>>,
    faults: Arc<Mutex<Faults>>,
}

impl InstrumentedStore {
    pub fn new(zones: &[&str]) -> Self {
        Self {
            inner: MemoryRecordStore::new(zones.iter().copied()),
            zone_lookups: Arc::new(AtomicUsize::new(0)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            apply_calls: Arc::new(AtomicUsize::new(0)),
            applied: Arc::new(Mutex::new(Vec::new())),
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Serve listings in small pages
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.inner = self.inner.with_page_size(page_size);
        self
    }

    /// The wrapped store
    pub fn memory(&self) -> &MemoryRecordStore {
        &self.inner
    }

    /// Fail the next `count` zone lookups with a transport error
    pub fn fail_zone_lookups(&self, count: usize) {
        self.faults.lock().unwrap().zone_failures = count;
    }

    /// Delay every zone lookup
    pub fn delay_zone_lookups(&self, delay: Duration) {
        self.faults.lock().unwrap().zone_delay = Some(delay);
    }

    /// Break the listing of `name` after its first page
    pub fn break_listing(&self, name: &str) {
        self.faults
            .lock()
            .unwrap()
            .broken_listings
            .insert(name.to_string());
    }

    /// Reject every batch for `name`
    pub fn reject_batches(&self, name: &str) {
        self.faults
            .lock()
            .unwrap()
            .rejected_batches
            .insert(name.to_string());
    }

    /// Never complete a batch for `name`
    pub fn hang_batches(&self, name: &str) {
        self.faults
            .lock()
            .unwrap()
            .hanging_batches
            .insert(name.to_string());
    }

    pub fn zone_lookups(&self) -> usize {
        self.zone_lookups.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Batches that reached the store, in submission order
    pub fn applied_batches(&self) -> Vec<RecordBatch> {
        self.applied.lock().unwrap().clone()
    }

    /// Seed a record under `name` in the first zone
    pub async fn seed(&self, name: &str, address: IpAddr, device: &str) -> String {
        let comment = tailflare_core::record::device_comment(device);
        self.inner
            .insert("zone-1", name, address, Some(&comment))
            .await
            .expect("seeding succeeds")
    }

    /// Addresses stored under `name` in the first zone, sorted
    pub async fn addresses(&self, name: &str) -> Vec<IpAddr> {
        let mut addresses: Vec<IpAddr> = self
            .inner
            .records("zone-1", name)
            .await
            .into_iter()
            .map(|r| r.address)
            .collect();
        addresses.sort();
        addresses
    }

    /// Record ids stored under `name` in the first zone, sorted
    pub async fn ids(&self, name: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .records("zone-1", name)
            .await
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait::async_trait]
impl RecordStore for InstrumentedStore {
    async fn find_zones(&self, zone_name: &str) -> Result<Vec<ZoneHandle>> {
        self.zone_lookups.fetch_add(1, Ordering::SeqCst);

        let (fail, delay) = {
            let mut faults = self.faults.lock().unwrap();
            let fail = faults.zone_failures > 0;
            if fail {
                faults.zone_failures -= 1;
            }
            (fail, faults.zone_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(Error::http("connection reset by peer"));
        }
        self.inner.find_zones(zone_name).await
    }

    fn list_records(&self, zone_id: &str, name: &str) -> RecordStream {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let listing = self.inner.list_records(zone_id, name);
        if self.faults.lock().unwrap().broken_listings.contains(name) {
            // one good page, then the connection drops
            let page_break = tokio_stream::once(Err(Error::http("page 2: connection reset")));
            return Box::pin(listing.take(1).chain(page_break));
        }
        listing
    }

    async fn apply_batch(&self, zone_id: &str, batch: RecordBatch) -> Result<BatchOutcome> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);

        let (rejected, hanging) = {
            let faults = self.faults.lock().unwrap();
            (
                faults.rejected_batches.contains(&batch.name),
                faults.hanging_batches.contains(&batch.name),
            )
        };

        if hanging {
            std::future::pending::<()>().await;
        }
        if rejected {
            return Err(Error::PartialApply {
                applied: 0,
                total: batch.len(),
                message: "batch rejected".to_string(),
            });
        }

        self.applied.lock().unwrap().push(batch.clone());
        self.inner.apply_batch(zone_id, batch).await
    }

    fn store_name(&self) -> &'static str {
        "instrumented"
    }
}
