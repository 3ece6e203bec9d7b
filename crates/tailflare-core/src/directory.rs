//! Directory snapshot
//!
//! One [`DirectorySnapshot`] is taken per run and every alias resolves its
//! device names against it.

use crate::record::AddressRecord;
use crate::traits::Device;
use std::collections::HashMap;
use tracing::warn;

/// Device hostname → desired record, as seen at one point in time
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    records: HashMap<String, AddressRecord>,
}

/// Result of resolving one alias's device list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Desired records, in configured device order
    pub records: Vec<AddressRecord>,
    /// Configured device names absent from the snapshot
    pub missing: Vec<String>,
}

impl DirectorySnapshot {
    /// Build a snapshot from a device listing
    ///
    /// Each device contributes its first IPv4 address. Devices without one are
    /// skipped. A hostname seen twice keeps the last device.
    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut records = HashMap::new();

        for device in devices {
            let Some(address) = device.ipv4() else {
                warn!("Device {} has no IPv4 address, skipping", device.hostname);
                continue;
            };
            records.insert(
                device.hostname.clone(),
                AddressRecord::desired(address, device.hostname),
            );
        }

        Self { records }
    }

    /// Look up one device
    pub fn resolve(&self, device: &str) -> Option<&AddressRecord> {
        self.records.get(device)
    }

    /// Resolve every configured device name of an alias
    pub fn resolve_all(&self, devices: &[String]) -> Resolution {
        let mut resolution = Resolution::default();

        for device in devices {
            match self.resolve(device) {
                Some(record) => resolution.records.push(record.clone()),
                None => resolution.missing.push(device.clone()),
            }
        }

        resolution
    }

    /// Number of devices with a usable address
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no device has a usable address
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
