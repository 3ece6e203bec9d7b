// # Address Directory Trait
//
// Defines the interface for reading the device directory of a mesh network.
//
// ## Implementations
//
// - Tailscale: `tailflare-directory-tailscale` crate
//
// ## Usage
//
// ```rust,ignore
// use tailflare_core::AddressDirectory;
// use tailflare_core::directory::DirectorySnapshot;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let directory = /* AddressDirectory implementation */;
//
//     // One snapshot per run
//     let snapshot = DirectorySnapshot::from_devices(directory.list_devices().await?);
//     println!("{:?}", snapshot.resolve("nas"));
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A named endpoint in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device hostname, the name aliases refer to
    pub hostname: String,
    /// Every address assigned to the device, in directory order
    pub addresses: Vec<IpAddr>,
}

impl Device {
    pub fn new(hostname: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            hostname: hostname.into(),
            addresses,
        }
    }

    /// The address published in A records: the first IPv4 address
    pub fn ipv4(&self) -> Option<IpAddr> {
        self.addresses.iter().find(|ip| ip.is_ipv4()).copied()
    }
}

/// Trait for device directory implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to the directory endpoint only
/// - ✅ Authenticate with the minimum read-only scope needed to list devices
///
/// ## Forbidden Capabilities
/// - ❌ Cache devices across calls (the orchestrator takes one snapshot per run)
/// - ❌ Retry or sleep (the orchestrator bounds every call)
/// - ❌ Spawn tasks or threads
#[async_trait]
pub trait AddressDirectory: Send + Sync {
    /// List every device currently in the directory
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Device>)`: All devices, possibly empty
    /// - `Err(Error)`: If the directory could not be read
    async fn list_devices(&self) -> Result<Vec<Device>, crate::Error>;

    /// Get the directory name (for logging/debugging)
    fn directory_name(&self) -> &'static str;
}

/// Helper trait for constructing directories from configuration
pub trait AddressDirectoryFactory: Send + Sync {
    /// Create an AddressDirectory instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this directory
    ///
    /// # Returns
    ///
    /// A boxed AddressDirectory trait object
    fn create(
        &self,
        config: &crate::config::DirectoryConfig,
    ) -> Result<Box<dyn AddressDirectory>, crate::Error>;
}
