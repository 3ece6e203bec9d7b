// # Tailscale Device Directory
//
// `AddressDirectory` implementation against the Tailscale API v2.
//
// ## Authentication
//
// OAuth client credentials are exchanged for a short-lived access token on
// every fetch. Only the `devices:core:read` scope is requested: listing
// devices is all tailflare needs.
//
// ## API Reference
//
// - Token: POST `/api/v2/oauth/token`
// - Devices: GET `/api/v2/tailnet/:tailnet/devices`
//
// The tailnet `-` means "the tailnet of the credentials".

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tailflare_core::config::DirectoryConfig;
use tailflare_core::traits::{AddressDirectory, AddressDirectoryFactory, Device};
use tailflare_core::{Error, ProviderRegistry, Result};

/// Tailscale API base URL
pub const TAILSCALE_API_BASE: &str = "https://api.tailscale.com";

/// Tailnet placeholder for the credentials' own tailnet
pub const DEFAULT_TAILNET: &str = "-";

/// The only scope requested
const DEVICE_READ_SCOPE: &str = "devices:core:read";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<ApiDevice>,
}

#[derive(Debug, Deserialize)]
struct ApiDevice {
    hostname: String,
    #[serde(default)]
    addresses: Vec<String>,
}

impl ApiDevice {
    fn into_device(self) -> Device {
        let addresses = self
            .addresses
            .iter()
            .filter_map(|raw| match raw.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::warn!("Device {} reports unparsable address {}", self.hostname, raw);
                    None
                }
            })
            .collect();
        Device::new(self.hostname, addresses)
    }
}

/// Parse a `GET /tailnet/:tailnet/devices` body
fn parse_devices(body: &str) -> Result<Vec<Device>> {
    let list: DeviceList = serde_json::from_str(body)
        .map_err(|e| Error::directory(format!("Failed to parse device list: {}", e)))?;
    Ok(list.devices.into_iter().map(ApiDevice::into_device).collect())
}

/// Tailscale device directory
pub struct TailscaleDirectory {
    /// Tailnet name, `-` for the default
    tailnet: String,

    /// OAuth client id
    client_id: String,

    /// OAuth client secret
    /// ⚠️ NEVER log this value
    client_secret: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// API base URL, without trailing slash
    base_url: String,
}

// Custom Debug implementation that hides the client secret
impl std::fmt::Debug for TailscaleDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailscaleDirectory")
            .field("tailnet", &self.tailnet)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TailscaleDirectory {
    /// Create a new Tailscale directory
    ///
    /// # Parameters
    ///
    /// - `tailnet`: Tailnet name; empty means the default tailnet (`-`)
    /// - `client_id`: OAuth client id
    /// - `client_secret`: OAuth client secret
    pub fn new(
        tailnet: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let tailnet = tailnet.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(Error::config("Tailscale OAuth client id and secret are required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            tailnet: if tailnet.is_empty() {
                DEFAULT_TAILNET.to_string()
            } else {
                tailnet
            },
            client_id,
            client_secret,
            client,
            base_url: TAILSCALE_API_BASE.to_string(),
        })
    }

    /// Point the directory at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Exchange the client credentials for an access token
    ///
    /// ```http
    /// POST /api/v2/oauth/token
    /// client_id=...&client_secret=...&grant_type=client_credentials&scope=devices:core:read
    /// ```
    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/v2/oauth/token", self.base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", DEVICE_READ_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| Error::http(format!("Tailscale token request failed: {}", e)))?;

        let body = checked_body(response, "OAuth token exchange").await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::directory(format!("Failed to parse token response: {}", e)))?;

        Ok(token.access_token)
    }
}

/// Read the body of a response, mapping failure statuses
async fn checked_body(response: reqwest::Response, action: &str) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::http(format!("{}: failed to read response: {}", action, e)))?;

    if status.is_success() {
        return Ok(body);
    }

    Err(match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid OAuth client or missing scope. Status: {}",
            action, status
        )),
        429 => Error::rate_limited(format!("{}: Tailscale rate limit exceeded", action)),
        _ => Error::directory(format!("{} failed: {} - {}", action, status, body)),
    })
}

#[async_trait]
impl AddressDirectory for TailscaleDirectory {
    /// ```http
    /// GET /api/v2/tailnet/:tailnet/devices
    /// Authorization: Bearer <access token>
    /// ```
    async fn list_devices(&self) -> Result<Vec<Device>> {
        let token = self.access_token().await?;

        tracing::debug!("Listing devices of tailnet {}", self.tailnet);
        let response = self
            .client
            .get(format!("{}/api/v2/tailnet/{}/devices", self.base_url, self.tailnet))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| Error::http(format!("Tailscale device request failed: {}", e)))?;

        let body = checked_body(response, "Device listing").await?;
        let devices = parse_devices(&body)?;

        tracing::debug!("Tailnet {} has {} devices", self.tailnet, devices.len());
        Ok(devices)
    }

    fn directory_name(&self) -> &'static str {
        "tailscale"
    }
}

/// Factory for creating Tailscale directories
pub struct TailscaleFactory;

impl AddressDirectoryFactory for TailscaleFactory {
    fn create(&self, config: &DirectoryConfig) -> Result<Box<dyn AddressDirectory>> {
        match config {
            DirectoryConfig::Tailscale {
                tailnet,
                client_id,
                client_secret,
            } => Ok(Box::new(TailscaleDirectory::new(
                tailnet.clone(),
                client_id.clone(),
                client_secret.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Tailscale directory")),
        }
    }
}

/// Register the Tailscale directory with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_directory("tailscale", Box::new(TailscaleFactory));
}
