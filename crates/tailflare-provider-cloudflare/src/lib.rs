// # Cloudflare Record Store
//
// `RecordStore` implementation against the Cloudflare API v4.
//
// - ✅ Zone lookup by exact name
// - ✅ Paged listing of A records, consumed lazily as the stream is polled
// - ✅ Creates, patches and deletes submitted as one atomic batch
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401, 403, 404, 409, 429, 5xx)
// - ✅ Dry-run mode for safe rehearsals
// - ❌ NO retry logic (owned by the caller)
// - ❌ NO zone caching (owned by `ZoneResolver`)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - API token MUST be provided via environment variables only
// - Store construction fails fast if the token is empty
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name.exact=...&page=N`
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`

pub mod api;

use api::{BatchRequest, BatchResult, DnsRecord, Envelope, ResultInfo, Zone};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tailflare_core::config::StoreConfig;
use tailflare_core::traits::{BatchOutcome, RecordBatch, RecordStore, RecordStoreFactory, RecordStream};
use tailflare_core::zone::ZoneHandle;
use tailflare_core::{Error, ProviderRegistry, Result};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const PER_PAGE: u32 = 100;

/// Cloudflare record store
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended batch payload
/// - **NOT** modify DNS records
pub struct CloudflareRecordStore {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// API base URL, without trailing slash
    base_url: String,

    /// Dry-run mode: perform reads but skip the batch POST
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareRecordStore")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareRecordStore {
    /// Create a new Cloudflare record store
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform reads but only log batches
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            client,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            dry_run,
        })
    }

    /// Point the store at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether batches are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Map a non-success HTTP status to an error
///
/// `not_found` builds the error for 404, which means different things per call.
fn status_error(status: StatusCode, body: &str, action: &str, not_found: impl FnOnce() -> Error) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => not_found(),
        409 => Error::provider(
            "cloudflare",
            format!("Conflict: {} collided with a concurrent change. Status: {}", action, status),
        ),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider("cloudflare", format!("{} failed: {} - {}", action, status, body)),
    }
}

/// Check the status and decode the envelope of a response
async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    action: &str,
    not_found: impl FnOnce() -> Error,
) -> Result<Envelope<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status, &body, action, not_found));
    }

    response
        .json()
        .await
        .map_err(|e| Error::provider("cloudflare", format!("Failed to parse response: {}", e)))
}

/// Whether the listing continues after `page`
///
/// A short page always ends the listing. Without usable paging info a full
/// page may be followed by more, so the next page is requested.
fn has_next_page(page: u32, info: Option<ResultInfo>, returned: usize) -> bool {
    if returned < PER_PAGE as usize {
        return false;
    }
    match info {
        Some(info) if info.total_pages > 0 => page < info.total_pages,
        _ => true,
    }
}

fn request_error(e: reqwest::Error) -> Error {
    Error::http(format!("Cloudflare request failed: {}", e))
}

#[async_trait]
impl RecordStore for CloudflareRecordStore {
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn find_zones(&self, zone_name: &str) -> Result<Vec<ZoneHandle>> {
        tracing::debug!("Looking up Cloudflare zone {}", zone_name);

        let response = self
            .client
            .get(format!("{}/zones", self.base_url))
            .bearer_auth(&self.api_token)
            .query(&[("name", zone_name)])
            .send()
            .await
            .map_err(request_error)?;

        let zones: Vec<Zone> = read_envelope(response, "Zone lookup", || Error::zone_not_found(zone_name))
            .await?
            .into_result()?;

        Ok(zones
            .into_iter()
            .map(|zone| ZoneHandle::new(zone.id, zone.name))
            .collect())
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name.exact=www.example.com&match=all&page=1&per_page=100
    /// Authorization: Bearer <token>
    /// ```
    fn list_records(&self, zone_id: &str, name: &str) -> RecordStream {
        let client = self.client.clone();
        let api_token = self.api_token.clone();
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let zone_id = zone_id.to_string();
        let name = name.to_string();

        Box::pin(async_stream::try_stream! {
            let mut page: u32 = 1;
            loop {
                let query = [
                    ("type", "A".to_string()),
                    ("name.exact", name.clone()),
                    ("match", "all".to_string()),
                    ("page", page.to_string()),
                    ("per_page", PER_PAGE.to_string()),
                ];

                let response = client
                    .get(&url)
                    .bearer_auth(&api_token)
                    .query(&query)
                    .send()
                    .await
                    .map_err(request_error)?;

                let envelope: Envelope<Vec<DnsRecord>> =
                    read_envelope(response, "Record listing", || Error::zone_not_found(zone_id.clone()))
                        .await?;
                let info = envelope.result_info;
                let records = envelope.into_result()?;

                tracing::debug!(
                    "Cloudflare page {}/{} for {} holds {} records",
                    page,
                    info.map_or_else(|| "?".to_string(), |i| i.total_pages.to_string()),
                    name,
                    records.len()
                );

                let more = has_next_page(page, info, records.len());
                for record in records {
                    yield record.into_address_record()?;
                }

                if !more {
                    break;
                }
                page += 1;
            }
        })
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records/batch
    /// Authorization: Bearer <token>
    /// { "deletes": [...], "patches": [...], "posts": [...] }
    /// ```
    async fn apply_batch(&self, zone_id: &str, batch: RecordBatch) -> Result<BatchOutcome> {
        let url = format!("{}/zones/{}/dns_records/batch", self.base_url, zone_id);
        let body = BatchRequest::from(&batch);

        tracing::info!(
            "{} batch for {}: {} posts, {} patches, {} deletes [mode: {}]",
            if self.dry_run { "Would submit" } else { "Submitting" },
            batch.name,
            body.posts.len(),
            body.patches.len(),
            body.deletes.len(),
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                serde_json::to_string(&body)?
            );
            return Ok(BatchOutcome::of(&batch));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let result: BatchResult = read_envelope(response, "Batch apply", || {
            Error::provider("cloudflare", format!("Batch target not found in zone {}", zone_id))
        })
        .await?
        .into_result()?;

        Ok(BatchOutcome {
            created: result.posts.len(),
            patched: result.patches.len(),
            deleted: result.deletes.len(),
        })
    }

    fn store_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare record stores
pub struct CloudflareFactory;

impl RecordStoreFactory for CloudflareFactory {
    fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            StoreConfig::Cloudflare { api_token, dry_run } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }

                if *dry_run {
                    tracing::warn!("Cloudflare store running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(CloudflareRecordStore::new(api_token.clone(), *dry_run)?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare store")),
        }
    }
}

/// Register the Cloudflare store with a registry
///
/// # Example
///
/// ```rust
/// use tailflare_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// tailflare_provider_cloudflare::register(&registry);
/// assert!(registry.has_store("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_store("cloudflare", Box::new(CloudflareFactory));
}
