//! Cloudflare API v4 wire types
//!
//! Only the fields tailflare reads or writes are modelled; everything else in
//! the responses is ignored.

use serde::{Deserialize, Serialize};
use tailflare_core::record::source_from_comment;
use tailflare_core::traits::{RecordBatch, Ttl};
use tailflare_core::{AddressRecord, Error, Result};

/// Standard response envelope
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    pub result: Option<T>,
    pub result_info: Option<ResultInfo>,
}

impl<T> Envelope<T> {
    /// The `result` of a successful response
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(Error::provider("cloudflare", join_messages(&self.errors)));
        }
        self.result
            .ok_or_else(|| Error::provider("cloudflare", "Invalid response format: missing result"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub code: i64,
    pub message: String,
}

/// Render API errors as `[code] message; [code] message`
pub fn join_messages(messages: &[ApiMessage]) -> String {
    if messages.is_empty() {
        return "request failed without an error message".to_string();
    }
    messages
        .iter()
        .map(|m| format!("[{}] {}", m.code, m.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Pagination block of list responses
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl DnsRecord {
    /// Convert to the core record, recovering the device name from the comment
    pub fn into_address_record(self) -> Result<AddressRecord> {
        let address = self.content.parse().map_err(|e| {
            Error::provider(
                "cloudflare",
                format!("Invalid IP in record {}: {} ({})", self.id, self.content, e),
            )
        })?;

        let source = self
            .comment
            .as_deref()
            .and_then(source_from_comment)
            .unwrap_or(&self.name)
            .to_string();

        Ok(AddressRecord::existing(self.id, address, source))
    }
}

/// `POST /zones/:zone_id/dns_records/batch` body
///
/// Cloudflare executes deletes, patches, puts and posts in that order inside
/// one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub deletes: Vec<BatchDelete>,
    pub patches: Vec<BatchPatch>,
    pub posts: Vec<BatchPost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDelete {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPatch {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub ttl: u32,
    pub proxied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPost {
    #[serde(rename = "type")]
    pub record_type: &'static str,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
    pub comment: String,
}

/// TTL as Cloudflare encodes it: 1 means automatic
pub fn ttl_value(ttl: Ttl) -> u32 {
    match ttl {
        Ttl::Automatic => 1,
        Ttl::Seconds(seconds) => seconds,
    }
}

impl From<&RecordBatch> for BatchRequest {
    fn from(batch: &RecordBatch) -> Self {
        Self {
            deletes: batch
                .deletes
                .iter()
                .map(|d| BatchDelete { id: d.id.clone() })
                .collect(),
            patches: batch
                .patches
                .iter()
                .map(|p| BatchPatch {
                    id: p.id.clone(),
                    record_type: "A",
                    ttl: ttl_value(p.ttl),
                    proxied: p.proxied,
                })
                .collect(),
            posts: batch
                .creates
                .iter()
                .map(|c| BatchPost {
                    record_type: "A",
                    name: c.name.clone(),
                    content: c.address.to_string(),
                    ttl: ttl_value(c.ttl),
                    proxied: c.proxied,
                    comment: c.comment.clone(),
                })
                .collect(),
        }
    }
}

/// Result of a batch call
#[derive(Debug, Default, Deserialize)]
pub struct BatchResult {
    #[serde(default)]
    pub deletes: Vec<serde_json::Value>,
    #[serde(default)]
    pub patches: Vec<serde_json::Value>,
    #[serde(default)]
    pub posts: Vec<serde_json::Value>,
}
