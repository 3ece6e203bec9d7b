//! Address records and record naming
//!
//! An [`AddressRecord`] is either an A record fetched from the store (it has an
//! `id`) or a candidate synthesized from the device directory (no `id` yet).
//! Only `address` takes part in identity; `source_name` is descriptive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Name denoting the zone apex in alias configuration
pub const APEX: &str = "@";

const COMMENT_PREFIX: &str = "Address of device '";
const COMMENT_SUFFIX: &str = "'";

/// One DNS A record, fetched or desired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Remote identifier; `None` for records that do not exist yet
    pub id: Option<String>,
    /// The address value, the identity of the record
    pub address: IpAddr,
    /// Device hostname the address came from
    pub source_name: String,
}

impl AddressRecord {
    /// A candidate record that has not been created remotely
    pub fn desired(address: IpAddr, source_name: impl Into<String>) -> Self {
        Self {
            id: None,
            address,
            source_name: source_name.into(),
        }
    }

    /// A record as it exists in the store
    pub fn existing(id: impl Into<String>, address: IpAddr, source_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            address,
            source_name: source_name.into(),
        }
    }

    /// Comment attached to the record when it is created
    pub fn comment(&self) -> String {
        device_comment(&self.source_name)
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.source_name)
    }
}

/// Render a record list for log lines: `[10.0.0.1 (nas), 10.0.0.2 (pi)]`
pub fn display_records(records: &[AddressRecord]) -> String {
    let parts: Vec<String> = records.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Comment text for a record created on behalf of a device
pub fn device_comment(source_name: &str) -> String {
    format!("{COMMENT_PREFIX}{source_name}{COMMENT_SUFFIX}")
}

/// Recover the device hostname from a comment written by [`device_comment`]
pub fn source_from_comment(comment: &str) -> Option<&str> {
    comment
        .strip_prefix(COMMENT_PREFIX)?
        .strip_suffix(COMMENT_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Qualify an alias against its zone
///
/// - `"@"` is the zone apex
/// - `"www"` becomes `"www.example.com"`
/// - names already inside the zone are kept as-is
pub fn qualify(alias: &str, zone: &str) -> String {
    let alias = alias.trim_end_matches('.');
    let zone = zone.trim_end_matches('.');

    if alias == APEX || alias.eq_ignore_ascii_case(zone) {
        return zone.to_string();
    }

    let suffix = format!(".{zone}");
    if alias.len() > suffix.len() && alias.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        return alias.to_string();
    }

    format!("{alias}{suffix}")
}
