//! Error types for tailflare
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors fall into two scopes:
//! - **Run-wide** (`Config`, `Directory`, `ZoneNotFound`): nothing can proceed, the run aborts.
//! - **Alias-scoped** (`DeviceNotFound`, `List`, `Apply`, `PartialApply`, `Canceled`):
//!   recorded against one alias, the run continues with the next alias.

use thiserror::Error;

/// Result type alias for tailflare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tailflare
#[derive(Error, Debug)]
pub enum Error {
    /// The configured zone name has no match at the record store
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// A configured device name is absent from the directory snapshot
    #[error("Device '{device}' not found in directory")]
    DeviceNotFound {
        /// Device hostname as configured
        device: String,
    },

    /// Listing the current records for a name failed
    #[error("Failed to list records for {name}: {source}")]
    List {
        /// Fully-qualified record name
        name: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Submitting the batch for a name failed
    #[error("Failed to apply batch for {name}: {source}")]
    Apply {
        /// Fully-qualified record name
        name: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// The store applied only part of a batch
    #[error("Batch partially applied ({applied} of {total} operations): {message}")]
    PartialApply {
        /// Operations the store reports as applied
        applied: usize,
        /// Operations in the batch
        total: usize,
        /// Provider message
        message: String,
    },

    /// Device directory errors
    #[error("Directory error: {0}")]
    Directory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote lookup failed before a response could be interpreted
    #[error("Transport error: {0}")]
    Transport(String),

    /// A remote call was canceled or ran past its deadline
    #[error("Operation canceled: {0}")]
    Canceled(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// An error scoped to one alias
    #[error("(alias {alias}) {source}")]
    Alias {
        /// Alias name as configured
        alias: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Every error recorded during a run, joined
    #[error("{}", join_errors(.0))]
    Multiple(Vec<Error>),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Create a "zone not found" error
    pub fn zone_not_found(zone: impl Into<String>) -> Self {
        Self::ZoneNotFound(zone.into())
    }

    /// Create a "device not found" error
    pub fn device_not_found(device: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            device: device.into(),
        }
    }

    /// Wrap a listing failure with the record name it occurred for
    pub fn list(name: impl Into<String>, source: Error) -> Self {
        Self::List {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a batch failure with the record name it occurred for
    pub fn apply(name: impl Into<String>, source: Error) -> Self {
        Self::Apply {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Create a directory error
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a cancellation error
    pub fn canceled(msg: impl Into<String>) -> Self {
        Self::Canceled(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Attach the alias an error occurred in
    pub fn alias(alias: impl Into<String>, source: Error) -> Self {
        Self::Alias {
            alias: alias.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, following `Alias`, `List` and `Apply` wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::Alias { source, .. } | Self::List { source, .. } | Self::Apply { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// Whether this error (or the error it wraps) is a cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self.root(), Self::Canceled(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
