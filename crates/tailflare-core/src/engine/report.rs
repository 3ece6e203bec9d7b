//! Run events and the end-of-run report

use crate::error::{Error, Result};
use crate::record::AddressRecord;
use crate::traits::BatchOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-alias lifecycle
///
/// ```text
/// PENDING → RESOLVING_ADDRESSES → DIFFING → APPLYING → SUCCEEDED
///                                    │          │
///                                    └──────────┴──────► FAILED
/// ```
///
/// A run-wide abort moves every alias from `PENDING` straight to `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AliasState {
    Pending,
    ResolvingAddresses,
    Diffing,
    Applying,
    Succeeded,
    Failed,
}

impl AliasState {
    /// True for `Succeeded` and `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, AliasState::Succeeded | AliasState::Failed)
    }
}

impl fmt::Display for AliasState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AliasState::Pending => "PENDING",
            AliasState::ResolvingAddresses => "RESOLVING_ADDRESSES",
            AliasState::Diffing => "DIFFING",
            AliasState::Applying => "APPLYING",
            AliasState::Succeeded => "SUCCEEDED",
            AliasState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Events emitted by the SyncOrchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Run started
    RunStarted { aliases: usize },

    /// An alias moved to a new state
    AliasStateChanged { alias: String, state: AliasState },

    /// Desired records resolved, reconciliation about to start
    AliasUpdateStarted {
        alias: String,
        records: Vec<AddressRecord>,
    },

    /// A configured device is absent from the directory (soft failure)
    DeviceNotFound { alias: String, device: String },

    /// Alias converged
    AliasSucceeded { alias: String, outcome: BatchOutcome },

    /// Alias failed
    AliasFailed { alias: String, error: String },

    /// A run-wide step failed; no alias was processed
    RunAborted { error: String },

    /// Run finished
    RunCompleted { successful: usize, failed: usize },
}

/// What happened to one alias during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasOutcome {
    /// Alias name as configured
    pub alias: String,
    /// Final state (`Succeeded` or `Failed` once the run is over)
    pub state: AliasState,
    /// Desired records resolved from the directory
    pub records: Vec<AddressRecord>,
    /// Counts from the applied batch, `None` unless the alias succeeded
    pub changes: Option<BatchOutcome>,
    /// Configured devices missing from the directory
    pub soft_failures: Vec<String>,
    /// Rendered failure cause
    pub error: Option<String>,
}

impl AliasOutcome {
    pub(crate) fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            state: AliasState::Pending,
            records: Vec::new(),
            changes: None,
            soft_failures: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn aborted(alias: impl Into<String>, cause: &Error) -> Self {
        Self {
            state: AliasState::Failed,
            error: Some(cause.to_string()),
            ..Self::new(alias)
        }
    }

    /// True when the alias converged
    pub fn succeeded(&self) -> bool {
        self.state == AliasState::Succeeded
    }
}

/// Summary of one run
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per configured alias, in processing order
    pub aliases: Vec<AliasOutcome>,
    /// Hard failures, each wrapped with the alias it occurred for. A run-wide
    /// abort records its root cause once.
    pub errors: Vec<Error>,
    /// Whether soft failures fail the run
    pub strict: bool,
}

impl RunReport {
    /// Aliases that converged
    pub fn successful(&self) -> usize {
        self.aliases.iter().filter(|a| a.succeeded()).count()
    }

    /// Aliases that failed
    pub fn failed(&self) -> usize {
        self.aliases.len() - self.successful()
    }

    /// Every missing device, wrapped with its alias
    pub fn soft_failures(&self) -> Vec<Error> {
        self.aliases
            .iter()
            .flat_map(|outcome| {
                outcome
                    .soft_failures
                    .iter()
                    .map(|device| Error::alias(&outcome.alias, Error::device_not_found(device)))
            })
            .collect()
    }

    /// True when the run counts as successful
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
            && self.failed() == 0
            && !(self.strict && self.aliases.iter().any(|a| !a.soft_failures.is_empty()))
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Turn a failed run into one error listing every cause
    ///
    /// Soft failures are included in the joined error, but never fail a run
    /// on their own unless the run is strict.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let mut causes = self.soft_failures();
        let mut errors = self.errors;
        errors.append(&mut causes);
        Err(Error::Multiple(errors))
    }
}
