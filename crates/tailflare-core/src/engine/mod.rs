//! Sync orchestrator
//!
//! The SyncOrchestrator runs one reconciliation pass:
//! - Takes one directory snapshot
//! - Resolves the zone (cached after the first success)
//! - Reconciles every configured alias in turn
//! - Aggregates the outcome into a [`RunReport`]
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   snapshot   ┌──────────────────┐
//! │ AddressDirectory │─────────────►│                  │──── SyncEvent ───► Events
//! └──────────────────┘              │ SyncOrchestrator │
//! ┌──────────────────┐  zone/list/  │                  │
//! │   RecordStore    │◄────batch────│                  │──── RunReport ───► caller
//! └──────────────────┘              └──────────────────┘
//! ```
//!
//! ## Failure policy
//!
//! - Directory fetch and zone resolution are run-wide: a failure aborts the
//!   run and every alias is reported failed with the same root cause.
//! - Listing and batch failures are alias-scoped: recorded, then the next
//!   alias is processed.
//! - Missing devices are soft failures: dropped from the desired set and
//!   reported. The alias still converges; the run fails unless
//!   `fail_on_missing_device` is off.
//! - No retries within a run.

mod report;

pub use report::{AliasOutcome, AliasState, RunReport, SyncEvent};

use crate::config::SyncConfig;
use crate::directory::DirectorySnapshot;
use crate::error::{Error, Result};
use crate::reconcile::{ByAddress, diff};
use crate::record::{AddressRecord, display_records, qualify};
use crate::traits::{
    AddressDirectory, BatchOutcome, RecordBatch, RecordPolicy, RecordStore, collect_records,
};
use crate::zone::{ZoneHandle, ZoneResolver};
use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives one reconciliation per configured alias
///
/// ## Lifecycle
///
/// 1. Create with [`SyncOrchestrator::new()`]
/// 2. Call [`SyncOrchestrator::run()`] once per pass
/// 3. Inspect the returned [`RunReport`]
///
/// The zone id is cached inside the orchestrator, so repeated runs on the
/// same instance resolve the zone only once.
///
/// ## Cancellation
///
/// Every remote call races the run's `CancellationToken` and the configured
/// per-call deadline. Either one firing fails the call with
/// `Error::Canceled`, handled like any other failure of that step.
pub struct SyncOrchestrator {
    /// Device directory
    directory: Box<dyn AddressDirectory>,

    /// DNS record store
    store: Box<dyn RecordStore>,

    /// Zone id cache
    zone: ZoneResolver,

    /// Alias → device names, iterated in name order
    aliases: BTreeMap<String, Vec<String>>,

    /// TTL and proxy settings written to managed records
    policy: RecordPolicy,

    /// Deadline for each remote call
    call_timeout: Option<Duration>,

    /// Whether missing devices fail the run
    fail_on_missing_device: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Parameters
    ///
    /// - `directory`: Device directory implementation
    /// - `store`: Record store implementation
    /// - `config`: Sync configuration (validated here)
    ///
    /// # Returns
    ///
    /// A tuple of (orchestrator, event_receiver)
    pub fn new(
        directory: Box<dyn AddressDirectory>,
        store: Box<dyn RecordStore>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let orchestrator = Self {
            directory,
            store,
            zone: ZoneResolver::new(config.zone),
            aliases: config.aliases,
            policy: RecordPolicy::default(),
            call_timeout: config.engine.call_timeout(),
            fail_on_missing_device: config.engine.fail_on_missing_device,
            event_tx: tx,
        };

        Ok((orchestrator, rx))
    }

    /// Override the TTL / proxy policy for managed records
    pub fn with_policy(mut self, policy: RecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The zone resolver (exposes the cached handle)
    pub fn zone(&self) -> &ZoneResolver {
        &self.zone
    }

    /// Run one reconciliation pass over every alias
    ///
    /// Never returns early because of one alias: every alias is attempted
    /// unless a run-wide step fails first. Use [`RunReport::into_result`] to
    /// turn the report into a single joined error.
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let started_at = Utc::now();
        info!(
            "Starting sync of {} aliases in zone {}",
            self.aliases.len(),
            self.zone.zone_name()
        );
        self.emit_event(SyncEvent::RunStarted {
            aliases: self.aliases.len(),
        });

        let mut outcomes = Vec::with_capacity(self.aliases.len());
        let mut errors = Vec::new();

        match self.prepare(cancel).await {
            Ok((snapshot, zone)) => {
                for (alias, devices) in &self.aliases {
                    let (outcome, failure) =
                        self.sync_alias(alias, devices, &snapshot, &zone, cancel).await;
                    outcomes.push(outcome);
                    errors.extend(failure);
                }
            }
            Err(root) => {
                error!("Sync aborted before any alias was processed: {}", root);
                self.emit_event(SyncEvent::RunAborted {
                    error: root.to_string(),
                });

                for alias in self.aliases.keys() {
                    self.emit_event(SyncEvent::AliasStateChanged {
                        alias: alias.clone(),
                        state: AliasState::Failed,
                    });
                    self.emit_event(SyncEvent::AliasFailed {
                        alias: alias.clone(),
                        error: root.to_string(),
                    });
                    outcomes.push(AliasOutcome::aborted(alias, &root));
                }
                errors.push(root);
            }
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            aliases: outcomes,
            errors,
            strict: self.fail_on_missing_device,
        };

        info!(
            "Sync complete: {} succeeded, {} failed, {} missing devices",
            report.successful(),
            report.failed(),
            report.soft_failures().len()
        );
        self.emit_event(SyncEvent::RunCompleted {
            successful: report.successful(),
            failed: report.failed(),
        });

        report
    }

    /// Run-wide steps: directory snapshot, then zone resolution
    async fn prepare(&self, cancel: &CancellationToken) -> Result<(DirectorySnapshot, ZoneHandle)> {
        let directory_name = self.directory.directory_name();

        let devices = self
            .bounded(cancel, "device directory fetch", self.directory.list_devices())
            .await
            .map_err(|e| match e {
                Error::Directory(_) | Error::Canceled(_) => e,
                other => Error::directory(format!("{}: {}", directory_name, other)),
            })?;

        let snapshot = DirectorySnapshot::from_devices(devices);
        info!(
            "Directory {} returned {} devices with an IPv4 address",
            directory_name,
            snapshot.len()
        );

        let zone = self
            .bounded(cancel, "zone lookup", self.zone.resolve(self.store.as_ref()))
            .await?
            .clone();

        Ok((snapshot, zone))
    }

    /// Reconcile one alias, never propagating its failure
    async fn sync_alias(
        &self,
        alias: &str,
        devices: &[String],
        snapshot: &DirectorySnapshot,
        zone: &ZoneHandle,
        cancel: &CancellationToken,
    ) -> (AliasOutcome, Option<Error>) {
        let mut outcome = AliasOutcome::new(alias);

        self.transition(&mut outcome, AliasState::ResolvingAddresses);
        let resolution = snapshot.resolve_all(devices);
        for device in &resolution.missing {
            warn!("Alias {}: device {} not found in directory, skipping", alias, device);
            self.emit_event(SyncEvent::DeviceNotFound {
                alias: alias.to_string(),
                device: device.clone(),
            });
        }
        outcome.soft_failures = resolution.missing;
        outcome.records = resolution.records;

        let name = qualify(alias, &zone.name);
        info!(
            "Updating alias {} ({}) to {}",
            alias,
            name,
            display_records(&outcome.records)
        );
        self.emit_event(SyncEvent::AliasUpdateStarted {
            alias: alias.to_string(),
            records: outcome.records.clone(),
        });

        let desired = outcome.records.clone();
        match self.reconcile(&name, zone, &desired, &mut outcome, cancel).await {
            Ok(changes) => {
                outcome.changes = Some(changes);
                self.transition(&mut outcome, AliasState::Succeeded);
                self.emit_event(SyncEvent::AliasSucceeded {
                    alias: alias.to_string(),
                    outcome: changes,
                });
                (outcome, None)
            }
            Err(e) => {
                let e = Error::alias(alias, e);
                error!("{}", e);
                outcome.error = Some(e.to_string());
                self.transition(&mut outcome, AliasState::Failed);
                self.emit_event(SyncEvent::AliasFailed {
                    alias: alias.to_string(),
                    error: e.to_string(),
                });
                (outcome, Some(e))
            }
        }
    }

    /// List, diff and apply for one fully-qualified name
    async fn reconcile(
        &self,
        name: &str,
        zone: &ZoneHandle,
        desired: &[AddressRecord],
        outcome: &mut AliasOutcome,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome> {
        self.transition(outcome, AliasState::Diffing);

        let current = self
            .bounded(
                cancel,
                "record listing",
                collect_records(self.store.list_records(&zone.id, name)),
            )
            .await
            .map_err(|e| Error::list(name, e))?;

        let reconciliation = diff(&current, desired, &ByAddress);
        debug!(
            "{}: {} current, {} desired -> create {}, update {}, delete {}",
            name,
            current.len(),
            desired.len(),
            display_records(&reconciliation.create),
            display_records(&reconciliation.update),
            display_records(&reconciliation.delete)
        );

        let batch = RecordBatch::from_reconciliation(name, &reconciliation, &self.policy)?;
        if batch.is_empty() {
            debug!("{}: nothing to submit", name);
            return Ok(BatchOutcome::default());
        }

        self.transition(outcome, AliasState::Applying);
        let applied = self
            .bounded(cancel, "batch apply", self.store.apply_batch(&zone.id, batch))
            .await
            .map_err(|e| Error::apply(name, e))?;

        info!(
            "Applied batch for {}: {} created, {} patched, {} deleted",
            name, applied.created, applied.patched, applied.deleted
        );
        Ok(applied)
    }

    /// Race a remote call against cancellation and the per-call deadline
    async fn bounded<T, F>(&self, cancel: &CancellationToken, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limited = async {
            match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::canceled(format!(
                        "{} exceeded its {}s deadline",
                        what,
                        limit.as_secs()
                    ))),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::canceled(format!("{} canceled", what))),
            result = limited => result,
        }
    }

    fn transition(&self, outcome: &mut AliasOutcome, state: AliasState) {
        debug!("Alias {}: {} -> {}", outcome.alias, outcome.state, state);
        outcome.state = state;
        self.emit_event(SyncEvent::AliasStateChanged {
            alias: outcome.alias.clone(),
            state,
        });
    }

    /// Emit an event, dropping it when the channel is full
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // nobody listens
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
