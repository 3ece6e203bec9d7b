//! Behavioural Contract Test: Failure Isolation
//!
//! Constraints verified:
//! - A failing alias never stops the other aliases
//! - Missing devices never stop an alias from reconciling, but fail the run
//!   unless it is lenient
//! - Run-wide failures abort before any alias, all aliases failed with one cause
//! - A broken listing never leads to a batch for that alias
//! - Cancellation and deadlines surface as `Canceled` alias failures
//!
//! If this test fails, one bad alias could take the whole zone down with it.

mod common;

use common::*;
use std::time::Duration;
use tailflare_core::engine::{AliasState, SyncEvent, SyncOrchestrator};
use tailflare_core::error::Error;
use tokio_util::sync::CancellationToken;

fn orchestrator(
    directory: impl tailflare_core::AddressDirectory + 'static,
    store: &InstrumentedStore,
    config: tailflare_core::SyncConfig,
) -> (
    SyncOrchestrator,
    tokio::sync::mpsc::Receiver<SyncEvent>,
) {
    SyncOrchestrator::new(Box::new(directory), Box::new(store.clone()), config)
        .expect("orchestrator construction succeeds")
}

#[tokio::test]
async fn scenario_c_missing_device_is_a_soft_failure() {
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.com"]);
    let config = minimal_config("example.com").with_alias("www", ["nas", "ghost"]);

    let (orchestrator, mut events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    let outcome = &report.aliases[0];
    assert_eq!(outcome.state, AliasState::Succeeded);
    assert_eq!(outcome.soft_failures, vec!["ghost".to_string()]);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(report.soft_failures().len(), 1);
    assert_eq!(report.failed(), 0);

    assert_eq!(store.addresses("www.example.com").await, vec![ip(1)]);

    let missing: Vec<SyncEvent> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, SyncEvent::DeviceNotFound { .. }))
        .collect();
    assert_eq!(
        missing,
        vec![SyncEvent::DeviceNotFound {
            alias: "www".to_string(),
            device: "ghost".to_string(),
        }]
    );

    // the alias converged, but the run as a whole reports the missing device
    assert!(!report.is_success());
    let err = report.into_result().unwrap_err();
    assert_eq!(err.to_string(), "(alias www) Device 'ghost' not found in directory");
}

#[tokio::test]
async fn missing_device_from_plain_yaml_fails_the_run() {
    let config = tailflare_core::SyncConfig::from_yaml_str(
        "zone: example.com\naliases:\n  www: [nas, ghost]\n",
    )
    .unwrap();
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.com"]);

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.successful(), 1);
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn lenient_runs_only_warn_on_missing_devices() {
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.com"]);
    let mut config = minimal_config("example.com").with_alias("www", ["nas", "ghost"]);
    config.engine.fail_on_missing_device = false;

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.soft_failures().len(), 1);
    assert!(report.is_success());
    assert_eq!(store.addresses("www.example.com").await, vec![ip(1)]);
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn scenario_d_missing_zone_aborts_the_run() {
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.org"]);
    let config = minimal_config("example.com")
        .with_alias("@", ["nas"])
        .with_alias("www", ["nas"]);

    let (orchestrator, mut events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.failed(), 2);
    assert!(report.aliases.iter().all(|a| a.state == AliasState::Failed));
    assert!(
        report
            .aliases
            .iter()
            .all(|a| a.error.as_deref() == Some("Zone not found: example.com"))
    );
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], Error::ZoneNotFound(_)));

    // nothing was listed or applied
    assert_eq!(store.list_calls(), 0);
    assert_eq!(store.apply_calls(), 0);

    let aborted = std::iter::from_fn(|| events.try_recv().ok())
        .any(|e| matches!(e, SyncEvent::RunAborted { .. }));
    assert!(aborted);
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn directory_failure_aborts_the_run() {
    let store = InstrumentedStore::new(&["example.com"]);
    let config = minimal_config("example.com").with_alias("www", ["nas"]);

    let (orchestrator, _events) = orchestrator(FailingDirectory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.failed(), 1);
    assert!(matches!(report.errors[0], Error::Directory(_)));
    assert_eq!(store.zone_lookups(), 0);
}

#[tokio::test]
async fn broken_listing_fails_only_that_alias() {
    let directory = StaticDirectory::new(vec![device("nas", 1), device("pi", 2)]);
    let store = InstrumentedStore::new(&["example.com"]).with_page_size(1);
    store.seed("a.example.com", ip(9), "old").await;
    store.seed("a.example.com", ip(8), "old").await;
    store.break_listing("a.example.com");

    let config = minimal_config("example.com")
        .with_alias("a", ["nas"])
        .with_alias("b", ["pi"]);

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.successful(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.aliases[0].state, AliasState::Failed);
    assert!(matches!(
        report.errors[0].root(),
        Error::Http(message) if message.contains("page 2")
    ));
    assert!(report.errors[0].to_string().starts_with("(alias a) Failed to list records"));

    // no batch for the broken alias, the seeded records are untouched
    let batches = store.applied_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].name, "b.example.com");
    assert_eq!(store.addresses("a.example.com").await, vec![ip(8), ip(9)]);
}

#[tokio::test]
async fn rejected_batch_fails_only_that_alias() {
    let directory = StaticDirectory::new(vec![device("nas", 1), device("pi", 2)]);
    let store = InstrumentedStore::new(&["example.com"]);
    store.reject_batches("a.example.com");

    let config = minimal_config("example.com")
        .with_alias("a", ["nas"])
        .with_alias("b", ["pi"]);

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.aliases[0].state, AliasState::Failed);
    assert_eq!(report.aliases[0].changes, None);
    assert_eq!(report.aliases[1].state, AliasState::Succeeded);
    assert!(matches!(report.errors[0].root(), Error::PartialApply { .. }));
    assert_eq!(store.addresses("b.example.com").await, vec![ip(2)]);

    let err = report.into_result().unwrap_err();
    assert_eq!(err.to_string().lines().count(), 1);
}

#[tokio::test]
async fn alias_without_devices_deletes_everything() {
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.com"]);
    store.seed("old.example.com", ip(5), "retired").await;
    store.seed("old.example.com", ip(6), "retired").await;

    let config = minimal_config("example.com").with_alias("old", ["ghost"]);

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.aliases[0].state, AliasState::Succeeded);
    assert_eq!(report.aliases[0].changes.map(|c| c.deleted), Some(2));
    assert!(store.addresses("old.example.com").await.is_empty());
}

#[tokio::test]
async fn cancellation_fails_in_flight_alias() {
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.com"]);
    store.hang_batches("www.example.com");

    let mut config = minimal_config("example.com").with_alias("www", ["nas"]);
    config.engine.call_timeout_secs = 0;

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&cancel))
        .await
        .expect("run finishes after cancellation");

    assert_eq!(report.aliases[0].state, AliasState::Failed);
    assert!(report.errors[0].is_canceled());
}

#[tokio::test]
async fn deadline_fails_hanging_alias_and_continues() {
    let directory = StaticDirectory::new(vec![device("nas", 1), device("pi", 2)]);
    let store = InstrumentedStore::new(&["example.com"]);
    store.hang_batches("a.example.com");

    let mut config = minimal_config("example.com")
        .with_alias("a", ["nas"])
        .with_alias("b", ["pi"]);
    config.engine.call_timeout_secs = 1;

    let (orchestrator, _events) = orchestrator(directory, &store, config);
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.aliases[0].state, AliasState::Failed);
    assert!(report.errors[0].is_canceled());
    assert_eq!(report.aliases[1].state, AliasState::Succeeded);
}

#[tokio::test]
async fn already_cancelled_run_touches_nothing() {
    let directory = StaticDirectory::new(vec![device("nas", 1)]);
    let store = InstrumentedStore::new(&["example.com"]);
    let config = minimal_config("example.com").with_alias("www", ["nas"]);

    let (orchestrator, _events) = orchestrator(directory.clone(), &store, config);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = orchestrator.run(&cancel).await;

    assert_eq!(report.failed(), 1);
    assert!(report.errors[0].is_canceled());
    assert_eq!(directory.list_calls(), 0);
    assert_eq!(store.apply_calls(), 0);
}
