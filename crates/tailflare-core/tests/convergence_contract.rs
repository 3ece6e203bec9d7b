//! Behavioural Contract Test: Convergence
//!
//! Constraints verified:
//! - One run converges the store to the desired addresses
//! - A second run changes no membership and keeps every record id
//! - Re-ordering devices or moving an address to another device causes no churn
//! - Paged listings are consumed completely
//!
//! If this test fails, every run would delete and recreate records.

mod common;

use common::*;
use tailflare_core::SyncOrchestrator;
use tailflare_core::traits::{BatchOutcome, Ttl};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn first_run_creates_second_run_only_patches() {
    let directory = StaticDirectory::new(vec![device("web-1", 1), device("web-2", 2)]);
    let store = InstrumentedStore::new(&["example.com"]);
    let config = minimal_config("example.com").with_alias("@", ["web-1", "web-2"]);

    let (orchestrator, _events) =
        SyncOrchestrator::new(Box::new(directory), Box::new(store.clone()), config).unwrap();
    let cancel = CancellationToken::new();

    let first = orchestrator.run(&cancel).await;
    assert!(first.is_success());
    assert_eq!(
        first.aliases[0].changes,
        Some(BatchOutcome {
            created: 2,
            patched: 0,
            deleted: 0
        })
    );
    assert_eq!(store.addresses("example.com").await, vec![ip(1), ip(2)]);
    let ids = store.ids("example.com").await;

    let second = orchestrator.run(&cancel).await;
    assert!(second.is_success());
    assert_eq!(
        second.aliases[0].changes,
        Some(BatchOutcome {
            created: 0,
            patched: 2,
            deleted: 0
        })
    );
    assert_eq!(store.ids("example.com").await, ids);
}

#[tokio::test]
async fn reordering_and_moving_addresses_causes_no_churn() {
    let store = InstrumentedStore::new(&["example.com"]);
    let nas = store.seed("www.example.com", ip(1), "nas").await;
    let pi = store.seed("www.example.com", ip(2), "pi").await;

    // same addresses, listed in a different order, one behind a renamed device
    let directory = StaticDirectory::new(vec![device("pi", 2), device("nas-2", 1)]);
    let config = minimal_config("example.com").with_alias("www", ["pi", "nas-2"]);

    let (orchestrator, _events) =
        SyncOrchestrator::new(Box::new(directory), Box::new(store.clone()), config).unwrap();
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert!(report.is_success());
    let batch = &store.applied_batches()[0];
    assert!(batch.creates.is_empty());
    assert!(batch.deletes.is_empty());

    let mut patched: Vec<String> = batch.patches.iter().map(|p| p.id.clone()).collect();
    patched.sort();
    let mut expected = vec![nas, pi];
    expected.sort();
    assert_eq!(patched, expected);
}

#[tokio::test]
async fn replaced_address_is_swapped_in_one_batch() {
    let store = InstrumentedStore::new(&["example.com"]);
    let kept = store.seed("nas.example.com", ip(1), "nas").await;
    let stale = store.seed("nas.example.com", ip(9), "laptop").await;

    let directory = StaticDirectory::new(vec![device("nas", 1), device("laptop", 3)]);
    let config = minimal_config("example.com").with_alias("nas", ["nas", "laptop"]);

    let (orchestrator, _events) =
        SyncOrchestrator::new(Box::new(directory), Box::new(store.clone()), config).unwrap();
    let report = orchestrator.run(&CancellationToken::new()).await;
    assert!(report.is_success());

    let batches = store.applied_batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];

    assert_eq!(batch.creates.len(), 1);
    assert_eq!(batch.creates[0].address, ip(3));
    assert_eq!(batch.creates[0].ttl, Ttl::Automatic);
    assert!(!batch.creates[0].proxied);
    assert_eq!(batch.creates[0].comment, "Address of device 'laptop'");
    assert_eq!(batch.patches.len(), 1);
    assert_eq!(batch.patches[0].id, kept);
    assert_eq!(batch.deletes.len(), 1);
    assert_eq!(batch.deletes[0].id, stale);

    assert_eq!(store.addresses("nas.example.com").await, vec![ip(1), ip(3)]);
}

#[tokio::test]
async fn paged_listing_is_consumed_completely() {
    let store = InstrumentedStore::new(&["example.com"]).with_page_size(2);
    for last in 1..=5 {
        store.seed("www.example.com", ip(last), "old").await;
    }

    // keep only the last seeded address: four deletes spread over three pages
    let directory = StaticDirectory::new(vec![device("new", 5)]);
    let config = minimal_config("example.com").with_alias("www", ["new"]);

    let (orchestrator, _events) =
        SyncOrchestrator::new(Box::new(directory), Box::new(store.clone()), config).unwrap();
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert!(report.is_success());
    assert_eq!(
        report.aliases[0].changes,
        Some(BatchOutcome {
            created: 0,
            patched: 1,
            deleted: 4
        })
    );
    assert_eq!(store.addresses("www.example.com").await, vec![ip(5)]);
}

#[tokio::test]
async fn empty_alias_over_empty_name_submits_nothing() {
    let directory = StaticDirectory::new(vec![]);
    let store = InstrumentedStore::new(&["example.com"]);
    let config = minimal_config("example.com").with_alias("unused", Vec::<String>::new());

    let (orchestrator, _events) =
        SyncOrchestrator::new(Box::new(directory), Box::new(store.clone()), config).unwrap();
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert!(report.is_success());
    assert_eq!(report.aliases[0].changes, Some(BatchOutcome::default()));
    assert_eq!(store.list_calls(), 1);
    assert_eq!(store.apply_calls(), 0);
}

#[tokio::test]
async fn memory_store_rehearsal_from_yaml() {
    let config = tailflare_core::SyncConfig::from_yaml_str(
        r#"
zone: example.com
aliases:
  "@": [web-1]
  nas: [nas]
"#,
    )
    .unwrap();

    let registry = tailflare_core::ProviderRegistry::with_builtins();
    let store = registry
        .create_store(&tailflare_core::StoreConfig::Memory {
            zones: vec!["example.com".to_string()],
        })
        .unwrap();
    let directory = StaticDirectory::new(vec![device("web-1", 1), device("nas", 2)]);

    let (orchestrator, _events) = SyncOrchestrator::new(Box::new(directory), store, config).unwrap();
    let report = orchestrator.run(&CancellationToken::new()).await;

    assert_eq!(report.successful(), 2);
    let aliases: Vec<&str> = report.aliases.iter().map(|a| a.alias.as_str()).collect();
    assert_eq!(aliases, vec!["@", "nas"]);
}
