//! End-to-end behaviour of the dispatch framework: registration, nested
//! cancellation, teardown and deadlines.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledgerkit_client::plugins::nft::FIND_MINT_WITH_METADATA_BY_ADDRESS;
use ledgerkit_client::plugins::nft::FindMintByAddressInput;
use ledgerkit_client::{
    handler_fn, plugin_fn, Capability, Client, ClientConfig, FetchOptions, MemoryDriver,
    OperationDescriptor, OperationError, Plugin, Scope,
};
use ledgerkit_core::InMemoryLedger;
use parking_lot::Mutex;
use tokio::sync::Notify;

const DOUBLE: OperationDescriptor<u64, u64> = OperationDescriptor::new("Double");
const PING: OperationDescriptor<(), ()> = OperationDescriptor::new("Ping");
const CHAIN: OperationDescriptor<(), ()> = OperationDescriptor::new("Chain");
const LEAF: OperationDescriptor<(), ()> = OperationDescriptor::new("Leaf");
const SPIN: OperationDescriptor<(), ()> = OperationDescriptor::new("Spin");

fn empty_ledger() -> Arc<InMemoryLedger> {
    Arc::new(InMemoryLedger::new())
}

fn doubling_plugin() -> impl Plugin {
    plugin_fn("double", |installer| {
        installer.register(DOUBLE, handler_fn(|n: u64, _client, _scope| async move { Ok(n * 2) }))
    })
}

struct Pinger(&'static str);

impl Capability for Pinger {
    fn name(&self) -> &'static str {
        "pinger"
    }
}

fn ping_plugin(name: &'static str) -> impl Plugin {
    plugin_fn(name, move |installer| {
        installer.provide(Arc::new(Pinger(name)));
        installer.register(PING, handler_fn(|(), _client, _scope| async { Ok(()) }))
    })
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn double_resolves_to_twice_the_input() {
    let client = Client::builder(empty_ledger())
        .plugin(doubling_plugin())
        .build()
        .unwrap();

    assert_eq!(client.run(DOUBLE.with(21), None).await.unwrap(), 42);
}

#[test]
fn same_key_from_two_plugins_fails_construction() {
    let err = Client::builder(empty_ledger())
        .plugin(ping_plugin("a"))
        .plugin(ping_plugin("b"))
        .build()
        .unwrap_err();

    assert!(matches!(err, OperationError::Duplicate { key: "Ping" }));
}

#[test]
fn first_capability_wins_across_plugins() {
    let second = plugin_fn("quiet", |installer| {
        installer.provide(Arc::new(Pinger("quiet")));
        Ok(())
    });
    let client = Client::builder(empty_ledger())
        .plugin(ping_plugin("loud"))
        .plugin(second)
        .build()
        .unwrap();

    assert_eq!(client.capability::<Pinger>().unwrap().0, "loud");
    assert!(client.has_capability("pinger"));
}

#[tokio::test]
async fn unregistered_key_rejects() {
    let client = Client::builder(empty_ledger()).build().unwrap();
    let err = client.run(DOUBLE.with(1), None).await.unwrap_err();
    assert!(matches!(err, OperationError::Unregistered { ref key } if key == "Double"));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChainProbe {
    started: Notify,
    resume: Notify,
    teardowns: Mutex<Vec<&'static str>>,
    leaf_runs: AtomicU32,
    leaf_canceled: AtomicU32,
}

fn chain_plugin(probe: Arc<ChainProbe>) -> impl Plugin {
    plugin_fn("chain", move |installer| {
        let leaf_probe = Arc::clone(&probe);
        installer.register(
            LEAF,
            handler_fn(move |(), _client, _scope| {
                let probe = Arc::clone(&leaf_probe);
                async move {
                    probe.leaf_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )?;

        let chain_probe = Arc::clone(&probe);
        installer.register(
            CHAIN,
            handler_fn(move |(), client: Client, scope: Scope| {
                let probe = Arc::clone(&chain_probe);
                async move {
                    for name in ["close-connection", "release-lock"] {
                        let probe = Arc::clone(&probe);
                        scope.on_cleanup(move || {
                            probe.teardowns.lock().push(name);
                            Ok(())
                        })?;
                    }
                    probe.started.notify_one();
                    probe.resume.notified().await;

                    let leaf = client.run(LEAF.with(()), Some(&scope)).await;
                    if matches!(leaf, Err(OperationError::Canceled)) {
                        probe.leaf_canceled.fetch_add(1, Ordering::SeqCst);
                    }
                    leaf
                }
            }),
        )
    })
}

#[tokio::test]
async fn canceling_outer_scope_rejects_nested_leaf_and_tears_down_once() {
    let probe = Arc::new(ChainProbe::default());
    let client = Client::builder(empty_ledger())
        .plugin(chain_plugin(Arc::clone(&probe)))
        .build()
        .unwrap();

    let root = Scope::new();
    let task = {
        let client = client.clone();
        let root = root.clone();
        tokio::spawn(async move { client.run(CHAIN.with(()), Some(&root)).await })
    };

    probe.started.notified().await;
    root.cancel();
    probe.resume.notify_one();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, OperationError::Canceled));
    assert_eq!(probe.leaf_runs.load(Ordering::SeqCst), 0);
    assert_eq!(probe.leaf_canceled.load(Ordering::SeqCst), 1);
    // Each callback exactly once, newest first.
    assert_eq!(
        *probe.teardowns.lock(),
        vec!["release-lock", "close-connection"]
    );
}

#[tokio::test]
async fn canceled_parent_performs_no_ledger_reads() {
    let ledger = common::ledger();
    let storage = Arc::new(MemoryDriver::new());
    let client = common::client(&ledger, &storage);
    let nft = common::seed_nft(&ledger, 10, common::SELLER, "");

    let root = Scope::new();
    root.cancel();
    let err = client
        .run(
            FIND_MINT_WITH_METADATA_BY_ADDRESS.with(FindMintByAddressInput {
                address: nft.mint,
                options: FetchOptions::default(),
            }),
            Some(&root),
        )
        .await
        .unwrap_err();

    assert!(err.is_canceled());
    assert_eq!(ledger.total_reads(), 0);
}

#[tokio::test]
async fn cancellation_is_not_retroactive() {
    let client = Client::builder(empty_ledger())
        .plugin(doubling_plugin())
        .build()
        .unwrap();
    let root = Scope::new();

    let done = client.run(DOUBLE.with(4), Some(&root)).await;
    root.cancel();

    assert_eq!(done.unwrap(), 8);
    let err = client.run(DOUBLE.with(4), Some(&root)).await.unwrap_err();
    assert!(matches!(err, OperationError::Canceled));
}

#[tokio::test]
async fn canceling_a_child_leaves_the_parent_running() {
    let client = Client::builder(empty_ledger())
        .plugin(doubling_plugin())
        .build()
        .unwrap();
    let root = Scope::new();
    let child = root.child();
    child.cancel();

    assert!(!root.is_canceled());
    assert_eq!(client.run(DOUBLE.with(3), Some(&root)).await.unwrap(), 6);
    assert!(client.run(DOUBLE.with(3), Some(&child)).await.is_err());
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_teardown_runs_every_callback_then_reports() {
    let ran = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&ran);
    const FLAKY: OperationDescriptor<(), u32> = OperationDescriptor::new("Flaky");

    let client = Client::builder(empty_ledger())
        .plugin(plugin_fn("flaky", move |installer| {
            let counter = Arc::clone(&counter);
            installer.register(
                FLAKY,
                handler_fn(move |(), _client, scope: Scope| {
                    let counter = Arc::clone(&counter);
                    async move {
                        for fails in [false, true, false] {
                            let counter = Arc::clone(&counter);
                            scope.on_cleanup(move || {
                                counter.fetch_add(1, Ordering::SeqCst);
                                if fails {
                                    anyhow::bail!("socket already closed");
                                }
                                Ok(())
                            })?;
                        }
                        Ok(7)
                    }
                }),
            )
        }))
        .build()
        .unwrap();

    let err = client.run(FLAKY.with(()), None).await.unwrap_err();
    assert_eq!(ran.load(Ordering::SeqCst), 3);
    match err {
        OperationError::Teardown { primary, failures } => {
            assert!(primary.is_none());
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].to_string(), "socket already closed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn operation_timeout_cancels_cooperative_handler() {
    let config = ClientConfig {
        operation_timeout: Some(Duration::from_millis(50)),
        ..ClientConfig::default()
    };
    let client = Client::builder(empty_ledger())
        .config(config)
        .plugin(plugin_fn("spin", |installer| {
            installer.register(
                SPIN,
                handler_fn(|(), _client, scope: Scope| async move {
                    loop {
                        scope.throw_if_canceled()?;
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                }),
            )
        }))
        .build()
        .unwrap();

    let err = client.run(SPIN.with(()), None).await.unwrap_err();
    assert!(matches!(err, OperationError::Canceled));
}
