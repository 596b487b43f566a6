//! Architectural Contract Test: Scheduling Independence
//!
//! This test verifies the per-source scheduling model.
//!
//! Constraints verified:
//! - A slow fetch for one source never stalls another source's schedule
//! - A source is never polled concurrently with itself (skip-if-busy,
//!   not queue-if-busy)
//! - A hung fetch is cut off by the per-fetch timeout and the cycle is
//!   abandoned with state untouched
//!
//! If this test fails, someone has reintroduced a shared polling loop or
//! removed the fetch timeout.

mod common;

use common::*;
use std::time::Duration;
use subwatch_core::config::EngineConfig;
use subwatch_core::{EngineEvent, WatchEngine};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

#[tokio::test]
async fn slow_source_does_not_block_other_sources() {
    let slow_key = "/live/room/slow";
    let fast_key = "/feed/user/fast";

    let fetcher = ControlledFetcher::new();
    fetcher.set_items(slow_key, vec![]);
    fetcher.set_items(fast_key, vec![]);
    // The slow source spends 3s per fetch, starting with its seed fetch
    fetcher.set_delay(slow_key, Duration::from_secs(3));

    let broadcaster = CountingBroadcaster::new();
    let store = MockStateStore::new();

    let config = minimal_config(vec![
        toggle_source("slow", slow_key),
        toggle_source("fast", fast_key),
    ]);
    let (engine, _event_rx) = WatchEngine::new(
        Box::new(ControlledFetcher::sharing_state_with(&fetcher)),
        Box::new(broadcaster),
        Box::new(store),
        config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    // The fast source sees its seed fetch plus ~3 polls; the slow source is
    // still stuck in its first cycles
    let fast_count = fetcher.fetch_count(fast_key);
    let slow_count = fetcher.fetch_count(slow_key);
    assert!(
        fast_count >= 3,
        "fast source should keep polling while the slow one hangs, got {}",
        fast_count
    );
    assert!(
        slow_count <= 2,
        "slow source cannot have completed many cycles, got {}",
        slow_count
    );

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn disabled_source_is_never_polled() {
    let active_key = "/live/room/1";
    let parked_key = "/live/room/2";

    let fetcher = ControlledFetcher::new();
    fetcher.set_items(active_key, vec![]);
    fetcher.set_items(parked_key, vec![]);

    let config = minimal_config(vec![
        toggle_source("active", active_key),
        toggle_source("parked", parked_key).with_enabled(false),
    ]);
    let (engine, _event_rx) = WatchEngine::new(
        Box::new(ControlledFetcher::sharing_state_with(&fetcher)),
        Box::new(CountingBroadcaster::new()),
        Box::new(MockStateStore::new()),
        config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert!(fetcher.fetch_count(active_key) >= 1);
    assert_eq!(
        fetcher.fetch_count(parked_key),
        0,
        "a disabled source must never be fetched, not even for its seed"
    );

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn source_never_overlaps_itself() {
    let key = "/live/room/1";
    let fetcher = ControlledFetcher::new();
    fetcher.set_items(key, vec![]);

    let broadcaster = CountingBroadcaster::new();
    let store = MockStateStore::new();

    let config = minimal_config(vec![toggle_source("room", key)]);
    let (engine, _event_rx) = WatchEngine::new(
        Box::new(ControlledFetcher::sharing_state_with(&fetcher)),
        Box::new(broadcaster),
        Box::new(store),
        config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Seed quickly, then make every cycle outlast the 1s interval
    tokio::time::sleep(Duration::from_millis(300)).await;
    fetcher.set_delay(key, Duration::from_millis(2_500));

    tokio::time::sleep(Duration::from_millis(4_000)).await;
    assert_eq!(
        fetcher.max_in_flight(key),
        1,
        "a cycle that outlasts the interval must delay the next tick, not overlap it"
    );

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn hung_fetch_is_cut_off_by_timeout() {
    let key = "/feed/user/a";
    let fetcher = ControlledFetcher::new();
    fetcher.set_items(key, vec![item_at("post", 1_000)]);

    let broadcaster = CountingBroadcaster::new();
    let broadcaster_probe = CountingBroadcaster::sharing_counters_with(&broadcaster);

    let store = MockStateStore::new();
    let store_probe = MockStateStore::sharing_state_with(&store);

    let config = minimal_config_with_engine(
        vec![timestamp_source("feed", key)],
        EngineConfig {
            fetch_timeout_secs: 1,
            ..EngineConfig::default()
        },
    );
    let (engine, event_rx) = WatchEngine::new(
        Box::new(ControlledFetcher::sharing_state_with(&fetcher)),
        Box::new(broadcaster),
        Box::new(store),
        config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Seed normally, then hang every fetch well past the 1s timeout
    tokio::time::sleep(Duration::from_millis(300)).await;
    let baseline = store_probe.comparison("feed");
    fetcher.set_delay(key, Duration::from_secs(30));

    tokio::time::sleep(Duration::from_millis(2_500)).await;

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    // The hung cycles were abandoned: no notification, state untouched
    assert_eq!(broadcaster_probe.messages().len(), 0);
    assert_eq!(store_probe.comparison("feed"), baseline);

    let events: Vec<EngineEvent> = ReceiverStream::new(event_rx).collect().await;
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::FetchFailed { source_id, .. } if source_id == "feed")),
        "the timeout must surface as a fetch failure, got {:?}",
        events
    );
}
