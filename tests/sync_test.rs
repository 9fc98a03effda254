mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use wallet_engine::adapter::{Adapter, BalanceAdapter, TransactionsAdapter};
use wallet_engine::{AdapterState, BitcoinAdapter};

use common::{confirmed, init_logger, test_config, unconfirmed, wait_until, MockUtxoBackend};

#[tokio::test(start_paused = true)]
async fn start_triggers_initial_sync() {
    init_logger();
    let backend = MockUtxoBackend::new(150_000);
    backend.set_transactions(vec![
        confirmed("a", 100, 1000),
        unconfirmed("u", -500),
        confirmed("b", 200, 2000),
    ]);
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);
    assert_eq!(adapter.state(), AdapterState::Loaded);

    adapter.start();
    wait_until(|| adapter.state() == AdapterState::Synced).await;

    assert_eq!(adapter.balance().units, 150_000);
    let records = adapter.transaction_records();
    let ids: Vec<&str> = records.iter().map(|r| r.txid.as_str()).collect();
    // Unconfirmed first, confirmed newest-first.
    assert_eq!(ids, vec!["u", "b", "a"]);
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn interval_tick_resyncs() {
    init_logger();
    let backend = MockUtxoBackend::new(1_000);
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);

    adapter.start();
    wait_until(|| adapter.state() == AdapterState::Synced).await;
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test(start_paused = true)]
async fn stop_suspends_ticks_but_not_manual_refresh() {
    init_logger();
    let backend = MockUtxoBackend::new(1_000);
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);

    adapter.start();
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 1).await;
    adapter.stop();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);

    adapter.refresh();
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test(start_paused = true)]
async fn sync_failure_keeps_last_snapshot() {
    init_logger();
    let backend = MockUtxoBackend::new(5_000);
    backend.set_transactions(vec![confirmed("a", 100, 1000)]);
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);

    adapter.start();
    wait_until(|| adapter.state() == AdapterState::Synced).await;
    assert_eq!(adapter.balance().units, 5_000);

    backend.fail_sync.store(true, Ordering::SeqCst);
    adapter.refresh();
    wait_until(|| matches!(adapter.state(), AdapterState::Failed(_))).await;

    // Last-known values stay visible while the state carries the error.
    assert_eq!(adapter.balance().units, 5_000);
    assert_eq!(adapter.transaction_records().len(), 1);

    // A later trigger recovers without any reset step.
    backend.fail_sync.store(false, Ordering::SeqCst);
    adapter.refresh();
    wait_until(|| adapter.state() == AdapterState::Synced).await;
}

#[tokio::test(start_paused = true)]
async fn refresh_during_sync_is_dropped_not_replayed() {
    init_logger();
    let backend = MockUtxoBackend::new(1_000);
    let gate = backend.gate_next_sync();
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);

    adapter.start();
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 1).await;

    // Sync is in flight; pile up refresh requests. They are discarded, not
    // queued behind the running sync.
    adapter.refresh();
    adapter.refresh();
    adapter.refresh();
    gate.notify_one();

    wait_until(|| adapter.state() == AdapterState::Synced).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);

    // A refresh after completion still works.
    adapter.refresh();
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test(start_paused = true)]
async fn tick_during_sync_is_dropped_not_replayed() {
    init_logger();
    let backend = MockUtxoBackend::new(1_000);
    let gate = backend.gate_next_sync();
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);

    adapter.start();
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 1).await;

    // Hold the sync across the 60s interval deadline, then release it.
    tokio::time::sleep(Duration::from_secs(70)).await;
    gate.notify_one();
    wait_until(|| adapter.state() == AdapterState::Synced).await;

    // The elapsed tick is discarded; no duplicate sync follows.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.sync_calls.load(Ordering::SeqCst), 1);

    // The schedule stays aligned: the next tick fires at the next multiple
    // of the period.
    tokio::time::sleep(Duration::from_secs(60)).await;
    wait_until(|| backend.sync_calls.load(Ordering::SeqCst) == 2).await;
}

#[tokio::test(start_paused = true)]
async fn state_subscription_sees_transitions() -> anyhow::Result<()> {
    init_logger();
    let backend = MockUtxoBackend::new(1_000);
    let gate = backend.gate_next_sync();
    let adapter = BitcoinAdapter::new(backend.clone(), &test_config(), None);
    let mut state_rx = adapter.subscribe_state();
    assert_eq!(*state_rx.borrow_and_update(), AdapterState::Loaded);

    adapter.start();
    state_rx.changed().await?;
    assert_eq!(*state_rx.borrow_and_update(), AdapterState::Syncing);

    gate.notify_one();
    state_rx.changed().await?;
    assert_eq!(*state_rx.borrow_and_update(), AdapterState::Synced);
    Ok(())
}
