//! Integration tests for core-async on native platforms.

#![cfg(not(target_arch = "wasm32"))]

use core_async::{sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn timeout_expires_for_slow_future() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn aborting_one_task_leaves_others_running() {
    let counter = Arc::new(AtomicUsize::new(0));

    let first = {
        let counter = Arc::clone(&counter);
        task::spawn_abortable(async move {
            time::sleep(time::Duration::from_secs(1)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _second = {
        let counter = Arc::clone(&counter);
        task::spawn_abortable(async move {
            time::sleep(time::Duration::from_secs(1)).await;
            counter.fetch_add(10, Ordering::SeqCst);
        })
    };

    first.abort();
    time::sleep(time::Duration::from_secs(2)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn unbounded_channel_preserves_order() {
    let (tx, mut rx) = sync::mpsc::unbounded_channel();
    for i in 0..5 {
        tx.send(i).unwrap();
    }
    drop(tx);

    let mut received = Vec::new();
    while let Some(value) = rx.recv().await {
        received.push(value);
    }
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}

#[test]
fn block_on_drives_future_outside_runtime() {
    assert!(!core_async::runtime::in_runtime());
    let value = core_async::runtime::block_on(async { 7 }).unwrap();
    assert_eq!(value, 7);
}
