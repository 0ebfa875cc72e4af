use super::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_execution() {
    let dedup = Arc::new(Deduplicator::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dedup = Arc::clone(&dedup);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            dedup
                .run("sha1:abcd", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    42u32
                })
                .await
        }));
    }

    let mut runners = 0;
    for handle in handles {
        let (value, was_runner) = handle.await.unwrap().unwrap();
        assert_eq!(value, 42);
        if was_runner {
            runners += 1;
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one upstream call");
    assert_eq!(runners, 1, "exactly one runner");
    assert!(dedup.is_empty(), "in-flight table must drain");
}

#[tokio::test(start_paused = true)]
async fn different_keys_do_not_coalesce() {
    let dedup = Arc::new(Deduplicator::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for key in ["a", "b", "c"] {
        let dedup = Arc::clone(&dedup);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            dedup
                .run(key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    key.len()
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn key_runs_again_after_completion() {
    let dedup: Deduplicator<u32> = Deduplicator::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let (value, was_runner) = dedup
            .run("key", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                7u32
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(was_runner);
    }
    // No call in flight between the two, so both executed.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn waiters_observe_a_cancelled_runner() {
    let dedup: Arc<Deduplicator<u32>> = Arc::new(Deduplicator::new());

    let runner = {
        let dedup = Arc::clone(&dedup);
        tokio::spawn(async move {
            dedup
                .run("key", || async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    1u32
                })
                .await
        })
    };
    tokio::task::yield_now().await;

    let waiter = {
        let dedup = Arc::clone(&dedup);
        tokio::spawn(async move { dedup.run("key", || async { 2u32 }).await })
    };
    tokio::task::yield_now().await;

    runner.abort();
    let _ = runner.await;

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(ScrapeError::Cancelled)));
    assert!(dedup.is_empty(), "aborted runner must remove its entry");
}
