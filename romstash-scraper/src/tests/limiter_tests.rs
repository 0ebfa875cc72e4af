use super::*;

use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn acquire_and_release_round_trip() {
    let limiter = Arc::new(RateLimiter::new(2, 100));
    let cancel = CancellationToken::new();

    let permit = limiter.acquire(&cancel).await.unwrap();
    let stats = limiter.stats();
    assert_eq!(stats.active_threads, 1);
    assert_eq!(stats.in_flight, 1);
    assert_eq!(stats.started_last_minute, 1);

    drop(permit);
    let stats = limiter.stats();
    assert_eq!(stats.active_threads, 0);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.total_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded_by_max_threads() {
    let limiter = Arc::new(RateLimiter::new(2, 100));
    let cancel = CancellationToken::new();

    let _a = limiter.acquire(&cancel).await.unwrap();
    let _b = limiter.acquire(&cancel).await.unwrap();
    assert_eq!(limiter.stats().active_threads, 2);

    // A third acquire must block while both slots are held.
    let blocked = tokio::time::timeout(Duration::from_millis(50), limiter.acquire(&cancel)).await;
    assert!(blocked.is_err(), "third acquire should not be admitted");

    drop(_a);
    let _c = limiter.acquire(&cancel).await.unwrap();
    assert_eq!(limiter.stats().active_threads, 2);
}

#[tokio::test(start_paused = true)]
async fn minute_window_delays_admission() {
    let limiter = Arc::new(RateLimiter::new(4, 2));
    let cancel = CancellationToken::new();

    let start = tokio::time::Instant::now();
    drop(limiter.acquire(&cancel).await.unwrap());
    drop(limiter.acquire(&cancel).await.unwrap());
    // Window full: the third admission waits for the oldest to age out.
    drop(limiter.acquire(&cancel).await.unwrap());
    assert!(start.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn cancellation_does_not_leak_a_slot() {
    let limiter = Arc::new(RateLimiter::new(1, 100));
    let cancel = CancellationToken::new();

    let held = limiter.acquire(&cancel).await.unwrap();

    let waiter = {
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        tokio::spawn(async move { limiter.acquire(&cancel).await })
    };
    tokio::task::yield_now().await;
    cancel.cancel();
    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(ScrapeError::Cancelled)));

    drop(held);
    let stats = limiter.stats();
    assert_eq!(stats.active_threads, 0);

    // A fresh token can acquire again: the slot was not leaked.
    let fresh = CancellationToken::new();
    let permit = limiter.acquire(&fresh).await.unwrap();
    drop(permit);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_wait_releases_slot() {
    let limiter = Arc::new(RateLimiter::new(1, 100));
    limiter.trigger_backoff();
    limiter.trigger_backoff();
    limiter.trigger_backoff(); // 4s deadline

    let cancel = CancellationToken::new();
    let waiter = {
        let limiter = Arc::clone(&limiter);
        let cancel = cancel.clone();
        tokio::spawn(async move { limiter.acquire(&cancel).await })
    };
    tokio::task::yield_now().await;
    cancel.cancel();
    assert!(matches!(
        waiter.await.unwrap(),
        Err(ScrapeError::Cancelled)
    ));
    assert_eq!(limiter.stats().active_threads, 0);
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_and_saturates() {
    let limiter = Arc::new(RateLimiter::new(1, 100));

    limiter.trigger_backoff();
    let first = limiter.stats();
    assert_eq!(first.backoff_level, 1);
    assert!(first.backoff_remaining <= Duration::from_secs(1));
    assert!(first.backoff_remaining > Duration::ZERO);

    limiter.trigger_backoff();
    let second = limiter.stats();
    assert_eq!(second.backoff_level, 2);
    // Deadlines never move backwards.
    assert!(second.backoff_remaining >= first.backoff_remaining);

    for _ in 0..10 {
        limiter.trigger_backoff();
    }
    let capped = limiter.stats();
    assert_eq!(capped.backoff_level, 6);
    assert!(capped.backoff_remaining <= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_admission_until_deadline() {
    let limiter = Arc::new(RateLimiter::new(1, 100));
    let cancel = CancellationToken::new();

    limiter.trigger_backoff(); // 1s
    let start = tokio::time::Instant::now();
    drop(limiter.acquire(&cancel).await.unwrap());
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn reset_backoff_clears_level_and_deadline() {
    let limiter = Arc::new(RateLimiter::new(1, 100));
    limiter.trigger_backoff();
    limiter.trigger_backoff();
    limiter.reset_backoff();

    let stats = limiter.stats();
    assert_eq!(stats.backoff_level, 0);
    assert_eq!(stats.backoff_remaining, Duration::ZERO);

    // And admission is immediate again.
    let cancel = CancellationToken::new();
    let start = tokio::time::Instant::now();
    drop(limiter.acquire(&cancel).await.unwrap());
    assert!(start.elapsed() < Duration::from_secs(1));
}
