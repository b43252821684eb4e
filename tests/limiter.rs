use booking_gateway::TokenBucketLimiter;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_capacity_bound_within_window() {
    let limiter = TokenBucketLimiter::new(2, Duration::from_secs(5));

    let first = limiter.consume("bookings", 1).unwrap();
    assert_eq!(first.remaining, 1);

    let second = limiter.consume("bookings", 1).unwrap();
    assert_eq!(second.remaining, 0);

    // Third point within the same window is refused.
    let rejection = limiter.consume("bookings", 1).unwrap_err();
    assert!(rejection.retry_after > Duration::ZERO);
    assert!(rejection.retry_after <= Duration::from_secs(5));
}

#[test]
fn test_rejection_leaves_bucket_untouched() {
    let limiter = TokenBucketLimiter::new(1, Duration::from_secs(60));

    limiter.consume("k", 1).unwrap();
    assert_eq!(limiter.remaining("k"), 0);

    for _ in 0..5 {
        assert!(limiter.consume("k", 1).is_err());
    }

    assert_eq!(limiter.remaining("k"), 0);
}

#[test]
fn test_window_reset_restores_capacity() {
    let limiter = TokenBucketLimiter::new(1, Duration::from_millis(100));

    assert!(limiter.consume("k", 1).is_ok());
    assert!(limiter.consume("k", 1).is_err());

    thread::sleep(Duration::from_millis(150));

    let grant = limiter.consume("k", 1).unwrap();
    assert_eq!(grant.remaining, 0);
}

#[test]
fn test_keys_have_independent_buckets() {
    let limiter = TokenBucketLimiter::new(1, Duration::from_secs(60));

    assert!(limiter.consume("alpha", 1).is_ok());
    assert!(limiter.consume("alpha", 1).is_err());

    // A different key is unaffected.
    assert!(limiter.consume("beta", 1).is_ok());
}

#[test]
fn test_remaining_never_consumes() {
    let limiter = TokenBucketLimiter::new(3, Duration::from_millis(100));

    assert_eq!(limiter.remaining("k"), 3);
    assert_eq!(limiter.remaining("k"), 3);

    limiter.consume("k", 2).unwrap();
    assert_eq!(limiter.remaining("k"), 1);

    // Expired bucket reads as full again.
    thread::sleep(Duration::from_millis(150));
    assert_eq!(limiter.remaining("k"), 3);
}

#[test]
fn test_multi_point_costs() {
    let limiter = TokenBucketLimiter::new(5, Duration::from_secs(60));

    let grant = limiter.consume("k", 3).unwrap();
    assert_eq!(grant.remaining, 2);

    assert!(limiter.consume("k", 3).is_err());
    assert!(limiter.consume("k", 2).is_ok());
    assert_eq!(limiter.remaining("k"), 0);
}

#[test]
fn test_purge_idle_drops_only_expired_buckets() {
    let limiter = TokenBucketLimiter::new(1, Duration::from_millis(100));

    limiter.consume("a", 1).unwrap();
    limiter.consume("b", 1).unwrap();
    assert_eq!(limiter.purge_idle(), 0);

    thread::sleep(Duration::from_millis(150));
    limiter.consume("c", 1).unwrap();

    assert_eq!(limiter.purge_idle(), 2);
    assert_eq!(limiter.remaining("c"), 0);
}

#[test]
fn test_concurrent_consumption_respects_capacity() {
    let limiter = Arc::new(TokenBucketLimiter::new(50, Duration::from_secs(60)));
    let mut handles = vec![];

    for _ in 0..10 {
        let limiter = Arc::clone(&limiter);
        handles.push(thread::spawn(move || {
            (0..20)
                .filter(|_| limiter.consume("shared", 1).is_ok())
                .count()
        }));
    }

    let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(granted, 50);
}

proptest! {
    // However many consumers show up, grants within one window never
    // exceed the configured capacity.
    #[test]
    fn grants_never_exceed_capacity(capacity in 1u32..64, attempts in 1usize..256) {
        let limiter = TokenBucketLimiter::new(capacity, Duration::from_secs(3600));

        let granted = (0..attempts)
            .filter(|_| limiter.consume("key", 1).is_ok())
            .count() as u32;

        prop_assert_eq!(granted, capacity.min(attempts as u32));
    }
}
