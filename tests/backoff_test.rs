//! 退避策略测试

use std::time::Duration;

use flare_consul_resolver::ExponentialBackoff;
use flare_consul_resolver::retry::{DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};

#[test]
fn test_growth_is_bounded_and_reset_restarts_from_min() {
    let max = Duration::from_millis(200);
    let mut backoff = ExponentialBackoff::new(DEFAULT_MIN_DELAY, max);

    let delays: Vec<Duration> = (0..3).map(|_| backoff.next_delay()).collect();
    for delay in &delays {
        assert!(*delay >= DEFAULT_MIN_DELAY && *delay <= max, "{:?}", delay);
    }
    // 第一次失败没有抖动空间
    assert_eq!(delays[0], DEFAULT_MIN_DELAY);
    assert_eq!(backoff.attempt(), 3);

    backoff.reset();
    assert_eq!(backoff.attempt(), 0);
    assert_eq!(backoff.next_delay(), DEFAULT_MIN_DELAY);
}

#[test]
fn test_without_jitter_doubles_until_cap() {
    let mut backoff = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(50))
        .with_jitter(false);

    let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
    assert_eq!(delays, vec![10, 20, 40, 50, 50]);
}

#[test]
fn test_custom_factor() {
    let mut backoff = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(1))
        .with_factor(3.0)
        .with_jitter(false);

    assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    assert_eq!(backoff.next_delay(), Duration::from_millis(30));
    assert_eq!(backoff.next_delay(), Duration::from_millis(90));
}

#[test]
fn test_many_attempts_saturate_at_max() {
    let mut backoff = ExponentialBackoff::default();
    for _ in 0..10_000 {
        assert!(backoff.next_delay() <= DEFAULT_MAX_DELAY);
    }
    assert_eq!(
        backoff.clone().with_jitter(false).next_delay(),
        DEFAULT_MAX_DELAY
    );
}

#[test]
fn test_max_below_min_is_raised() {
    let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(10));
    assert_eq!(backoff.max(), Duration::from_millis(100));
    assert_eq!(backoff.min(), Duration::from_millis(100));
}

#[test]
fn test_saturated_jitter_stays_at_max() {
    let max = Duration::from_secs(1);
    let mut backoff = ExponentialBackoff::new(Duration::from_millis(10), max);
    for _ in 0..40 {
        backoff.next_delay();
    }

    // 抖动作用在未截断的基础延迟上，之后才截断到 max
    for _ in 0..20 {
        assert_eq!(backoff.next_delay(), max);
    }
}
