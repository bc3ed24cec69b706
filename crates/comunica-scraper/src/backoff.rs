//! Retry delays with jitter.
//!
//! Every delay carries random jitter so that page workers retrying at the
//! same moment spread out instead of hitting the upstream in lockstep.

use rand::Rng;
use std::time::Duration;

/// Base delay for attempt 0.
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound (exclusive) of the jitter added to every backoff.
pub const BACKOFF_JITTER_MS: u64 = 500;

/// Longest `Retry-After` honoured; larger values are clamped to it.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Exponents above this are clamped so the delay cannot overflow.
const MAX_EXPONENT: u32 = 16;

/// Exponential part of the backoff: `2^attempt * 1000 ms`.
#[must_use]
pub fn backoff_base(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << attempt.min(MAX_EXPONENT))
}

/// `2^attempt * 1000 ms` plus uniform jitter in `[0, 500)` ms.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    backoff_base(attempt) + jitter(0..BACKOFF_JITTER_MS)
}

/// Delay after a 429.
///
/// Honours `Retry-After` plus 100-500 ms of jitter when the upstream sent
/// one; otherwise the exponential base plus 200-800 ms of jitter.
#[must_use]
pub fn throttle_delay(retry_after: Option<Duration>, attempt: u32) -> Duration {
    match retry_after {
        Some(wait) => wait + jitter(100..500),
        None => backoff_base(attempt) + jitter(200..800),
    }
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds.
///
/// HTTP-date values and garbage are ignored, which falls back to backoff.
/// Waits longer than [`MAX_RETRY_AFTER`] are clamped.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !(secs.is_finite() && secs >= 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(secs.min(MAX_RETRY_AFTER.as_secs_f64())).ok()
}

fn jitter(range: std::ops::Range<u64>) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_stays_within_jitter_bounds() {
        for attempt in 0..6 {
            let base = Duration::from_millis(2u64.pow(attempt) * 1000);
            for _ in 0..50 {
                let delay = backoff_delay(attempt);
                assert!(delay >= base, "attempt {attempt}: {delay:?} < {base:?}");
                assert!(
                    delay <= base + Duration::from_millis(500),
                    "attempt {attempt}: {delay:?} too large"
                );
            }
        }
    }

    #[test]
    fn test_backoff_lower_bound_is_non_decreasing() {
        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let base = backoff_base(attempt);
            assert!(base >= previous);
            previous = base;
        }
    }

    #[test]
    fn test_throttle_delay_with_retry_after() {
        for _ in 0..50 {
            let delay = throttle_delay(Some(Duration::from_secs(2)), 3);
            assert!(delay >= Duration::from_millis(2100));
            assert!(delay < Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_throttle_delay_without_retry_after() {
        for _ in 0..50 {
            let delay = throttle_delay(None, 1);
            assert!(delay >= Duration::from_millis(2200));
            assert!(delay < Duration::from_millis(2800));
        }
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("inf"), None);
        assert_eq!(parse_retry_after("NaN"), None);
    }

    #[test]
    fn test_parse_retry_after_clamps_huge_values() {
        assert_eq!(parse_retry_after("99999999999999999999"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("1e300"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("601"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("600"), Some(Duration::from_secs(600)));
    }
}
