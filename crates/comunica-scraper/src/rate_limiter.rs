//! Adaptive token-bucket rate limiter.
//!
//! One limiter is shared by every page worker of a tribunal. It refills
//! continuously at the current rate, backs off hard when the upstream answers
//! 429 and probes upward slowly once the upstream has been quiet for a while.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Lowest rate the limiter will ever drop to (req/s).
pub const MIN_RATE: f64 = 0.5;

/// Multiplier applied to the rate on every throttle signal.
pub const THROTTLE_FACTOR: f64 = 0.6;

/// Multiplier applied to the rate when probing upward.
pub const RECOVERY_FACTOR: f64 = 1.15;

/// Quiet period after the last throttle before the rate may grow again.
pub const RECOVERY_QUIET_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct LimiterState {
    rate: f64,
    tokens: f64,
    max_tokens: f64,
    last_refill: Instant,
    last_throttle: Option<Instant>,
    consecutive_throttles: u32,
}

impl LimiterState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.max_tokens);
        self.last_refill = now;
    }
}

/// Point-in-time view of a limiter, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSnapshot {
    /// Current rate in requests per second
    pub rate: f64,
    /// Tokens available as of the last refill
    pub tokens: f64,
    /// Throttle signals since the last recovery step
    pub consecutive_throttles: u32,
}

/// Token bucket whose rate reacts to upstream feedback.
#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    state: Mutex<LimiterState>,
    max_rate: f64,
}

impl AdaptiveRateLimiter {
    /// Create a limiter starting at `initial_rate` requests per second.
    ///
    /// The bucket starts with `initial_rate` tokens; the rate may later grow
    /// up to twice the initial value.
    #[must_use]
    pub fn new(initial_rate: f64) -> Self {
        let rate = initial_rate.max(MIN_RATE);
        Self {
            state: Mutex::new(LimiterState {
                rate,
                tokens: rate,
                max_tokens: rate * 2.0,
                last_refill: Instant::now(),
                last_throttle: None,
                consecutive_throttles: 0,
            }),
            max_rate: rate * 2.0,
        }
    }

    /// Wait until a token is available and consume it.
    ///
    /// The lock is not held while sleeping, so one waiting worker never blocks
    /// the others from refilling or reporting feedback.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            state.refill(Instant::now());
            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return;
            }
            Duration::from_secs_f64((1.0 - state.tokens) / state.rate)
        };

        tokio::time::sleep(wait).await;

        let mut state = self.state.lock().await;
        state.tokens = 1.0;
        state.last_refill = Instant::now();
        state.tokens -= 1.0;
    }

    /// The upstream rejected a request with 429: cut the rate.
    pub async fn report_throttled(&self) {
        let mut state = self.state.lock().await;
        state.last_throttle = Some(Instant::now());
        state.consecutive_throttles += 1;

        state.rate = (state.rate * THROTTLE_FACTOR).max(MIN_RATE);
        state.max_tokens = state.rate * 2.0;
        state.tokens = state.rate;

        warn!(
            rate = state.rate,
            consecutive = state.consecutive_throttles,
            "Throttled by upstream, lowering request rate to {:.2} req/s",
            state.rate
        );
    }

    /// A request succeeded. Grows the rate only after a quiet period
    /// following at least one throttle.
    pub async fn report_success(&self) {
        let mut state = self.state.lock().await;
        let quiet = state
            .last_throttle
            .is_some_and(|at| at.elapsed() > RECOVERY_QUIET_PERIOD);

        if state.consecutive_throttles > 0 && quiet {
            state.consecutive_throttles = 0;
            let old_rate = state.rate;
            state.rate = (state.rate * RECOVERY_FACTOR).min(self.max_rate);
            state.max_tokens = state.rate * 2.0;

            if (state.rate - old_rate).abs() > f64::EPSILON {
                info!(rate = state.rate, "Raising request rate to {:.2} req/s", state.rate);
            }
        }
    }

    /// Current state without refilling.
    pub async fn snapshot(&self) -> LimiterSnapshot {
        let state = self.state.lock().await;
        LimiterSnapshot {
            rate: state.rate,
            tokens: state.tokens,
            consecutive_throttles: state.consecutive_throttles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_spends_initial_burst_then_waits() {
        let limiter = AdaptiveRateLimiter::new(2.0);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500), "waited {waited:?}");
        assert!(waited < Duration::from_millis(510), "waited {waited:?}");

        let snapshot = limiter.snapshot().await;
        assert!(snapshot.tokens >= 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_twice_the_rate() {
        let limiter = AdaptiveRateLimiter::new(2.0);
        tokio::time::advance(Duration::from_secs(60)).await;

        limiter.acquire().await;
        let snapshot = limiter.snapshot().await;
        assert!(approx(snapshot.tokens, 3.0), "tokens = {}", snapshot.tokens);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_negative_under_contention() {
        let limiter = std::sync::Arc::new(AdaptiveRateLimiter::new(5.0));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                limiter.snapshot().await.tokens
            }));
        }
        for handle in handles {
            let tokens = handle.await.expect("task completes");
            assert!(tokens >= 0.0, "tokens went negative: {tokens}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_cuts_rate_and_resets_tokens() {
        let limiter = AdaptiveRateLimiter::new(4.0);
        limiter.report_throttled().await;

        let snapshot = limiter.snapshot().await;
        assert!(approx(snapshot.rate, 2.4));
        assert!(approx(snapshot.tokens, 2.4));
        assert_eq!(snapshot.consecutive_throttles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_respects_floor() {
        let limiter = AdaptiveRateLimiter::new(0.6);
        limiter.report_throttled().await;
        assert!(approx(limiter.snapshot().await.rate, MIN_RATE));

        limiter.report_throttled().await;
        assert!(approx(limiter.snapshot().await.rate, MIN_RATE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_without_throttle_is_noop() {
        let limiter = AdaptiveRateLimiter::new(3.0);
        tokio::time::advance(Duration::from_secs(120)).await;
        limiter.report_success().await;
        assert!(approx(limiter.snapshot().await.rate, 3.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_needs_quiet_period() {
        let limiter = AdaptiveRateLimiter::new(4.0);
        limiter.report_throttled().await;

        tokio::time::advance(Duration::from_secs(29)).await;
        limiter.report_success().await;
        assert!(approx(limiter.snapshot().await.rate, 2.4));

        tokio::time::advance(Duration::from_secs(2)).await;
        limiter.report_success().await;
        let snapshot = limiter.snapshot().await;
        assert!(approx(snapshot.rate, 2.4 * RECOVERY_FACTOR));
        assert_eq!(snapshot.consecutive_throttles, 0);

        // Counter was reset, so a second success does nothing.
        limiter.report_success().await;
        assert!(approx(limiter.snapshot().await.rate, 2.4 * RECOVERY_FACTOR));
    }
}
