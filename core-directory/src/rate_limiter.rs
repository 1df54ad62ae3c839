//! Pacing for remote geocoding lookups.
//!
//! Public geocoding services allow roughly one request per second. The
//! orchestrator calls [`RateLimiter::acquire`] before every remote lookup and
//! geocodes strictly one provider at a time.

use async_trait::async_trait;
use bridge_traits::time::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Gate awaited before each remote request.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Resolves once the next request may be sent.
    async fn acquire(&self);
}

/// Enforces a fixed minimum delay between consecutive requests.
///
/// Elapsed time is measured with the injected [`Clock`]; waiting is a
/// `tokio::time::sleep`, never a busy loop.
pub struct FixedDelayRateLimiter {
    clock: Arc<dyn Clock>,
    min_delay: Duration,
    last_request_ms: Mutex<Option<i64>>,
}

impl FixedDelayRateLimiter {
    pub fn new(min_delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            min_delay,
            last_request_ms: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

#[async_trait]
impl RateLimiter for FixedDelayRateLimiter {
    async fn acquire(&self) {
        // Held across the sleep so concurrent callers queue up
        let mut last_request = self.last_request_ms.lock().await;

        if let Some(last) = *last_request {
            // Clamped at zero: a clock set back never stretches the wait
            let elapsed_ms = self.clock.millis_since(last).max(0);
            let required_ms = i64::try_from(self.min_delay.as_millis()).unwrap_or(i64::MAX);
            if elapsed_ms < required_ms {
                let wait_time = Duration::from_millis((required_ms - elapsed_ms) as u64);
                debug!("Rate limiting: waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }

        *last_request = Some(self.clock.unix_timestamp_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;
    use chrono::Duration as ChronoDuration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter =
            FixedDelayRateLimiter::new(Duration::from_secs(1), Arc::new(ManualClock::new()));

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_requests_wait_full_delay() {
        let clock = Arc::new(ManualClock::new());
        let limiter = FixedDelayRateLimiter::new(Duration::from_millis(1000), clock.clone());

        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_elapsed_time_is_credited() {
        let clock = Arc::new(ManualClock::new());
        let limiter = FixedDelayRateLimiter::new(Duration::from_millis(1000), clock.clone());

        limiter.acquire().await;
        clock.advance(ChronoDuration::milliseconds(600));

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(400));
        assert!(waited < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_delay_has_passed() {
        let clock = Arc::new(ManualClock::new());
        let limiter = FixedDelayRateLimiter::new(Duration::from_millis(1000), clock.clone());

        limiter.acquire().await;
        clock.advance(ChronoDuration::seconds(2));

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_set_back_waits_at_most_min_delay() {
        let clock = Arc::new(ManualClock::new());
        let limiter = FixedDelayRateLimiter::new(Duration::from_millis(1000), clock.clone());

        limiter.acquire().await;
        clock.advance(ChronoDuration::hours(-2));

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(1000));
        assert!(waited < Duration::from_secs(2));
    }
}
