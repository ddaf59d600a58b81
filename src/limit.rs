//! Per-operation rate limiting.
//!
//! One limiter lives for the duration of a single save/read/delete/list and
//! enforces a discrete leaky bucket: up to `limit` items may pass within any
//! 1-second window, and the item that overflows the window sleeps until the
//! window rolls. Throughput therefore averages `limit` items/second while
//! allowing full-window bursts.

use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

pub struct RateLimiter {
    limit: u64,
    count: u64,
    window_start: Instant,
}

impl RateLimiter {
    /// `limit` is items per second; `None` means unbounded.
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit: limit.unwrap_or(u64::MAX),
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Account for one processed item.
    ///
    /// Returns `true` on every throttled sleep and on every window rollover;
    /// that is the caller's cue to emit a progress snapshot independent of
    /// per-item work.
    pub async fn tick(&mut self) -> bool {
        let elapsed = self.window_start.elapsed();
        if elapsed < WINDOW {
            self.count += 1;
            if self.count > self.limit {
                tokio::time::sleep(WINDOW - elapsed).await;
                self.reset();
                return true;
            }
            false
        } else {
            self.reset();
            true
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn test_unbounded_never_sleeps() {
        let mut limiter = RateLimiter::new(None);
        let start = StdInstant::now();
        for _ in 0..10_000 {
            limiter.tick().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_throttles_past_the_limit() {
        let mut limiter = RateLimiter::new(Some(3));
        let start = StdInstant::now();
        let mut pulses = 0;
        // 4th tick overflows the window and must sleep out the remainder.
        for _ in 0..4 {
            if limiter.tick().await {
                pulses += 1;
            }
        }
        assert!(start.elapsed() >= Duration::from_millis(900));
        assert!(pulses >= 1);
    }

    #[tokio::test]
    async fn test_window_rollover_resets_without_sleeping() {
        let mut limiter = RateLimiter::new(Some(2));
        limiter.tick().await;
        limiter.tick().await;
        tokio::time::sleep(Duration::from_millis(1050)).await;
        let start = StdInstant::now();
        let pulsed = limiter.tick().await;
        assert!(pulsed, "rollover must pulse");
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
