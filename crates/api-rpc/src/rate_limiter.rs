//! Rate Limiter (Token Bucket Algorithm)
//!
//! Guards the mutating RPC methods (start, stop) so a runaway client cannot
//! flood the controller with jobs. Lock-free: state lives in one `AtomicU64`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Bucket size and refill speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum burst size
    pub burst: u32,
    /// Tokens added per second
    pub per_second: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 20,
            per_second: 5,
        }
    }
}

/// Token bucket limiter
pub struct RateLimiter {
    // Upper 32 bits: available tokens
    // Lower 32 bits: refill clock (ms since creation) up to which tokens were credited
    packed: AtomicU64,
    created: Instant,
    max_tokens: u32,
    refill_rate: u32,
}

impl RateLimiter {
    /// `RateLimiter::new(200, 100)` allows 100 requests/sec with a burst of 200
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            packed: AtomicU64::new((max_tokens as u64) << 32),
            created: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    pub fn from_config(config: RateLimitConfig) -> Self {
        Self::new(config.burst, config.per_second)
    }

    /// Consume one token; false means the caller is throttled
    pub fn try_acquire(&self) -> bool {
        loop {
            let packed = self.packed.load(Ordering::Acquire);
            let tokens = (packed >> 32) as u32;
            let clock_ms = (packed & 0xFFFF_FFFF) as u32;

            let now_ms = self.created.elapsed().as_millis().min(u32::MAX as u128) as u32;
            let (tokens, clock_ms) = self.refill(tokens, clock_ms, now_ms);

            let granted = tokens >= 1;
            let left = if granted { tokens - 1 } else { tokens };
            let next = ((left as u64) << 32) | clock_ms as u64;

            if self
                .packed
                .compare_exchange(packed, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return granted;
            }
        }
    }

    /// Credit whole tokens for the time since `clock_ms`
    ///
    /// The clock only advances by the time actually converted into tokens,
    /// so frequent calls never discard fractional refill.
    fn refill(&self, tokens: u32, clock_ms: u32, now_ms: u32) -> (u32, u32) {
        if self.refill_rate == 0 {
            return (tokens, now_ms);
        }
        let delta_ms = now_ms.saturating_sub(clock_ms) as u64;
        let earned = delta_ms * self.refill_rate as u64 / 1000;
        if earned == 0 {
            return (tokens, clock_ms);
        }

        let total = tokens as u64 + earned;
        if total >= self.max_tokens as u64 {
            (self.max_tokens, now_ms)
        } else {
            let used_ms = earned * 1000 / self.refill_rate as u64;
            (total as u32, clock_ms + used_ms as u32)
        }
    }

    /// Tokens currently available (monitoring)
    pub fn remaining(&self) -> u32 {
        (self.packed.load(Ordering::Acquire) >> 32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, Duration};

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let limiter = RateLimiter::new(10, 10);

        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_refills() {
        let limiter = RateLimiter::new(5, 10);

        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());

        sleep(Duration::from_millis(300)).await;
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_refill_keeps_fractional_time() {
        let limiter = RateLimiter::new(10, 100);
        // 15ms at 100/s earns one token and consumes only 10ms of clock
        assert_eq!(limiter.refill(0, 0, 15), (1, 10));
        assert_eq!(limiter.refill(0, 0, 5), (0, 0));
        assert_eq!(limiter.refill(9, 0, 10_000), (10, 10_000));
    }

    #[test]
    fn test_zero_rate_never_refills() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_concurrent() {
        let limiter = Arc::new(RateLimiter::new(100, 1));

        let mut handles = vec![];
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..20).filter(|_| limiter.try_acquire()).count()
            }));
        }

        let mut total_allowed = 0;
        for handle in handles {
            total_allowed += handle.await.unwrap();
        }

        assert!(
            (100..=101).contains(&total_allowed),
            "Expected about 100 allowed, got {}",
            total_allowed
        );
    }
}
