// Backoff policy between attempts
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Capped exponential backoff with deterministic per-job jitter
///
/// delay(n) = min(base * factor^(n-1), max) * jitter(job_id)
/// where `n` is the number of attempts already made (n >= 1) and
/// jitter lies in [0.9, 1.1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    #[serde(with = "millis")]
    pub base: Duration,
    pub factor: f64,
    #[serde(with = "millis")]
    pub max: Duration,
    /// Disable to get exact delays (tests)
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            factor: 1.5,
            max: Duration::from_secs(300),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Fixed delay, no growth and no jitter
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1.0,
            max: delay,
            jitter: false,
        }
    }

    /// Delay to wait after the `attempts`-th failed attempt of `job_id`
    pub fn delay_for(&self, job_id: &str, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw_ms = self.base.as_millis() as f64 * self.factor.max(1.0).powi(exponent);
        let capped_ms = raw_ms.min(self.max.as_millis() as f64);

        // Spread jobs that fail together; seeded by the ID so a job's
        // schedule is reproducible
        let delay_ms = if self.jitter {
            let seed = job_id.chars().map(|c| c as u32).fold(0u32, u32::wrapping_add);
            capped_ms * (0.9 + (seed % 21) as f64 / 100.0)
        } else {
            capped_ms
        };

        let delay = Duration::from_millis(delay_ms.max(0.0) as u64);
        debug!(job_id, attempts, delay_ms = delay.as_millis() as u64, "Backoff computed");
        delay
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
