// Which non-terminal milestones are worth a notification
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Progress notification policy (off unless enabled)
///
/// When enabled: one notice when a job starts, one per attempt for the
/// first `first_attempts` attempts and on every `every`-th after that, and
/// a retry notice whenever the next backoff exceeds `long_wait`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPolicy {
    pub enabled: bool,
    pub first_attempts: u32,
    /// 0 disables the periodic notice
    pub every: u32,
    #[serde(with = "secs")]
    pub long_wait: Duration,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            first_attempts: 5,
            every: 10,
            long_wait: Duration::from_secs(60),
        }
    }
}

impl ProgressPolicy {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn reports_start(&self) -> bool {
        self.enabled
    }

    /// Whether attempt `sequence` (1-based) is announced
    pub fn reports_attempt(&self, sequence: u32) -> bool {
        self.enabled
            && (sequence <= self.first_attempts || (self.every > 0 && sequence % self.every == 0))
    }

    pub fn reports_wait(&self, delay: Duration) -> bool {
        self.enabled && delay > self.long_wait
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let policy = ProgressPolicy::default();
        assert!(!policy.reports_start());
        assert!(!policy.reports_attempt(1));
        assert!(!policy.reports_wait(Duration::from_secs(600)));
    }

    #[test]
    fn test_attempt_schedule() {
        let policy = ProgressPolicy::enabled();
        let announced: Vec<u32> = (1..=30).filter(|n| policy.reports_attempt(*n)).collect();
        assert_eq!(announced, vec![1, 2, 3, 4, 5, 10, 20, 30]);

        let quiet = ProgressPolicy {
            every: 0,
            ..ProgressPolicy::enabled()
        };
        assert!(!quiet.reports_attempt(10));
    }

    #[test]
    fn test_only_long_waits_are_reported() {
        let policy = ProgressPolicy::enabled();
        assert!(!policy.reports_wait(Duration::from_secs(60)));
        assert!(policy.reports_wait(Duration::from_secs(61)));
    }

    #[test]
    fn test_deserializes_partial_config() {
        let policy: ProgressPolicy =
            serde_json::from_str(r#"{"enabled": true, "long_wait": 120}"#).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.long_wait, Duration::from_secs(120));
        assert_eq!(policy.every, 10);
    }
}
