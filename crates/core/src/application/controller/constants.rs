// Controller constants (no magic values)
use std::time::Duration;

/// Sleep after a store error before the loop tries again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Upper bound for one notifier call (30s)
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long shutdown waits for attempt loops to park (10s)
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Stop reason recorded when the caller gives none
pub const DEFAULT_STOP_REASON: &str = "user requested";
