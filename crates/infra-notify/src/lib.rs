// Provisio Notify Infrastructure
// HTTP delivery of job events

mod http;
pub mod telegram;
pub mod webhook;

pub use telegram::{TelegramNotifier, TELEGRAM_API_BASE};
pub use webhook::WebhookNotifier;

/// Default per-request timeout for notifier HTTP calls
pub const DEFAULT_HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
