// Telegram notifier (Bot API sendMessage)
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_response, map_send_error};
use provisio_core::domain::TerminalStatus;
use provisio_core::port::{Notification, Notifier, NotifyError, ProgressEvent, ProgressUpdate};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let bot_token = bot_token.into();
        let chat_id = chat_id.into();
        if bot_token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(NotifyError::Delivery(
                "telegram bot token and chat id are required".to_string(),
            ));
        }
        Ok(Self {
            client: build_client(crate::DEFAULT_HTTP_TIMEOUT)?,
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token,
            chat_id,
        })
    }

    /// Point at a different Bot API host (tests, self-hosted bot API)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, NotifyError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn send(&self, text: String) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        check_response(response).await
    }
}

/// Markdown message body for a terminal event
pub fn render_message(n: &Notification) -> String {
    match n.status {
        TerminalStatus::Succeeded => {
            let mut text = format!("✅ *VM created*: {}\n\n*Instance details:*\n", n.display_name);
            if let Some(resource) = &n.resource {
                text.push_str(&format!("• *ID*: `{}`\n", resource.resource_id));
                text.push_str(&format!("• *Region*: {}\n", resource.region));
                text.push_str(&format!(
                    "• *Public IP*: `{}`\n",
                    resource.public_ip.as_deref().unwrap_or("N/A")
                ));
                text.push_str(&format!(
                    "• *Private IP*: `{}`\n",
                    resource.private_ip.as_deref().unwrap_or("N/A")
                ));
            }
            text.push_str(&format!("• *Attempts*: {}\n", n.attempts));
            text
        }
        TerminalStatus::Failed => format!(
            "💥 *VM creation failed*: {}\n\nGave up after {} attempt(s).\nLast region: {}\nLast error: `{}`",
            n.display_name,
            n.attempts,
            n.last_region.as_deref().unwrap_or("none"),
            n.detail.as_deref().unwrap_or("unknown error")
        ),
        TerminalStatus::Stopped => format!(
            "🛑 *VM creation stopped*: {}\n\nStopped after {} attempt(s).\nReason: {}",
            n.display_name,
            n.attempts,
            n.detail.as_deref().unwrap_or("user requested")
        ),
    }
}

/// Markdown message body for a progress notice
pub fn render_progress(u: &ProgressUpdate) -> String {
    match &u.event {
        ProgressEvent::Started => format!(
            "🚀 *VM creation started*: {}\n\nUp to {} attempt(s).",
            u.display_name, u.max_attempts
        ),
        ProgressEvent::Attempting => format!(
            "🔄 *Attempt {}/{}*: {}\nRegion: {}",
            u.attempt,
            u.max_attempts,
            u.display_name,
            u.region.as_deref().unwrap_or("unknown")
        ),
        ProgressEvent::Retrying {
            delay_secs,
            last_error,
        } => format!(
            "⏳ *Retrying in {}s*: {}\n\nAttempt {}/{} failed.\nLast error: `{}`",
            delay_secs,
            u.display_name,
            u.attempt,
            u.max_attempts,
            last_error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(job_id = %notification.job_id, chat_id = %self.chat_id, "Sending Telegram message");
        self.send(render_message(notification)).await
    }

    async fn progress(&self, update: &ProgressUpdate) -> Result<(), NotifyError> {
        debug!(job_id = %update.job_id, attempt = update.attempt, "Sending Telegram progress");
        self.send(render_progress(update)).await
    }
}
