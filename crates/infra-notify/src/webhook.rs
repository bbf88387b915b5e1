// Webhook notifier: POST the notification as JSON
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, check_response, map_send_error};
use provisio_core::port::{Notification, Notifier, NotifyError, ProgressUpdate};

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    async fn post<T: serde::Serialize + ?Sized>(&self, body: &T) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        check_response(response).await
    }

    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_timeout(url, crate::DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NotifyError::Delivery(format!("invalid webhook url: {}", url)));
        }
        Ok(Self {
            client: build_client(timeout)?,
            url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(job_id = %notification.job_id, url = %self.url, "Posting webhook");
        self.post(notification).await
    }

    /// Same endpoint; receivers tell the two apart by `event` versus `status`
    async fn progress(&self, update: &ProgressUpdate) -> Result<(), NotifyError> {
        debug!(job_id = %update.job_id, url = %self.url, "Posting progress webhook");
        self.post(update).await
    }
}
