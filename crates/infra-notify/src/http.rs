// Shared reqwest plumbing for the HTTP notifiers
use provisio_core::port::NotifyError;
use std::time::Duration;

/// Longest response body kept in a `Rejected` error
const MAX_BODY_IN_ERROR: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, NotifyError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("provisio/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| NotifyError::Delivery(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn map_send_error(e: reqwest::Error) -> NotifyError {
    if e.is_timeout() {
        NotifyError::Timeout
    } else {
        NotifyError::Delivery(e.to_string())
    }
}

/// Turn a non-2xx response into `Rejected`
pub(crate) async fn check_response(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_BODY_IN_ERROR {
        let mut cut = MAX_BODY_IN_ERROR;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
    })
}
