use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};
use telex_domain::model::LogEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook `{url}` answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("webhook `{url}` unreachable: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for matched events. One call is one delivery attempt to one
/// endpoint.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, url: &str, event: &LogEvent) -> Result<(), DeliveryError>;
}

/// POSTs events as JSON using the client's default timeouts and no retry.
#[derive(Clone, Default)]
pub struct WebhookDispatcher {
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl EventSink for WebhookDispatcher {
    async fn deliver(&self, url: &str, event: &LogEvent) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&event.to_payload())?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
