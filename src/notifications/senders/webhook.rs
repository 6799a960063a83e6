use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;

use super::{NotificationSender, SenderError};
use crate::notifications::models::IncidentPayload;

/// A sender for posting incidents to the Squadcast incident webhook.
pub struct WebhookSender {
    client: Client,
}

impl WebhookSender {
    pub fn new(timeout: Option<Duration>) -> Result<Self, SenderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(SenderError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, endpoint: &str, payload: &IncidentPayload) -> Result<(), SenderError> {
        let body = serde_json::to_vec(payload)?;
        debug!(endpoint = %endpoint, bytes = body.len(), "Posting incident.");

        let response = self
            .client
            .post(endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| SenderError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::RemoteRejected {
                endpoint: endpoint.to_string(),
                status,
                body: error_body,
            });
        }

        Ok(())
    }
}
