use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use super::models::IncidentPayload;

pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Failed to marshal Squadcast event: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("POST to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("POST to {endpoint} failed with {status}. Body: {body}")]
    RemoteRejected {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
}

impl SenderError {
    /// HTTP status returned by the endpoint, when it answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SenderError::RemoteRejected { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }
}

/// Delivers a built incident to a remote endpoint. One attempt, no retries.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, endpoint: &str, payload: &IncidentPayload) -> Result<(), SenderError>;
}
