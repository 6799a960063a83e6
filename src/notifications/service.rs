use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::builder::{BuildError, FsTemplateSource, PayloadBuilder, TemplateSource};
use super::senders::{webhook::WebhookSender, NotificationSender, SenderError};
use crate::config::{HandlerConfig, ValidationError};
use crate::event::Event;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Configuration error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Failed to build Squadcast incident: {0}")]
    Build(#[from] BuildError),
    #[error("Failed to deliver Squadcast incident: {0}")]
    Delivery(#[from] SenderError),
}

/// The stage of [`HandlerService::handle`] an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Build,
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Build => write!(f, "build"),
            Self::Deliver => write!(f, "deliver"),
        }
    }
}

impl HandlerError {
    pub fn stage(&self) -> Stage {
        match self {
            HandlerError::Validation(_) => Stage::Validate,
            HandlerError::Build(_) => Stage::Build,
            HandlerError::Delivery(_) => Stage::Deliver,
        }
    }
}

/// Runs one event through validation, payload construction and delivery.
/// The first failing stage ends the run; nothing is sent unless the payload
/// was fully built.
pub struct HandlerService {
    config: HandlerConfig,
    builder: PayloadBuilder,
    sender: Arc<dyn NotificationSender>,
    annotation_overrides: bool,
}

impl HandlerService {
    pub fn new(
        config: HandlerConfig,
        sender: Arc<dyn NotificationSender>,
        template_source: Arc<dyn TemplateSource>,
    ) -> Self {
        Self {
            config,
            builder: PayloadBuilder::new(template_source),
            sender,
            annotation_overrides: true,
        }
    }

    /// Wires the webhook sender and filesystem templates for `config`.
    pub fn from_config(config: HandlerConfig) -> Result<Self, SenderError> {
        let sender = WebhookSender::new(config.timeout())?;
        Ok(Self::new(config, Arc::new(sender), Arc::new(FsTemplateSource)))
    }

    /// Enables or disables per-event annotation overrides (on by default).
    pub fn with_annotation_overrides(mut self, enabled: bool) -> Self {
        self.annotation_overrides = enabled;
        self
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let config = if self.annotation_overrides {
            self.config.with_annotation_overrides(event)
        } else {
            self.config.clone()
        };

        config.validate()?;
        debug!("Handler configuration validated.");

        let payload = self.builder.build(event, &config).await?;
        info!(
            event_id = %payload.event_id,
            status = %payload.status,
            "Built Squadcast incident."
        );

        self.sender.send(&config.api_url, &payload).await?;
        info!(
            event_id = %payload.event_id,
            status = %payload.status,
            "Delivered incident to Squadcast."
        );
        Ok(())
    }
}
