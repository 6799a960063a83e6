use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::models::{IncidentPayload, IncidentStatus};
use super::templates::{self, RenderError};
use crate::config::HandlerConfig;
use crate::event::Event;

pub const MESSAGE_TEMPLATE: &str = "message";
pub const DESCRIPTION_TEMPLATE: &str = "description";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
    #[error("Failed to read specified template file {path:?}: {source}")]
    TemplateFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Supplies the contents of description template files.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn read_template(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads templates from the local filesystem.
pub struct FsTemplateSource;

#[async_trait]
impl TemplateSource for FsTemplateSource {
    async fn read_template(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

pub struct PayloadBuilder {
    template_source: Arc<dyn TemplateSource>,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(Arc::new(FsTemplateSource))
    }
}

impl PayloadBuilder {
    pub fn new(template_source: Arc<dyn TemplateSource>) -> Self {
        Self { template_source }
    }

    /// Turns an event into the incident payload. Nothing is sent from here;
    /// the only I/O is reading the description template file when one is set.
    pub async fn build(
        &self,
        event: &Event,
        config: &HandlerConfig,
    ) -> Result<IncidentPayload, BuildError> {
        let check = event
            .check
            .as_ref()
            .ok_or_else(|| BuildError::InvalidEvent("event does not contain a check".to_string()))?;
        let status = IncidentStatus::from_check_status(check.status);

        let description_template = self.description_template(config).await?;

        let message = templates::render(MESSAGE_TEMPLATE, &config.message, event)?;
        let description = templates::render(DESCRIPTION_TEMPLATE, &description_template, event)?;

        Ok(IncidentPayload {
            check: event.check.clone(),
            entity: event.entity.clone(),
            status,
            event_id: message.clone(),
            message,
            description,
        })
    }

    async fn description_template(&self, config: &HandlerConfig) -> Result<String, BuildError> {
        match config.template_path() {
            Some(path) => {
                debug!(path = ?path, "Reading description template file.");
                self.template_source
                    .read_template(path)
                    .await
                    .map_err(|source| BuildError::TemplateFileUnreadable {
                        path: path.to_path_buf(),
                        source,
                    })
            }
            None => Ok(config.description.clone()),
        }
    }
}
