use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::{Event, ObjectMeta};
use crate::version::HANDLER_NAME;

pub const OPTION_API_URL: &str = "api-url";
pub const OPTION_MESSAGE: &str = "message";
pub const OPTION_DESCRIPTION: &str = "description";
pub const OPTION_TEMPLATE: &str = "template";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing Squadcast API URL")]
    MissingEndpoint,
    #[error("Invalid Squadcast API URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Fully resolved handler configuration. Built once at start-up and passed
/// explicitly to every stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HandlerConfig {
    #[serde(default)]
    pub api_url: String,

    #[serde(default = "default_message")]
    pub message: String,

    #[serde(default = "default_description")]
    pub description: String,

    /// Path of a file whose contents replace `description`. Empty means unset.
    #[serde(default)]
    pub template: String,

    /// Request timeout in seconds, 0 leaves the HTTP client without one.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug, Clone)]
pub struct PartialHandlerConfig {
    pub api_url: Option<String>,
    pub message: Option<String>,
    pub description: Option<String>,
    pub template: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl PartialHandlerConfig {
    /// Fields set in `self` win over those in `lower`.
    fn merge_over(self, lower: PartialHandlerConfig) -> PartialHandlerConfig {
        PartialHandlerConfig {
            api_url: self.api_url.or(lower.api_url),
            message: self.message.or(lower.message),
            description: self.description.or(lower.description),
            template: self.template.or(lower.template),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
        }
    }
}

pub fn default_message() -> String {
    "{{Entity.Name}}/{{Check.Name}}".to_string()
}

pub fn default_description() -> String {
    "{{Check.Output}}".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Prefix of the entity and check annotations that override options per event.
pub fn annotation_keyspace() -> String {
    format!("sensu.io/plugins/{HANDLER_NAME}/config")
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            message: default_message(),
            description: default_description(),
            template: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HandlerConfig {
    /// Layers defaults, the optional TOML file and `overrides` (flags and
    /// environment), in increasing order of precedence.
    pub fn load(
        config_path: Option<&Path>,
        overrides: PartialHandlerConfig,
    ) -> Result<Self, ConfigError> {
        let file_config: PartialHandlerConfig = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some(path) => {
                warn!(path = ?path, "Config file not found, continuing without it.");
                PartialHandlerConfig::default()
            }
            None => PartialHandlerConfig::default(),
        };

        let merged = overrides.merge_over(file_config);
        let defaults = HandlerConfig::default();
        Ok(HandlerConfig {
            api_url: merged.api_url.unwrap_or(defaults.api_url),
            message: merged.message.unwrap_or(defaults.message),
            description: merged.description.unwrap_or(defaults.description),
            template: merged.template.unwrap_or(defaults.template),
            timeout_secs: merged.timeout_secs.unwrap_or(defaults.timeout_secs),
        })
    }

    /// Checks the endpoint is present and syntactically a URL. Does not touch the network.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_url.is_empty() {
            return Err(ValidationError::MissingEndpoint);
        }
        let invalid = |reason: String| ValidationError::InvalidEndpoint {
            url: self.api_url.clone(),
            reason,
        };
        let url = Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if !url.has_host() {
            return Err(invalid("URL has no host".to_string()));
        }
        Ok(())
    }

    pub fn template_path(&self) -> Option<&Path> {
        if self.template.is_empty() {
            None
        } else {
            Some(Path::new(&self.template))
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Applies `<keyspace>/<option>` annotations from the event's entity and
    /// then its check, so check annotations take precedence. The API URL is a
    /// secret and is never taken from annotations, and the timeout is fixed
    /// when the HTTP client is built.
    pub fn with_annotation_overrides(&self, event: &Event) -> HandlerConfig {
        let mut config = self.clone();
        let keyspace = annotation_keyspace();
        let sources = [
            event.entity.as_ref().map(|e| &e.metadata),
            event.check.as_ref().map(|c| &c.metadata),
        ];
        for meta in sources.into_iter().flatten() {
            config.apply_annotations(&keyspace, meta);
        }
        config
    }

    fn apply_annotations(&mut self, keyspace: &str, meta: &ObjectMeta) {
        for (key, value) in &meta.annotations {
            let Some(option) = key
                .strip_prefix(keyspace)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };
            match option {
                OPTION_MESSAGE => self.message = value.clone(),
                OPTION_DESCRIPTION => self.description = value.clone(),
                OPTION_TEMPLATE => self.template = value.clone(),
                OPTION_API_URL => {
                    warn!(annotation = %key, "The API URL cannot be overridden by annotations.");
                    continue;
                }
                other => {
                    warn!(option = %other, "Ignoring annotation for unknown option.");
                    continue;
                }
            }
            debug!(option = %option, source = %meta.name, "Applied annotation override.");
        }
    }
}
