use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::{Check, Entity};

/// Incident lifecycle state understood by the Squadcast incident webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Resolve,
    Trigger,
}

impl IncidentStatus {
    /// A check status of 0 (OK) resolves the incident; warning, critical and
    /// unknown codes all trigger it.
    pub fn from_check_status(status: u32) -> Self {
        match status {
            0 => IncidentStatus::Resolve,
            _ => IncidentStatus::Trigger,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => write!(f, "resolve"),
            Self::Trigger => write!(f, "trigger"),
        }
    }
}

/// JSON body posted to the Squadcast incident webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    pub status: IncidentStatus,
    /// Deduplication key for the incident. Always the rendered message.
    pub event_id: String,
    pub message: String,
    pub description: String,
}
