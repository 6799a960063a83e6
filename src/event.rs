//! Sensu event model as delivered to handlers on stdin.
//!
//! Only the fields the handler reads are typed. Everything else is carried in
//! `extra` so the entity and check objects are forwarded to Squadcast as they
//! were received.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to read event: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to decode event JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid event: {0}")]
    Invalid(String),
}

// Sensu encodes nil slices and maps as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The monitored host or resource.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Entity {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub entity_class: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subscriptions: Vec<String>,
    #[serde(default)]
    pub last_seen: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One evaluation of a check. `status` is the only field the handler interprets.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Check {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub interval: u32,
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub occurrences: i64,
    #[serde(default)]
    pub issued: i64,
    #[serde(default)]
    pub executed: i64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub handlers: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Event {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
    #[serde(default)]
    pub metadata: ObjectMeta,
}

impl Event {
    /// Decodes an event from a JSON byte stream and checks it is usable by a handler.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, EventError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        let event: Event = serde_json::from_str(raw)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        let entity = self
            .entity
            .as_ref()
            .ok_or_else(|| EventError::Invalid("event does not contain an entity".to_string()))?;
        if entity.metadata.name.is_empty() {
            return Err(EventError::Invalid("entity name must not be empty".to_string()));
        }
        let check = self
            .check
            .as_ref()
            .ok_or_else(|| EventError::Invalid("event does not contain a check".to_string()))?;
        if check.metadata.name.is_empty() {
            return Err(EventError::Invalid("check name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Builds a minimal event for the given entity and check names.
    #[cfg(test)]
    pub fn fixture(entity_name: &str, check_name: &str) -> Self {
        Event {
            timestamp: 1_700_000_000,
            id: None,
            entity: Some(Entity {
                metadata: ObjectMeta {
                    name: entity_name.to_string(),
                    namespace: "default".to_string(),
                    ..Default::default()
                },
                entity_class: "host".to_string(),
                subscriptions: vec!["linux".to_string()],
                last_seen: 1_700_000_000,
                extra: Map::new(),
            }),
            check: Some(Check {
                metadata: ObjectMeta {
                    name: check_name.to_string(),
                    namespace: "default".to_string(),
                    ..Default::default()
                },
                command: "command".to_string(),
                interval: 60,
                state: "passing".to_string(),
                issued: 1_700_000_000,
                executed: 1_700_000_000,
                handlers: vec!["squadcast".to_string()],
                ..Default::default()
            }),
            metadata: ObjectMeta::default(),
        }
    }
}
