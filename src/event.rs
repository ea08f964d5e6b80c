//! Monitoring event model.
//!
//! Only the fields the multiplexer reads or rewrites are typed; everything
//! else is carried in `extra` so an event round-trips without loss.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;

/// Inbound event decoded from stdin and the template for outbound events.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Entity {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Check {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub output: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Check annotations, or `None` when the event carries no check.
    pub fn check_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.check.as_ref().map(|check| &check.metadata.annotations)
    }

    /// Entity annotations, or `None` when the event carries no entity.
    pub fn entity_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.entity.as_ref().map(|entity| &entity.metadata.annotations)
    }
}

/// Decode a JSON event from a reader (stdin in production).
pub fn read_event<R: Read>(reader: R) -> Result<Event> {
    let event = serde_json::from_reader(reader).context("decode event JSON from stdin")?;
    Ok(event)
}
