// crates/mtp-sim-monitor/src/model.rs

//! Request and message types exchanged with the browser.

use mtp_sim::{CanonicalKey, ChangeOrigin, TagValue, ValueChange, VariableInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/write`.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    #[serde(alias = "NodeId")]
    pub node_id: String,
    /// Any JSON scalar. Missing or `null` writes an empty string.
    #[serde(default, alias = "Value")]
    pub value: Option<Value>,
}

impl WriteRequest {
    /// Converts the JSON value into a tag value.
    pub fn tag_value(&self) -> TagValue {
        match &self.value {
            None | Some(Value::Null) => TagValue::Text(String::new()),
            Some(Value::Bool(b)) => TagValue::Boolean(*b),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) => TagValue::Number(f),
                None => TagValue::Text(n.to_string()),
            },
            Some(Value::String(s)) => TagValue::Text(s.clone()),
            // Arrays and objects are stored as their JSON text.
            Some(other) => TagValue::Text(other.to_string()),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct WriteResponse {
    pub success: bool,
}

/// Query of `POST /api/mtp/upload`.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub file_name: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct UploadResponse {
    pub success: bool,
    pub count: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// A message pushed to every WebSocket client, tagged by `event`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MonitorMessage {
    /// A value produced by the engine or written locally.
    Value {
        node_id: CanonicalKey,
        value: TagValue,
    },
    /// A value written by a remote actor.
    ExternalWrite {
        node_id: CanonicalKey,
        value: TagValue,
    },
    /// The variable list after a descriptor was loaded.
    Variables { variables: Vec<VariableInfo> },
}

impl From<&ValueChange> for MonitorMessage {
    fn from(change: &ValueChange) -> Self {
        let node_id = change.key.clone();
        let value = change.value.clone();
        match change.origin {
            ChangeOrigin::ExternalWrite => MonitorMessage::ExternalWrite { node_id, value },
            ChangeOrigin::Simulation | ChangeOrigin::Write => MonitorMessage::Value { node_id, value },
        }
    }
}
