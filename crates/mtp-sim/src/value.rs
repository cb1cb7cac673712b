// crates/mtp-sim/src/value.rs

//! Tag values and the change events handed to sinks.

use crate::identity::CanonicalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar tag value.
///
/// Serialized untagged, so JSON `42`, `true` and `"open"` map to
/// `Number`, `Boolean` and `Text` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl TagValue {
    /// Parses override text as a finite number.
    pub fn parse_number(text: &str) -> Option<f64> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Boolean(_) => None,
            Self::Text(t) => Self::parse_number(t),
        }
    }
}

/// The text form is what the override store persists.
impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeOrigin {
    /// Produced by a simulation tick (possibly replaced by a stored override).
    Simulation,
    /// Submitted through the write-request entry point (UI, REST).
    Write,
    /// Written by a remote actor through the address-space sink.
    ExternalWrite,
}

/// A resolved value change, delivered to every subscribed sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub key: CanonicalKey,
    pub value: TagValue,
    pub origin: ChangeOrigin,
    pub timestamp: DateTime<Utc>,
}

impl ValueChange {
    pub fn new(key: CanonicalKey, value: TagValue, origin: ChangeOrigin) -> Self {
        Self {
            key,
            value,
            origin,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(TagValue::parse_number(" 42 "), Some(42.0));
        assert_eq!(TagValue::parse_number("-0.5"), Some(-0.5));
        assert_eq!(TagValue::parse_number("NaN"), None);
        assert_eq!(TagValue::parse_number("inf"), None);
        assert_eq!(TagValue::parse_number("open"), None);
    }

    #[test]
    fn test_display_is_storage_text() {
        assert_eq!(TagValue::Number(42.0).to_string(), "42");
        assert_eq!(TagValue::Number(1.5).to_string(), "1.5");
        assert_eq!(TagValue::Boolean(true).to_string(), "true");
        assert_eq!(TagValue::from("open").to_string(), "open");
    }

    #[test]
    fn test_untagged_json() {
        let v: TagValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, TagValue::Number(42.0));
        let v: TagValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, TagValue::Boolean(true));
        let v: TagValue = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(v, TagValue::Text("42".into()));
        assert_eq!(v.as_f64(), Some(42.0));
    }

    #[test]
    fn test_change_serializes_camel_case() {
        let change = ValueChange::new(
            CanonicalKey::from_raw("R0001"),
            TagValue::Number(1.0),
            ChangeOrigin::ExternalWrite,
        );
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["key"], "ns=2;s=R0001");
        assert_eq!(json["origin"], "externalWrite");
        assert_eq!(json["value"], 1.0);
    }
}
