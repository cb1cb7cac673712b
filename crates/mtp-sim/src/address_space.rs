// crates/mtp-sim/src/address_space.rs

//! In-process variable table mirroring what the network address space exposes.
//!
//! The protocol stack itself lives outside this crate; this table is the part it
//! is configured from. It is rebuilt wholesale from a tree, receives every resolved
//! value as a [`ValueSink`], and answers reads by any identifier encoding.

use crate::error::SinkError;
use crate::fanout::ValueSink;
use crate::identity::{CanonicalKey, normalize};
use crate::node::Node;
use crate::types::{AccessLevel, DataType};
use crate::value::{TagValue, ValueChange};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Live state of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableState {
    pub key: CanonicalKey,
    pub display_name: String,
    pub browse_name: String,
    pub data_type: DataType,
    /// The data type text as declared in the descriptor.
    pub declared_type: Option<String>,
    pub access: AccessLevel,
    pub description: Option<String>,
    pub value: TagValue,
    /// Time of the last update; `None` until the first value arrives.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Serializable row of [`AddressSpace::snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableInfo {
    pub node_id: CanonicalKey,
    pub display_name: String,
    pub data_type: String,
    pub value: Option<TagValue>,
    pub access: AccessLevel,
    pub description: Option<String>,
}

#[derive(Default)]
struct Table {
    /// Keys in tree order, for stable snapshots.
    order: Vec<CanonicalKey>,
    vars: HashMap<CanonicalKey, VariableState>,
}

#[derive(Default)]
pub struct AddressSpace {
    table: RwLock<Table>,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the table from `root`. When several leaves normalize to the same
    /// key, the first one in tree order wins. Returns the number of variables.
    pub fn load(&self, root: &Node) -> usize {
        let mut table = Table::default();
        for node in root.variables() {
            let Some(key) = node.canonical_key() else {
                continue;
            };
            if table.vars.contains_key(&key) {
                debug!(
                    "[AddressSpace] Duplicate identity {} ('{}'), keeping the first variable",
                    key, node.display_name
                );
                continue;
            }
            let data_type = node.resolved_data_type();
            let display_name = if node.display_name.trim().is_empty() {
                node.browse_name.clone()
            } else {
                node.display_name.clone()
            };
            table.order.push(key.clone());
            table.vars.insert(
                key.clone(),
                VariableState {
                    key,
                    display_name,
                    browse_name: node.browse_name.clone(),
                    data_type,
                    declared_type: node.data_type.clone(),
                    access: node.access.unwrap_or(AccessLevel::ReadWrite),
                    description: node.description.clone(),
                    value: data_type.default_value(),
                    timestamp: None,
                },
            );
        }

        let count = table.order.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        info!("[AddressSpace] Loaded {} variable(s)", count);
        count
    }

    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the current value of `key`.
    pub fn update_value(&self, key: &CanonicalKey, value: TagValue) -> Result<(), SinkError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let var = table
            .vars
            .get_mut(key)
            .ok_or_else(|| SinkError::UnknownKey(key.clone()))?;
        var.value = value;
        var.timestamp = Some(Utc::now());
        Ok(())
    }

    /// Reads the current value by any identifier encoding.
    pub fn try_get_value(&self, raw_identifier: &str) -> Option<TagValue> {
        self.variable(raw_identifier).map(|v| v.value)
    }

    pub fn variable(&self, raw_identifier: &str) -> Option<VariableState> {
        let key = normalize(raw_identifier);
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .vars
            .get(&key)
            .cloned()
    }

    /// All variables in tree order. Values that were never updated are `None`.
    pub fn snapshot(&self) -> Vec<VariableInfo> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .order
            .iter()
            .filter_map(|key| table.vars.get(key))
            .map(|var| VariableInfo {
                node_id: var.key.clone(),
                display_name: var.display_name.clone(),
                data_type: var
                    .declared_type
                    .clone()
                    .unwrap_or_else(|| var.data_type.to_string()),
                value: var.timestamp.map(|_| var.value.clone()),
                access: var.access,
                description: var.description.clone(),
            })
            .collect()
    }
}

impl ValueSink for AddressSpace {
    fn name(&self) -> &str {
        "address-space"
    }

    fn on_value_changed(&self, change: &ValueChange) -> Result<(), SinkError> {
        self.update_value(&change.key, change.value.clone())
    }
}
