// crates/mtp-sim/src/node.rs

//! The node model: an owned tree of folders, objects and variables.
//!
//! A tree is built once per descriptor parse and never mutated after it has been
//! handed to the simulator. Reloading replaces the whole tree through [`SharedTree`].

use crate::identity::{CanonicalKey, normalize};
use crate::types::{AccessLevel, DataType, NodeClass};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub display_name: String,
    pub browse_name: String,
    pub node_class: NodeClass,
    /// Declared data type text, e.g. `xs:double`. Required on variables.
    pub data_type: Option<String>,
    /// Identifier as written in the descriptor, in any accepted encoding.
    pub raw_identifier: Option<String>,
    pub access: Option<AccessLevel>,
    pub description: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    /// Creates a folder whose display and browse names are both `name`.
    pub fn folder(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            browse_name: name,
            node_class: NodeClass::Folder,
            ..Default::default()
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self {
            node_class: NodeClass::Object,
            ..Self::folder(name)
        }
    }

    /// Creates a variable leaf with the given declared data type.
    pub fn variable(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            node_class: NodeClass::Variable,
            data_type: Some(data_type.into()),
            ..Self::folder(name)
        }
    }

    pub fn with_identifier(mut self, raw: impl Into<String>) -> Self {
        self.raw_identifier = Some(raw.into());
        self
    }

    pub fn with_browse_name(mut self, browse_name: impl Into<String>) -> Self {
        self.browse_name = browse_name.into();
        self
    }

    pub fn with_access(mut self, access: Option<AccessLevel>) -> Self {
        self.access = access;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_variable(&self) -> bool {
        self.node_class == NodeClass::Variable
    }

    /// The classified data type; blank or unknown declarations are `Double`.
    pub fn resolved_data_type(&self) -> DataType {
        DataType::from_declared(self.data_type.as_deref())
    }

    /// The text the canonical key is derived from: the raw identifier, else the
    /// display name, else the browse name. Blank values are skipped.
    pub fn identity_source(&self) -> Option<&str> {
        [
            self.raw_identifier.as_deref(),
            Some(self.display_name.as_str()),
            Some(self.browse_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
    }

    /// The normalized key of this node, if it has any identity source.
    pub fn canonical_key(&self) -> Option<CanonicalKey> {
        self.identity_source().map(normalize)
    }

    /// Depth-first, pre-order traversal starting at (and including) `self`.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter { stack: vec![self] }
    }

    /// All variable leaves in traversal order.
    pub fn variables(&self) -> impl Iterator<Item = &Node> {
        self.iter().filter(|n| n.is_variable())
    }

    pub fn variable_count(&self) -> usize {
        self.variables().count()
    }

    /// Finds the first variable whose canonical key matches `raw` after normalization.
    pub fn find_variable(&self, raw: &str) -> Option<&Node> {
        let key = normalize(raw);
        self.variables()
            .find(|n| n.canonical_key().as_ref() == Some(&key))
    }

    /// Gives every variable without any identity source a generated identifier,
    /// so its key stays stable for the lifetime of the tree.
    pub fn assign_fallback_identifiers(&mut self) {
        if self.is_variable() && self.identity_source().is_none() {
            let generated = uuid::Uuid::new_v4().simple().to_string();
            log::debug!(
                "[Node] Variable without identity, assigned generated identifier {}",
                generated
            );
            self.raw_identifier = Some(generated);
        }
        for child in &mut self.children {
            child.assign_fallback_identifiers();
        }
    }

    /// Checks the structural invariants of a tree rooted at `self`:
    /// the root is a folder, and variables are childless and typed.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.node_class != NodeClass::Folder {
            return Err("root node must be a Folder");
        }
        for node in self.iter() {
            if node.is_variable() {
                if !node.children.is_empty() {
                    return Err("Variable nodes must not have children");
                }
                if node.data_type.is_none() {
                    return Err("Variable nodes must carry a data type");
                }
            }
        }
        Ok(())
    }
}

/// Iterator returned by [`Node::iter`].
pub struct NodeIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse so the first child is visited first.
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Holder of the currently loaded tree.
///
/// Readers get an `Arc` to an immutable tree; a reload swaps the reference in one step,
/// so a traversal in progress keeps seeing the tree it started on.
#[derive(Debug, Default)]
pub struct SharedTree {
    current: RwLock<Option<Arc<Node>>>,
}

impl SharedTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tree currently in effect.
    pub fn current(&self) -> Option<Arc<Node>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the tree, returning the previous one.
    pub fn replace(&self, tree: Arc<Node>) -> Option<Arc<Node>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tree)
    }
}
