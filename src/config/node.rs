//! Source-tagged document tree used between parsing and the final result.
//!
//! Every node remembers the file that introduced it. Merging always builds
//! fresh nodes, so an ancestor document is never mutated in place and each
//! node in the merged tree has exactly one owner.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeKind {
    Scalar(Value),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub source: Arc<Path>,
    /// Value before path resolution rewrote it.
    pub original: Option<Value>,
}

impl Node {
    pub fn from_value(value: Value, source: &Arc<Path>) -> Self {
        let kind = match value {
            Value::Array(items) => NodeKind::Array(
                items
                    .into_iter()
                    .map(|item| Node::from_value(item, source))
                    .collect(),
            ),
            Value::Object(map) => NodeKind::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Node::from_value(item, source)))
                    .collect(),
            ),
            scalar => NodeKind::Scalar(scalar),
        };
        Self {
            kind,
            source: Arc::clone(source),
            original: None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, NodeKind::Object(_))
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Array(_) => "array",
            NodeKind::Object(_) => "object",
            NodeKind::Scalar(Value::String(_)) => "string",
            NodeKind::Scalar(Value::Number(_)) => "number",
            NodeKind::Scalar(Value::Bool(_)) => "boolean",
            NodeKind::Scalar(_) => "null",
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.kind {
            NodeKind::Object(fields) => fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, node)| node),
            _ => None,
        }
    }

    /// Removes and returns a field from an object node.
    pub fn take(&mut self, key: &str) -> Option<Node> {
        match &mut self.kind {
            NodeKind::Object(fields) => {
                let index = fields.iter().position(|(name, _)| name == key)?;
                Some(fields.remove(index).1)
            }
            _ => None,
        }
    }

    /// Plain JSON view of this subtree.
    pub fn to_value(&self) -> Value {
        match &self.kind {
            NodeKind::Scalar(value) => value.clone(),
            NodeKind::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            NodeKind::Object(fields) => {
                let map: Map<String, Value> = fields
                    .iter()
                    .map(|(key, node)| (key.clone(), node.to_value()))
                    .collect();
                Value::Object(map)
            }
        }
    }
}
