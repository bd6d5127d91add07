//! Reading one config file into a source-tagged document.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::node::{Node, NodeKind};
use super::ConfigError;

/// Key naming the file a document inherits from.
pub(crate) const EXTENDS_KEY: &str = "extends";
/// Editor hint; never part of a loaded document.
pub(crate) const SCHEMA_KEY: &str = "$schema";

/// The parsed contents of exactly one file, before merging.
#[derive(Debug, Clone)]
pub(crate) struct RawDocument {
    pub path: Arc<Path>,
    pub extends: Option<String>,
    pub node: Node,
}

/// Loads and parses a JSON config file.
///
/// Returns `Ok(None)` if the file doesn't exist. `path` should already be
/// absolute; it is recorded as the source of every node in the document.
pub(crate) fn read_document(path: &Path) -> Result<Option<RawDocument>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    tracing::debug!(path = %path.display(), bytes = contents.len(), "read config file");

    let value: Value =
        serde_json::from_str(&contents).map_err(|e| ConfigError::MalformedDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
    parse_document(path, value).map(Some)
}

fn parse_document(path: &Path, value: Value) -> Result<RawDocument, ConfigError> {
    if !value.is_object() {
        return Err(ConfigError::InvalidDocument {
            path: path.to_path_buf(),
            reason: "top-level value must be an object".to_string(),
        });
    }

    let source: Arc<Path> = Arc::from(path);
    let mut node = Node::from_value(value, &source);
    node.take(SCHEMA_KEY);

    let extends = match node.take(EXTENDS_KEY).map(|n| n.kind) {
        None => None,
        Some(NodeKind::Scalar(Value::String(target))) => Some(target),
        Some(_) => {
            return Err(ConfigError::InvalidDocument {
                path: path.to_path_buf(),
                reason: format!("\"{EXTENDS_KEY}\" must be a string"),
            })
        }
    };

    Ok(RawDocument {
        path: source,
        extends,
        node,
    })
}
