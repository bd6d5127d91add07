//! The loaded document and where each of its values came from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::node::{Node, NodeKind};
use super::ConfigError;

#[derive(Debug, Clone)]
struct Record {
    source: Arc<Path>,
    original: Option<Value>,
}

/// A fully resolved configuration document.
///
/// The document itself is plain JSON. Provenance lives in a side table
/// keyed by each node's location, so it can be queried either with a JSON
/// pointer or with a reference borrowed from [`document`](Self::document):
///
/// ```no_run
/// # use cfgweave::{ConfigSpec, PathResolution};
/// # use serde_json::json;
/// let spec = ConfigSpec::builder("config/build.json")
///     .with_schema(json!({ "type": "object" }))
///     .resolve_path("$.plugins.*.entry", PathResolution::RelativeToConfigFile)
///     .build()?;
/// let config = spec.load("/repo/app", None)?;
///
/// if let Some(plugin) = config.document()["plugins"].get(0) {
///     println!("declared in {:?}", config.source_file_of(plugin));
///     println!("written as {:?}", config.original_value_of(plugin, "entry"));
/// }
/// # Ok::<(), cfgweave::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    document: Value,
    source_file: PathBuf,
    records: HashMap<String, Record>,
}

impl ResolvedConfig {
    pub(crate) fn new(root: Node, source_file: PathBuf) -> Self {
        let mut records = HashMap::new();
        let document = freeze(root, String::new(), &mut records);
        Self {
            document,
            source_file,
            records,
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    /// The file that was loaded, i.e. the most-derived file of the chain.
    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Deserializes the document into a typed configuration.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        T::deserialize(&self.document).map_err(ConfigError::DeserializeError)
    }

    /// Returns the file that declared `value`.
    ///
    /// `value` must be borrowed from [`document`](Self::document): lookup is
    /// by identity, so an equal value from elsewhere yields `None`.
    pub fn source_file_of(&self, value: &Value) -> Option<&Path> {
        let pointer = locate(&self.document, value)?;
        self.source_file_at(&pointer)
    }

    /// Returns `field` of `object` as it was written, before path resolution.
    ///
    /// For an array, `field` is an element index such as `"0"`. Like
    /// [`source_file_of`](Self::source_file_of), `object` must be borrowed
    /// from the document.
    pub fn original_value_of(&self, object: &Value, field: &str) -> Option<&Value> {
        let token = match object {
            Value::Object(map) => {
                map.get(field)?;
                escape(field)
            }
            Value::Array(items) => {
                let index: usize = field.parse().ok()?;
                items.get(index)?;
                index.to_string()
            }
            _ => return None,
        };
        let pointer = locate(&self.document, object)?;
        self.original_value_at(&format!("{pointer}/{token}"))
    }

    /// Returns the file that declared the value at a JSON pointer.
    pub fn source_file_at(&self, pointer: &str) -> Option<&Path> {
        self.records.get(pointer).map(|record| &*record.source)
    }

    /// Returns the value at a JSON pointer as it was written.
    pub fn original_value_at(&self, pointer: &str) -> Option<&Value> {
        let record = self.records.get(pointer)?;
        record
            .original
            .as_ref()
            .or_else(|| self.document.pointer(pointer))
    }
}

fn freeze(node: Node, pointer: String, records: &mut HashMap<String, Record>) -> Value {
    let value = match node.kind {
        NodeKind::Scalar(value) => value,
        NodeKind::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| freeze(item, format!("{pointer}/{index}"), records))
                .collect(),
        ),
        NodeKind::Object(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (key, item) in fields {
                let child = format!("{pointer}/{}", escape(&key));
                map.insert(key, freeze(item, child, records));
            }
            Value::Object(map)
        }
    };
    records.insert(
        pointer,
        Record {
            source: node.source,
            original: node.original,
        },
    );
    value
}

/// JSON pointer of `needle` inside `haystack`, matched by address.
fn locate(haystack: &Value, needle: &Value) -> Option<String> {
    if std::ptr::eq(haystack, needle) {
        return Some(String::new());
    }
    match haystack {
        Value::Array(items) => items.iter().enumerate().find_map(|(index, item)| {
            locate(item, needle).map(|rest| format!("/{index}{rest}"))
        }),
        Value::Object(map) => map.iter().find_map(|(key, item)| {
            locate(item, needle).map(|rest| format!("/{}{rest}", escape(key)))
        }),
        _ => None,
    }
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
