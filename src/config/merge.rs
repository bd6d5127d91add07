//! Folding an extends chain into one document.
//!
//! Top-level fields are combined according to their [`InheritancePolicy`].
//! Without an explicit policy, two arrays are appended and anything else is
//! replaced by the descendant's value.
//!
//! A file can also override the policy of one of its own fields inline:
//!
//! ```json
//! {
//!   "extends": "./base.json",
//!   "$plugins.inheritanceType": "replace",
//!   "plugins": []
//! }
//! ```
//!
//! Inline directives take precedence over the policies of the
//! [`ConfigSpec`](super::ConfigSpec). They are stripped from every object
//! reachable through object fields, and never appear in a loaded document.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::chain::ExtendsChain;
use super::node::{Node, NodeKind};
use super::ConfigError;

const DIRECTIVE_SUFFIX: &str = ".inheritanceType";

/// Caller-supplied merge for one field.
///
/// Receives the descendant's value and the value accumulated from all
/// ancestors; whatever it returns becomes the field's value verbatim.
pub trait CustomMerge: Send + Sync {
    fn merge(&self, child: &Value, parent: &Value) -> Value;
}

impl<F> CustomMerge for F
where
    F: Fn(&Value, &Value) -> Value + Send + Sync,
{
    fn merge(&self, child: &Value, parent: &Value) -> Value {
        self(child, parent)
    }
}

/// How a descendant's field combines with the same field of its ancestors.
#[derive(Clone)]
pub enum InheritancePolicy {
    /// Ancestor elements followed by descendant elements. Arrays only.
    Append,
    /// Ancestor keys overlaid with descendant keys, recursively. Objects only.
    Merge,
    /// The descendant value replaces the ancestor value.
    Replace,
    Custom(Arc<dyn CustomMerge>),
}

impl InheritancePolicy {
    pub fn custom(merge: impl CustomMerge + 'static) -> Self {
        Self::Custom(Arc::new(merge))
    }

    fn from_directive(name: &str) -> Option<Self> {
        match name {
            "append" => Some(Self::Append),
            "merge" => Some(Self::Merge),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

impl fmt::Debug for InheritancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => f.write_str("Append"),
            Self::Merge => f.write_str("Merge"),
            Self::Replace => f.write_str("Replace"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

type Policies = HashMap<String, InheritancePolicy>;

/// Merges `chain` base-first. The root object of the result is attributed
/// to the most-derived file.
pub(crate) fn merge_chain(chain: ExtendsChain, policies: &Policies) -> Result<Node, ConfigError> {
    let (mut merged, derived) = chain.into_parts();
    strip_directives(&mut merged.node, &merged.path)?;

    derived.into_iter().try_fold(merged.node, |parent, document| {
        tracing::trace!(path = %document.path.display(), "merging config file");
        merge_objects(parent, document.node, Some(policies), &document.path)
    })
}

fn merge_objects(
    parent: Node,
    mut child: Node,
    policies: Option<&Policies>,
    file: &Path,
) -> Result<Node, ConfigError> {
    let directives = take_directives(&mut child, file)?;
    let source = Arc::clone(&child.source);

    let (NodeKind::Object(parent_fields), NodeKind::Object(mut child_fields)) =
        (parent.kind, child.kind)
    else {
        return Err(ConfigError::InvalidDocument {
            path: file.to_path_buf(),
            reason: "cannot merge a non-object value".to_string(),
        });
    };

    let mut fields = Vec::with_capacity(parent_fields.len() + child_fields.len());
    for (key, parent_value) in parent_fields {
        let index = child_fields.iter().position(|(name, _)| *name == key);
        let Some(index) = index else {
            fields.push((key, parent_value));
            continue;
        };

        let (_, child_value) = child_fields.remove(index);
        let policy = directives
            .get(&key)
            .or_else(|| policies.and_then(|p| p.get(&key)));
        let value = merge_field(&key, parent_value, child_value, policy, file)?;
        fields.push((key, value));
    }

    for (key, mut child_value) in child_fields {
        strip_directives(&mut child_value, file)?;
        fields.push((key, child_value));
    }

    Ok(Node {
        kind: NodeKind::Object(fields),
        source,
        original: None,
    })
}

fn merge_field(
    key: &str,
    parent: Node,
    mut child: Node,
    policy: Option<&InheritancePolicy>,
    file: &Path,
) -> Result<Node, ConfigError> {
    let mismatch = |expected: &str, parent: &Node, child: &Node| ConfigError::InvalidInheritance {
        path: file.to_path_buf(),
        field: key.to_string(),
        reason: format!(
            "{expected} requires both values to be {}s, found {} and {}",
            if expected == "append" { "array" } else { "object" },
            parent.type_name(),
            child.type_name()
        ),
    };

    let policy = match policy {
        Some(policy) => policy.clone(),
        None if parent.is_array() && child.is_array() => InheritancePolicy::Append,
        None => InheritancePolicy::Replace,
    };

    match policy {
        InheritancePolicy::Append => {
            if !(parent.is_array() && child.is_array()) {
                return Err(mismatch("append", &parent, &child));
            }
            let mut items = Vec::new();
            if let NodeKind::Array(inherited) = parent.kind {
                items.extend(inherited);
            }
            if let NodeKind::Array(own) = child.kind {
                items.extend(own);
            }
            Ok(Node {
                kind: NodeKind::Array(items),
                source: child.source,
                original: None,
            })
        }
        InheritancePolicy::Merge => {
            if !(parent.is_object() && child.is_object()) {
                return Err(mismatch("merge", &parent, &child));
            }
            merge_objects(parent, child, None, file)
        }
        InheritancePolicy::Replace => {
            strip_directives(&mut child, file)?;
            Ok(child)
        }
        InheritancePolicy::Custom(merge) => {
            strip_directives(&mut child, file)?;
            let value = merge.merge(&child.to_value(), &parent.to_value());
            Ok(Node::from_value(value, &child.source))
        }
    }
}

/// Removes the directives declared directly on `node`, returning them by field.
fn take_directives(node: &mut Node, file: &Path) -> Result<Policies, ConfigError> {
    let mut directives = Policies::new();
    let NodeKind::Object(fields) = &mut node.kind else {
        return Ok(directives);
    };

    let mut index = 0;
    while index < fields.len() {
        let Some(field) = directive_target(&fields[index].0) else {
            index += 1;
            continue;
        };
        let field = field.to_string();
        let (key, value) = fields.remove(index);

        let policy = match &value.kind {
            NodeKind::Scalar(Value::String(name)) => InheritancePolicy::from_directive(name),
            _ => None,
        };
        let policy = policy.ok_or_else(|| ConfigError::InvalidDocument {
            path: file.to_path_buf(),
            reason: format!(
                "\"{key}\" must be one of \"append\", \"merge\" or \"replace\", found {}",
                value.to_value()
            ),
        })?;
        directives.insert(field, policy);
    }

    Ok(directives)
}

/// Removes directives from `node` and every object nested under its fields.
fn strip_directives(node: &mut Node, file: &Path) -> Result<(), ConfigError> {
    take_directives(node, file)?;
    if let NodeKind::Object(fields) = &mut node.kind {
        for (_, value) in fields.iter_mut() {
            strip_directives(value, file)?;
        }
    }
    Ok(())
}

fn directive_target(key: &str) -> Option<&str> {
    key.strip_prefix('$')?
        .strip_suffix(DIRECTIVE_SUFFIX)
        .filter(|field| !field.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::chain::resolve_chain;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = fs::canonicalize(dir.path()).unwrap();
            Self { _dir: dir, root }
        }

        fn write(&self, name: &str, contents: Value) -> PathBuf {
            let path = self.root.join(name);
            fs::write(&path, contents.to_string()).unwrap();
            path
        }

        fn merge(&self, leaf: &Path, policies: &Policies) -> Result<Node, ConfigError> {
            merge_chain(resolve_chain(leaf)?, policies)
        }
    }

    fn policies(entries: &[(&str, InheritancePolicy)]) -> Policies {
        entries
            .iter()
            .map(|(name, policy)| (name.to_string(), policy.clone()))
            .collect()
    }

    #[test]
    fn test_scalar_child_wins() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "name": "base", "only_base": true }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "name": "app" }));

        let merged = fx.merge(&leaf, &Policies::new()).unwrap();
        assert_eq!(merged.to_value(), json!({ "name": "app", "only_base": true }));
    }

    #[test]
    fn test_arrays_append_by_default() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": [1, 2] }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "list": [3] }));

        let merged = fx.merge(&leaf, &Policies::new()).unwrap();
        assert_eq!(merged.to_value(), json!({ "list": [1, 2, 3] }));
    }

    #[test]
    fn test_replace_policy_keeps_only_child_array() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": [1, 2] }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "list": [3] }));

        let merged = fx
            .merge(&leaf, &policies(&[("list", InheritancePolicy::Replace)]))
            .unwrap();
        assert_eq!(merged.to_value(), json!({ "list": [3] }));
    }

    #[test]
    fn test_objects_replace_by_default() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "opts": { "a": 1, "b": 2 } }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "opts": { "b": 3 } }));

        let merged = fx.merge(&leaf, &Policies::new()).unwrap();
        assert_eq!(merged.to_value(), json!({ "opts": { "b": 3 } }));
    }

    #[test]
    fn test_merge_policy_overlays_keys() {
        let fx = Fixture::new();
        fx.write(
            "base.json",
            json!({ "opts": { "a": 1, "b": 2, "tags": ["x"] } }),
        );
        let leaf = fx.write(
            "app.json",
            json!({ "extends": "base.json", "opts": { "b": 3, "c": 4, "tags": ["y"] } }),
        );

        let merged = fx
            .merge(&leaf, &policies(&[("opts", InheritancePolicy::Merge)]))
            .unwrap();
        assert_eq!(
            merged.to_value(),
            json!({ "opts": { "a": 1, "b": 3, "tags": ["x", "y"], "c": 4 } })
        );
    }

    #[test]
    fn test_custom_result_is_taken_verbatim() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": [1] }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "list": [2] }));

        let custom = InheritancePolicy::custom(|_: &Value, _: &Value| json!("unrelated"));
        let merged = fx.merge(&leaf, &policies(&[("list", custom)])).unwrap();
        assert_eq!(merged.to_value(), json!({ "list": "unrelated" }));
    }

    #[test]
    fn test_custom_sees_child_then_parent() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "n": 10 }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "n": 3 }));

        let custom = InheritancePolicy::custom(|child: &Value, parent: &Value| {
            json!([child.clone(), parent.clone()])
        });
        let merged = fx.merge(&leaf, &policies(&[("n", custom)])).unwrap();
        assert_eq!(merged.to_value(), json!({ "n": [3, 10] }));
    }

    #[test]
    fn test_append_type_mismatch() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": "not an array" }));
        let leaf = fx.write("app.json", json!({ "extends": "base.json", "list": [1] }));

        let result = fx.merge(&leaf, &policies(&[("list", InheritancePolicy::Append)]));
        match result {
            Err(ConfigError::InvalidInheritance { path, field, .. }) => {
                assert_eq!(path, leaf);
                assert_eq!(field, "list");
            }
            other => panic!("expected InvalidInheritance, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_directive_overrides_spec_policy() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": [1, 2] }));
        let leaf = fx.write(
            "app.json",
            json!({
                "extends": "base.json",
                "$list.inheritanceType": "replace",
                "list": [3]
            }),
        );

        let merged = fx
            .merge(&leaf, &policies(&[("list", InheritancePolicy::Append)]))
            .unwrap();
        assert_eq!(merged.to_value(), json!({ "list": [3] }));
    }

    #[test]
    fn test_nested_directive_under_merge() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "opts": { "inner": { "a": 1 } } }));
        let leaf = fx.write(
            "app.json",
            json!({
                "extends": "base.json",
                "$opts.inheritanceType": "merge",
                "opts": {
                    "$inner.inheritanceType": "merge",
                    "inner": { "b": 2 }
                }
            }),
        );

        let merged = fx.merge(&leaf, &Policies::new()).unwrap();
        assert_eq!(
            merged.to_value(),
            json!({ "opts": { "inner": { "a": 1, "b": 2 } } })
        );
    }

    #[test]
    fn test_directives_are_stripped_from_base() {
        let fx = Fixture::new();
        let base = fx.write(
            "base.json",
            json!({ "$list.inheritanceType": "append", "list": [1], "nested": { "$x.inheritanceType": "merge" } }),
        );

        let merged = fx.merge(&base, &Policies::new()).unwrap();
        assert_eq!(merged.to_value(), json!({ "list": [1], "nested": {} }));
    }

    #[test]
    fn test_unknown_directive_value() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": [1] }));
        let leaf = fx.write(
            "app.json",
            json!({ "extends": "base.json", "$list.inheritanceType": "prepend", "list": [2] }),
        );

        let result = fx.merge(&leaf, &Policies::new());
        assert!(matches!(result, Err(ConfigError::InvalidDocument { .. })));
    }

    #[test]
    fn test_appended_elements_keep_their_source() {
        let fx = Fixture::new();
        let base = fx.write("base.json", json!({ "list": [{ "id": "a" }] }));
        let leaf = fx.write(
            "app.json",
            json!({ "extends": "base.json", "list": [{ "id": "b" }] }),
        );

        let merged = fx.merge(&leaf, &Policies::new()).unwrap();
        let NodeKind::Array(items) = &merged.get("list").unwrap().kind else {
            panic!("expected array");
        };
        assert_eq!(&*items[0].source, base.as_path());
        assert_eq!(&*items[1].source, leaf.as_path());
        assert_eq!(&*merged.source, leaf.as_path());
    }

    #[test]
    fn test_merge_is_deterministic() {
        let fx = Fixture::new();
        fx.write("base.json", json!({ "list": [1], "opts": { "a": 1 } }));
        let leaf = fx.write(
            "app.json",
            json!({ "extends": "base.json", "list": [2], "opts": { "b": 2 } }),
        );

        let first = fx.merge(&leaf, &Policies::new()).unwrap();
        let second = fx.merge(&leaf, &Policies::new()).unwrap();
        assert_eq!(first, second);
    }
}
