//! Path resolution for string fields of a merged document.
//!
//! Runs after merging so that every value is resolved against the file
//! that introduced it, not against the file that was loaded.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::module::resolve_module;
use super::node::{Node, NodeKind};
use super::pattern::FieldPattern;
use super::ConfigError;

/// Everything a [`CustomResolver`] knows about the value it resolves.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub raw: &'a str,
    /// Absolute path of the file that declared the value.
    pub declaring_file: &'a Path,
    pub project_root: &'a Path,
}

pub trait CustomResolver: Send + Sync {
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<PathBuf, ConfigError>;
}

impl<F> CustomResolver for F
where
    F: Fn(&ResolveContext<'_>) -> Result<PathBuf, ConfigError> + Send + Sync,
{
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<PathBuf, ConfigError> {
        self(context)
    }
}

/// How a matched string field is turned into an absolute path.
#[derive(Clone)]
pub enum PathResolution {
    /// Joined onto the folder of the file that declared the value.
    RelativeToConfigFile,
    /// Joined onto the project root.
    RelativeToProjectRoot,
    /// Looked up as a module specifier from the project root, then
    /// canonicalized.
    ModuleResolve,
    Custom(Arc<dyn CustomResolver>),
}

impl PathResolution {
    pub fn custom(resolver: impl CustomResolver + 'static) -> Self {
        Self::Custom(Arc::new(resolver))
    }
}

impl fmt::Debug for PathResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelativeToConfigFile => f.write_str("RelativeToConfigFile"),
            Self::RelativeToProjectRoot => f.write_str("RelativeToProjectRoot"),
            Self::ModuleResolve => f.write_str("ModuleResolve"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Rewrites every string matched by `rules` in place, keeping the raw
/// string as the node's original value.
pub(crate) fn resolve_paths(
    root: &mut Node,
    rules: &[(FieldPattern, PathResolution)],
    project_root: &Path,
) -> Result<(), ConfigError> {
    for (pattern, resolution) in rules {
        pattern.for_each_match(root, &mut |node| {
            resolve_node(node, pattern, resolution, project_root)
        })?;
    }
    Ok(())
}

fn resolve_node(
    node: &mut Node,
    pattern: &FieldPattern,
    resolution: &PathResolution,
    project_root: &Path,
) -> Result<(), ConfigError> {
    let NodeKind::Scalar(Value::String(raw)) = &node.kind else {
        return Ok(());
    };

    let context = ResolveContext {
        raw,
        declaring_file: &node.source,
        project_root,
    };
    let resolved = resolve_one(&context, resolution)?;
    tracing::trace!(
        pattern = %pattern,
        raw = %raw,
        resolved = %resolved.display(),
        "resolved path field"
    );

    let resolved = Value::String(resolved.to_string_lossy().into_owned());
    let raw = std::mem::replace(&mut node.kind, NodeKind::Scalar(resolved));
    if node.original.is_none() {
        if let NodeKind::Scalar(raw) = raw {
            node.original = Some(raw);
        }
    }
    Ok(())
}

fn resolve_one(
    context: &ResolveContext<'_>,
    resolution: &PathResolution,
) -> Result<PathBuf, ConfigError> {
    match resolution {
        PathResolution::RelativeToConfigFile => {
            let folder = context.declaring_file.parent().unwrap_or(Path::new("/"));
            Ok(normalize(&folder.join(context.raw)))
        }
        PathResolution::RelativeToProjectRoot => {
            Ok(normalize(&context.project_root.join(context.raw)))
        }
        PathResolution::ModuleResolve => resolve_module(context.raw, context.project_root)
            .ok_or_else(|| ConfigError::ModuleNotFound {
                specifier: context.raw.to_string(),
                search_root: context.project_root.to_path_buf(),
                declared_in: context.declaring_file.to_path_buf(),
            }),
        PathResolution::Custom(resolver) => resolver.resolve(context),
    }
}

/// Collapses `.` and `..` components without touching the file system.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_) | Component::ParentDir)
                );
                if !at_root {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
