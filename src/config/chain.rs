//! Walking a file's `extends` chain.

use std::path::{Path, PathBuf};

use super::file::{read_document, RawDocument};
use super::resolve::normalize;
use super::ConfigError;

/// Every document one load inherits from, most-base first.
///
/// A chain always holds at least the requested file.
#[derive(Debug, Clone)]
pub(crate) struct ExtendsChain {
    base: RawDocument,
    derived: Vec<RawDocument>,
}

impl ExtendsChain {
    pub fn single(document: RawDocument) -> Self {
        Self {
            base: document,
            derived: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        1 + self.derived.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawDocument> {
        std::iter::once(&self.base).chain(self.derived.iter())
    }

    /// The file the chain was resolved from.
    pub fn leaf(&self) -> &RawDocument {
        self.derived.last().unwrap_or(&self.base)
    }

    pub fn into_parts(self) -> (RawDocument, Vec<RawDocument>) {
        (self.base, self.derived)
    }
}

/// Follows `extends` references starting at `root`.
///
/// Each reference is resolved against the folder of the file declaring it.
/// Files are identified by canonical path, so a chain that comes back to a
/// file through a different spelling or a symlink is still a cycle.
pub(crate) fn resolve_chain(root: &Path) -> Result<ExtendsChain, ConfigError> {
    let mut current = canonical(root).ok_or_else(|| ConfigError::NotFound {
        path: root.to_path_buf(),
        rig_path: None,
    })??;

    let mut visited: Vec<PathBuf> = Vec::new();
    let mut documents: Vec<RawDocument> = Vec::new();

    loop {
        let document = read_document(&current)?.ok_or_else(|| match visited.last() {
            Some(referencing) => ConfigError::UnresolvedExtends {
                referencing: referencing.clone(),
                target: current.clone(),
            },
            None => ConfigError::NotFound {
                path: current.clone(),
                rig_path: None,
            },
        })?;

        let target = document.extends.as_deref().map(|extends| {
            let folder = current.parent().unwrap_or(Path::new("/"));
            normalize(&folder.join(extends))
        });
        visited.push(current);
        documents.push(document);

        let Some(target) = target else {
            break;
        };

        let referencing = visited.last().cloned().unwrap_or_default();
        let next = canonical(&target).transpose()?;
        let Some(next) = next.filter(|next| next.is_file()) else {
            return Err(ConfigError::UnresolvedExtends {
                referencing,
                target,
            });
        };

        if visited.contains(&next) {
            let mut cycle = visited;
            cycle.push(next);
            return Err(ConfigError::CircularExtends { cycle });
        }

        tracing::debug!(
            from = %referencing.display(),
            to = %next.display(),
            "following extends"
        );
        current = next;
    }

    documents.reverse();
    let mut documents = documents.into_iter();
    let base = documents.next().ok_or_else(|| ConfigError::NotFound {
        path: root.to_path_buf(),
        rig_path: None,
    })?;

    Ok(ExtendsChain {
        base,
        derived: documents.collect(),
    })
}

/// Canonical path of an existing file, `None` when it does not exist.
fn canonical(path: &Path) -> Option<Result<PathBuf, ConfigError>> {
    match std::fs::canonicalize(path) {
        Ok(path) => Some(Ok(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => Some(Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        (dir, root)
    }

    fn write(root: &Path, name: &str, contents: serde_json::Value) -> PathBuf {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents.to_string()).unwrap();
        path
    }

    fn paths(chain: &ExtendsChain) -> Vec<PathBuf> {
        chain.iter().map(|doc| doc.path.to_path_buf()).collect()
    }

    #[test]
    fn test_single_file_chain() {
        let (_dir, root) = project();
        let leaf = write(&root, "app.json", json!({ "a": 1 }));

        let chain = resolve_chain(&leaf).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(paths(&chain), vec![leaf.clone()]);
        assert_eq!(&*chain.leaf().path, leaf.as_path());
    }

    #[test]
    fn test_three_level_chain_is_base_first() {
        let (_dir, root) = project();
        let base = write(&root, "shared/base.json", json!({ "a": 1 }));
        let mid = write(&root, "shared/mid.json", json!({ "extends": "./base.json" }));
        let leaf = write(&root, "config/app.json", json!({ "extends": "../shared/mid.json" }));

        let chain = resolve_chain(&leaf).unwrap();
        assert_eq!(paths(&chain), vec![base, mid, leaf]);
    }

    #[test]
    fn test_self_reference_is_circular() {
        let (_dir, root) = project();
        let file = write(&root, "app.json", json!({ "extends": "./app.json" }));

        match resolve_chain(&file) {
            Err(ConfigError::CircularExtends { cycle }) => {
                assert_eq!(cycle, vec![file.clone(), file]);
            }
            other => panic!("expected CircularExtends, got {other:?}"),
        }
    }

    #[test]
    fn test_mutual_reference_names_full_path() {
        let (_dir, root) = project();
        let first = write(&root, "one.json", json!({ "extends": "two.json" }));
        let second = write(&root, "two.json", json!({ "extends": "./one.json" }));

        match resolve_chain(&first) {
            Err(ConfigError::CircularExtends { cycle }) => {
                assert_eq!(cycle, vec![first.clone(), second, first]);
            }
            other => panic!("expected CircularExtends, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_ancestor() {
        let (_dir, root) = project();
        let leaf = write(&root, "app.json", json!({ "extends": "./missing.json" }));

        match resolve_chain(&leaf) {
            Err(ConfigError::UnresolvedExtends {
                referencing,
                target,
            }) => {
                assert_eq!(referencing, leaf);
                assert_eq!(target, root.join("missing.json"));
            }
            other => panic!("expected UnresolvedExtends, got {other:?}"),
        }
    }

    #[test]
    fn test_extends_pointing_at_folder_is_unresolved() {
        let (_dir, root) = project();
        fs::create_dir_all(root.join("config/sub")).unwrap();
        let leaf = write(&root, "config/app.json", json!({ "extends": "./sub" }));

        match resolve_chain(&leaf) {
            Err(ConfigError::UnresolvedExtends {
                referencing,
                target,
            }) => {
                assert_eq!(referencing, leaf);
                assert_eq!(target, root.join("config/sub"));
            }
            other => panic!("expected UnresolvedExtends, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let (_dir, root) = project();
        let result = resolve_chain(&root.join("absent.json"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_malformed_ancestor_names_that_file() {
        let (_dir, root) = project();
        let base = root.join("base.json");
        fs::write(&base, "{ not json").unwrap();
        let leaf = write(&root, "app.json", json!({ "extends": "base.json" }));

        match resolve_chain(&leaf) {
            Err(ConfigError::MalformedDocument { path, .. }) => assert_eq!(path, base),
            other => panic!("expected MalformedDocument, got {other:?}"),
        }
    }
}
