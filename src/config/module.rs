//! Module specifier lookup through `node_modules` folders.
//!
//! Bare specifiers (`pkg`, `pkg/lib/file`, `@scope/pkg`) are searched in
//! the `node_modules` folder of the starting directory and of each of its
//! ancestors. Relative and absolute specifiers resolve against the starting
//! directory directly. A candidate path resolves as a file first, then as a
//! package or folder with an index file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::resolve::normalize;

const EXTENSIONS: [&str; 3] = ["js", "json", "node"];
const NODE_MODULES: &str = "node_modules";

/// Resolves `specifier` starting at `root`, returning the real path of the
/// matched file with symlinks followed.
pub(crate) fn resolve_module(specifier: &str, root: &Path) -> Option<PathBuf> {
    if specifier.is_empty() {
        return None;
    }

    if is_path_like(specifier) {
        let candidate = normalize(&root.join(specifier));
        return resolve_candidate(&candidate);
    }

    root.ancestors()
        .filter(|dir| dir.file_name().map_or(true, |name| name != NODE_MODULES))
        .find_map(|dir| resolve_candidate(&dir.join(NODE_MODULES).join(specifier)))
}

/// Finds the folder of an installed package, searching upward from `root`.
pub(crate) fn find_package(name: &str, root: &Path) -> Option<PathBuf> {
    root.ancestors()
        .map(|dir| dir.join(NODE_MODULES).join(name))
        .find(|candidate| candidate.join("package.json").is_file())
        .and_then(|folder| std::fs::canonicalize(folder).ok())
}

fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

fn resolve_candidate(candidate: &Path) -> Option<PathBuf> {
    let hit = as_file(candidate).or_else(|| as_directory(candidate))?;
    tracing::trace!(candidate = %candidate.display(), hit = %hit.display(), "module candidate matched");
    std::fs::canonicalize(hit).ok()
}

fn as_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    EXTENSIONS.iter().find_map(|ext| {
        let mut with_ext = OsString::from(path.as_os_str());
        with_ext.push(".");
        with_ext.push(ext);
        let with_ext = PathBuf::from(with_ext);
        with_ext.is_file().then_some(with_ext)
    })
}

fn as_index(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .find(|index| index.is_file())
}

fn as_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    if let Some(main) = package_main(dir) {
        let main = normalize(&dir.join(main));
        if let Some(hit) = as_file(&main).or_else(|| as_index(&main)) {
            return Some(hit);
        }
    }
    as_index(dir)
}

fn package_main(dir: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&contents).ok()?;
    manifest
        .get("main")
        .and_then(|main| main.as_str())
        .filter(|main| !main.is_empty())
        .map(str::to_string)
}
