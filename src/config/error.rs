use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::schema::SchemaIssue;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {}{}", path.display(), rig_suffix(rig_path))]
    NotFound {
        path: PathBuf,
        rig_path: Option<PathBuf>,
    },

    #[error("failed to read config file '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", path.display())]
    MalformedDocument {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config file '{}': {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("config loaded from '{}' violates its schema: {}", path.display(), Issues(issues))]
    SchemaViolation {
        path: PathBuf,
        issues: Vec<SchemaIssue>,
    },

    #[error("circular extends chain: {}", Chain(cycle))]
    CircularExtends { cycle: Vec<PathBuf> },

    #[error(
        "config file '{}' extends '{}', which does not exist",
        referencing.display(),
        target.display()
    )]
    UnresolvedExtends {
        referencing: PathBuf,
        target: PathBuf,
    },

    #[error(
        "cannot resolve module '{specifier}' from '{}' (declared in '{}')",
        search_root.display(),
        declared_in.display()
    )]
    ModuleNotFound {
        specifier: String,
        search_root: PathBuf,
        declared_in: PathBuf,
    },

    #[error("cannot inherit field '{field}' in '{}': {reason}", path.display())]
    InvalidInheritance {
        path: PathBuf,
        field: String,
        reason: String,
    },

    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("invalid field pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] serde_json::Error),
}

impl ConfigError {
    /// Returns `true` when the root config file could not be located.
    ///
    /// Only this kind is swallowed by the `try_load` family; a missing
    /// `extends` target is [`ConfigError::UnresolvedExtends`] instead.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }
}

fn rig_suffix(rig_path: &Option<PathBuf>) -> String {
    match rig_path {
        Some(path) => format!(" (also checked rig profile at {})", path.display()),
        None => String::new(),
    }
}

struct Chain<'a>(&'a [PathBuf]);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

struct Issues<'a>(&'a [SchemaIssue]);

impl fmt::Display for Issues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}
