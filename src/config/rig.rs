//! Rig packages: shared fallback locations for config files.
//!
//! A project opts into a rig with `config/rig.json`:
//!
//! ```json
//! { "rigPackageName": "@acme/node-rig", "rigProfile": "library" }
//! ```
//!
//! The rig package is found in `node_modules` of the project or one of its
//! ancestors, and its profile folder is `<package>/profiles/<profile>`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::module::find_package;
use super::ConfigError;

/// Supplies the folder searched when a project lacks a config file.
pub trait RigProfile {
    fn profile_folder(&self, project_folder: &Path) -> Option<PathBuf>;
}

impl<F> RigProfile for F
where
    F: Fn(&Path) -> Option<PathBuf>,
{
    fn profile_folder(&self, project_folder: &Path) -> Option<PathBuf> {
        self(project_folder)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RigFile {
    rig_package_name: String,
    #[serde(default = "default_profile")]
    rig_profile: String,
}

fn default_profile() -> String {
    RigConfig::DEFAULT_PROFILE.to_string()
}

/// A project's `config/rig.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigConfig {
    package_name: String,
    profile: String,
}

impl RigConfig {
    pub const FILE: &'static str = "config/rig.json";
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// A rig without reading a rig file.
    pub fn new(package_name: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            profile: profile.into(),
        }
    }

    /// Reads the rig file of `project_folder`.
    ///
    /// Returns `Ok(None)` if the project has no rig file.
    pub fn load_for_project(project_folder: impl AsRef<Path>) -> Result<Option<Self>, ConfigError> {
        let path = project_folder.as_ref().join(Self::FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::ReadError { path, source: e }),
        };

        let file: RigFile =
            serde_json::from_str(&contents).map_err(|e| ConfigError::MalformedDocument {
                path: path.clone(),
                source: e,
            })?;

        let invalid = |reason: String| ConfigError::InvalidDocument {
            path: path.clone(),
            reason,
        };
        if !file.rig_package_name.ends_with("-rig") {
            return Err(invalid(format!(
                "rig package name \"{}\" must end in \"-rig\"",
                file.rig_package_name
            )));
        }
        if !is_profile_name(&file.rig_profile) {
            return Err(invalid(format!(
                "rig profile \"{}\" may only contain lowercase letters, digits, '-', '_' and '.'",
                file.rig_profile
            )));
        }

        tracing::debug!(
            path = %path.display(),
            package = %file.rig_package_name,
            profile = %file.rig_profile,
            "loaded rig config"
        );
        Ok(Some(Self::new(file.rig_package_name, file.rig_profile)))
    }

    /// The npm package name of the rig, e.g. `@acme/node-rig`.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Name of the profile folder under `profiles/`.
    pub fn profile(&self) -> &str {
        &self.profile
    }
}

impl RigProfile for RigConfig {
    fn profile_folder(&self, project_folder: &Path) -> Option<PathBuf> {
        let package = find_package(&self.package_name, project_folder)?;
        let folder = package.join("profiles").join(&self.profile);
        if folder.is_dir() {
            Some(folder)
        } else {
            tracing::debug!(folder = %folder.display(), "rig profile folder is missing");
            None
        }
    }
}

fn is_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}
