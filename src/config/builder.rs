use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use super::chain::{resolve_chain, ExtendsChain};
use super::merge::{merge_chain, InheritancePolicy};
use super::pattern::FieldPattern;
use super::provenance::ResolvedConfig;
use super::resolve::{normalize, resolve_paths, PathResolution};
use super::rig::RigProfile;
use super::schema::{JsonSchemaValidator, SchemaValidator};
use super::ConfigError;

#[derive(Debug)]
enum SchemaSource {
    Document(Value),
    File(PathBuf),
    Validator(Arc<dyn SchemaValidator>),
}

/// Builder for a [`ConfigSpec`].
///
/// Patterns are compiled and the schema is loaded when
/// [`build`](Self::build) is called, so a bad pattern or schema surfaces
/// once rather than on every load.
#[derive(Debug)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigSpecBuilder {
    path: PathBuf,
    schema: Option<SchemaSource>,
    path_rules: Vec<(String, PathResolution)>,
    policies: HashMap<String, InheritancePolicy>,
    validate_each_file: bool,
}

impl ConfigSpecBuilder {
    /// Validates loaded documents against a JSON Schema document.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(SchemaSource::Document(schema));
        self
    }

    /// Validates loaded documents against a JSON Schema file.
    pub fn with_schema_file(mut self, path: impl AsRef<Path>) -> Self {
        self.schema = Some(SchemaSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Validates loaded documents with a caller-supplied validator.
    pub fn with_validator(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.schema = Some(SchemaSource::Validator(Arc::new(validator)));
        self
    }

    /// Resolves every string matched by `pattern` to an absolute path.
    ///
    /// Rules run in registration order. A value matched by several rules
    /// keeps the raw string it was written with as its original value.
    pub fn resolve_path(mut self, pattern: impl Into<String>, resolution: PathResolution) -> Self {
        self.path_rules.push((pattern.into(), resolution));
        self
    }

    /// Sets how the top-level `field` inherits from ancestor files.
    pub fn inherit(mut self, field: impl Into<String>, policy: InheritancePolicy) -> Self {
        self.policies.insert(field.into(), policy);
        self
    }

    /// Also validates each file of an extends chain on its own.
    ///
    /// The merged document is always validated. Off by default.
    pub fn validate_each_file(mut self, enabled: bool) -> Self {
        self.validate_each_file = enabled;
        self
    }

    pub fn build(self) -> Result<ConfigSpec, ConfigError> {
        let validator: Arc<dyn SchemaValidator> = match self.schema {
            Some(SchemaSource::Document(schema)) => Arc::new(JsonSchemaValidator::new(&schema)?),
            Some(SchemaSource::File(path)) => Arc::new(JsonSchemaValidator::from_file(&path)?),
            Some(SchemaSource::Validator(validator)) => validator,
            None => {
                return Err(ConfigError::InvalidSchema {
                    reason: format!("no schema configured for {}", self.path.display()),
                })
            }
        };

        let path_rules = self
            .path_rules
            .into_iter()
            .map(|(pattern, resolution)| Ok((FieldPattern::parse(&pattern)?, resolution)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(ConfigSpec {
            project_relative_path: self.path,
            validator,
            path_rules,
            policies: self.policies,
            validate_each_file: self.validate_each_file,
        })
    }
}

/// Describes one kind of config file and how to load it.
///
/// Loading locates the file (falling back to a rig profile), follows its
/// `extends` chain, merges the chain field by field, validates the merged
/// document against the schema, and finally resolves path fields.
///
/// ## Example
///
/// ```no_run
/// use cfgweave::{ConfigSpec, InheritancePolicy, PathResolution, RigConfig, RigProfile};
///
/// let spec = ConfigSpec::builder("config/build.json")
///     .with_schema_file("schemas/build.schema.json")
///     .resolve_path("$.outputFolder", PathResolution::RelativeToProjectRoot)
///     .resolve_path("$.plugins[*].entry", PathResolution::ModuleResolve)
///     .inherit("plugins", InheritancePolicy::Append)
///     .build()?;
///
/// let project = "/repo/apps/web";
/// let rig = RigConfig::load_for_project(project)?;
/// if let Some(config) = spec.try_load(project, rig.as_ref().map(|r| r as &dyn RigProfile))? {
///     println!("{}", config.document());
/// }
/// # Ok::<(), cfgweave::ConfigError>(())
/// ```
pub struct ConfigSpec {
    project_relative_path: PathBuf,
    validator: Arc<dyn SchemaValidator>,
    path_rules: Vec<(FieldPattern, PathResolution)>,
    policies: HashMap<String, InheritancePolicy>,
    validate_each_file: bool,
}

impl ConfigSpec {
    /// Starts describing the config file found at `project_relative_path`.
    pub fn builder(project_relative_path: impl AsRef<Path>) -> ConfigSpecBuilder {
        ConfigSpecBuilder {
            path: project_relative_path.as_ref().to_path_buf(),
            schema: None,
            path_rules: Vec::new(),
            policies: HashMap::new(),
            validate_each_file: false,
        }
    }

    pub fn project_relative_path(&self) -> &Path {
        &self.project_relative_path
    }

    /// Loads the config file of the project in `project_folder`.
    ///
    /// When the project has no such file and `rig` is given, the file is
    /// looked up in the rig's profile folder instead.
    pub fn load(
        &self,
        project_folder: impl AsRef<Path>,
        rig: Option<&dyn RigProfile>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let project_root = absolute(project_folder.as_ref())?;
        let file = self.locate(&project_root, rig)?;
        self.load_resolved(&file, &project_root)
    }

    /// Like [`load`](Self::load), but returns `Ok(None)` when the file exists
    /// neither in the project nor in the rig. Every other failure is still
    /// an error.
    pub fn try_load(
        &self,
        project_folder: impl AsRef<Path>,
        rig: Option<&dyn RigProfile>,
    ) -> Result<Option<ResolvedConfig>, ConfigError> {
        not_found_as_none(self.load(project_folder, rig))
    }

    /// Loads an explicit file, bypassing project lookup and rigs.
    ///
    /// `project_folder` is still the root for project-relative and module
    /// path resolution.
    pub fn load_file(
        &self,
        file: impl AsRef<Path>,
        project_folder: impl AsRef<Path>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let project_root = absolute(project_folder.as_ref())?;
        let file = absolute(file.as_ref())?;
        self.load_resolved(&file, &project_root)
    }

    /// Like [`load_file`](Self::load_file), but returns `Ok(None)` when the
    /// file does not exist.
    pub fn try_load_file(
        &self,
        file: impl AsRef<Path>,
        project_folder: impl AsRef<Path>,
    ) -> Result<Option<ResolvedConfig>, ConfigError> {
        not_found_as_none(self.load_file(file, project_folder))
    }

    fn locate(&self, project_root: &Path, rig: Option<&dyn RigProfile>) -> Result<PathBuf, ConfigError> {
        let local = project_root.join(&self.project_relative_path);
        if local.is_file() {
            return Ok(local);
        }

        let rig_path = rig
            .and_then(|rig| rig.profile_folder(project_root))
            .map(|folder| folder.join(&self.project_relative_path));
        if let Some(candidate) = &rig_path {
            tracing::debug!(
                project = %local.display(),
                rig = %candidate.display(),
                "config file missing from project, probing rig profile"
            );
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
        }

        Err(ConfigError::NotFound {
            path: local,
            rig_path,
        })
    }

    fn load_resolved(&self, file: &Path, project_root: &Path) -> Result<ResolvedConfig, ConfigError> {
        let chain = resolve_chain(file)?;
        let leaf = chain.leaf().path.to_path_buf();
        tracing::debug!(path = %leaf.display(), files = chain.len(), "resolved extends chain");

        if self.validate_each_file {
            self.validate_files(&chain)?;
        }

        let mut merged = merge_chain(chain, &self.policies)?;

        self.validator
            .validate(&merged.to_value())
            .map_err(|issues| ConfigError::SchemaViolation {
                path: leaf.clone(),
                issues,
            })?;

        resolve_paths(&mut merged, &self.path_rules, project_root)?;
        Ok(ResolvedConfig::new(merged, leaf))
    }

    fn validate_files(&self, chain: &ExtendsChain) -> Result<(), ConfigError> {
        for document in chain.iter() {
            // Merge a lone copy so inline directives are stripped the same way.
            let single = ExtendsChain::single(document.clone());
            let value = merge_chain(single, &self.policies)?.to_value();
            self.validator
                .validate(&value)
                .map_err(|issues| ConfigError::SchemaViolation {
                    path: document.path.to_path_buf(),
                    issues,
                })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConfigSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSpec")
            .field("project_relative_path", &self.project_relative_path)
            .field("validator", &self.validator)
            .field("path_rules", &self.path_rules)
            .field("policies", &self.policies)
            .field("validate_each_file", &self.validate_each_file)
            .finish()
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path)
        .map(|path| normalize(&path))
        .map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })
}

fn not_found_as_none(
    result: Result<ResolvedConfig, ConfigError>,
) -> Result<Option<ResolvedConfig>, ConfigError> {
    match result {
        Ok(config) => Ok(Some(config)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
