//! Load JSON config files that inherit from each other.
//!
//! A [`ConfigSpec`] names a project-relative config file, the schema it must
//! satisfy, which of its fields hold paths, and how each field inherits
//! along an `extends` chain. Loading returns a [`ResolvedConfig`]: the
//! merged document with every path field made absolute, plus a record of
//! which file declared each value and how it was originally written.

pub mod config;

pub use config::{
    ConfigError, ConfigSpec, ConfigSpecBuilder, CustomMerge, CustomResolver, FieldPattern,
    InheritancePolicy, JsonSchemaValidator, PathResolution, ResolveContext, ResolvedConfig,
    RigConfig, RigProfile, SchemaIssue, SchemaValidator,
};
