//! Configuration loading: extends chains, inheritance, path resolution and provenance.

mod builder;
mod chain;
mod error;
mod file;
mod merge;
mod module;
mod node;
mod pattern;
mod provenance;
mod resolve;
mod rig;
mod schema;

pub use builder::{ConfigSpec, ConfigSpecBuilder};
pub use error::ConfigError;
pub use merge::{CustomMerge, InheritancePolicy};
pub use pattern::FieldPattern;
pub use provenance::ResolvedConfig;
pub use resolve::{CustomResolver, PathResolution, ResolveContext};
pub use rig::{RigConfig, RigProfile};
pub use schema::{JsonSchemaValidator, SchemaIssue, SchemaValidator};
