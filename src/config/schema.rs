//! Schema validation of loaded documents.
//!
//! Validation sits behind [`SchemaValidator`] so the engine never depends on
//! how a schema is evaluated. [`JsonSchemaValidator`] is the stock
//! implementation backed by the `jsonschema` crate.

use std::fmt;
use std::path::Path;

use serde_json::Value;

use super::ConfigError;

/// A single schema rule violated by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// JSON pointer to the offending location in the validated document.
    pub instance_path: String,
    /// JSON pointer to the violated rule inside the schema.
    pub schema_path: String,
    pub message: String,
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.instance_path.is_empty() {
            "/"
        } else {
            &self.instance_path
        };
        write!(
            f,
            "at {location}: {} (rule {})",
            self.message, self.schema_path
        )
    }
}

pub trait SchemaValidator: Send + Sync + fmt::Debug {
    /// Checks `document`, returning every violated rule on failure.
    fn validate(&self, document: &Value) -> Result<(), Vec<SchemaIssue>>;
}

/// JSON Schema validator compiled once from a schema document.
pub struct JsonSchemaValidator {
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    pub fn new(schema: &Value) -> Result<Self, ConfigError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidSchema {
                reason: e.to_string(),
            })?;
        Ok(Self { validator })
    }

    /// Reads and compiles a schema file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let schema: Value =
            serde_json::from_str(&contents).map_err(|e| ConfigError::MalformedDocument {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::new(&schema).map_err(|e| match e {
            ConfigError::InvalidSchema { reason } => ConfigError::InvalidSchema {
                reason: format!("{}: {reason}", path.display()),
            },
            other => other,
        })
    }
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Result<(), Vec<SchemaIssue>> {
        let issues: Vec<SchemaIssue> = self
            .validator
            .iter_errors(document)
            .map(|error| SchemaIssue {
                instance_path: error.instance_path.to_string(),
                schema_path: error.schema_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_document_passes() {
        let validator = JsonSchemaValidator::new(&json!({
            "type": "object",
            "properties": { "name": { "type": "string" } }
        }))
        .unwrap();

        assert!(validator.validate(&json!({ "name": "app" })).is_ok());
    }

    #[test]
    fn test_issue_points_at_field_and_rule() {
        let validator = JsonSchemaValidator::new(&json!({
            "type": "object",
            "properties": { "port": { "type": "integer" } }
        }))
        .unwrap();

        let issues = validator.validate(&json!({ "port": "eighty" })).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].instance_path, "/port");
        assert!(issues[0].schema_path.contains("type"));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let result = JsonSchemaValidator::new(&json!({ "type": 12 }));
        assert!(matches!(result, Err(ConfigError::InvalidSchema { .. })));
    }

    #[test]
    fn test_schema_file_is_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{ "type": "object", "required": ["name"] }"#).unwrap();

        let validator = JsonSchemaValidator::from_file(&path).unwrap();
        assert!(validator.validate(&json!({})).is_err());
    }

    #[test]
    fn test_invalid_schema_file_names_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{ "type": 12 }"#).unwrap();

        match JsonSchemaValidator::from_file(&path) {
            Err(ConfigError::InvalidSchema { reason }) => {
                assert!(reason.contains(&path.display().to_string()), "{reason}");
            }
            other => panic!("expected InvalidSchema, got {other:?}"),
        }
    }
}
