//! Embedded JSON Schemas for the two manifest documents.
//!
//! Both catalogs are validated structurally before serde sees them so a typo
//! in a field produces a pointer-qualified message instead of a generic
//! deserialization error. Schemas are parsed once and kept for the life of the
//! process.

use crate::error::ConfigError;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

const TOOLS_SCHEMA: &str = include_str!("../schema/tools.schema.json");
const DEPENDENCIES_SCHEMA: &str = include_str!("../schema/dependencies.schema.json");

/// Which manifest a document claims to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ManifestKind {
    Tools,
    Dependencies,
}

impl ManifestKind {
    fn schema(self) -> &'static Value {
        static TOOLS: OnceLock<Value> = OnceLock::new();
        static DEPENDENCIES: OnceLock<Value> = OnceLock::new();
        let (cell, raw) = match self {
            ManifestKind::Tools => (&TOOLS, TOOLS_SCHEMA),
            ManifestKind::Dependencies => (&DEPENDENCIES, DEPENDENCIES_SCHEMA),
        };
        // The embedded schemas are compile-time constants covered by tests.
        cell.get_or_init(|| serde_json::from_str(raw).unwrap_or(Value::Bool(true)))
    }
}

/// Validate `document` against the embedded schema for `kind`.
pub(crate) fn validate_manifest(
    path: &Path,
    kind: ManifestKind,
    document: &Value,
) -> Result<(), ConfigError> {
    let compiled = JSONSchema::compile(kind.schema()).map_err(|err| ConfigError::Schema {
        path: path.to_path_buf(),
        details: format!("embedded schema failed to compile: {err}"),
    })?;
    if let Err(errors) = compiled.validate(document) {
        let details = errors
            .map(|err| {
                let pointer = err.instance_path.to_string();
                if pointer.is_empty() {
                    format!("  - {err}")
                } else {
                    format!("  - {pointer}: {err}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ConfigError::Schema {
            path: path.to_path_buf(),
            details,
        });
    }
    Ok(())
}
