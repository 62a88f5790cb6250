//! Tool and dependency manifests.
//!
//! Both documents are JSON files shipped under `<install-root>/config/`. The
//! loader validates structure and uniqueness only; whether a referenced
//! dependency is described, or a tool file exists anywhere, is decided at
//! resolution time so one broken entry never blocks the rest of the catalog.

pub mod dependencies;
pub mod index;
pub mod model;

pub use dependencies::DependencyCatalog;
pub use index::ToolCatalog;
pub use model::{Argument, Dependency, Flag, FlagType, Tool, ToolCommand};

use crate::error::ConfigError;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Flag names the launcher keeps for itself.
pub const RESERVED_FLAGS: &[&str] = &["debug", "config", "version", "help"];

/// Category assigned to tools that do not declare one.
pub const DEFAULT_CATEGORY: &str = "other";

pub(crate) fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the top-level `version` field, which may be a string or a number.
pub(crate) fn document_version(value: &Value) -> String {
    match value.get("version") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
