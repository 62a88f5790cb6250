//! Dependency catalog: dependency name → descriptor.

use super::model::Dependency;
use super::{document_version, read_json};
use crate::error::ConfigError;
use crate::schema_loader::{ManifestKind, validate_manifest};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Deserialize)]
struct DependenciesDocument {
    #[serde(default)]
    dependencies: BTreeMap<String, Dependency>,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyCatalog {
    version: String,
    entries: BTreeMap<String, Dependency>,
}

impl DependencyCatalog {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let value = read_json(path)?;
        Self::from_value(path, value)
    }

    /// Like [`DependencyCatalog::load`], but a missing file yields an empty
    /// catalog. Tools without dependencies never need the document.
    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "dependency catalog absent");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_value(path: &Path, value: Value) -> Result<Self, ConfigError> {
        validate_manifest(path, ManifestKind::Dependencies, &value)?;
        let version = document_version(&value);
        let document: DependenciesDocument =
            serde_json::from_value(value).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            version,
            entries: document.dependencies,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.entries.get(name)
    }

    /// Dependency names in sorted order.
    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub fn insert(&mut self, name: impl Into<String>, dependency: Dependency) {
        self.entries.insert(name.into(), dependency);
    }
}
