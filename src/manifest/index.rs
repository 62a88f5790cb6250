//! Indexed view of the tool catalog.
//!
//! The index is strict about duplicates (tool ids, command names within a
//! tool, flag names within a command) and about file paths that could escape
//! the tools directory, so a malformed catalog is rejected as a whole instead
//! of half-loading.

use super::model::Tool;
use super::{RESERVED_FLAGS, document_version, read_json};
use crate::error::ConfigError;
use crate::schema_loader::{ManifestKind, validate_manifest};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

#[derive(Deserialize)]
struct ToolsDocument {
    #[serde(default)]
    tools: Vec<Tool>,
}

/// Ordered tool list plus a derived index keyed by tool id.
#[derive(Clone, Debug)]
pub struct ToolCatalog {
    version: String,
    tools: Vec<Tool>,
    by_id: BTreeMap<String, usize>,
}

impl ToolCatalog {
    /// Load and validate the catalog from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let value = read_json(path)?;
        Self::from_value(path, value)
    }

    /// Validate an already-parsed document. `path` is only used in messages.
    pub fn from_value(path: &Path, value: Value) -> Result<Self, ConfigError> {
        validate_manifest(path, ManifestKind::Tools, &value)?;
        let version = document_version(&value);
        let document: ToolsDocument =
            serde_json::from_value(value).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let by_id = build_index(&document.tools)?;
        Ok(Self {
            version,
            tools: document.tools,
            by_id,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Resolve a tool by id.
    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.by_id.get(id).map(|&idx| &self.tools[idx])
    }

    /// Tools in catalog order.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Distinct categories in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.tools
            .iter()
            .map(|tool| tool.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }

    /// Tools whose category matches `category` (case-insensitive).
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Tool> + 'a {
        self.tools
            .iter()
            .filter(move |tool| tool.category.eq_ignore_ascii_case(category))
    }
}

fn build_index(tools: &[Tool]) -> Result<BTreeMap<String, usize>, ConfigError> {
    let mut map = BTreeMap::new();
    for (idx, tool) in tools.iter().enumerate() {
        if map.insert(tool.id.clone(), idx).is_some() {
            return Err(ConfigError::DuplicateToolId(tool.id.clone()));
        }
        validate_tool_file(tool)?;
        validate_commands(tool)?;
    }
    Ok(map)
}

fn validate_tool_file(tool: &Tool) -> Result<(), ConfigError> {
    let path = Path::new(&tool.file);
    let escapes = path.components().any(|component| {
        !matches!(component, Component::Normal(_) | Component::CurDir)
    });
    if escapes {
        return Err(ConfigError::InvalidToolFile {
            tool: tool.id.clone(),
            file: tool.file.clone(),
        });
    }
    Ok(())
}

fn validate_commands(tool: &Tool) -> Result<(), ConfigError> {
    let mut names = BTreeSet::new();
    for command in &tool.commands {
        if !names.insert(command.name.as_str()) {
            return Err(ConfigError::DuplicateCommand {
                tool: tool.id.clone(),
                command: command.name.clone(),
            });
        }
        let mut flags = BTreeSet::new();
        let mut shorts = BTreeSet::new();
        for flag in &command.flags {
            let reserved_short = flag.short.is_some_and(|c| c == 'h');
            if RESERVED_FLAGS.contains(&flag.name.as_str()) || reserved_short {
                return Err(ConfigError::ReservedFlag {
                    tool: tool.id.clone(),
                    command: command.name.clone(),
                    flag: flag.name.clone(),
                });
            }
            let short_clash = flag.short.is_some_and(|c| !shorts.insert(c));
            if !flags.insert(flag.name.as_str()) || short_clash {
                return Err(ConfigError::DuplicateFlag {
                    tool: tool.id.clone(),
                    command: command.name.clone(),
                    flag: flag.name.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(value: Value) -> Result<ToolCatalog, ConfigError> {
        ToolCatalog::from_value(Path::new("tools.json"), value)
    }

    fn tool(id: &str) -> Value {
        json!({"id": id, "name": id, "file": format!("{id}.sh"), "type": "bash"})
    }

    #[test]
    fn indexes_tools_by_id_in_order() {
        let catalog = load(json!({"version": "2", "tools": [tool("b"), tool("a")]})).unwrap();
        assert_eq!(catalog.version(), "2");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.tools()[0].id, "b");
        assert!(catalog.tool("a").is_some());
        assert!(catalog.tool("c").is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = load(json!({"tools": [tool("a"), tool("a")]})).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateToolId(id) if id == "a"));
    }

    #[test]
    fn duplicate_command_names_are_rejected() {
        let mut entry = tool("a");
        entry["commands"] = json!([{"name": "x"}, {"name": "x"}]);
        let err = load(json!({"tools": [entry]})).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCommand { .. }));
    }

    #[test]
    fn reserved_flag_names_are_rejected() {
        let mut entry = tool("a");
        entry["commands"] = json!([{"name": "x", "flags": [{"name": "debug", "type": "bool"}]}]);
        let err = load(json!({"tools": [entry]})).unwrap_err();
        assert!(matches!(err, ConfigError::ReservedFlag { .. }));
    }

    #[test]
    fn escaping_file_paths_are_rejected() {
        for file in ["../evil.sh", "/etc/passwd"] {
            let mut entry = tool("a");
            entry["file"] = json!(file);
            let err = load(json!({"tools": [entry]})).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidToolFile { .. }), "{file}");
        }
    }

    #[test]
    fn nested_relative_file_is_allowed() {
        let mut entry = tool("a");
        entry["file"] = json!("net/scan.sh");
        load(json!({"tools": [entry]})).unwrap();
    }

    #[test]
    fn categories_are_distinct_in_first_seen_order() {
        let mut a = tool("a");
        a["category"] = json!("net");
        let b = tool("b");
        let mut c = tool("c");
        c["category"] = json!("net");
        let catalog = load(json!({"tools": [a, b, c]})).unwrap();
        assert_eq!(catalog.categories(), vec!["net", "other"]);
        assert_eq!(catalog.in_category("NET").count(), 2);
    }
}
