//! Serde model of the catalog documents.

use crate::runtimes::ToolType;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::DEFAULT_CATEGORY;

#[derive(Clone, Debug, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Source path relative to the tools directory.
    pub file: String,
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_category", alias = "group")]
    pub category: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Empty means the tool is invoked directly with raw arguments.
    #[serde(default)]
    pub commands: Vec<ToolCommand>,
}

impl Tool {
    pub fn command(&self, name: &str) -> Option<&ToolCommand> {
        self.commands.iter().find(|cmd| cmd.name == name)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ToolCommand {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub flags: Vec<Flag>,
}

impl ToolCommand {
    pub fn required_count(&self) -> usize {
        self.args.iter().filter(|arg| arg.required).count()
    }

    /// `<required> [optional]` in declaration order.
    pub fn usage(&self) -> String {
        self.args
            .iter()
            .map(|arg| {
                if arg.required {
                    format!("<{}>", arg.name)
                } else {
                    format!("[{}]", arg.name)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Bool,
    Int,
    #[default]
    String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Flag {
    pub name: String,
    #[serde(default)]
    pub short: Option<char>,
    #[serde(default, rename = "type")]
    pub flag_type: FlagType,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl Flag {
    /// Declared default rendered for help output, if any.
    pub fn default_display(&self) -> Option<String> {
        match self.default.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Descriptor for one external system dependency.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub description: String,
    /// Executable probed on PATH; defaults to the dependency name.
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    /// Package-manager id → package name.
    #[serde(default)]
    pub packages: BTreeMap<String, String>,
    #[serde(default)]
    pub docs: Option<String>,
}

impl Dependency {
    pub fn check_command<'a>(&'a self, name: &'a str) -> &'a str {
        self.check.as_deref().unwrap_or(name)
    }

    /// Manager-specific override first, then the generic package name.
    pub fn package_for(&self, manager_id: &str) -> Option<&str> {
        self.packages
            .get(manager_id)
            .map(String::as_str)
            .or(self.package.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_version() -> String {
    "0.0.0".to_string()
}
