//! Catalog-driven command tree.
//!
//! Every catalog tool becomes a `clap` sub-command of the launcher:
//! - tools without `commands` take everything after their name verbatim
//!   (minus the launcher's reserved global flags) and hand it to the child
//! - tools with `commands` get one nested node per command, with a usage
//!   string derived from the declared arguments and typed flags
//!
//! Raw argument lists lose the reserved launcher flags up to the first
//! literal `--`; everything after it reaches the tool untouched.
//!
//! Positional arguments are collected into a single list and only counted
//! against the number of required arguments; they are never bound by name.
//! Only flags the user set on the command line reach the child; declared
//! defaults are shown in help but not forwarded.

use crate::error::ValidationError;
use crate::manifest::{Flag, FlagType, Tool, ToolCatalog, ToolCommand};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, value_parser};
use std::collections::BTreeMap;
use std::ffi::OsString;
use tracing::warn;

/// Built-in launcher commands; catalog tools may not shadow them.
pub const BUILTIN_COMMANDS: &[&str] = &["list", "run", "deps", "update", "help"];

/// Argument id holding the collected positionals of generated nodes. Catalog
/// flag names start with an alphanumeric, so they can never take this id.
pub const POSITIONALS_ID: &str = "@args";

/// Global launcher flags that are never forwarded to a raw tool.
const RESERVED_SWITCHES: &[&str] = &["--debug", "--version"];
const RESERVED_VALUED: &str = "--config";

/// Value of one explicitly set catalog flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// A generated sub-command plus the tool it dispatches to.
#[derive(Clone, Debug)]
pub struct InvocableCommand {
    pub tool_id: String,
    pub command: clap::Command,
}

/// Build one invocable node per catalog tool, in catalog order.
pub fn build(catalog: &ToolCatalog) -> Vec<InvocableCommand> {
    catalog
        .tools()
        .iter()
        .filter(|tool| {
            let clashes = BUILTIN_COMMANDS.contains(&tool.id.as_str());
            if clashes {
                warn!(
                    tool = %tool.id,
                    "tool id collides with a built-in command; use 'run {}' instead",
                    tool.id
                );
            }
            !clashes
        })
        .map(|tool| InvocableCommand {
            tool_id: tool.id.clone(),
            command: tool_node(tool),
        })
        .collect()
}

fn tool_node(tool: &Tool) -> clap::Command {
    let about = if tool.description.is_empty() {
        tool.name.clone()
    } else {
        tool.description.clone()
    };
    let node = clap::Command::new(tool.id.clone()).about(about);

    if tool.commands.is_empty() {
        return node.disable_help_flag(true).arg(raw_args());
    }

    // Catalog commands may be named `help`; `--help` still works.
    node.subcommand_required(true)
        .arg_required_else_help(true)
        .disable_help_subcommand(true)
        .subcommands(tool.commands.iter().map(|cmd| command_node(tool, cmd)))
}

fn raw_args() -> Arg {
    Arg::new(POSITIONALS_ID)
        .value_name("ARGS")
        .num_args(0..)
        .trailing_var_arg(true)
        .allow_hyphen_values(true)
        .value_parser(value_parser!(OsString))
}

fn command_node(tool: &Tool, cmd: &ToolCommand) -> clap::Command {
    let usage = cmd.usage();
    let mut node = clap::Command::new(cmd.name.clone())
        .about(cmd.description.clone())
        .override_usage(
            format!("toolbelt {} {} [OPTIONS] {usage}", tool.id, cmd.name)
                .trim_end()
                .to_string(),
        )
        .arg(
            Arg::new(POSITIONALS_ID)
                .value_name("ARGS")
                .num_args(0..)
                .value_parser(value_parser!(OsString))
                .hide(cmd.args.is_empty()),
        );

    if !cmd.args.is_empty() {
        let lines = cmd
            .args
            .iter()
            .map(|arg| {
                let label = if arg.required {
                    format!("<{}>", arg.name)
                } else {
                    format!("[{}]", arg.name)
                };
                format!("  {label:<20} {}", arg.description)
            })
            .collect::<Vec<_>>()
            .join("\n");
        node = node.after_help(format!("Arguments:\n{lines}"));
    }

    for flag in &cmd.flags {
        node = node.arg(flag_arg(flag));
    }
    node
}

fn flag_arg(flag: &Flag) -> Arg {
    let mut arg = Arg::new(flag.name.clone())
        .long(flag.name.clone())
        .help(flag.description.clone());
    if let Some(short) = flag.short {
        arg = arg.short(short);
    }
    match flag.flag_type {
        FlagType::Bool => {
            arg = arg.action(ArgAction::SetTrue);
        }
        FlagType::Int => {
            arg = arg.action(ArgAction::Set).value_parser(value_parser!(i64));
        }
        FlagType::String => {
            arg = arg.action(ArgAction::Set).value_parser(value_parser!(String));
        }
    }
    if flag.flag_type != FlagType::Bool {
        if let Some(default) = flag.default_display() {
            arg = arg.default_value(default);
        }
    }
    arg
}

/// A validated request to run one tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub tool_id: String,
    /// Matched catalog sub-command, if the tool declares any.
    pub command: Option<String>,
    pub args: Vec<OsString>,
    /// Only flags set explicitly on the command line.
    pub flags: BTreeMap<String, FlagValue>,
}

impl Invocation {
    /// Forward `args` unchanged, as `run <tool-id> [args...]` does.
    pub fn raw(tool_id: impl Into<String>, args: Vec<OsString>) -> Self {
        Self {
            tool_id: tool_id.into(),
            command: None,
            args,
            flags: BTreeMap::new(),
        }
    }

    /// Interpret the matches of a generated tool node.
    ///
    /// `escaped` is the number of command-line words after the first `--`
    /// (see [`escaped_len`]). Fails before anything is resolved or spawned
    /// when fewer positionals were given than the matched command requires.
    pub fn from_matches(
        tool: &Tool,
        matches: &ArgMatches,
        escaped: usize,
    ) -> Result<Self, ValidationError> {
        if tool.commands.is_empty() {
            return Ok(Self::raw(
                tool.id.clone(),
                strip_reserved(&positionals(matches), escaped),
            ));
        }

        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(ValidationError {
                tool: tool.id.clone(),
                command: String::new(),
                required: 1,
                supplied: 0,
                usage: format!("toolbelt {} <COMMAND>", tool.id),
            });
        };
        // clap only matches declared sub-commands, so the lookup cannot miss
        // unless the node was built from a different catalog.
        let Some(cmd) = tool.command(name) else {
            return Ok(Self::raw(tool.id.clone(), positionals(sub_matches)));
        };

        let args = positionals(sub_matches);
        let required = cmd.required_count();
        if args.len() < required {
            return Err(ValidationError {
                tool: tool.id.clone(),
                command: cmd.name.clone(),
                required,
                supplied: args.len(),
                usage: format!("toolbelt {} {} {}", tool.id, cmd.name, cmd.usage())
                    .trim_end()
                    .to_string(),
            });
        }

        Ok(Self {
            tool_id: tool.id.clone(),
            command: Some(cmd.name.clone()),
            args,
            flags: explicit_flags(cmd, sub_matches),
        })
    }

    /// Argument vector handed to the child process.
    ///
    /// Sub-command invocations lead with the command name, then positionals,
    /// then each explicitly set flag as `--name [value]` in name order.
    pub fn child_args(&self) -> Vec<OsString> {
        let Some(command) = &self.command else {
            return self.args.clone();
        };
        let mut out = Vec::with_capacity(1 + self.args.len() + self.flags.len() * 2);
        out.push(OsString::from(command));
        out.extend(self.args.iter().cloned());
        for (name, value) in &self.flags {
            match value {
                FlagValue::Bool(true) => out.push(OsString::from(format!("--{name}"))),
                FlagValue::Bool(false) => {}
                FlagValue::Int(n) => {
                    out.push(OsString::from(format!("--{name}")));
                    out.push(OsString::from(n.to_string()));
                }
                FlagValue::Str(s) => {
                    out.push(OsString::from(format!("--{name}")));
                    out.push(OsString::from(s));
                }
            }
        }
        out
    }
}

fn positionals(matches: &ArgMatches) -> Vec<OsString> {
    matches
        .get_many::<OsString>(POSITIONALS_ID)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn explicit_flags(cmd: &ToolCommand, matches: &ArgMatches) -> BTreeMap<String, FlagValue> {
    let mut out = BTreeMap::new();
    for flag in &cmd.flags {
        if matches.value_source(&flag.name) != Some(ValueSource::CommandLine) {
            continue;
        }
        let value = match flag.flag_type {
            FlagType::Bool => Some(FlagValue::Bool(matches.get_flag(&flag.name))),
            FlagType::Int => matches
                .get_one::<i64>(&flag.name)
                .map(|n| FlagValue::Int(*n)),
            FlagType::String => matches
                .get_one::<String>(&flag.name)
                .map(|s| FlagValue::Str(s.clone())),
        };
        if let Some(value) = value {
            out.insert(flag.name.clone(), value);
        }
    }
    out
}

/// Number of words following the first literal `--` in `args`.
pub fn escaped_len(args: &[OsString]) -> usize {
    args.iter()
        .position(|arg| arg == "--")
        .map_or(0, |idx| args.len() - idx - 1)
}

/// Drop the launcher's own global flags from a raw argument list.
///
/// The last `escaped` values followed a `--` on the command line and are
/// kept as given. clap swallows a `--` that comes before the first raw
/// value but keeps one that comes later, so a `--` still present among the
/// values ends the stripping as well.
pub fn strip_reserved(args: &[OsString], escaped: usize) -> Vec<OsString> {
    let (head, tail) = args.split_at(args.len().saturating_sub(escaped));
    let mut out = Vec::with_capacity(args.len());
    let mut iter = head.iter();
    while let Some(arg) = iter.next() {
        let text = arg.to_str().unwrap_or_default();
        if text == "--" {
            out.push(arg.clone());
            out.extend(iter.by_ref().cloned());
            break;
        }
        if RESERVED_SWITCHES.contains(&text) {
            continue;
        }
        if text == RESERVED_VALUED {
            iter.next();
            continue;
        }
        if text.starts_with(RESERVED_VALUED) && text[RESERVED_VALUED.len()..].starts_with('=') {
            continue;
        }
        out.push(arg.clone());
    }
    out.extend(tail.iter().cloned());
    out
}
