//! Runtime registry for tool types.
//!
//! Every runtime a catalog entry can declare maps to exactly one row in
//! `RUNTIME_SPECS`, which says how a resolved source file turns into a
//! concrete program + argument list. The dispatcher and the resolver both go
//! through this table; adding a runtime means adding one enum variant and one
//! row here.

use serde::Deserialize;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;

/// Declared execution strategy of a tool's source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    #[serde(alias = "shell", alias = "sh")]
    Bash,
    Python,
    Node,
    Go,
    Binary,
}

/// Broad class of a runtime, independent of the concrete interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeFamily {
    InterpretedShell,
    InterpretedScript,
    CompiledSource,
    PrebuiltBinary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Launcher {
    /// `<interpreter> <path> args...`
    Interpreter(&'static str),
    /// `<program> <subcommand> <path> args...` while the artifact is still
    /// source (identified by extension); run directly otherwise.
    ToolchainRun {
        program: &'static str,
        subcommand: &'static str,
        source_ext: &'static str,
    },
    /// `<path> args...`
    Direct,
}

struct RuntimeSpec {
    tool_type: ToolType,
    name: &'static str,
    family: RuntimeFamily,
    launcher: Launcher,
}

const RUNTIME_SPECS: &[RuntimeSpec] = &[
    RuntimeSpec {
        tool_type: ToolType::Bash,
        name: "bash",
        family: RuntimeFamily::InterpretedShell,
        launcher: Launcher::Interpreter("bash"),
    },
    RuntimeSpec {
        tool_type: ToolType::Python,
        name: "python",
        family: RuntimeFamily::InterpretedScript,
        launcher: Launcher::Interpreter("python3"),
    },
    RuntimeSpec {
        tool_type: ToolType::Node,
        name: "node",
        family: RuntimeFamily::InterpretedScript,
        launcher: Launcher::Interpreter("node"),
    },
    RuntimeSpec {
        tool_type: ToolType::Go,
        name: "go",
        family: RuntimeFamily::CompiledSource,
        launcher: Launcher::ToolchainRun {
            program: "go",
            subcommand: "run",
            source_ext: "go",
        },
    },
    RuntimeSpec {
        tool_type: ToolType::Binary,
        name: "binary",
        family: RuntimeFamily::PrebuiltBinary,
        launcher: Launcher::Direct,
    },
];

/// Program and arguments for one child process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ToolType {
    fn spec(self) -> &'static RuntimeSpec {
        RUNTIME_SPECS
            .iter()
            .find(|spec| spec.tool_type == self)
            .unwrap_or(&RUNTIME_SPECS[RUNTIME_SPECS.len() - 1])
    }

    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    pub fn family(self) -> RuntimeFamily {
        self.spec().family
    }

    /// Script runtimes get execute bits when fetched into the cache.
    pub fn is_script(self) -> bool {
        matches!(
            self.family(),
            RuntimeFamily::InterpretedShell | RuntimeFamily::InterpretedScript
        )
    }

    /// Build the concrete invocation for a resolved source path.
    pub fn command_spec(self, path: &Path, args: &[OsString]) -> CommandSpec {
        let path_arg = path.as_os_str().to_os_string();
        let (program, mut argv) = match self.spec().launcher {
            Launcher::Interpreter(interpreter) => (OsString::from(interpreter), vec![path_arg]),
            Launcher::ToolchainRun {
                program,
                subcommand,
                source_ext,
            } if has_extension(path, source_ext) => (
                OsString::from(program),
                vec![OsString::from(subcommand), path_arg],
            ),
            Launcher::ToolchainRun { .. } | Launcher::Direct => (path_arg, Vec::new()),
        };
        argv.extend(args.iter().cloned());
        CommandSpec {
            program,
            args: argv,
        }
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .is_some_and(|value| value.eq_ignore_ascii_case(ext))
}
