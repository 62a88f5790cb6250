//! Execution dispatcher.
//!
//! One invocation walks `Resolve → CheckDependencies → BuildInvocation →
//! Spawn → Wait`. Validation has already happened by the time an
//! [`Invocation`] exists, so nothing here can reject user input; every
//! failure is about the environment (missing source, missing dependency,
//! child failure).
//!
//! The child inherits stdio and the working directory, plus a fixed set of
//! `TOOLBELT_*` variables that override anything inherited.

use crate::commands::Invocation;
use crate::deps::{DependencyResolver, Host};
use crate::error::{Error, ExecutionError, ResolutionError};
use crate::fetch::Fetch;
use crate::manifest::{Tool, ToolCatalog};
use crate::resolver::SourceResolver;
use crate::runtimes::CommandSpec;
use crate::settings::{ENV_CHANNEL, ENV_DEBUG, ENV_ROOT, Settings};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

pub const ENV_TOOL_ID: &str = "TOOLBELT_TOOL_ID";
pub const ENV_TOOL_NAME: &str = "TOOLBELT_TOOL_NAME";
pub const ENV_TOOL_VERSION: &str = "TOOLBELT_TOOL_VERSION";
pub const ENV_TOOLS_DIR: &str = "TOOLBELT_TOOLS_DIR";
pub const ENV_LIB_DIR: &str = "TOOLBELT_LIB_DIR";
pub const ENV_TMPDIR: &str = "TOOLBELT_TMPDIR";
pub const ENV_ORIGINAL_PWD: &str = "TOOLBELT_ORIGINAL_PWD";
pub const ENV_COMMAND: &str = "TOOLBELT_COMMAND";

/// How a child process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildExit {
    Code(i32),
    Signal,
}

/// Spawns a child with inherited stdio and waits for it.
pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec, env: &[(&'static str, OsString)]) -> io::Result<ChildExit>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &CommandSpec, env: &[(&'static str, OsString)]) -> io::Result<ChildExit> {
        (**self).run(spec, env)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec, env: &[(&'static str, OsString)]) -> io::Result<ChildExit> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        for (key, value) in env {
            command.env(key, value);
        }
        let status = command.status()?;
        Ok(match status.code() {
            Some(code) => ChildExit::Code(code),
            None => ChildExit::Signal,
        })
    }
}

pub struct Dispatcher<'a, F, H, R> {
    settings: &'a Settings,
    catalog: &'a ToolCatalog,
    sources: SourceResolver<'a, F>,
    dependencies: DependencyResolver<'a, H>,
    runner: R,
    original_pwd: PathBuf,
}

impl<'a, F: Fetch, H: Host, R: ProcessRunner> Dispatcher<'a, F, H, R> {
    pub fn new(
        settings: &'a Settings,
        catalog: &'a ToolCatalog,
        sources: SourceResolver<'a, F>,
        dependencies: DependencyResolver<'a, H>,
        runner: R,
        original_pwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings,
            catalog,
            sources,
            dependencies,
            runner,
            original_pwd: original_pwd.into(),
        }
    }

    /// Run one validated invocation to completion.
    pub fn dispatch(&self, invocation: &Invocation) -> Result<(), Error> {
        let tool = self
            .catalog
            .tool(&invocation.tool_id)
            .ok_or_else(|| ResolutionError::UnknownTool(invocation.tool_id.clone()))?;

        let source = self.sources.resolve(tool)?;
        debug!(
            tool = %tool.id,
            tier = source.tier.as_str(),
            path = %source.path.display(),
            "resolved source"
        );

        self.dependencies.ensure(&tool.dependencies)?;
        debug!(tool = %tool.id, count = tool.dependencies.len(), "dependencies satisfied");

        let spec = tool
            .tool_type
            .command_spec(&source.path, &invocation.child_args());
        debug!(tool = %tool.id, command = %spec.display(), "built invocation");

        // Removed when this guard drops, after the child has exited.
        let scratch = tempfile::Builder::new()
            .prefix(&format!("toolbelt-{}-", tool.id))
            .tempdir()
            .map_err(|source| ExecutionError::TempDir {
                tool: tool.id.clone(),
                source,
            })?;
        let env = tool_environment(
            self.settings,
            tool,
            invocation.command.as_deref(),
            scratch.path(),
            &self.original_pwd,
        );

        debug!(tool = %tool.id, "spawning");
        let exit = self
            .runner
            .run(&spec, &env)
            .map_err(|source| ExecutionError::Spawn {
                program: spec.program.to_string_lossy().into_owned(),
                source,
            })?;
        debug!(tool = %tool.id, ?exit, "child finished");

        match exit {
            ChildExit::Code(0) => Ok(()),
            ChildExit::Code(code) => Err(ExecutionError::Exit {
                tool: tool.id.clone(),
                code,
            }
            .into()),
            ChildExit::Signal => Err(ExecutionError::Signal {
                tool: tool.id.clone(),
            }
            .into()),
        }
    }
}

/// Variables injected into every child, in a stable order.
pub fn tool_environment(
    settings: &Settings,
    tool: &Tool,
    command: Option<&str>,
    scratch: &Path,
    original_pwd: &Path,
) -> Vec<(&'static str, OsString)> {
    let mut env = vec![
        (ENV_TOOL_ID, OsString::from(&tool.id)),
        (ENV_TOOL_NAME, OsString::from(&tool.name)),
        (ENV_TOOL_VERSION, OsString::from(&tool.version)),
        (ENV_CHANNEL, OsString::from(settings.channel.as_str())),
        (
            ENV_DEBUG,
            OsString::from(if settings.debug { "1" } else { "0" }),
        ),
        (ENV_ROOT, settings.install_root.clone().into_os_string()),
        (ENV_TOOLS_DIR, settings.tools_dir().into_os_string()),
        (ENV_LIB_DIR, settings.lib_dir().into_os_string()),
        (ENV_TMPDIR, scratch.as_os_str().to_os_string()),
        (ENV_ORIGINAL_PWD, original_pwd.as_os_str().to_os_string()),
    ];
    if let Some(command) = command {
        env.push((ENV_COMMAND, OsString::from(command)));
    }
    env
}
