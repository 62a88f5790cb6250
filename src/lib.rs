//! Declarative tool launcher.
//!
//! A catalog (`config/tools.json`) describes independently maintained tools.
//! The launcher turns each entry into a command, resolves the tool's source
//! file from a local override, the channel cache, or the remote source
//! repository, makes sure declared system dependencies are installed, and
//! runs the tool as a child process with a fixed `TOOLBELT_*` environment.

pub mod cli;
pub mod commands;
pub mod deps;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod logging;
pub mod manifest;
pub mod resolver;
pub mod runtime;
pub mod runtimes;
mod schema_loader;
pub mod settings;

pub use commands::{FlagValue, InvocableCommand, Invocation};
pub use deps::{DependencyResolver, DependencyStatus, Host, PackageManager, SystemHost};
pub use error::{
    ConfigError, DependencyError, Error, ExecutionError, ResolutionError, Result, ValidationError,
};
pub use executor::{ChildExit, Dispatcher, ProcessRunner, SystemRunner};
pub use fetch::{Fetch, FetchError, HttpFetcher};
pub use manifest::{DependencyCatalog, Tool, ToolCatalog};
pub use resolver::{ResolvedSource, SourceResolver, SourceTier};
pub use runtimes::{CommandSpec, ToolType};
pub use settings::{ReleaseChannel, Settings};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name used under the platform data dir when nothing else matches.
const INSTALL_DIR_NAME: &str = "toolbelt";

/// Locate the install root without consulting `TOOLBELT_ROOT`.
///
/// Order: walk upward from the running executable looking for
/// `config/tools.json`, then the build-time `TOOLBELT_ROOT_HINT`, then the
/// per-user data directory. The last candidate is returned even if it does
/// not exist yet; loading the catalog reports the problem with a real path.
pub fn find_install_root() -> PathBuf {
    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            if let Some(root) = search_upwards(exe_dir) {
                return root;
            }
        }
    }

    if let Some(hint) = option_env!("TOOLBELT_ROOT_HINT") {
        if let Some(root) = root_from_hint(hint) {
            return root;
        }
    }

    dirs::data_local_dir()
        .map(|dir| dir.join(INSTALL_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(INSTALL_DIR_NAME))
}

fn is_install_root(candidate: &Path) -> bool {
    candidate.join(settings::DEFAULT_TOOLS_MANIFEST).is_file()
}

fn root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !is_install_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_install_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}
