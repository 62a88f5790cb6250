//! Error taxonomy shared by every launcher component.
//!
//! Each component owns one error type so callers can tell a broken catalog
//! apart from a failed download or a child that exited non-zero. The binary
//! collapses all of them into exit code `1`, except for
//! [`ExecutionError::Exit`] where the child's own status is propagated.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure surfaced by the launcher.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl Error {
    /// Exit code the entry point should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Execution(ExecutionError::Exit { code, .. }) if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Malformed settings or catalog documents. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} failed schema validation:\n{details}")]
    Schema { path: PathBuf, details: String },
    #[error("duplicate tool id '{0}'")]
    DuplicateToolId(String),
    #[error("tool '{tool}' declares command '{command}' more than once")]
    DuplicateCommand { tool: String, command: String },
    #[error("command '{tool} {command}' declares flag '{flag}' more than once")]
    DuplicateFlag {
        tool: String,
        command: String,
        flag: String,
    },
    #[error("command '{tool} {command}' uses reserved flag name '{flag}'")]
    ReservedFlag {
        tool: String,
        command: String,
        flag: String,
    },
    #[error("tool '{tool}' file '{file}' must be a relative path inside the tools directory")]
    InvalidToolFile { tool: String, file: String },
    #[error("invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },
}

/// A tool source could not be produced from any tier.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("tool file '{file}' not found locally, in the cache, or at {url}")]
    NotFound { file: String, url: String },
    #[error("fetching {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("writing cache entry {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

/// The user supplied fewer positional arguments than a command requires.
#[derive(Debug, Error)]
#[error(
    "'{tool} {command}' requires at least {required} argument(s), got {supplied}\n\nUsage: {usage}"
)]
pub struct ValidationError {
    pub tool: String,
    pub command: String,
    pub required: usize,
    pub supplied: usize,
    pub usage: String,
}

/// Declared system dependencies are missing and could not be installed.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("dependency '{0}' is not described in the dependency catalog")]
    Unknown(String),
    #[error("installation declined; missing: {}", .0.join(", "))]
    Declined(Vec<String>),
    #[error("no supported package manager found; install {} manually", .0.join(", "))]
    NoPackageManager(Vec<String>),
    #[error("no package name for '{name}' with {manager}")]
    NoPackage { name: String, manager: String },
    #[error("installing '{name}' with {manager} failed")]
    InstallFailed { name: String, manager: String },
}

/// The child process could not be started or did not succeed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool '{tool}' exited with status {code}")]
    Exit { tool: String, code: i32 },
    #[error("tool '{tool}' terminated by signal")]
    Signal { tool: String },
    #[error("creating temporary directory for '{tool}': {source}")]
    TempDir {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}
