#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Nothing listens on the discard port, so remote fetches fail fast.
pub const UNREACHABLE_SOURCE: &str = "http://127.0.0.1:9/toolbelt";

const CLEARED_ENV: &[&str] = &[
    "TOOLBELT_ROOT",
    "TOOLBELT_CHANNEL",
    "TOOLBELT_SOURCE_URL",
    "TOOLBELT_UPDATE_INTERVAL",
    "TOOLBELT_NO_AUTO_UPDATE",
    "TOOLBELT_DEBUG",
    "RUST_LOG",
];

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// A throwaway install root plus a separate working directory.
pub struct Install {
    pub root: TempDir,
    pub work: TempDir,
}

impl Install {
    pub fn new(catalog: Value) -> Result<Self> {
        let install = Self {
            root: TempDir::new()?,
            work: TempDir::new()?,
        };
        install.write_config("tools.json", &catalog)?;
        Ok(install)
    }

    pub fn with_dependencies(self, dependencies: Value) -> Result<Self> {
        self.write_config("dependencies.json", &dependencies)?;
        Ok(self)
    }

    fn write_config(&self, name: &str, value: &Value) -> Result<()> {
        let dir = self.root.path().join("config");
        fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        fs::write(&path, serde_json::to_vec_pretty(value)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    /// Script in the working directory's `tools/`, shadowing every other tier.
    pub fn local_tool(&self, file: &str, contents: &str) -> Result<PathBuf> {
        write_script(&self.work.path().join("tools").join(file), contents)
    }

    /// Script already present in the channel cache, last modified `age` ago.
    pub fn cached_tool(
        &self,
        channel: &str,
        file: &str,
        contents: &str,
        age: Duration,
    ) -> Result<PathBuf> {
        let path = self.root.path().join("tools").join(channel).join(file);
        write_script(&path, contents)?;
        let file = fs::File::options().write(true).open(&path)?;
        file.set_modified(SystemTime::now() - age)?;
        Ok(path)
    }

    /// Launcher command isolated from the caller's environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_toolbelt"));
        for key in CLEARED_ENV {
            cmd.env_remove(key);
        }
        cmd.env("TOOLBELT_ROOT", self.root.path())
            .env("TOOLBELT_SOURCE_URL", UNREACHABLE_SOURCE)
            .current_dir(self.work.path())
            .stdin(Stdio::null());
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Result<Output> {
        self.command()
            .args(args)
            .output()
            .context("failed to execute toolbelt")
    }

    pub fn work_file(&self, name: &str) -> PathBuf {
        self.work.path().join(name)
    }

    pub fn read_work_file(&self, name: &str) -> Result<String> {
        let path = self.work_file(name);
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }
}

pub fn write_script(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    make_executable(path)?;
    Ok(path.to_path_buf())
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// `key=value` lines written by the recording scripts below.
pub fn record_value(record: &str, key: &str) -> Option<String> {
    record.lines().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

/// Writes its arguments and launcher environment to `record.txt` in the
/// directory the launcher was started from.
pub const RECORDING_SCRIPT: &str = r#"#!/usr/bin/env bash
out="$TOOLBELT_ORIGINAL_PWD/record.txt"
{
  printf 'args=%s\n' "$*"
  printf 'argc=%s\n' "$#"
  printf 'id=%s\n' "$TOOLBELT_TOOL_ID"
  printf 'name=%s\n' "$TOOLBELT_TOOL_NAME"
  printf 'version=%s\n' "$TOOLBELT_TOOL_VERSION"
  printf 'channel=%s\n' "$TOOLBELT_CHANNEL"
  printf 'debug=%s\n' "$TOOLBELT_DEBUG"
  printf 'root=%s\n' "$TOOLBELT_ROOT"
  printf 'tools_dir=%s\n' "$TOOLBELT_TOOLS_DIR"
  printf 'lib_dir=%s\n' "$TOOLBELT_LIB_DIR"
  printf 'tmpdir=%s\n' "$TOOLBELT_TMPDIR"
  printf 'command=%s\n' "${TOOLBELT_COMMAND:-}"
  if [ -d "$TOOLBELT_TMPDIR" ]; then echo 'tmpdir_exists=1'; fi
} > "$out"
exit "${TOOL_EXIT:-0}"
"#;
