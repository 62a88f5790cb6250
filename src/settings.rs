//! Immutable launcher settings.
//!
//! Settings are resolved once per process from built-in defaults, an optional
//! JSON config file, `TOOLBELT_*` environment overrides, and finally the CLI
//! `--debug` flag. The result is passed by reference into every component so
//! resolution and dependency logic never read ambient state on their own.
//!
//! Environment access goes through a lookup closure; [`Settings::load`] wires
//! it to the real process environment while tests pass a map.

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the rolling release channel. Every other channel is pinned.
pub const ROLLING_CHANNEL: &str = "main";
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/toolbelt-dev/toolbelt";
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Config file consulted under the install root when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config/toolbelt.json";
pub const DEFAULT_TOOLS_MANIFEST: &str = "config/tools.json";
pub const DEFAULT_DEPENDENCIES_MANIFEST: &str = "config/dependencies.json";

pub const ENV_ROOT: &str = "TOOLBELT_ROOT";
pub const ENV_CHANNEL: &str = "TOOLBELT_CHANNEL";
pub const ENV_SOURCE_URL: &str = "TOOLBELT_SOURCE_URL";
pub const ENV_UPDATE_INTERVAL: &str = "TOOLBELT_UPDATE_INTERVAL";
pub const ENV_NO_AUTO_UPDATE: &str = "TOOLBELT_NO_AUTO_UPDATE";
pub const ENV_DEBUG: &str = "TOOLBELT_DEBUG";

/// The tool-source version stream in use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseChannel {
    /// Tracks the moving head of the source repository.
    Rolling,
    /// An immutable tag; cached files never go stale.
    Pinned(String),
}

impl ReleaseChannel {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(invalid(ENV_CHANNEL, "channel must not be empty"));
        }
        // The channel becomes a cache directory name and a URL segment.
        if value == "." || value == ".." {
            return Err(invalid(ENV_CHANNEL, "channel must not be a relative path"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(invalid(
                ENV_CHANNEL,
                &format!("channel must match ^[A-Za-z0-9_.-]+$, got {value}"),
            ));
        }
        if value == ROLLING_CHANNEL {
            Ok(ReleaseChannel::Rolling)
        } else {
            Ok(ReleaseChannel::Pinned(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReleaseChannel::Rolling => ROLLING_CHANNEL,
            ReleaseChannel::Pinned(tag) => tag,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, ReleaseChannel::Pinned(_))
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub install_root: PathBuf,
    pub channel: ReleaseChannel,
    /// Base URL of the source repository; the channel and `tools/<file>` are appended.
    pub source_url: String,
    /// Maximum age of a rolling-channel cache entry before it is re-fetched.
    pub update_interval: Duration,
    /// Treat every cached file as fresh.
    pub no_auto_update: bool,
    pub debug: bool,
    pub tools_manifest: PathBuf,
    pub dependencies_manifest: PathBuf,
}

/// On-disk shape of `toolbelt.json`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    #[serde(default)]
    install_root: Option<PathBuf>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    update_interval_secs: Option<u64>,
    #[serde(default)]
    no_auto_update: Option<bool>,
    #[serde(default)]
    debug: Option<bool>,
    #[serde(default)]
    tools_manifest: Option<PathBuf>,
    #[serde(default)]
    dependencies_manifest: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings against the real process environment.
    pub fn load(config_path: Option<&Path>, debug_flag: bool) -> Result<Self, ConfigError> {
        let env_lookup = |key: &str| std::env::var(key).ok();
        let install_root = match env_lookup(ENV_ROOT).filter(|v| !v.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => crate::find_install_root(),
        };
        let mut settings = Self::from_sources(install_root, config_path, env_lookup)?;
        settings.debug |= debug_flag;
        Ok(settings)
    }

    /// Layer defaults, the config file, and environment overrides.
    ///
    /// `config_path` is required to exist when given; the default config file
    /// under `install_root` is optional.
    pub fn from_sources<F>(
        install_root: PathBuf,
        config_path: Option<&Path>,
        env_lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match config_path {
            Some(path) => read_file_settings(path)?,
            None => {
                let default_path = install_root.join(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    read_file_settings(&default_path)?
                } else {
                    FileSettings::default()
                }
            }
        };

        let install_root = file.install_root.unwrap_or(install_root);

        let channel = match env_lookup(ENV_CHANNEL).filter(|v| !v.is_empty()) {
            Some(value) => ReleaseChannel::parse(&value)?,
            None => match file.channel.as_deref() {
                Some(value) => ReleaseChannel::parse(value)?,
                None => ReleaseChannel::Rolling,
            },
        };

        let source_url = env_lookup(ENV_SOURCE_URL)
            .filter(|v| !v.is_empty())
            .or(file.source_url)
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());
        let source_url = source_url.trim_end_matches('/').to_string();
        if source_url.is_empty() {
            return Err(invalid(ENV_SOURCE_URL, "source url must not be empty"));
        }

        let update_interval = match env_lookup(ENV_UPDATE_INTERVAL).filter(|v| !v.is_empty()) {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                invalid(
                    ENV_UPDATE_INTERVAL,
                    &format!("expected seconds, got '{raw}'"),
                )
            })?),
            None => file
                .update_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_UPDATE_INTERVAL),
        };

        let no_auto_update = match env_lookup(ENV_NO_AUTO_UPDATE) {
            Some(raw) => parse_bool(ENV_NO_AUTO_UPDATE, &raw)?,
            None => file.no_auto_update.unwrap_or(false),
        };

        let debug = match env_lookup(ENV_DEBUG) {
            Some(raw) => parse_bool(ENV_DEBUG, &raw)?,
            None => file.debug.unwrap_or(false),
        };

        let tools_manifest = rooted(
            &install_root,
            file.tools_manifest
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOLS_MANIFEST)),
        );
        let dependencies_manifest = rooted(
            &install_root,
            file.dependencies_manifest
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPENDENCIES_MANIFEST)),
        );

        Ok(Self {
            install_root,
            channel,
            source_url,
            update_interval,
            no_auto_update,
            debug,
            tools_manifest,
            dependencies_manifest,
        })
    }

    /// `<install-root>/tools`, the parent of every channel cache.
    pub fn tools_root(&self) -> PathBuf {
        self.install_root.join("tools")
    }

    /// Cache directory for the active channel.
    pub fn tools_dir(&self) -> PathBuf {
        self.tools_root().join(self.channel.as_str())
    }

    /// Directory holding the helper libraries tools may source.
    pub fn lib_dir(&self) -> PathBuf {
        self.install_root.join("lib")
    }
}

fn read_file_settings(path: &Path) -> Result<FileSettings, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn rooted(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(key, &format!("expected a boolean, got '{other}'"))),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        message: message.to_string(),
    }
}
