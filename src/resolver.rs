//! Three-tier source resolution for catalog tools.
//!
//! Responsibilities:
//! - prefer `<cwd>/tools/<file>` so tool authors can iterate without the cache
//! - serve `<install-root>/tools/<channel>/<file>` while it is fresh
//! - otherwise download `<source-url>/<channel>/tools/<file>` into the cache
//!   through a temp file + rename so concurrent readers never see a partial
//!   write
//!
//! Pinned channels never go stale once cached. The rolling channel goes stale
//! after the configured update interval unless auto-update is disabled.

use crate::error::ResolutionError;
use crate::fetch::{Fetch, FetchError};
use crate::manifest::Tool;
use crate::runtime::make_executable;
use crate::settings::{ReleaseChannel, Settings};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Directory under the working directory that shadows the cache.
pub const LOCAL_TOOLS_DIR: &str = "tools";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceTier {
    LocalOverride,
    Cache,
    Remote,
}

impl SourceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTier::LocalOverride => "local",
            SourceTier::Cache => "cache",
            SourceTier::Remote => "remote",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSource {
    pub path: PathBuf,
    pub tier: SourceTier,
}

pub struct SourceResolver<'a, F> {
    settings: &'a Settings,
    work_dir: PathBuf,
    fetcher: F,
}

impl<'a, F: Fetch> SourceResolver<'a, F> {
    pub fn new(settings: &'a Settings, work_dir: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            settings,
            work_dir: work_dir.into(),
            fetcher,
        }
    }

    pub fn local_override_path(&self, tool: &Tool) -> PathBuf {
        self.work_dir.join(LOCAL_TOOLS_DIR).join(&tool.file)
    }

    pub fn cache_path(&self, tool: &Tool) -> PathBuf {
        self.settings.tools_dir().join(&tool.file)
    }

    pub fn source_url(&self, tool: &Tool) -> String {
        let file = tool.file.trim_start_matches("./").replace('\\', "/");
        format!(
            "{}/{}/{}/{}",
            self.settings.source_url,
            self.settings.channel.as_str(),
            LOCAL_TOOLS_DIR,
            file
        )
    }

    /// Return a local path for `tool`, fetching it if no tier has it.
    pub fn resolve(&self, tool: &Tool) -> Result<ResolvedSource, ResolutionError> {
        let local = self.local_override_path(tool);
        if local.is_file() {
            debug!(tool = %tool.id, path = %local.display(), "using local override");
            return Ok(ResolvedSource {
                path: local,
                tier: SourceTier::LocalOverride,
            });
        }

        let cached = self.cache_path(tool);
        if cached.is_file() {
            let age = file_age(&cached);
            if !is_stale(
                &self.settings.channel,
                age,
                self.settings.update_interval,
                self.settings.no_auto_update,
            ) {
                debug!(tool = %tool.id, path = %cached.display(), "using cached source");
                return Ok(ResolvedSource {
                    path: cached,
                    tier: SourceTier::Cache,
                });
            }
            info!(
                tool = %tool.id,
                age_secs = age.map(|a| a.as_secs()),
                "cached source is stale; refreshing"
            );
        }

        self.fetch_into_cache(tool)
    }

    /// Re-download `tool` into the cache regardless of freshness.
    pub fn refresh(&self, tool: &Tool) -> Result<ResolvedSource, ResolutionError> {
        self.fetch_into_cache(tool)
    }

    fn fetch_into_cache(&self, tool: &Tool) -> Result<ResolvedSource, ResolutionError> {
        let url = self.source_url(tool);
        let bytes = self.fetcher.fetch(&url).map_err(|err| match err {
            FetchError::NotFound => ResolutionError::NotFound {
                file: tool.file.clone(),
                url: url.clone(),
            },
            FetchError::Failed(message) => ResolutionError::Fetch {
                url: url.clone(),
                message,
            },
        })?;

        let dest = self.cache_path(tool);
        let executable = tool.tool_type.is_script() || runs_directly(tool, &dest);
        write_atomically(&dest, &bytes, executable)?;
        info!(tool = %tool.id, url = %url, path = %dest.display(), "cached remote source");
        Ok(ResolvedSource {
            path: dest,
            tier: SourceTier::Remote,
        })
    }
}

/// Freshness policy for a cached file of the given age.
///
/// `None` age (unreadable mtime) counts as stale on the rolling channel.
pub fn is_stale(
    channel: &ReleaseChannel,
    age: Option<Duration>,
    update_interval: Duration,
    no_auto_update: bool,
) -> bool {
    if channel.is_pinned() || no_auto_update {
        return false;
    }
    match age {
        Some(age) => age > update_interval,
        None => true,
    }
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    // A timestamp in the future counts as brand new.
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

/// Prebuilt artifacts are executed as the program itself and need exec bits.
fn runs_directly(tool: &Tool, path: &Path) -> bool {
    tool.tool_type.command_spec(path, &[]).program == path.as_os_str()
}

fn write_atomically(dest: &Path, bytes: &[u8], executable: bool) -> Result<(), ResolutionError> {
    let cache_err = |source| ResolutionError::Cache {
        path: dest.to_path_buf(),
        source,
    };
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(cache_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(cache_err)?;
    tmp.write_all(bytes).map_err(cache_err)?;
    tmp.as_file().sync_all().map_err(cache_err)?;
    if executable {
        make_executable(tmp.path()).map_err(cache_err)?;
    } else {
        make_readable(tmp.path()).map_err(cache_err)?;
    }
    tmp.persist(dest).map_err(|err| cache_err(err.error))?;
    Ok(())
}

fn make_readable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
