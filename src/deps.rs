//! System dependency checks and installation.
//!
//! Tools declare dependency names; the dependency catalog says which
//! executable proves a dependency is present and which package provides it.
//! Missing dependencies are presented in one batch behind a single
//! confirmation, then installed one by one with the first package manager
//! found on the host. Every failure path prints manual installation
//! instructions before returning an error.
//!
//! Host interaction (PATH lookups, prompting, running installers) goes
//! through [`Host`] so the flow can be exercised without touching the
//! machine.

use crate::error::DependencyError;
use crate::manifest::{Dependency, DependencyCatalog};
use crate::runtime::{find_on_path, running_as_root};
use crate::runtimes::CommandSpec;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

/// Everything the resolver needs from the machine it runs on.
pub trait Host {
    fn find_executable(&self, name: &str) -> Option<PathBuf>;
    /// Ask a yes/no question; anything but an explicit yes is a no.
    fn confirm(&self, prompt: &str) -> bool;
    /// Run an installer to completion with inherited stdio; `Ok(true)` on success.
    fn run(&self, spec: &CommandSpec) -> io::Result<bool>;
    fn is_root(&self) -> bool;
    /// Show a message to the operator.
    fn notify(&self, message: &str);
}

/// The real machine: `PATH`, stdin/stderr, and `std::process`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        find_on_path(name)
    }

    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_yes(&answer),
        }
    }

    fn run(&self, spec: &CommandSpec) -> io::Result<bool> {
        Ok(Command::new(&spec.program)
            .args(&spec.args)
            .status()?
            .success())
    }

    fn is_root(&self) -> bool {
        running_as_root()
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageManager {
    Brew,
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
}

struct ManagerSpec {
    manager: PackageManager,
    /// Key used in a dependency's `packages` map.
    id: &'static str,
    /// Executable whose presence identifies the manager.
    probe: &'static str,
    install: &'static [&'static str],
    needs_root: bool,
}

// Detection order: only one manager is normally present, and a Homebrew
// install on Linux should win over the distribution manager.
const MANAGER_SPECS: &[ManagerSpec] = &[
    ManagerSpec {
        manager: PackageManager::Brew,
        id: "brew",
        probe: "brew",
        install: &["install"],
        needs_root: false,
    },
    ManagerSpec {
        manager: PackageManager::Apt,
        id: "apt",
        probe: "apt-get",
        install: &["install", "-y"],
        needs_root: true,
    },
    ManagerSpec {
        manager: PackageManager::Dnf,
        id: "dnf",
        probe: "dnf",
        install: &["install", "-y"],
        needs_root: true,
    },
    ManagerSpec {
        manager: PackageManager::Yum,
        id: "yum",
        probe: "yum",
        install: &["install", "-y"],
        needs_root: true,
    },
    ManagerSpec {
        manager: PackageManager::Pacman,
        id: "pacman",
        probe: "pacman",
        install: &["-S", "--noconfirm"],
        needs_root: true,
    },
    ManagerSpec {
        manager: PackageManager::Zypper,
        id: "zypper",
        probe: "zypper",
        install: &["install", "-y"],
        needs_root: true,
    },
    ManagerSpec {
        manager: PackageManager::Apk,
        id: "apk",
        probe: "apk",
        install: &["add"],
        needs_root: true,
    },
];

impl PackageManager {
    fn spec(self) -> &'static ManagerSpec {
        MANAGER_SPECS
            .iter()
            .find(|spec| spec.manager == self)
            .unwrap_or(&MANAGER_SPECS[0])
    }

    /// Key used for per-manager package overrides.
    pub fn id(self) -> &'static str {
        self.spec().id
    }

    pub fn executable(self) -> &'static str {
        self.spec().probe
    }

    /// First manager whose executable is present, in priority order.
    pub fn detect(host: &impl Host) -> Option<Self> {
        MANAGER_SPECS
            .iter()
            .find(|spec| host.find_executable(spec.probe).is_some())
            .map(|spec| spec.manager)
    }

    /// Install invocation, escalated with `sudo` when the manager needs root
    /// and the process does not already have it.
    pub fn install_command(self, package: &str, is_root: bool) -> CommandSpec {
        let spec = self.spec();
        let mut args: Vec<OsString> = spec.install.iter().map(OsString::from).collect();
        args.push(OsString::from(package));
        if spec.needs_root && !is_root {
            args.insert(0, OsString::from(spec.probe));
            CommandSpec {
                program: OsString::from("sudo"),
                args,
            }
        } else {
            CommandSpec {
                program: OsString::from(spec.probe),
                args,
            }
        }
    }
}

/// Presence of one declared dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyStatus {
    pub name: String,
    pub check: String,
    pub description: String,
    pub location: Option<PathBuf>,
}

impl DependencyStatus {
    pub fn is_present(&self) -> bool {
        self.location.is_some()
    }
}

pub struct DependencyResolver<'a, H> {
    catalog: &'a DependencyCatalog,
    host: H,
}

impl<'a, H: Host> DependencyResolver<'a, H> {
    pub fn new(catalog: &'a DependencyCatalog, host: H) -> Self {
        Self { catalog, host }
    }

    /// Check every named dependency without prompting or installing.
    pub fn status<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<DependencyStatus>, DependencyError> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for name in names {
            let name: &str = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            let Some(dependency) = self.catalog.get(name) else {
                self.manual_instructions(name, None, None);
                return Err(DependencyError::Unknown(name.to_string()));
            };
            let check = dependency.check_command(name);
            let location = self.host.find_executable(check);
            debug!(dependency = name, check, present = location.is_some(), "checked dependency");
            out.push(DependencyStatus {
                name: name.to_string(),
                check: check.to_string(),
                description: dependency.description.clone(),
                location,
            });
        }
        Ok(out)
    }

    /// Make sure every named dependency is present, installing after one
    /// confirmation if needed.
    pub fn ensure<S: AsRef<str>>(&self, names: &[S]) -> Result<(), DependencyError> {
        let missing: Vec<DependencyStatus> = self
            .status(names)?
            .into_iter()
            .filter(|status| !status.is_present())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let missing_names: Vec<String> = missing.iter().map(|s| s.name.clone()).collect();

        let mut summary = String::from("Missing dependencies:");
        for status in &missing {
            if status.description.is_empty() {
                summary.push_str(&format!("\n  - {}", status.name));
            } else {
                summary.push_str(&format!("\n  - {}: {}", status.name, status.description));
            }
        }
        self.host.notify(&summary);

        if !self.host.confirm("Install missing dependencies now?") {
            for status in &missing {
                self.manual_instructions(&status.name, None, None);
            }
            return Err(DependencyError::Declined(missing_names));
        }

        let Some(manager) = PackageManager::detect(&self.host) else {
            warn!("no supported package manager detected");
            for status in &missing {
                self.manual_instructions(&status.name, None, None);
            }
            return Err(DependencyError::NoPackageManager(missing_names));
        };
        info!(manager = manager.executable(), "installing missing dependencies");

        for status in &missing {
            self.install_one(manager, status)?;
        }
        Ok(())
    }

    fn install_one(
        &self,
        manager: PackageManager,
        status: &DependencyStatus,
    ) -> Result<(), DependencyError> {
        let name = status.name.as_str();
        let dependency = self.descriptor(name)?;
        let Some(package) = dependency.package_for(manager.id()) else {
            self.manual_instructions(name, Some(manager), None);
            return Err(DependencyError::NoPackage {
                name: name.to_string(),
                manager: manager.executable().to_string(),
            });
        };

        let command = manager.install_command(package, self.host.is_root());
        self.host
            .notify(&format!("Installing {name} ({package}): {}", command.display()));
        let succeeded = match self.host.run(&command) {
            Ok(success) => success,
            Err(err) => {
                warn!(dependency = name, error = %err, "installer failed to start");
                false
            }
        };

        if succeeded && self.host.find_executable(&status.check).is_some() {
            info!(dependency = name, package, "dependency installed");
            return Ok(());
        }

        self.manual_instructions(name, Some(manager), Some(package));
        Err(DependencyError::InstallFailed {
            name: name.to_string(),
            manager: manager.executable().to_string(),
        })
    }

    fn descriptor(&self, name: &str) -> Result<&'a Dependency, DependencyError> {
        self.catalog
            .get(name)
            .ok_or_else(|| DependencyError::Unknown(name.to_string()))
    }

    fn manual_instructions(
        &self,
        name: &str,
        manager: Option<PackageManager>,
        package: Option<&str>,
    ) {
        let dependency = self.catalog.get(name);
        let description = dependency
            .map(|d| d.description.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or("(no description)");
        let package = package
            .or_else(|| manager.and_then(|m| dependency.and_then(|d| d.package_for(m.id()))))
            .or_else(|| dependency.and_then(|d| d.package.as_deref()));
        let docs = dependency.and_then(|d| d.docs.as_deref());

        let mut message = format!("Install '{name}' manually:\n  description: {description}");
        message.push_str(&format!(
            "\n  package manager: {}",
            manager.map(|m| m.executable()).unwrap_or("(none detected)")
        ));
        message.push_str(&format!("\n  package: {}", package.unwrap_or("(unknown)")));
        if let Some(docs) = docs {
            message.push_str(&format!("\n  docs: {docs}"));
        }
        self.host.notify(&message);
    }
}
