//! Launcher front-end.
//!
//! Startup happens in two passes. A manual pre-scan picks out the global
//! flags (`--debug`, `--config`, `--version`, `--version-info`) so settings,
//! logging, and the catalog can be loaded before the command tree exists.
//! The full `clap` tree (built-ins plus one node per catalog tool) is then
//! assembled and the matched command dispatched.

use crate::commands::{self, InvocableCommand, Invocation, escaped_len, strip_reserved};
use crate::deps::{DependencyResolver, SystemHost};
use crate::error::{Error, ExecutionError, ResolutionError};
use crate::executor::{Dispatcher, SystemRunner};
use crate::fetch::HttpFetcher;
use crate::logging;
use crate::manifest::{DependencyCatalog, Tool, ToolCatalog};
use crate::resolver::SourceResolver;
use crate::settings::Settings;
use anyhow::{Context, Result, anyhow, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TARGET: &str = env!("TOOLBELT_BUILD_TARGET");

/// Global flags recognised before the catalog is loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub version: bool,
    pub version_info: bool,
}

impl GlobalArgs {
    /// Scan arguments (without the program name).
    ///
    /// `--debug` and `--config` count anywhere before a literal `--`; the
    /// version flags only count ahead of the first command word so that
    /// `toolbelt run tool --version` still reaches the tool.
    pub fn scan(args: &[OsString]) -> Result<Self> {
        let mut globals = Self::default();
        let mut seen_command = false;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let Some(text) = arg.to_str() else {
                seen_command = true;
                continue;
            };
            match text {
                "--" => break,
                "--debug" => globals.debug = true,
                "--config" => {
                    let Some(value) = iter.next() else {
                        bail!("--config requires a value");
                    };
                    globals.config = Some(PathBuf::from(value));
                }
                "--version" if !seen_command => globals.version = true,
                "--version-info" if !seen_command => globals.version_info = true,
                other => {
                    if let Some(value) = other.strip_prefix("--config=") {
                        globals.config = Some(PathBuf::from(value));
                    } else if !other.starts_with('-') {
                        seen_command = true;
                    }
                }
            }
        }
        Ok(globals)
    }
}

/// Run the launcher and return the process exit code.
pub fn run<I>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = OsString>,
{
    let argv: Vec<OsString> = args.into_iter().collect();
    let globals = GlobalArgs::scan(argv.get(1..).unwrap_or_default())?;

    if globals.version {
        println!("toolbelt {VERSION}");
        return Ok(0);
    }

    let settings =
        Settings::load(globals.config.as_deref(), globals.debug).context("loading settings")?;
    logging::init(settings.debug);
    debug!(
        root = %settings.install_root.display(),
        channel = %settings.channel,
        "settings resolved"
    );

    if globals.version_info {
        print_version_info(&settings);
        return Ok(0);
    }

    let catalog = ToolCatalog::load(&settings.tools_manifest)?;
    debug!(tools = catalog.len(), version = catalog.version(), "catalog loaded");
    let generated = commands::build(&catalog);

    let matches = match root_command(&generated).try_get_matches_from(&argv) {
        Ok(matches) => matches,
        Err(err) => {
            err.print().context("writing usage")?;
            return Ok(if err.use_stderr() { 1 } else { 0 });
        }
    };

    let Some((name, sub_matches)) = matches.subcommand() else {
        bail!("no command given; see 'toolbelt --help'");
    };
    let escaped = escaped_len(&argv);
    let app = App {
        settings: &settings,
        catalog: &catalog,
    };
    match name {
        "list" => app.list(sub_matches),
        "deps" => app.deps(sub_matches),
        "update" => app.update(sub_matches),
        "run" => {
            let tool_id = required_str(sub_matches, "tool-id")?;
            let tool = app.tool(tool_id)?;
            let args = strip_reserved(&os_values(sub_matches, "args"), escaped);
            app.dispatch(&Invocation::raw(tool.id.clone(), args))
        }
        tool_id => {
            let tool = app.tool(tool_id)?;
            let invocation =
                Invocation::from_matches(tool, sub_matches, escaped).map_err(Error::from)?;
            app.dispatch(&invocation)
        }
    }
}

/// Root command: built-ins first, then the generated tool nodes.
pub fn root_command(generated: &[InvocableCommand]) -> Command {
    Command::new("toolbelt")
        .about("Run catalog tools from local, cached, or remote sources")
        .disable_version_flag(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .long("debug")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging and set TOOLBELT_DEBUG=1 for the tool"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Settings file to use instead of <root>/config/toolbelt.json"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print the launcher version"),
        )
        .arg(
            Arg::new("version-info")
                .long("version-info")
                .action(ArgAction::SetTrue)
                .help("Print version, build, and settings details"),
        )
        .subcommand(
            Command::new("list")
                .about("List catalog tools by category")
                .arg(
                    Arg::new("category")
                        .long("category")
                        .value_name("CATEGORY")
                        .help("Only show tools in this category"),
                )
                .arg(
                    Arg::new("verbose")
                        .long("verbose")
                        .short('v')
                        .action(ArgAction::SetTrue)
                        .help("Show file, runtime, version, dependencies, and commands"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Run a tool by id, forwarding arguments verbatim")
                .arg(Arg::new("tool-id").required(true).value_name("TOOL"))
                .arg(
                    Arg::new("args")
                        .value_name("ARGS")
                        .num_args(0..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true)
                        .value_parser(value_parser!(OsString)),
                ),
        )
        .subcommand(
            Command::new("deps")
                .about("Report whether declared dependencies are installed")
                .arg(Arg::new("tool-id").value_name("TOOL")),
        )
        .subcommand(
            Command::new("update")
                .about("Re-fetch tool sources into the cache")
                .arg(Arg::new("tool-id").value_name("TOOL")),
        )
        .subcommands(generated.iter().map(|node| node.command.clone()))
}

struct App<'a> {
    settings: &'a Settings,
    catalog: &'a ToolCatalog,
}

impl<'a> App<'a> {
    fn tool(&self, id: &str) -> Result<&'a Tool> {
        self.catalog
            .tool(id)
            .ok_or_else(|| Error::from(ResolutionError::UnknownTool(id.to_string())).into())
    }

    fn dispatch(&self, invocation: &Invocation) -> Result<i32> {
        let work_dir = env::current_dir().context("reading current directory")?;
        let fetcher = HttpFetcher::new().map_err(|err| anyhow!("{err}"))?;
        let dependencies = DependencyCatalog::load_optional(&self.settings.dependencies_manifest)?;
        let dispatcher = Dispatcher::new(
            self.settings,
            self.catalog,
            SourceResolver::new(self.settings, &work_dir, fetcher),
            DependencyResolver::new(&dependencies, SystemHost),
            SystemRunner,
            &work_dir,
        );
        match dispatcher.dispatch(invocation) {
            Ok(()) => Ok(0),
            Err(Error::Execution(ExecutionError::Exit { tool, code })) => {
                debug!(tool = %tool, code, "tool exited non-zero");
                Ok(code)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self, matches: &ArgMatches) -> Result<i32> {
        let verbose = matches.get_flag("verbose");
        let filter = matches.get_one::<String>("category");

        let categories: Vec<&str> = match filter {
            Some(wanted) => self
                .catalog
                .categories()
                .into_iter()
                .filter(|category| category.eq_ignore_ascii_case(wanted))
                .collect(),
            None => self.catalog.categories(),
        };
        if categories.is_empty() {
            match filter {
                Some(wanted) => eprintln!("no tools in category '{wanted}'"),
                None => eprintln!("catalog is empty"),
            }
            return Ok(1);
        }

        for (idx, category) in categories.iter().enumerate() {
            if idx > 0 {
                println!();
            }
            println!("{category}:");
            for tool in self.catalog.in_category(category) {
                print_tool(tool, verbose);
            }
        }
        Ok(0)
    }

    fn deps(&self, matches: &ArgMatches) -> Result<i32> {
        let names: Vec<String> = match matches.get_one::<String>("tool-id") {
            Some(id) => self.tool(id)?.dependencies.clone(),
            None => {
                let mut all: Vec<String> = Vec::new();
                for tool in self.catalog.tools() {
                    for name in &tool.dependencies {
                        if !all.contains(name) {
                            all.push(name.clone());
                        }
                    }
                }
                all
            }
        };
        if names.is_empty() {
            println!("no dependencies declared");
            return Ok(0);
        }

        let dependencies = DependencyCatalog::load_optional(&self.settings.dependencies_manifest)?;
        let statuses = DependencyResolver::new(&dependencies, SystemHost)
            .status(&names)
            .map_err(Error::from)?;
        let width = statuses.iter().map(|s| s.name.len()).max().unwrap_or(0);
        let mut missing = 0;
        for status in &statuses {
            match &status.location {
                Some(path) => println!("  ok       {:<width$}  {}", status.name, path.display()),
                None => {
                    missing += 1;
                    println!("  missing  {:<width$}  {}", status.name, status.description);
                }
            }
        }
        Ok(if missing == 0 { 0 } else { 1 })
    }

    fn update(&self, matches: &ArgMatches) -> Result<i32> {
        let tools: Vec<&Tool> = match matches.get_one::<String>("tool-id") {
            Some(id) => vec![self.tool(id)?],
            None => self.catalog.tools().iter().collect(),
        };
        let work_dir = env::current_dir().context("reading current directory")?;
        let fetcher = HttpFetcher::new().map_err(|err| anyhow!("{err}"))?;
        let sources = SourceResolver::new(self.settings, &work_dir, fetcher);

        let mut errors: Vec<String> = Vec::new();
        for tool in tools {
            match sources.refresh(tool) {
                Ok(resolved) => {
                    println!("updated {} -> {}", tool.id, resolved.path.display());
                    let local = sources.local_override_path(tool);
                    if local.is_file() {
                        eprintln!(
                            "note: {} is shadowed by local override {}",
                            tool.id,
                            local.display()
                        );
                    }
                }
                Err(err) => {
                    eprintln!("toolbelt: update {} failed: {err}", tool.id);
                    errors.push(tool.id.clone());
                }
            }
        }
        if errors.is_empty() {
            Ok(0)
        } else {
            bail!("{} tool(s) failed to update: {}", errors.len(), errors.join(", "))
        }
    }
}

fn print_tool(tool: &Tool, verbose: bool) {
    let summary = if tool.description.is_empty() {
        &tool.name
    } else {
        &tool.description
    };
    println!("  {:<20} {summary}", tool.id);
    if !verbose {
        return;
    }
    println!("      name:    {}", tool.name);
    println!("      file:    {}", tool.file);
    println!("      type:    {}", tool.tool_type);
    println!("      version: {}", tool.version);
    if !tool.dependencies.is_empty() {
        println!("      depends: {}", tool.dependencies.join(", "));
    }
    for cmd in &tool.commands {
        let usage = cmd.usage();
        if usage.is_empty() {
            println!("      - {}", cmd.name);
        } else {
            println!("      - {} {usage}", cmd.name);
        }
    }
}

fn print_version_info(settings: &Settings) {
    println!("toolbelt {VERSION}");
    println!("target:         {BUILD_TARGET}");
    println!("install root:   {}", settings.install_root.display());
    println!("channel:        {}", settings.channel);
    println!("source url:     {}", settings.source_url);
    println!("tools dir:      {}", settings.tools_dir().display());
    println!("tools manifest: {}", settings.tools_manifest.display());
    match ToolCatalog::load(&settings.tools_manifest) {
        Ok(catalog) => println!(
            "catalog:        version {} ({} tools)",
            catalog.version(),
            catalog.len()
        ),
        Err(err) => println!("catalog:        unavailable ({err})"),
    }
}

fn required_str<'m>(matches: &'m ArgMatches, id: &str) -> Result<&'m str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing required argument <{id}>"))
}

fn os_values(matches: &ArgMatches, id: &str) -> Vec<OsString> {
    matches
        .get_many::<OsString>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}
