#![cfg(unix)]

// End-to-end behavior of the launcher binary against throwaway install roots.
mod support;

use anyhow::Result;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use support::{Install, RECORDING_SCRIPT, record_value, stderr, stdout};

fn catalog() -> Value {
    json!({
        "version": "2024.1",
        "tools": [
            {
                "id": "test-tool",
                "name": "Test Tool",
                "description": "Records how it was invoked",
                "file": "test.sh",
                "type": "bash",
                "version": "1.2.3",
                "category": "testing"
            },
            {
                "id": "net",
                "name": "Network",
                "description": "Network helpers",
                "file": "net.sh",
                "type": "bash",
                "group": "network",
                "commands": [
                    {
                        "name": "scan",
                        "description": "Scan a host",
                        "args": [
                            {"name": "host", "required": true},
                            {"name": "port"}
                        ],
                        "flags": [
                            {"name": "verbose", "short": "v", "type": "bool"},
                            {"name": "retries", "type": "int", "default": 3}
                        ]
                    }
                ]
            }
        ]
    })
}

fn install() -> Result<Install> {
    let install = Install::new(catalog())?;
    install.local_tool("test.sh", RECORDING_SCRIPT)?;
    install.local_tool("net.sh", RECORDING_SCRIPT)?;
    Ok(install)
}

// `run <id> a b` executes `bash <path> a b` with the launcher environment.
#[test]
fn run_forwards_arguments_and_environment() -> Result<()> {
    let install = install()?;
    let output = install.run(&["run", "test-tool", "a", "b"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let record = install.read_work_file("record.txt")?;
    assert_eq!(record_value(&record, "args").as_deref(), Some("a b"));
    assert_eq!(record_value(&record, "argc").as_deref(), Some("2"));
    assert_eq!(record_value(&record, "id").as_deref(), Some("test-tool"));
    assert_eq!(record_value(&record, "name").as_deref(), Some("Test Tool"));
    assert_eq!(record_value(&record, "version").as_deref(), Some("1.2.3"));
    assert_eq!(record_value(&record, "channel").as_deref(), Some("main"));
    assert_eq!(record_value(&record, "debug").as_deref(), Some("0"));
    assert_eq!(record_value(&record, "command").as_deref(), Some(""));
    assert_eq!(
        record_value(&record, "root"),
        Some(install.root.path().display().to_string())
    );
    assert_eq!(
        record_value(&record, "tools_dir"),
        Some(install.root.path().join("tools/main").display().to_string())
    );
    assert_eq!(
        record_value(&record, "lib_dir"),
        Some(install.root.path().join("lib").display().to_string())
    );

    // The private temp dir exists while the tool runs and is gone afterwards.
    assert_eq!(record_value(&record, "tmpdir_exists").as_deref(), Some("1"));
    let tmpdir = record_value(&record, "tmpdir").unwrap_or_default();
    assert!(!tmpdir.is_empty());
    assert!(!Path::new(&tmpdir).exists());
    Ok(())
}

#[test]
fn original_pwd_is_the_launch_directory() -> Result<()> {
    let install = install()?;
    install.run(&["run", "test-tool"])?;
    // The record lands in TOOLBELT_ORIGINAL_PWD, which must be the work dir.
    assert!(install.work_file("record.txt").is_file());
    let record = install.read_work_file("record.txt")?;
    assert_eq!(record_value(&record, "argc").as_deref(), Some("0"));
    Ok(())
}

#[test]
fn child_exit_status_is_propagated() -> Result<()> {
    let install = install()?;
    let output = install
        .command()
        .env("TOOL_EXIT", "3")
        .args(["run", "test-tool"])
        .output()?;
    assert_eq!(output.status.code(), Some(3));
    assert!(
        !stderr(&output).contains("error:"),
        "a failing tool is not a launcher error: {}",
        stderr(&output)
    );
    Ok(())
}

#[test]
fn tool_id_as_command_forwards_raw_args() -> Result<()> {
    let install = install()?;
    let output = install.run(&["test-tool", "--flag", "-x", "value"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(record_value(&record, "args").as_deref(), Some("--flag -x value"));
    Ok(())
}

#[test]
fn launcher_flags_are_not_forwarded_to_raw_tools() -> Result<()> {
    let install = install()?;
    let output = install.run(&["test-tool", "a", "--debug", "b"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(record_value(&record, "args").as_deref(), Some("a b"));
    assert_eq!(record_value(&record, "debug").as_deref(), Some("1"));
    Ok(())
}

#[test]
fn words_after_double_dash_reach_raw_tools_verbatim() -> Result<()> {
    let install = install()?;
    let output = install.run(&["run", "test-tool", "--", "--debug"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(record_value(&record, "args").as_deref(), Some("--debug"));
    assert_eq!(record_value(&record, "debug").as_deref(), Some("0"));

    let output = install.run(&["test-tool", "a", "--", "--debug", "--config", "x"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(
        record_value(&record, "args").as_deref(),
        Some("a -- --debug --config x")
    );
    assert_eq!(record_value(&record, "debug").as_deref(), Some("0"));
    Ok(())
}

#[test]
fn subcommand_passes_positionals_and_explicit_flags() -> Result<()> {
    let install = install()?;
    let output = install.run(&["net", "scan", "example.org", "-v", "--retries", "5"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(
        record_value(&record, "args").as_deref(),
        Some("scan example.org --retries 5 --verbose")
    );
    assert_eq!(record_value(&record, "command").as_deref(), Some("scan"));
    Ok(())
}

#[test]
fn declared_flag_defaults_are_not_forwarded() -> Result<()> {
    let install = install()?;
    let output = install.run(&["net", "scan", "example.org", "8080"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(
        record_value(&record, "args").as_deref(),
        Some("scan example.org 8080")
    );
    Ok(())
}

// Too few positionals fail before anything is resolved or spawned.
#[test]
fn missing_required_argument_never_spawns() -> Result<()> {
    let install = install()?;
    let output = install.run(&["net", "scan"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("requires at least 1 argument"));
    assert!(stderr(&output).contains("<host> [port]"));
    assert!(!install.work_file("record.txt").exists());
    Ok(())
}

#[test]
fn help_for_generated_command_shows_usage() -> Result<()> {
    let install = install()?;
    let output = install.run(&["net", "scan", "--help"])?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("<host> [port]"), "help: {text}");
    assert!(text.contains("--retries"));
    assert!(!install.work_file("record.txt").exists());
    Ok(())
}

#[test]
fn duplicate_tool_ids_fail_startup() -> Result<()> {
    let install = Install::new(json!({
        "tools": [
            {"id": "dup", "name": "A", "file": "a.sh", "type": "bash"},
            {"id": "dup", "name": "B", "file": "b.sh", "type": "bash"}
        ]
    }))?;
    let output = install.run(&["list"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("duplicate tool id 'dup'"));
    Ok(())
}

#[test]
fn malformed_catalog_is_reported_with_path() -> Result<()> {
    let install = Install::new(json!({}))?;
    fs::write(install.root.path().join("config/tools.json"), "{ nope")?;
    let output = install.run(&["list"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("tools.json"));
    Ok(())
}

#[test]
fn unknown_tool_exits_one() -> Result<()> {
    let install = install()?;
    let output = install.run(&["run", "ghost"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unknown tool 'ghost'"));
    Ok(())
}

#[test]
fn list_groups_tools_by_category() -> Result<()> {
    let install = install()?;
    let output = install.run(&["list"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    let testing = text.find("testing:").unwrap_or(usize::MAX);
    let network = text.find("network:").unwrap_or(usize::MAX);
    assert!(testing < network, "categories out of order: {text}");
    assert!(text.contains("Records how it was invoked"));

    let filtered = install.run(&["list", "--category", "network"])?;
    let text = stdout(&filtered);
    assert!(text.contains("net"));
    assert!(!text.contains("test-tool"));

    let verbose = install.run(&["list", "--verbose"])?;
    assert!(stdout(&verbose).contains("scan <host> [port]"));

    let missing = install.run(&["list", "--category", "nope"])?;
    assert_eq!(missing.status.code(), Some(1));
    Ok(())
}

#[test]
fn version_flags() -> Result<()> {
    let install = install()?;
    let output = install.run(&["--version"])?;
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("toolbelt {}", env!("CARGO_PKG_VERSION"))
    );

    let info = install.run(&["--version-info"])?;
    assert!(info.status.success());
    let text = stdout(&info);
    assert!(text.contains("channel:        main"));
    assert!(text.contains("version 2024.1 (2 tools)"));
    Ok(())
}

#[test]
fn config_file_selects_channel() -> Result<()> {
    let install = install()?;
    let config = install.work_file("alt.json");
    fs::write(&config, r#"{"channel": "v9.9.9"}"#)?;
    let output = install.run(&["--config", "alt.json", "run", "test-tool"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let record = install.read_work_file("record.txt")?;
    assert_eq!(record_value(&record, "channel").as_deref(), Some("v9.9.9"));
    Ok(())
}

#[test]
fn invalid_config_file_exits_one() -> Result<()> {
    let install = install()?;
    fs::write(install.work_file("bad.json"), r#"{"unknown_key": 1}"#)?;
    let output = install.run(&["--config", "bad.json", "list"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("loading settings"));
    Ok(())
}
