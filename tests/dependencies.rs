#![cfg(unix)]

// Dependency checks through the launcher. Stdin is closed, so any
// confirmation prompt reads EOF and counts as a "no".
mod support;

use anyhow::Result;
use serde_json::{Value, json};
use support::{Install, RECORDING_SCRIPT, stderr, stdout};

const MISSING: &str = "toolbelt-test-definitely-not-installed";

fn dependencies() -> Value {
    json!({
        "version": "1",
        "dependencies": {
            "shell": {"description": "POSIX shell", "check": "sh"},
            "phantom": {
                "description": "Never installed",
                "check": MISSING,
                "package": MISSING,
                "docs": "https://example.test/phantom"
            }
        }
    })
}

fn install(deps: &[&str]) -> Result<Install> {
    let install = Install::new(json!({
        "tools": [
            {"id": "needs", "name": "Needs", "file": "needs.sh", "type": "bash",
             "dependencies": deps}
        ]
    }))?
    .with_dependencies(dependencies())?;
    install.local_tool("needs.sh", RECORDING_SCRIPT)?;
    Ok(install)
}

#[test]
fn present_dependencies_run_without_prompting() -> Result<()> {
    let install = install(&["shell"])?;
    let output = install.run(&["run", "needs"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!stderr(&output).contains("Install missing dependencies"));
    assert!(install.work_file("record.txt").is_file());
    Ok(())
}

#[test]
fn declined_install_prints_manual_steps_and_never_spawns() -> Result<()> {
    let install = install(&["shell", "phantom"])?;
    let output = install.run(&["run", "needs"])?;
    assert_eq!(output.status.code(), Some(1));

    let err = stderr(&output);
    assert!(err.contains("Missing dependencies:"), "stderr: {err}");
    assert!(err.contains("phantom: Never installed"));
    assert_eq!(err.matches("Install missing dependencies now?").count(), 1);
    assert!(err.contains("Install 'phantom' manually"));
    assert!(err.contains("https://example.test/phantom"));
    assert!(err.contains("installation declined"));
    assert!(!install.work_file("record.txt").exists());
    Ok(())
}

#[test]
fn undescribed_dependency_fails_before_spawn() -> Result<()> {
    let install = install(&["mystery"])?;
    let output = install.run(&["run", "needs"])?;
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Install 'mystery' manually"), "stderr: {err}");
    assert!(err.contains("dependency 'mystery' is not described"));
    assert!(!install.work_file("record.txt").exists());
    Ok(())
}

#[test]
fn deps_command_reports_presence() -> Result<()> {
    let install = install(&["shell", "phantom"])?;
    let output = install.run(&["deps", "needs"])?;
    // Anything missing makes the report fail, so it can gate scripts.
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    let shell = text.lines().find(|l| l.contains("shell")).unwrap_or_default();
    let phantom = text.lines().find(|l| l.contains("phantom")).unwrap_or_default();
    assert!(shell.trim_start().starts_with("ok"), "report: {text}");
    assert!(phantom.trim_start().starts_with("missing"), "report: {text}");
    assert!(!stderr(&output).contains("Install missing dependencies"));
    Ok(())
}

#[test]
fn deps_command_without_tool_covers_catalog() -> Result<()> {
    let install = install(&["shell"])?;
    let output = install.run(&["deps"])?;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("shell"));
    Ok(())
}
