// ============================================
// MCPGATE - CLI Integration Tests
// ============================================

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn mcpgate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mcpgate"))
}

#[test]
fn test_cli_help() {
    let output = mcpgate().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("discover"));
    assert!(stdout.contains("call"));
}

#[test]
fn test_cli_version() {
    let output = mcpgate().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_discover_requires_target() {
    let output = mcpgate().arg("discover").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_config_init_writes_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = mcpgate()
        .args(["config", "--init"])
        .env("MCPGATE_CONFIG", &path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.contains("[transport]"));
    assert!(written.contains("ws_path"));
}

#[test]
fn test_servers_lists_configured() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[servers.kb]\nbase_url = \"http://127.0.0.1:9\"\n\n[servers.old]\nbase_url = \"http://old\"\nenabled = false\n",
    )
    .unwrap();

    let output = mcpgate()
        .args(["--config", path.to_str().unwrap(), "servers"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kb"));
    assert!(!stdout.contains("http://old"));
}

#[test]
fn test_call_rejects_non_object_arguments() {
    let output = mcpgate()
        .args(["call", "--url", "http://127.0.0.1:9", "--tool", "search", "--args", "[1]"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid arguments"));
}
