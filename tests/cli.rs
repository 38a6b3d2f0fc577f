//! Tests that run the `th` binary.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_config(dir: &Path, token_env: &str) -> std::path::PathBuf {
    let config_dir = dir.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("th.toml");
    fs::write(
        &path,
        format!(
            r#"[source]
api_base = "http://127.0.0.1:9"
token_env = "{}"

[cache]
refresh_interval_secs = 0

[server]
bind = "127.0.0.1:0"
"#,
            token_env
        ),
    )
    .unwrap();
    path
}

fn run_th(config: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_th"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("TH_TEST_TOKEN_UNSET")
        .output()
        .expect("failed to run th");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_th"))
        .arg("--help")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["load", "search", "get", "serve"] {
        assert!(stdout.contains(cmd), "missing {} in help", cmd);
    }
}

#[test]
fn test_load_without_token_fails_fast() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "TH_TEST_TOKEN_UNSET");
    let (_, stderr, ok) = run_th(&config, &["load"]);
    assert!(!ok);
    assert!(stderr.contains("not configured"), "stderr: {}", stderr);
}

#[test]
fn test_search_without_token_reports_no_results() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), "TH_TEST_TOKEN_UNSET");
    let (stdout, _, ok) = run_th(&config, &["search", "payroll"]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    fs::write(&path, "[retrieval]\nescalation = \"maybe\"\n\n[server]\nbind = \"x\"\n").unwrap();
    let (_, stderr, ok) = run_th(&path, &["load"]);
    assert!(!ok);
    assert!(stderr.contains("escalation"), "stderr: {}", stderr);
}
