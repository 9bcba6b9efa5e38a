//! Basic CLI E2E tests.
//!
//! Each test points `--config` at a temporary file so nothing touches the
//! user's real configuration.

use std::path::Path;
use std::process::Command;

/// Run the CLI with the given config file and return (stdout, stderr, code).
fn run_cli(config: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_pomocycle"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_config_init_set_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (_, stderr, code) = run_cli(&config, &["config", "init"]);
    assert_eq!(code, 0, "config init failed: {stderr}");
    assert!(config.exists());

    let (_, _, code) = run_cli(&config, &["config", "init"]);
    assert_ne!(code, 0, "init without --force must not overwrite");

    let (stdout, stderr, code) = run_cli(&config, &["config", "set", "cycle.meso_count", "3"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    assert!(stdout.contains("ok"));

    let (stdout, _, code) = run_cli(&config, &["config", "get", "cycle.meso_count"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");

    let contents = std::fs::read_to_string(&config).unwrap();
    assert!(contents.contains("meso_count = 3"));
}

#[test]
fn test_config_set_rejects_degenerate_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    run_cli(&config, &["config", "init"]);

    let (_, stderr, code) = run_cli(&config, &["config", "set", "cycle.micro_offset_secs", "500"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));

    let (stdout, _, _) = run_cli(&config, &["config", "get", "cycle.micro_offset_secs"]);
    assert_eq!(stdout.trim(), "60");
}

#[test]
fn test_config_set_rejects_oversized_base() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    run_cli(&config, &["config", "init"]);

    let (_, stderr, code) = run_cli(
        &config,
        &["config", "set", "cycle.micro_base_secs", "9223372036854775808"],
    );
    assert_eq!(code, 1, "expected a clean error exit: {stderr}");
    assert!(stderr.contains("error"));
    assert!(!stderr.contains("panicked"));

    let (stdout, _, _) = run_cli(&config, &["config", "get", "cycle.micro_base_secs"]);
    assert_eq!(stdout.trim(), "180");
}

#[test]
fn test_config_get_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let (_, stderr, code) = run_cli(&config, &["config", "get", "cycle.nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_json_format() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let (_, _, code) = run_cli(&config, &["config", "init"]);
    assert_eq!(code, 0);

    let contents = std::fs::read_to_string(&config).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed["cycle"]["meso_count"], 4);
}

#[test]
fn test_plan_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (stdout, stderr, code) = run_cli(&config, &["plan", "--count", "3", "--seed", "7"]);
    assert_eq!(code, 0, "plan failed: {stderr}");

    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let groups = parsed.as_array().unwrap();
    assert_eq!(groups.len(), 3);
    for group in groups {
        let durations: Vec<u64> = group["durations_secs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d.as_u64().unwrap())
            .collect();
        let (last, rest) = durations.split_last().expect("empty plan");
        for d in rest {
            assert!((120..=240).contains(d), "{group}");
        }
        assert!(*last >= 1);

        if group["fit"]["kind"] == "exact" {
            assert!((120..=240).contains(last), "{group}");
            assert_eq!(group["span_secs"], group["target_secs"], "{group}");
        }
    }

    // Seed 7 falls back to a closest miss on some group with the defaults.
    assert!(groups.iter().any(|g| g["fit"]["kind"] == "closest_miss"));

    let (again, _, _) = run_cli(&config, &["plan", "--count", "3", "--seed", "7"]);
    assert_eq!(stdout, again, "same seed must give the same plan");
}

#[test]
fn test_run_without_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("missing.toml");

    let (_, stderr, code) = run_cli(&config, &["run", "--exit-delay-secs", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("failed to load configuration"));
}

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let (stdout, _, code) = run_cli(&config, &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pomocycle"));
}
