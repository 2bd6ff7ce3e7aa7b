//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. Tests use
//! `info --json` to assert actual config values, not just process success.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary, isolated from the
/// user's own config and environment.
#[allow(deprecated)]
fn cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("SHORTBIZ_LOG_DIR", home.join("logs"))
        .env_remove("SHORTBIZ_LOG_LEVEL")
        .env_remove("SHORTBIZ_BRAND_NAME")
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_MODEL")
        .env_remove("RUST_LOG");
    cmd
}

/// Run `info --json` from a directory and parse the JSON output.
fn info_json(home: &Path, dir: &Path) -> Value {
    let output = cmd(home)
        .args(["-C", dir.to_str().unwrap(), "info", "--json"])
        .output()
        .expect("failed to run command");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("invalid JSON output")
}

/// A scratch home plus a project dir inside it.
fn scratch() -> (TempDir, std::path::PathBuf) {
    let home = TempDir::new().unwrap();
    let project = home.path().join("project");
    fs::create_dir_all(&project).unwrap();
    (home, project)
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let (home, project) = scratch();
    let json = info_json(home.path(), &project);

    assert_eq!(json["config"]["log_level"], "info");
    assert_eq!(json["config"]["brand_name"], "MyShortBIZ");
    assert_eq!(json["config"]["model"], "gpt-4.1-mini");
    assert!(json["config"]["config_file"].is_null());
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let (home, project) = scratch();
    fs::write(project.join(".shortbiz.toml"), r#"log_level = "debug""#).unwrap();

    let json = info_json(home.path(), &project);

    assert_eq!(json["config"]["log_level"], "debug");
    let reported = json["config"]["config_file"].as_str().unwrap();
    assert!(reported.ends_with(".shortbiz.toml"), "{reported}");
}

#[test]
fn discovers_config_in_parent_directory() {
    let (home, project) = scratch();
    let nested = project.join("nested").join("deep");
    fs::create_dir_all(&nested).unwrap();
    fs::write(project.join("shortbiz.toml"), r#"brand_name = "Ann's Bakery""#).unwrap();

    let json = info_json(home.path(), &nested);
    assert_eq!(json["config"]["brand_name"], "Ann's Bakery");
}

#[test]
fn regular_name_overrides_dotfile() {
    let (home, project) = scratch();
    fs::write(project.join(".shortbiz.toml"), r#"log_level = "debug""#).unwrap();
    fs::write(project.join("shortbiz.toml"), r#"log_level = "error""#).unwrap();

    let json = info_json(home.path(), &project);
    assert_eq!(json["config"]["log_level"], "error");
}

#[test]
fn user_config_is_read() {
    let (home, project) = scratch();
    let user_dir = home.path().join(".config").join("shortbiz");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join("config.toml"), "starting_tokens = 250\n").unwrap();

    let json = info_json(home.path(), &project);
    assert_eq!(json["config"]["starting_tokens"], 250);
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_nested_sections() {
    let (home, project) = scratch();
    fs::write(
        project.join(".shortbiz.toml"),
        r#"
[llm]
model = "gpt-4.1"
api_key = "sk-test"

[billing]
checkout_base_url = "https://pay.example.com"
"#,
    )
    .unwrap();

    let json = info_json(home.path(), &project);
    assert_eq!(json["config"]["model"], "gpt-4.1");
    assert_eq!(json["config"]["api_key_set"], true);
    assert_eq!(
        json["config"]["checkout_base_url"],
        "https://pay.example.com"
    );
}

#[test]
fn parses_yaml_config() {
    let (home, project) = scratch();
    fs::write(project.join(".shortbiz.yaml"), "log_level: warn\n").unwrap();

    let json = info_json(home.path(), &project);
    assert_eq!(json["config"]["log_level"], "warn");
}

#[test]
fn parses_json_config() {
    let (home, project) = scratch();
    fs::write(
        project.join(".shortbiz.json"),
        r#"{"auth": {"token_ttl_minutes": 15}}"#,
    )
    .unwrap();

    let json = info_json(home.path(), &project);
    assert_eq!(json["config"]["token_ttl_minutes"], 15);
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn explicit_config_overrides_discovered() {
    let (home, project) = scratch();
    fs::write(project.join(".shortbiz.toml"), r#"log_level = "debug""#).unwrap();
    let explicit = project.join("override.toml");
    fs::write(&explicit, r#"log_level = "error""#).unwrap();

    let output = cmd(home.path())
        .args([
            "-C",
            project.to_str().unwrap(),
            "--config",
            explicit.to_str().unwrap(),
            "info",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["config"]["log_level"], "error");
    let reported = json["config"]["config_file"].as_str().unwrap();
    assert!(reported.ends_with("override.toml"), "{reported}");
}

#[test]
fn env_overrides_files() {
    let (home, project) = scratch();
    fs::write(
        project.join(".shortbiz.toml"),
        "brand_name = \"From File\"\n[llm]\nmodel = \"file-model\"\n",
    )
    .unwrap();

    let output = cmd(home.path())
        .env("SHORTBIZ_BRAND_NAME", "From Env")
        .env("OPENAI_MODEL", "env-model")
        .env("OPENAI_API_KEY", "sk-env")
        .args(["-C", project.to_str().unwrap(), "info", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["config"]["brand_name"], "From Env");
    assert_eq!(json["config"]["model"], "env-model");
    assert_eq!(json["config"]["api_key_set"], true);
}

#[test]
fn nested_env_keys_use_double_underscore() {
    let (home, project) = scratch();
    let output = cmd(home.path())
        .env("SHORTBIZ_LLM__MODEL", "nested-model")
        .args(["-C", project.to_str().unwrap(), "info", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["config"]["model"], "nested-model");
}

// =============================================================================
// Error Cases & Boundaries
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let (home, project) = scratch();
    fs::write(project.join(".shortbiz.toml"), "this is not valid toml [[[").unwrap();

    cmd(home.path())
        .args(["-C", project.to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn wrong_type_shows_error() {
    let (home, project) = scratch();
    fs::write(project.join(".shortbiz.toml"), "starting_tokens = \"lots\"\n").unwrap();

    cmd(home.path())
        .args(["-C", project.to_str().unwrap(), "info"])
        .assert()
        .failure();
}

#[test]
fn git_boundary_stops_config_search() {
    let (home, project) = scratch();
    let repo = project.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(project.join(".shortbiz.toml"), r#"log_level = "error""#).unwrap();

    let json = info_json(home.path(), &src);
    assert_eq!(json["config"]["log_level"], "info");
    assert!(json["config"]["config_file"].is_null());
}
