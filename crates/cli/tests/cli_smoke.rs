//! CLI smoke tests for stv.
//!
//! These tests never reach a container daemon: they exercise argument
//! handling, configuration errors, and failures from an unusable runtime
//! binary, and check exit codes and messages.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the stv binary with an isolated environment.
fn stv_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("stv");
  cmd
    .env_remove("STV_FILE")
    .env_remove("STV_PROJECT_NAME")
    .env("STV_DOCKER", "/nonexistent/docker")
    .env("RUST_LOG", "off");
  cmd
}

/// Create a temp directory holding `stevedore.yaml`.
fn temp_project(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("stevedore.yaml"), content).unwrap();
  temp
}

const THREE_TIER: &str = r#"
services:
  db:
    image: postgres:16
  web:
    image: example/web:latest
    depends_on: [db]
  nginx:
    image: nginx:1.27
    links: [web]
"#;

const CYCLE: &str = r#"
services:
  web:
    image: app
    depends_on: [db]
  db:
    image: postgres
    depends_on: [web]
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  stv_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  stv_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("stv"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["up", "plan", "down"] {
    stv_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// Usage errors
// =============================================================================

#[test]
fn conflicting_strategy_flags_are_rejected() {
  let temp = temp_project(THREE_TIER);

  stv_cmd()
    .current_dir(temp.path())
    .args(["up", "--force-recreate", "--no-recreate"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn malformed_scale_is_rejected() {
  stv_cmd()
    .args(["up", "--scale", "web"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("SERVICE=N"));
}

#[test]
fn never_start_stopped_requires_no_recreate() {
  stv_cmd().args(["up", "--never-start-stopped"]).assert().code(2);
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn missing_file_fails() {
  let temp = TempDir::new().unwrap();

  stv_cmd()
    .arg("-f")
    .arg(temp.path().join("missing.yaml"))
    .arg("plan")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn file_from_environment_is_used() {
  let temp = temp_project(CYCLE);

  stv_cmd()
    .env("STV_FILE", temp.path().join("stevedore.yaml"))
    .arg("plan")
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle detected"));
}

#[test]
fn cycle_is_reported_before_any_container_work() {
  let temp = temp_project(CYCLE);

  stv_cmd()
    .current_dir(temp.path())
    .arg("up")
    .assert()
    .failure()
    .stderr(predicate::str::contains("web -> db -> web").or(predicate::str::contains("db -> web -> db")));
}

#[test]
fn unknown_dependency_fails() {
  let temp = temp_project(
    r#"
services:
  web:
    image: app
    depends_on: [cache]
"#,
  );

  stv_cmd()
    .current_dir(temp.path())
    .arg("plan")
    .assert()
    .failure()
    .stderr(predicate::str::contains("undefined service cache"));
}

#[test]
fn unknown_selected_service_fails() {
  let temp = temp_project(THREE_TIER);

  stv_cmd()
    .current_dir(temp.path())
    .args(["plan", "ghost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no such service: ghost"));
}

#[test]
fn zero_scale_override_fails() {
  let temp = temp_project(THREE_TIER);

  stv_cmd()
    .current_dir(temp.path())
    .args(["up", "--scale", "web=0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid scale"));
}

// =============================================================================
// Runtime failures
// =============================================================================

#[test]
fn plan_reports_unresolvable_images() {
  let temp = temp_project(THREE_TIER);

  stv_cmd()
    .current_dir(temp.path())
    .arg("plan")
    .assert()
    .failure()
    .stdout(predicate::str::contains("image resolution failed"));
}

#[test]
fn plan_json_lists_services_in_dependency_order() {
  let temp = temp_project(THREE_TIER);

  let output = stv_cmd()
    .current_dir(temp.path())
    .args(["-p", "demo", "-o", "json", "plan"])
    .output()
    .unwrap();

  assert!(!output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["project"], "demo");
  let services: Vec<&str> = json["services"]
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["service"].as_str().unwrap())
    .collect();
  assert_eq!(services, vec!["db", "web", "nginx"]);
  assert!(json["services"][0]["error"].is_string());
}

#[test]
fn up_fails_and_skips_dependents() {
  let temp = temp_project(THREE_TIER);

  let output = stv_cmd()
    .current_dir(temp.path())
    .args(["-o", "json", "up"])
    .output()
    .unwrap();

  assert!(!output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["success"], false);
  let outcome = |name: &str| {
    json["services"]
      .as_array()
      .unwrap()
      .iter()
      .find(|s| s["service"] == name)
      .map(|s| s["outcome"].clone())
      .unwrap()
  };
  assert_eq!(outcome("db"), "failed");
  assert_eq!(outcome("web"), "skipped");
  assert_eq!(outcome("nginx"), "skipped");
}

#[test]
fn down_fails_when_runtime_is_unavailable() {
  let temp = temp_project(THREE_TIER);

  stv_cmd()
    .current_dir(temp.path())
    .arg("down")
    .assert()
    .failure()
    .stdout(predicate::str::contains("nginx"));
}
