//! CLI-level tests: exit codes and the entity CRUD surface, driven through
//! the built binary against a temp-dir config and store.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let config_path = dir.path().join("orch.yml");
    let yaml = format!(
        "storage:\n  path: {}\nmonitoring:\n  production_logging:\n    enabled: true\n    path: {}\n    privacy:\n      redact_pii: true\n      redact_secrets: true\n",
        dir.path().join("state.db").display(),
        dir.path().join("prod.jsonl").display(),
    );
    std::fs::write(&config_path, yaml).expect("write config");
    config_path
}

fn orch(dir: &TempDir) -> Command {
    let config_path = write_config(dir);
    let mut cmd = Command::cargo_bin("orch").expect("binary builds");
    cmd.arg("--config").arg(config_path);
    cmd
}

#[test]
fn no_subcommand_prints_hint_and_succeeds() {
    let dir = TempDir::new().unwrap();
    orch(&dir).assert().success().stdout(predicate::str::contains("orch"));
}

#[test]
fn project_create_then_list_round_trips() {
    let dir = TempDir::new().unwrap();

    orch(&dir)
        .args(["project", "create", "TestProj", "--workdir", "/tmp/testproj"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created project 'TestProj'"));

    orch(&dir)
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TestProj"));
}

#[test]
fn task_crud_against_a_project() {
    let dir = TempDir::new().unwrap();

    let create = orch(&dir)
        .args(["project", "create", "TestProj", "--workdir", "/tmp/testproj"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&create.get_output().stdout).to_string();
    let project_id = stdout.rsplit('(').next().unwrap().trim_end().trim_end_matches(')').to_string();

    orch(&dir)
        .args(["task", "create", "Implement login", "--project", &project_id, "--priority", "high"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created Task 'Implement login'"));

    orch(&dir)
        .args(["task", "list", "--project", &project_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Implement login"));
}

#[test]
fn work_item_create_without_project_is_a_user_error() {
    let dir = TempDir::new().unwrap();
    orch(&dir)
        .args(["task", "create", "Orphan task"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--project"));
}

#[test]
fn show_with_unknown_id_is_a_user_error() {
    let dir = TempDir::new().unwrap();
    orch(&dir).args(["task", "show", "no-such-id"]).assert().failure().code(1).stderr(predicate::str::contains("not found"));
}

#[test]
fn run_without_registered_ports_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    orch(&dir)
        .args(["run", "task-123"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("agent.type"));
}

#[test]
fn invalid_config_is_a_hard_startup_error_naming_the_key() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bad.yml");
    std::fs::write(&config_path, "agent:\n  response_timeout: 5\n").unwrap();

    let mut cmd = Command::cargo_bin("orch").expect("binary builds");
    cmd.arg("--config")
        .arg(config_path)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("agent.response_timeout"));
}

#[test]
fn production_log_records_the_invocation() {
    let dir = TempDir::new().unwrap();
    orch(&dir).args(["project", "list"]).assert().success();

    let log = std::fs::read_to_string(dir.path().join("prod.jsonl")).expect("production log written");
    let first: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(first["type"], "user_input");
    assert!(first["ts"].as_str().unwrap().contains('T'));
    assert!(first["session"].as_str().is_some());
    assert!(log.lines().any(|l| l.contains("execution_result")));
}
