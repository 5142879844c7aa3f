use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn stackpilot(state_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stackpilot").unwrap();
    cmd.env("STACKPILOT_STATE_DIR", state_dir)
        .env_remove("AWS_REGION")
        .env_remove("AWS_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

fn write_plan(dir: &Path, body: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("templates")).unwrap();
    fs::write(dir.join("templates/network.yaml"), "Resources: {}\n").unwrap();
    fs::write(dir.join("templates/api.yaml"), "Resources: {}\n").unwrap();
    let path = dir.join("stackpilot.toml");
    fs::write(&path, body).unwrap();
    path
}

const PLAN: &str = r#"
version = "1.0"
project = "orders"
region = "us-east-1"

[[stacks]]
component = "api"
template = "templates/api.yaml"
depends_on = ["network"]
parameters = { ArtifactBucket = "{{bucket_name}}" }

[[stacks]]
component = "network"
template = "templates/network.yaml"
"#;

#[test]
fn test_help_lists_commands() {
    let state = tempfile::tempdir().unwrap();
    stackpilot(state.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("teardown"))
        .stdout(predicate::str::contains("restore"));
}

#[test]
fn test_offline_estimate_prices_bulk_tier() {
    let state = tempfile::tempdir().unwrap();
    stackpilot(state.path())
        .args(["restore", "estimate", "--size-gb", "100", "--tier", "bulk"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bulk"))
        .stdout(predicate::str::contains("$0.25"));
}

#[test]
fn test_estimate_without_source_is_rejected() {
    let state = tempfile::tempdir().unwrap();
    stackpilot(state.path())
        .args(["restore", "estimate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--size-gb"));
}

#[test]
fn test_missing_plan_is_a_precondition_failure() {
    let state = tempfile::tempdir().unwrap();
    stackpilot(state.path())
        .args([
            "deploy",
            "--plan",
            "/no/such/stackpilot.toml",
            "--environment",
            "dev",
            "--bucket-name",
            "orders-artifacts",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Plan file not found"));
}

#[test]
fn test_dry_run_prints_commands_in_dependency_order() {
    let work = tempfile::tempdir().unwrap();
    let plan = write_plan(work.path(), PLAN);

    let assert = stackpilot(work.path())
        .args(["deploy", "--dry-run", "--environment", "dev", "--bucket-name", "orders-artifacts"])
        .arg("--plan")
        .arg(&plan)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let network = stdout.find("--stack-name orders-dev-network").unwrap();
    let api = stdout.find("--stack-name orders-dev-api").unwrap();
    assert!(network < api);
    assert!(stdout.contains("ArtifactBucket=orders-artifacts"));
}

#[test]
fn test_dry_run_rejects_missing_template() {
    let work = tempfile::tempdir().unwrap();
    let plan = write_plan(work.path(), &PLAN.replace("templates/api.yaml", "templates/gone.yaml"));

    stackpilot(work.path())
        .args(["deploy", "--dry-run", "-e", "dev", "--bucket-name", "orders-artifacts"])
        .arg("--plan")
        .arg(&plan)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Template file not found"));
}

#[test]
fn test_cyclic_plan_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let cyclic = PLAN.replace(
        "template = \"templates/network.yaml\"",
        "template = \"templates/network.yaml\"\ndepends_on = [\"api\"]",
    );
    let plan = write_plan(work.path(), &cyclic);

    stackpilot(work.path())
        .args(["deploy", "--dry-run", "-e", "dev", "--bucket-name", "orders-artifacts"])
        .arg("--plan")
        .arg(&plan)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency"));
}

#[test]
fn test_jobs_on_empty_state_dir() {
    let state = tempfile::tempdir().unwrap();
    stackpilot(state.path())
        .args(["restore", "jobs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No restore jobs found"));
}
