//! End-to-end tests for the podgrid binary.
//!
//! Only offline surfaces are exercised: argument validation and the
//! registry commands against a temporary registry file. Nothing here
//! talks to the external system.

use assert_cmd::Command;
use predicates::prelude::*;

fn podgrid(registry: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("podgrid").expect("binary");
    cmd.env("PODGRID_REGISTRY", registry);
    cmd
}

#[test]
fn help_lists_command_groups() {
    Command::cargo_bin("podgrid")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resources"))
        .stdout(predicate::str::contains("pods"))
        .stdout(predicate::str::contains("pod"));
}

#[test]
fn create_rejects_unknown_gpu_type_before_any_remote_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    podgrid(&dir.path().join("registry.json"))
        .args(["pods", "create", "--gpu-type", "WARPDRIVE", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized gpu type 'WARPDRIVE'"));
}

#[test]
fn setup_switch_remove_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = dir.path().join("registry.json");

    // First pod becomes active.
    podgrid(&registry)
        .args(["--format", "json", "pod", "setup", "a", "user@host"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active\": true"));

    // Second pod does not steal the pointer.
    podgrid(&registry)
        .args(["--format", "json", "pod", "setup", "b", "user@host2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active\": false"));

    podgrid(&registry)
        .args(["--format", "json", "pod", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active_pod\": \"a\""));

    // Removing the active pod clears the pointer.
    podgrid(&registry)
        .args(["pod", "remove", "a"])
        .assert()
        .success();

    podgrid(&registry)
        .args(["--format", "json", "pod", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"active_pod\": null"));
}

#[test]
fn duplicate_setup_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = dir.path().join("registry.json");

    podgrid(&registry)
        .args(["pod", "setup", "a", "user@host"])
        .assert()
        .success();
    podgrid(&registry)
        .args(["pod", "setup", "a", "user@other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn switch_to_unknown_pod_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    podgrid(&dir.path().join("registry.json"))
        .args(["pod", "switch", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn malformed_ssh_target_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    podgrid(&dir.path().join("registry.json"))
        .args(["pod", "setup", "a", "just-a-hostname"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid ssh target"));
}
