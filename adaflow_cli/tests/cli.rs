use assert_cmd::Command;
use predicates::prelude::*;

fn adaflow() -> Command {
    Command::cargo_bin("adaflow").expect("binary")
}

#[test]
fn help_prints_usage() {
    adaflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Adaptive flow controller"));
}

#[test]
fn get_pa_falls_back_to_profile_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = dir.path().join("state.toml");
    adaflow()
        .args([
            "--config",
            dir.path().join("missing.toml").to_str().expect("utf-8"),
            "--state",
            state.to_str().expect("utf-8"),
            "get-pa",
            "--material",
            "pla",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("PA for pla"));
}

#[test]
fn set_pa_round_trips_through_state_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = dir.path().join("state.toml");
    let config = dir.path().join("missing.toml");
    adaflow()
        .args([
            "--config",
            config.to_str().expect("utf-8"),
            "--state",
            state.to_str().expect("utf-8"),
            "set-pa",
            "--material",
            "petg",
            "--value",
            "0.071",
        ])
        .assert()
        .success();
    adaflow()
        .args([
            "--config",
            config.to_str().expect("utf-8"),
            "--state",
            state.to_str().expect("utf-8"),
            "get-pa",
            "--material",
            "petg",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.071"));
}

#[test]
fn json_mode_emits_structured_reply() {
    let dir = tempfile::tempdir().expect("tempdir");
    adaflow()
        .args([
            "--config",
            dir.path().join("missing.toml").to_str().expect("utf-8"),
            "--state",
            dir.path().join("state.toml").to_str().expect("utf-8"),
            "--json",
            "status",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\":true"));
}
