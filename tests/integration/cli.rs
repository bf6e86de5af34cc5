//! Smoke tests for the `updraft` binary.

use crate::common::TestEnv;
use assert_cmd::Command;
use predicates::prelude::*;
use semver::Version;
use updraft::manifest::ReleaseKind;

fn updraft() -> Command {
    let mut cmd = Command::cargo_bin("updraft").unwrap();
    cmd.env_remove("UPDRAFT_CONFIG_PATH");
    cmd.env("UPDRAFT_NO_PROGRESS", "1");
    cmd
}

/// Write the config file and return its path.
fn write_config(env: &TestEnv) -> std::path::PathBuf {
    let path = env.root_dir.parent().unwrap().join("updraft.toml");
    let config = env.config();
    std::fs::write(
        &path,
        toml::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
    path
}

#[test]
fn help_lists_subcommands() {
    updraft()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("update"));
}

#[test]
fn check_json_emits_plan() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.0.0", ReleaseKind::Full, &[("app.txt", b"v1.0")]);
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();
    let config = write_config(&env);

    let output = updraft()
        .args(["--quiet", "--config"])
        .arg(&config)
        .args(["check", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(plan["currently_installed_version"], "1.0.0");
    assert_eq!(plan["is_bootstrapping"], false);
    assert_eq!(plan["releases_to_apply"].as_array().unwrap().len(), 1);
}

#[test]
fn update_applies_and_reports() {
    let mut env = TestEnv::new();
    env.install_current("1.0.0", &[("app.txt", b"v1.0")]);
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();
    let config = write_config(&env);

    updraft()
        .args(["--quiet", "--config"])
        .arg(&config)
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated to 1.1.0"));

    assert_eq!(env.current_version(), Some(Version::new(1, 1, 0)));
    assert_eq!(env.current_file("app.txt"), b"v1.1");

    // A second run finds nothing to do.
    updraft()
        .args(["--quiet", "--config"])
        .arg(&config)
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
}

#[test]
fn missing_config_fails_with_context() {
    updraft()
        .args(["--quiet", "--config", "/definitely/not/here.toml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config").or(predicate::str::contains("Config")));
}

#[test]
fn root_override_is_honored() {
    let mut env = TestEnv::new();
    env.publish("1.1.0", ReleaseKind::Full, &[("app.txt", b"v1.1")]);
    env.commit();
    let config = write_config(&env);

    let other_root = env.root_dir.parent().unwrap().join("elsewhere");
    updraft()
        .args(["--quiet", "--config"])
        .arg(&config)
        .arg("--root")
        .arg(&other_root)
        .arg("update")
        .assert()
        .success();

    // The configured root stays empty; the override got the install.
    assert!(other_root.join(".current").exists());
    assert!(!env.root_dir.join(".current").exists());
}
