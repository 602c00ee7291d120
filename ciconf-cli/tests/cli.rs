use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn ciconf_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ci-configurator"));
    cmd.arg("--root")
        .arg(root)
        .arg("--relation-file")
        .arg(root.join("relations.yaml"))
        .env_remove("CICONF_ROOT")
        .env_remove("CICONF_RELATION_FILE")
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1");
    cmd
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, body).expect("write fixture");
}

#[test]
fn help_lists_every_pass() {
    let root = TempDir::new().expect("root");
    ciconf_cmd(root.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("refresh-config"))
        .stdout(contains("sync-members"))
        .stdout(contains("jenkins"))
        .stdout(contains("zuul"));
}

#[test]
fn unknown_log_format_is_rejected() {
    let root = TempDir::new().expect("root");
    ciconf_cmd(root.path())
        .args(["--log-format", "xml", "status"])
        .assert()
        .failure()
        .stderr(contains("unknown log format"));
}

#[test]
fn plugins_come_from_control_file() {
    let root = TempDir::new().expect("root");
    write(
        root.path(),
        "ci-config/control.yml",
        "required_jenkins_plugins: [git, gerrit-trigger]\n",
    );
    ciconf_cmd(root.path())
        .arg("plugins")
        .assert()
        .success()
        .stdout("git gerrit-trigger\n");
}

#[test]
fn passes_without_relations_are_skipped() {
    let root = TempDir::new().expect("root");
    write(root.path(), "ci-config/gerrit/permissions/groups.yml", "ci-core: core\n");
    for pass in ["gerrit", "sync-members", "jenkins", "zuul"] {
        ciconf_cmd(root.path())
            .arg(pass)
            .assert()
            .success()
            .stdout(contains("skipped"));
    }
}

#[test]
fn zuul_reports_layout_directory() {
    let root = TempDir::new().expect("root");
    write(root.path(), "relations.yaml", "zuul-configurator:\n  host: zuul\n");
    write(root.path(), "ci-config/zuul/layout.yaml", "pipelines: []\n");
    ciconf_cmd(root.path())
        .arg("zuul")
        .assert()
        .success()
        .stdout(contains("zuul layout at"));
}

#[test]
fn refresh_from_bundled_tree_without_updates() {
    let root = TempDir::new().expect("root");
    let bundled = TempDir::new().expect("bundled");
    write(bundled.path(), "control.yml", "required_jenkins_plugins: [git]\n");
    write(bundled.path(), "zuul/layout.yaml", "pipelines: []\n");

    ciconf_cmd(root.path())
        .arg("refresh-config")
        .arg("--bundled")
        .arg(bundled.path())
        .arg("--no-update")
        .assert()
        .success()
        .stdout(contains("copied from bundled tree"))
        .stdout(contains("zuul").not());

    assert!(root.path().join("ci-config/zuul/layout.yaml").exists());
}

#[test]
fn refresh_without_repository_is_skipped() {
    let root = TempDir::new().expect("root");
    ciconf_cmd(root.path())
        .arg("refresh-config")
        .assert()
        .success()
        .stdout(contains("config repository: skipped"));
}

#[test]
fn status_json_on_unconfigured_host() {
    let root = TempDir::new().expect("root");
    let output = ciconf_cmd(root.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["configured"], false);
    assert!(report["projects"].as_array().expect("array").is_empty());
    assert!(report["skipped"].is_string());
    assert!(report["jenkins_installed_at"].is_null());
}
