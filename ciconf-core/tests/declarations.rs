//! Declaration and relation loading against files laid out like a real
//! config checkout.

use assert_fs::prelude::*;
use ciconf_core::{
    loader, CharmConfig, CiPaths, ConfigError, FileRelation, GerritRelation, GroupName,
    RelationSource, TeamName,
};

// ---------------------------------------------------------------------------
// 1. Error messages carry the file path
// ---------------------------------------------------------------------------

#[test]
fn missing_projects_file_is_not_found_and_incomplete() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let paths = CiPaths::new(root.path());
    let err = loader::load_projects_at(&paths.projects_file()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.is_incomplete());
    assert!(err.to_string().contains("projects.yml"));
}

#[test]
fn corrupt_groups_file_is_a_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let paths = CiPaths::new(root.path());
    root.child("ci-config/gerrit/permissions/groups.yml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = loader::load_groups_at(&paths.groups_file()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(!err.is_incomplete());
    assert!(err.to_string().contains("groups.yml"));
}

// ---------------------------------------------------------------------------
// 2. Groups accept strings and sequences
// ---------------------------------------------------------------------------

#[test]
fn groups_are_sorted_and_accept_both_team_forms() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = root.child("groups.yml");
    file.write_str("zeta-core: [zeta-team]\nalpha-core: alpha-team  beta-team\n")
        .expect("write");

    let groups = loader::load_groups_at(file.path()).expect("load");
    let names: Vec<&GroupName> = groups.groups.iter().map(|g| &g.name).collect();
    assert_eq!(names, [&GroupName::from("alpha-core"), &GroupName::from("zeta-core")]);
    assert_eq!(
        groups.groups[0].teams,
        vec![TeamName::from("alpha-team"), TeamName::from("beta-team")]
    );
}

// ---------------------------------------------------------------------------
// 3. Relation documents
// ---------------------------------------------------------------------------

#[test]
fn file_relation_builds_a_complete_gerrit_relation() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = root.child("relations.yaml");
    file.write_str(
        "gerrit-configurator:\n  admin_username: admin\n  admin_email: admin@example.com\n  \
         admin_privkey_path: /home/gerrit2/.ssh/id_rsa\n  review_site_dir: /srv/review\n  \
         public_url: review.example.com\n",
    )
    .expect("write");

    let settings = FileRelation::new(file.path())
        .settings("gerrit-configurator")
        .expect("read")
        .expect("present");
    let relation = GerritRelation::from_settings(settings).expect("complete");
    assert_eq!(relation.admin_username, "admin");
    assert_eq!(relation.review_site_dir, std::path::PathBuf::from("/srv/review"));
}

#[test]
fn partial_gerrit_relation_names_every_missing_key() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = root.child("relations.yaml");
    file.write_str("gerrit-configurator:\n  admin_username: admin\n  public_url: ''\n")
        .expect("write");

    let settings = FileRelation::new(file.path())
        .settings("gerrit-configurator")
        .expect("read")
        .expect("present");
    let err = GerritRelation::from_settings(settings).unwrap_err();
    assert!(err.is_incomplete());
    let msg = err.to_string();
    assert!(msg.contains("public_url"), "got: {msg}");
    assert!(msg.contains("review_site_dir"), "got: {msg}");
}

#[test]
fn absent_relation_is_none() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = root.child("relations.yaml");
    file.write_str("zuul-configurator: {}\n").expect("write");
    let source = FileRelation::new(file.path());
    assert!(source.settings("jenkins-configurator").expect("read").is_none());
    assert!(source.settings("zuul-configurator").expect("read").is_some());
}

// ---------------------------------------------------------------------------
// 4. Charm configuration
// ---------------------------------------------------------------------------

#[test]
fn charm_config_reads_kebab_case_keys() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("config.yaml")
        .write_str(
            "config-repo: lp:ci-config\nconfig-repo-revision: '42'\n\
             jenkins-admin-user: bot\njenkins-token: t0k\n",
        )
        .expect("write");
    let paths = CiPaths::new(root.path());

    let config = CharmConfig::load_at(&paths.charm_config()).expect("load");
    assert_eq!(config.config_repo.as_deref(), Some("lp:ci-config"));
    assert_eq!(config.config_repo_rcs, "bzr");
    assert_eq!(config.config_repo_revision.as_deref(), Some("42"));
    assert_eq!(config.jenkins_credentials(), Some(("bot".into(), "t0k".into())));
}
