//! Project provisioning with a scripted server and runner.

use ciconf_core::ProjectDecl;
use ciconf_gerrit::fakes::{FakeRunner, ScriptedShell};
use ciconf_gerrit::{
    Applied, GerritClient, GerritError, ProjectProvisioner, ProvisionSettings,
};
use ciconf_renderer::Renderer;

const INITIALIZED: &str = "\
aa\tHEAD
aa\trefs/heads/master
bb\trefs/meta/config
";

fn decl(name: &str, repo: &str) -> ProjectDecl {
    ProjectDecl {
        name: name.into(),
        repo: repo.into(),
    }
}

fn settings() -> ProvisionSettings {
    ProvisionSettings::new("admin", "admin@example.com", "review.example.com")
        .with_git_root("/srv/git")
}

#[test]
fn creating_a_project_twice_never_errors() {
    let mut shell = ScriptedShell::new()
        .on_once("create-project", "", "")
        .on("create-project", "", "fatal: Project already exists\n");
    let mut client = GerritClient::new(&mut shell);
    assert_eq!(client.create_project("ci/tools").unwrap(), Applied::Created);
    assert_eq!(
        client.create_project("ci/tools").unwrap(),
        Applied::AlreadyExisted
    );
}

#[test]
fn initialized_repository_is_skipped() {
    let renderer = Renderer::new().unwrap();
    let mut shell = ScriptedShell::new().on("create-project", "", "fatal: Project already exists\n");
    let mut runner = FakeRunner::new().on("ls-remote", INITIALIZED);

    let report = {
        let mut provisioner = ProjectProvisioner::new(
            GerritClient::new(&mut shell),
            &mut runner,
            &renderer,
            settings(),
        );
        provisioner
            .provision(&[decl("ci/tools", "openstack/tools")], &["master".into()], "github.com")
            .unwrap()
    };

    assert_eq!(report.skipped_initialized, vec!["ci/tools".to_string()]);
    assert_eq!(report.already_present, vec!["ci/tools".to_string()]);
    assert!(!report.changed());
    assert!(runner.matching("git clone").is_empty());
    assert_eq!(
        runner.matching("ls-remote"),
        ["git ls-remote /srv/git/ci/tools.git"]
    );
    assert_eq!(shell.matching("flush-caches"), ["gerrit flush-caches"]);
}

#[test]
fn empty_batch_touches_nothing() {
    let renderer = Renderer::new().unwrap();
    let mut shell = ScriptedShell::new();
    let mut runner = FakeRunner::new();

    let report = {
        let mut provisioner = ProjectProvisioner::new(
            GerritClient::new(&mut shell),
            &mut runner,
            &renderer,
            settings(),
        );
        provisioner.provision(&[], &["master".into()], "github.com").unwrap()
    };

    assert!(!report.changed());
    assert!(shell.commands().is_empty());
    assert!(runner.invocations().is_empty());
}

#[test]
fn uninitialized_repository_is_seeded_on_missing_branches() {
    let renderer = Renderer::new().unwrap();
    let mut shell = ScriptedShell::new();
    let mut runner = FakeRunner::new()
        .on("status --porcelain", "A  .gitreview\n")
        .failing("show-branch gerrit/stable");

    let report = {
        let mut provisioner = ProjectProvisioner::new(
            GerritClient::new(&mut shell),
            &mut runner,
            &renderer,
            settings(),
        );
        provisioner
            .provision(
                &[decl("ci/tools", "openstack/tools")],
                &["master".into(), " stable ".into()],
                "github.com",
            )
            .unwrap()
    };

    assert_eq!(report.created, vec!["ci/tools".to_string()]);
    assert_eq!(report.seeded, vec!["ci/tools".to_string()]);
    assert_eq!(report.branches_pushed, 1);

    assert_eq!(
        runner.matching("git clone"),
        [format!(
            "git clone https://github.com/openstack/tools {}",
            runner.invocations()[0].cwd.join("ci_tools").display()
        )
        .as_str()]
    );
    assert_eq!(runner.matching("git add").len(), 1);
    assert_eq!(
        runner.matching("git commit"),
        ["git commit -a -m Configured git-review to point to 'review.example.com'"]
    );
    assert_eq!(
        runner.matching("remote add"),
        ["git remote add gerrit /srv/git/ci/tools.git"]
    );
    assert_eq!(
        runner.matching("git push"),
        ["git push --force gerrit HEAD:refs/heads/stable"]
    );
    assert!(runner.invocations().iter().all(|i| i.user == "gerrit2"));
    assert!(runner.owned().iter().all(|(_, user)| user == "gerrit2"));
    assert_eq!(shell.matching("flush-caches").len(), 1);
}

#[test]
fn unchanged_tree_is_not_committed() {
    let renderer = Renderer::new().unwrap();
    let mut shell = ScriptedShell::new();
    let mut runner = FakeRunner::new();

    {
        let mut provisioner = ProjectProvisioner::new(
            GerritClient::new(&mut shell),
            &mut runner,
            &renderer,
            settings(),
        );
        provisioner
            .provision(&[decl("p", "up/p")], &["master".into()], "git.example.com")
            .unwrap();
    }

    assert!(runner.matching("git commit").is_empty());
}

#[test]
fn first_failure_aborts_the_batch() {
    let renderer = Renderer::new().unwrap();
    let mut shell = ScriptedShell::new();
    let mut runner = FakeRunner::new().failing("git clone");

    let err = {
        let mut provisioner = ProjectProvisioner::new(
            GerritClient::new(&mut shell),
            &mut runner,
            &renderer,
            settings(),
        );
        provisioner
            .provision(
                &[decl("first", "up/first"), decl("second", "up/second")],
                &["master".into()],
                "github.com",
            )
            .unwrap_err()
    };

    match err {
        GerritError::Project { project, source } => {
            assert_eq!(project, "first");
            assert!(source.is_exit_failure());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(shell.matching("create-project"), ["gerrit create-project first"]);
    assert!(shell.matching("flush-caches").is_empty());
}
