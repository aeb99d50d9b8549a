//! Versions rendered from real git repositories.
//!
//! Repositories are set up with the git CLI; the code under test reads them
//! with gix.

use std::fs;
use std::path::Path;
use std::process::Command;

use git_versioning::get_version;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A repository with a committed `pyproject.toml` enabling versioning.
fn create_repo(table: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);

    fs::write(
        dir.path().join("pyproject.toml"),
        format!("[tool.setuptools-git-versioning]\nenabled = true\n{table}\n"),
    )
    .unwrap();
    fs::write(dir.path().join("README.md"), "readme\n").unwrap();
    commit(dir.path(), "Initial commit");
    dir
}

fn commit(dir: &Path, message: &str) {
    git(dir, &["add", "--all"]);
    git(dir, &["commit", "-m", message]);
}

fn head_sha(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

#[test]
#[serial_test::serial]
fn test_untagged_repo_uses_starting_version() {
    let repo = create_repo("");
    assert_eq!(get_version(repo.path()).unwrap(), "0.0.1");
}

#[test]
#[serial_test::serial]
fn test_tagged_commit_uses_template() {
    let repo = create_repo("");
    git(repo.path(), &["tag", "v1.0.0"]);
    assert_eq!(get_version(repo.path()).unwrap(), "1.0.0");
}

#[test]
#[serial_test::serial]
fn test_annotated_tag() {
    let repo = create_repo("");
    git(repo.path(), &["tag", "-a", "1.2.0", "-m", "Release 1.2.0"]);
    assert_eq!(get_version(repo.path()).unwrap(), "1.2.0");
}

#[test]
#[serial_test::serial]
fn test_commits_after_tag_use_dev_template() {
    let repo = create_repo("");
    git(repo.path(), &["tag", "v1.0.0"]);

    fs::write(repo.path().join("a.txt"), "a\n").unwrap();
    commit(repo.path(), "Add a");
    fs::write(repo.path().join("b.txt"), "b\n").unwrap();
    commit(repo.path(), "Add b");

    let sha = head_sha(repo.path());
    assert_eq!(
        get_version(repo.path()).unwrap(),
        format!("1.0.0.post2+git.{}", &sha[..8])
    );
}

#[test]
#[serial_test::serial]
fn test_modified_tracked_file_uses_dirty_template() {
    let repo = create_repo("");
    git(repo.path(), &["tag", "v1.0.0"]);
    fs::write(repo.path().join("README.md"), "changed\n").unwrap();

    let sha = head_sha(repo.path());
    assert_eq!(
        get_version(repo.path()).unwrap(),
        format!("1.0.0.post0+git.{}.dirty", &sha[..8])
    );
}

#[test]
#[serial_test::serial]
fn test_untracked_file_is_not_dirty() {
    let repo = create_repo("");
    git(repo.path(), &["tag", "v1.0.0"]);
    fs::write(repo.path().join("untracked.txt"), "new\n").unwrap();
    assert_eq!(get_version(repo.path()).unwrap(), "1.0.0");
}

#[test]
#[serial_test::serial]
fn test_tag_filter_skips_tags() {
    let repo = create_repo(r#"tag_filter = "^v\\d""#);
    git(repo.path(), &["tag", "v1.0.0"]);
    fs::write(repo.path().join("a.txt"), "a\n").unwrap();
    commit(repo.path(), "Add a");
    git(repo.path(), &["tag", "nightly"]);

    let sha = head_sha(repo.path());
    assert_eq!(
        get_version(repo.path()).unwrap(),
        format!("1.0.0.post1+git.{}", &sha[..8])
    );
}

#[test]
#[serial_test::serial]
fn test_custom_templates_with_branch() {
    let repo = create_repo(
        r#"template = "{tag}+{branch}"
dev_template = "{tag}.dev{ccount}""#,
    );
    git(repo.path(), &["tag", "v2.0.0"]);
    assert_eq!(get_version(repo.path()).unwrap(), "2.0.0+main");

    fs::write(repo.path().join("a.txt"), "a\n").unwrap();
    commit(repo.path(), "Add a");
    assert_eq!(get_version(repo.path()).unwrap(), "2.0.0.dev1");
}

#[test]
#[serial_test::serial]
fn test_disabled_config_ignores_tags() {
    let repo = create_repo("");
    fs::write(
        repo.path().join("pyproject.toml"),
        "[tool.setuptools-git-versioning]\nenabled = false\n",
    )
    .unwrap();
    commit(repo.path(), "Disable versioning");
    git(repo.path(), &["tag", "v1.0.0"]);
    assert_eq!(get_version(repo.path()).unwrap(), "0.0.0");
}
