use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::rstest;

mod common;
use common::{
    AUTHOR_EMAIL, AUTHOR_NAME, dirc_commit, dirc_output_oid, init_repository_dir, run_dirc_command,
    with_author, write_file,
};

fn read_head_commit(dir: &std::path::Path) -> String {
    std::fs::read_to_string(dir.join(".git/refs/heads/master"))
        .expect("master should exist")
        .trim()
        .to_string()
}

#[rstest]
fn first_commit_is_a_root_commit(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    write_file(dir, "dir/b.txt", "two\n");
    run_dirc_command(dir, &["add", "."]).assert().success();

    dirc_commit(dir, "Initial commit")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\[master \(root-commit\) [0-9a-f]{7}\] Initial commit\n").unwrap())
        .stdout(predicate::str::contains(" create mode 100644 a.txt\n"))
        .stdout(predicate::str::contains(" create mode 100644 dir/b.txt\n"));

    let head = read_head_commit(dir);
    run_dirc_command(dir, &["cat-file", "-t", &head])
        .assert()
        .success()
        .stdout("commit\n");
}

#[rstest]
fn commit_records_tree_author_and_message(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "hello.txt", "test content\n");
    run_dirc_command(dir, &["add", "hello.txt"]).assert().success();
    dirc_commit(dir, "Add hello").assert().success();

    let head = read_head_commit(dir);
    run_dirc_command(dir, &["cat-file", "-p", &head])
        .assert()
        .success()
        .stdout(format!(
            "tree e4cc8b3b601ce58ee02233915fee2a5bdbcbb44d\n\
             author {AUTHOR_NAME} <{AUTHOR_EMAIL}> 1672574400 +0000\n\
             committer {AUTHOR_NAME} <{AUTHOR_EMAIL}> 1672574400 +0000\n\
             \n\
             Add hello\n"
        ));
}

#[rstest]
fn second_commit_has_the_first_as_parent(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    write_file(dir, "b.txt", "two\n");
    run_dirc_command(dir, &["add", "."]).assert().success();
    dirc_commit(dir, "First").assert().success();
    let first = read_head_commit(dir);

    run_dirc_command(dir, &["rm", "b.txt"]).assert().success();
    write_file(dir, "c.txt", "three\n");
    run_dirc_command(dir, &["add", "c.txt"]).assert().success();

    dirc_commit(dir, "Second")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\[master [0-9a-f]{7}\] Second\n").unwrap())
        .stdout(predicate::str::contains(" delete mode 100644 b.txt\n create mode 100644 c.txt\n"));

    let second = read_head_commit(dir);
    assert_ne!(first, second);
    run_dirc_command(dir, &["cat-file", "-p", &second])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("parent {first}\n")));

    run_dirc_command(dir, &["diff-tree", "HEAD^", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("D\tb.txt\n"))
        .stdout(predicate::str::contains("A\tc.txt\n"));
}

#[rstest]
fn commit_fails_without_an_author(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    run_dirc_command(dir, &["add", "a.txt"]).assert().success();

    run_dirc_command(dir, &["commit", "-m", "No author"])
        .env_remove("GIT_AUTHOR_NAME")
        .env_remove("GIT_AUTHOR_EMAIL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GIT_AUTHOR_NAME"));

    init_repository_dir
        .child(".git/refs/heads/master")
        .assert(predicate::path::missing());
}

#[rstest]
fn commit_tree_builds_history_by_hand(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "hello.txt", "test content\n");
    run_dirc_command(dir, &["add", "hello.txt"]).assert().success();
    let tree = dirc_output_oid(dir, &["write-tree"]);

    let output = with_author(run_dirc_command(dir, &["commit-tree", "-m", "Root", &tree]))
        .output()
        .unwrap();
    assert!(output.status.success());
    let root = String::from_utf8(output.stdout).unwrap().trim().to_string();

    let output = with_author(run_dirc_command(
        dir,
        &["commit-tree", "-p", &root, "-m", "Child", &tree],
    ))
    .output()
    .unwrap();
    assert!(output.status.success());
    let child = String::from_utf8(output.stdout).unwrap().trim().to_string();

    run_dirc_command(dir, &["cat-file", "-p", &child])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("parent {root}\n")))
        .stdout(predicate::str::ends_with("\nChild\n"));

    // commit-tree leaves refs alone
    init_repository_dir
        .child(".git/refs/heads/master")
        .assert(predicate::path::missing());
}

#[rstest]
fn commit_tree_rejects_a_non_commit_parent(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    let tree = dirc_output_oid(dir, &["write-tree"]);

    with_author(run_dirc_command(
        dir,
        &["commit-tree", "-p", &tree, "-m", "Bad parent", &tree],
    ))
    .assert()
    .failure();
}
