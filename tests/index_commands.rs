use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use rstest::rstest;

mod common;
use common::{init_repository_dir, run_dirc_command, write_file, write_generated_files};

#[rstest]
fn add_stages_every_file_below_a_directory(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    write_file(dir, "dir/b.txt", "two\n");
    write_file(dir, "dir/nested/c.txt", "three\n");

    run_dirc_command(dir, &["add", "."]).assert().success();

    run_dirc_command(dir, &["ls-files"])
        .assert()
        .success()
        .stdout("a.txt\ndir/b.txt\ndir/nested/c.txt\n");
    init_repository_dir
        .child(".git/objects/56/26abf0f72e58d7a153368ba57db4c673c0e171")
        .assert(predicate::path::is_file());
}

#[rstest]
fn add_lists_generated_files_in_order(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    let files = write_generated_files(dir, 5);

    run_dirc_command(dir, &["add", "."]).assert().success();

    let expected = files
        .iter()
        .map(|(name, _)| format!("{name}\n"))
        .collect::<String>();
    run_dirc_command(dir, &["ls-files"])
        .assert()
        .success()
        .stdout(expected);
}

#[rstest]
fn add_fails_for_unknown_paths(init_repository_dir: TempDir) {
    run_dirc_command(init_repository_dir.path(), &["add", "missing.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pathspec 'missing.txt' did not match any files"));

    init_repository_dir
        .child(".git/index")
        .assert(predicate::path::missing());
}

#[rstest]
fn ls_files_stage_shows_mode_oid_and_stage(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "hello.txt", "test content\n");

    run_dirc_command(dir, &["add", "hello.txt"]).assert().success();

    run_dirc_command(dir, &["ls-files", "--stage"])
        .assert()
        .success()
        .stdout("100644 d670460b4b4aece5915caf5c68d12f560a9fe3e4 0\thello.txt\n");
}

#[rstest]
fn update_index_requires_add_for_new_paths(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "new.txt", "fresh\n");

    run_dirc_command(dir, &["update-index", "new.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "new.txt: cannot add to the index - missing --add option?",
        ));

    run_dirc_command(dir, &["update-index", "--add", "new.txt"])
        .assert()
        .success();
    run_dirc_command(dir, &["ls-files"])
        .assert()
        .success()
        .stdout("new.txt\n");
}

#[rstest]
fn update_index_remove_drops_deleted_files(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    write_file(dir, "b.txt", "two\n");
    run_dirc_command(dir, &["add", "."]).assert().success();
    std::fs::remove_file(dir.join("a.txt")).unwrap();

    run_dirc_command(dir, &["update-index", "a.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("a.txt: does not exist and --remove not passed"));

    run_dirc_command(dir, &["update-index", "--remove", "a.txt"])
        .assert()
        .success();
    run_dirc_command(dir, &["ls-files"])
        .assert()
        .success()
        .stdout("b.txt\n");
}

#[rstest]
fn update_index_cacheinfo_stages_without_a_file(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();

    run_dirc_command(
        dir,
        &[
            "update-index",
            "--add",
            "--cacheinfo",
            "100755,d670460b4b4aece5915caf5c68d12f560a9fe3e4,bin/run.sh",
        ],
    )
    .assert()
    .success();

    run_dirc_command(dir, &["ls-files", "-s"])
        .assert()
        .success()
        .stdout("100755 d670460b4b4aece5915caf5c68d12f560a9fe3e4 0\tbin/run.sh\n");
}

#[rstest]
fn rm_removes_from_index_and_working_tree(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    write_file(dir, "b.txt", "two\n");
    run_dirc_command(dir, &["add", "."]).assert().success();

    run_dirc_command(dir, &["rm", "a.txt"])
        .assert()
        .success()
        .stdout("rm 'a.txt'\n");

    init_repository_dir.child("a.txt").assert(predicate::path::missing());
    run_dirc_command(dir, &["ls-files"])
        .assert()
        .success()
        .stdout("b.txt\n");
}

#[rstest]
fn rm_cached_keeps_the_file(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "a.txt", "one\n");
    run_dirc_command(dir, &["add", "a.txt"]).assert().success();

    run_dirc_command(dir, &["rm", "--cached", "a.txt"])
        .assert()
        .success();

    init_repository_dir.child("a.txt").assert("one\n");
    run_dirc_command(dir, &["ls-files"]).assert().success().stdout("");
}

#[rstest]
fn rm_directory_needs_recursive_flag(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "dir/a.txt", "one\n");
    write_file(dir, "dir/b.txt", "two\n");
    run_dirc_command(dir, &["add", "dir"]).assert().success();

    run_dirc_command(dir, &["rm", "dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not removing 'dir' recursively without -r"));

    run_dirc_command(dir, &["rm", "-r", "--cached", "dir"])
        .assert()
        .success()
        .stdout("rm 'dir/a.txt'\nrm 'dir/b.txt'\n");
}

#[rstest]
fn corrupted_index_is_rejected(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "hello.txt", "test content\n");
    run_dirc_command(dir, &["add", "hello.txt"]).assert().success();

    let index = init_repository_dir.child(".git/index");
    let mut data = std::fs::read(index.path()).unwrap();
    // flip a byte inside the first entry
    data[20] ^= 0xff;
    index.write_binary(&data).unwrap();

    run_dirc_command(dir, &["ls-files"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupted index"));
}

#[rstest]
fn index_version_is_kept_when_rewritten(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    write_file(dir, "hello.txt", "test content\n");
    run_dirc_command(dir, &["add", "hello.txt"]).assert().success();

    let index = std::fs::read(dir.join(".git/index")).unwrap();
    assert_eq!(&index[..4], b"DIRC");
    assert_eq!(&index[4..8], &2u32.to_be_bytes());
}
