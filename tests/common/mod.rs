#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

pub const AUTHOR_NAME: &str = "fake_user";
pub const AUTHOR_EMAIL: &str = "fake_email@email.com";
pub const AUTHOR_DATE: &str = "2023-01-01 12:00:00 +0000";

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_dirc_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    repository_dir
}

pub fn run_dirc_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("dirc").expect("Failed to find dirc binary");
    cmd.current_dir(dir);
    cmd.env_remove("GIT_DIR");
    cmd.env_remove("GIT_INDEX_FILE");
    cmd.env_remove("DIRC_LOG");
    for variable in ["NAME", "EMAIL", "DATE"] {
        cmd.env_remove(format!("GIT_AUTHOR_{variable}"));
        cmd.env_remove(format!("GIT_COMMITTER_{variable}"));
    }
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn with_author(mut cmd: Command) -> Command {
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", AUTHOR_NAME),
        ("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL),
        ("GIT_AUTHOR_DATE", AUTHOR_DATE), // %Y-%m-%d %H:%M:%S %z
    ]);
    cmd
}

pub fn dirc_commit(dir: &Path, message: &str) -> Command {
    with_author(run_dirc_command(dir, &["commit", "-m", message]))
}

/// Run a command that prints a single object id and return it
pub fn dirc_output_oid(dir: &Path, args: &[&str]) -> String {
    let output = run_dirc_command(dir, args)
        .output()
        .expect("Failed to run dirc");
    assert!(
        output.status.success(),
        "dirc {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout)
        .expect("dirc printed invalid utf-8")
        .trim()
        .to_string()
}

pub fn write_file(dir: &Path, path: &str, content: &str) {
    let path = dir.join(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    std::fs::write(path, content).expect("Failed to write file");
}

/// Write `files_count` files with random names and content below `dir`
pub fn write_generated_files(dir: &Path, files_count: usize) -> Vec<(String, String)> {
    use fake::Fake;
    use fake::faker::lorem::en::{Word, Words};

    let mut files = Vec::with_capacity(files_count);
    for index in 0..files_count {
        let name = format!("{}-{index}.txt", Word().fake::<String>());
        let content = Words(5..10).fake::<Vec<String>>().join(" ");
        write_file(dir, &name, &content);
        files.push((name, content));
    }
    files.sort();
    files
}
