//! Shared helpers for integration tests that drive the real git binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// True when a usable `git` is on PATH; tests bail out quietly otherwise.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub fn git(args: &[&str], cwd: &Path) {
    let status = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("failed to run git");
    assert!(
        status.success(),
        "git {:?} failed in {}",
        args,
        cwd.display()
    );
}

pub fn git_stdout(args: &[&str], cwd: &Path) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to run git");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn commit_file(repo: &Path, file: &str, message: &str) {
    std::fs::write(repo.join(file), message).expect("write file");
    git(&["add", "."], repo);
    git(
        &[
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "-m",
            message,
        ],
        repo,
    );
}

/// Create a source repository with one initial commit.
pub fn init_source_repo(root: &Path, name: &str) -> PathBuf {
    let src = root.join(name);
    std::fs::create_dir_all(&src).expect("create source dir");
    git(&["init"], &src);
    commit_file(&src, "README.md", "first");
    src
}

/// Full ref listing (name + target hash), for comparing ref sets.
pub fn ref_list(repo: &Path) -> String {
    git_stdout(&["for-each-ref", "--format=%(refname) %(objectname)"], repo)
}

/// file:// URL for a local path, the way a provider would hand one out.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
