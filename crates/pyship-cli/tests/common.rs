#![allow(dead_code)]

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use assert_cmd::{assert::Assert, cargo::cargo_bin_cmd, Command};
use serde_json::Value;
use tempfile::TempDir;

/// Variables that would let a developer's shell leak into a test run.
const ISOLATED_ENV: [&str; 17] = [
    "PYSHIP_DIST_DIR",
    "PYSHIP_REPOSITORY",
    "PYSHIP_TOKEN",
    "PYSHIP_USERNAME",
    "PYSHIP_PASSWORD",
    "PYSHIP_PYTHON",
    "PYSHIP_KEEP_PROXIES",
    "PYSHIP_HTTP_TIMEOUT",
    "TWINE_USERNAME",
    "TWINE_PASSWORD",
    "SOURCE_DATE_EPOCH",
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
];

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

pub fn fixture_source() -> PathBuf {
    workspace_root().join("fixtures").join("pycebes")
}

pub fn prepare_fixture(prefix: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let dst = temp.path().join("pycebes");
    copy_dir_all(&fixture_source(), &dst).expect("copy fixture");
    (temp, dst)
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// `pyship` running inside `project` with a scrubbed environment.
pub fn pyship(project: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("pyship");
    cmd.current_dir(project).env("NO_COLOR", "1");
    for key in ISOLATED_ENV {
        cmd.env_remove(key);
    }
    cmd
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

pub fn dist_names(project: &Path) -> Vec<String> {
    let dist = project.join("dist");
    if !dist.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(dist)
        .expect("read dist")
        .map(|entry| {
            entry
                .expect("dist entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

pub fn seed_stale_artifacts(project: &Path) {
    let dist = project.join("dist");
    fs::create_dir_all(&dist).expect("dist dir");
    fs::write(dist.join("old-1.0.tar.gz"), b"stale sdist").expect("stale sdist");
    fs::write(dist.join("old-1.0-py2.py3-none-any.whl"), b"stale wheel").expect("stale wheel");
}

pub const EXPECTED_ARTIFACTS: [&str; 2] = ["pycebes-2.0-py2.py3-none-any.whl", "pycebes-2.0.tar.gz"];
