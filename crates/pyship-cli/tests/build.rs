use std::fs::{self, File};
use std::io::Read;

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

mod common;

use common::{dist_names, parse_json, prepare_fixture, pyship, seed_stale_artifacts, EXPECTED_ARTIFACTS};

#[test]
fn build_replaces_stale_artifacts_with_current_release() {
    let (_temp, project) = prepare_fixture("pyship-build");
    seed_stale_artifacts(&project);

    let assert = pyship(&project)
        .env("SOURCE_DATE_EPOCH", "1700000000")
        .args(["--json", "build"])
        .assert()
        .success();
    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "ok", "{payload}");
    assert_eq!(payload["details"]["format"], "both");
    assert_eq!(dist_names(&project), EXPECTED_ARTIFACTS);

    let wheel = File::open(project.join("dist").join(EXPECTED_ARTIFACTS[0])).expect("wheel");
    let mut wheel = ZipArchive::new(wheel).expect("zip");
    let names: Vec<String> = wheel.file_names().map(ToString::to_string).collect();
    assert!(names.iter().any(|name| name == "pycebes/core/session.py"));
    assert!(!names.iter().any(|name| name.starts_with("tests/")));
    let mut tags = String::new();
    wheel
        .by_name("pycebes-2.0.dist-info/WHEEL")
        .expect("WHEEL")
        .read_to_string(&mut tags)
        .expect("read WHEEL");
    assert!(tags.contains("Tag: py2-none-any"));
    assert!(tags.contains("Tag: py3-none-any"));
    let mut metadata = String::new();
    wheel
        .by_name("pycebes-2.0.dist-info/METADATA")
        .expect("METADATA")
        .read_to_string(&mut metadata)
        .expect("read METADATA");
    assert!(metadata.contains("Requires-Dist: requests>=2.18"));
    assert!(metadata.contains("Requires-Python: >=2.7"));

    let sdist = File::open(project.join("dist").join(EXPECTED_ARTIFACTS[1])).expect("sdist");
    let mut archive = Archive::new(GzDecoder::new(sdist));
    let members: Vec<String> = archive
        .entries()
        .expect("entries")
        .map(|entry| entry.expect("entry").path().expect("path").display().to_string())
        .collect();
    for expected in [
        "pycebes-2.0/PKG-INFO",
        "pycebes-2.0/pyproject.toml",
        "pycebes-2.0/README.rst",
        "pycebes-2.0/LICENSE",
        "pycebes-2.0/pycebes/core/session.py",
    ] {
        assert!(members.iter().any(|m| m == expected), "missing {expected}: {members:?}");
    }
}

#[test]
fn build_is_reproducible_with_source_date_epoch() {
    let (_temp, project) = prepare_fixture("pyship-repro");
    let digest = |project: &std::path::Path| {
        pyship(project)
            .env("SOURCE_DATE_EPOCH", "1700000000")
            .args(["build", "wheel"])
            .assert()
            .success();
        fs::read(project.join("dist").join(EXPECTED_ARTIFACTS[0])).expect("wheel bytes")
    };
    let first = digest(&project);
    let second = digest(&project);
    assert_eq!(first, second);
}

#[test]
fn build_sdist_into_custom_directory_keeps_dist_untouched() {
    let (_temp, project) = prepare_fixture("pyship-out");
    seed_stale_artifacts(&project);

    pyship(&project)
        .args(["build", "sdist", "--out", "out"])
        .assert()
        .success();
    assert!(project.join("out/pycebes-2.0.tar.gz").is_file());
    assert!(!project.join("out/pycebes-2.0-py2.py3-none-any.whl").exists());
    assert_eq!(dist_names(&project).len(), 2, "dist/ should be left alone");
}

#[test]
fn no_clean_keeps_existing_files() {
    let (_temp, project) = prepare_fixture("pyship-noclean");
    seed_stale_artifacts(&project);

    pyship(&project)
        .args(["build", "--no-clean"])
        .assert()
        .success();
    assert_eq!(dist_names(&project).len(), 4);
}

#[test]
fn invalid_version_is_a_user_error() {
    let (_temp, project) = prepare_fixture("pyship-badversion");
    let manifest = project.join("pyproject.toml");
    let contents = fs::read_to_string(&manifest).expect("pyproject");
    fs::write(
        &manifest,
        contents.replace("version = \"2.0\"", "version = \"two\""),
    )
    .expect("rewrite pyproject");

    let assert = pyship(&project)
        .args(["--json", "build"])
        .assert()
        .code(1);
    let payload = parse_json(&assert);
    assert_eq!(payload["status"], "user-error");
    assert_eq!(payload["details"]["reason"], "invalid_version");
    assert!(dist_names(&project).is_empty());
}

#[test]
fn clean_on_missing_dist_succeeds() {
    let (_temp, project) = prepare_fixture("pyship-clean");
    let assert = pyship(&project).args(["--json", "clean"]).assert().success();
    let payload = parse_json(&assert);
    assert_eq!(payload["message"], "pyship clean: dist already empty");
}

#[test]
fn clean_empties_dist_even_with_broken_metadata() {
    let (_temp, project) = prepare_fixture("pyship-clean-broken");
    seed_stale_artifacts(&project);
    fs::write(project.join("pyproject.toml"), "[project]\nname = \"pycebes\"\n")
        .expect("rewrite pyproject");

    pyship(&project).arg("clean").assert().success();
    assert!(dist_names(&project).is_empty());
}

#[test]
fn missing_project_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    let assert = pyship(temp.path())
        .args(["--json", "build"])
        .assert()
        .code(1);
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "missing_project");
}

#[test]
fn clean_refuses_the_project_root_as_output() {
    let (_temp, project) = prepare_fixture("pyship-clean-root");
    let assert = pyship(&project)
        .env("PYSHIP_DIST_DIR", ".")
        .args(["--json", "clean"])
        .assert()
        .code(1);
    let payload = parse_json(&assert);
    assert_eq!(payload["details"]["reason"], "invalid_dist_dir");
    assert!(project.join("pyproject.toml").is_file());
    assert!(project.join("pycebes").is_dir());
}
