//! # s3zipper Archive Integration Tests
//!
//! File: cli/tests/archive.rs
//!
//! ## Overview
//!
//! End-to-end runs of the binary against the local storage backend:
//! archiving, skipping existing archives, overwriting, dry runs and the
//! exit status of a run with a failing dataset.
//!

mod common;
use common::*;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::Read;
use zip::ZipArchive;

const ARGS: &[&str] = &[
    "--bucket",
    "data",
    "--src-prefix",
    "raw/",
    "--dest-prefix",
    "out/",
];

fn seeded() -> LocalFixture {
    let fixture = LocalFixture::new();
    fixture.put("data", "raw/A/x.csv", b"a,b\n1,2\n");
    fixture.put("data", "raw/A/sub/y.csv", b"c\n3\n");
    fixture.put("data", "raw/B/z.csv", b"z\n");
    fixture
}

fn entry(fixture: &LocalFixture, key: &str, name: &str) -> String {
    let file = File::open(fixture.object_path("data", key)).expect("archive exists");
    let mut archive = ZipArchive::new(file).expect("valid zip");
    let mut body = String::new();
    archive
        .by_name(name)
        .expect("entry present")
        .read_to_string(&mut body)
        .expect("readable entry");
    body
}

#[test]
fn test_archives_every_dataset() {
    let fixture = seeded();
    fixture
        .cmd(ARGS)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 2 dataset folders under data/raw/"))
        .stdout(predicate::str::contains("Zipping A → data/out/A.zip"))
        .stdout(predicate::str::contains("Uploaded: data/out/B.zip"))
        .stdout(predicate::str::contains("2 uploaded, 0 skipped, 0 failed"));

    assert_eq!(entry(&fixture, "out/A.zip", "x.csv"), "a,b\n1,2\n");
    assert_eq!(entry(&fixture, "out/A.zip", "sub/y.csv"), "c\n3\n");
    assert_eq!(entry(&fixture, "out/B.zip", "z.csv"), "z\n");
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_second_run_skips_existing() {
    let fixture = seeded();
    fixture.cmd(ARGS).assert().success();
    let before = fs::read(fixture.object_path("data", "out/A.zip")).expect("archive A");

    fixture
        .cmd(ARGS)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exists, skipping: data/out/A.zip"))
        .stdout(predicate::str::contains("Exists, skipping: data/out/B.zip"))
        .stdout(predicate::str::contains("0 uploaded, 2 skipped, 0 failed"));
    let after = fs::read(fixture.object_path("data", "out/A.zip")).expect("archive A");
    assert_eq!(before, after);
}

#[test]
fn test_overwrite_replaces_existing() {
    let fixture = seeded();
    fixture.put("data", "out/B.zip", b"stale");

    let mut args = ARGS.to_vec();
    args.push("--overwrite");
    fixture
        .cmd(&args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exists, skipping").not());
    assert_eq!(entry(&fixture, "out/B.zip", "z.csv"), "z\n");
}

#[test]
fn test_dry_run_writes_nothing() {
    let fixture = seeded();
    fixture.put("data", "out/B.zip", b"existing");

    let mut args = ARGS.to_vec();
    args.push("--dry-run");
    fixture
        .cmd(&args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Would zip A → data/out/A.zip"))
        .stdout(predicate::str::contains("Exists, skipping: data/out/B.zip"));

    assert!(!fixture.object_path("data", "out/A.zip").exists());
    assert_eq!(
        fs::read(fixture.object_path("data", "out/B.zip")).expect("archive B"),
        b"existing"
    );
    assert!(fixture.scratch_is_empty());
}

#[test]
fn test_separate_destination_bucket() {
    let fixture = seeded();
    let mut args = ARGS.to_vec();
    args.extend(["--dest-bucket", "archives"]);
    fixture.cmd(&args).assert().success();

    assert!(fixture.object_path("archives", "out/A.zip").is_file());
    assert!(!fixture.object_path("data", "out/A.zip").exists());
}

#[test]
fn test_empty_prefix_reports_no_datasets() {
    let fixture = seeded();
    fixture
        .cmd(&[
            "--bucket",
            "data",
            "--src-prefix",
            "nothing-here/",
            "--dest-prefix",
            "out/",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("No dataset folders found (check prefix)."));
}

#[cfg(unix)]
#[test]
fn test_failed_dataset_sets_exit_status() {
    let fixture = seeded();
    // A directory where B's archive should go makes its upload fail.
    fs::create_dir_all(fixture.object_path("data", "out/B.zip/blocker")).expect("blocker dir");

    let mut args = ARGS.to_vec();
    args.push("--overwrite");
    fixture
        .cmd(&args)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("❌ Failed B during upload"))
        .stdout(predicate::str::contains("1 uploaded, 0 skipped, 1 failed"));
    assert!(fixture.object_path("data", "out/A.zip").is_file());
    assert!(fixture.scratch_is_empty());
}
