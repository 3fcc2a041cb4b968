#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const HEADER: &str =
    "op, student, teacher, class, payment, voucher, title, price, start, duration, max_students";

fn run(db_path: &std::path::Path, rows: &[&str]) -> String {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "{HEADER}").unwrap();
    for row in rows {
        writeln!(csv, "{row}").unwrap();
    }

    let mut cmd = Command::new(cargo_bin!("classroll"));
    cmd.arg(csv.path())
        .arg("--db-path")
        .arg(db_path)
        .arg("--seed")
        .arg("tests/fixtures/seed.json")
        .arg("--now")
        .arg("2030-01-01T08:00:00Z");

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: create a class and take one seat with a voucher
    let stdout1 = run(
        &db_path,
        &[
            "create_class, , t-1, yoga, , , Yoga, 15, 2030-01-03T10:00:00Z, 60, 2",
            "enroll, s-2, , yoga, voucher, v-1",
        ],
    );
    assert!(stdout1.contains("yoga,Yoga,t-1,2030-01-03T10:00:00Z,1,2"));

    // 2. Second run against the same DB: the class and the spent credit are still there
    let stdout2 = run(
        &db_path,
        &[
            "enroll, s-1, , yoga",
            "enroll, s-3, , yoga",
            "create_class, , t-1, late, , , Late, 15, 2030-01-03T10:30:00Z, 60,",
        ],
    );
    assert!(stdout2.contains("yoga,Yoga,t-1,2030-01-03T10:00:00Z,2,2"));
    assert!(!stdout2.contains("late"));
}
