use assert_cmd::Command;
use covdb_sqlite::SqliteDb;
use covdb_testkit::{DbSpec, covergroup, snapshot, sqlite_db};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BIN: &str = "/cg:covergroup/cp:coverpoint";

fn write_db(dir: &Path, name: &str, bins: &[(&str, u64)], test: &str) -> PathBuf {
    let path = dir.join(name);
    let spec = DbSpec::new().scope(covergroup("cg", &[("cp", bins)])).test(test);
    drop(sqlite_db(&path, &spec).unwrap());
    path
}

fn covdb() -> Command {
    Command::cargo_bin("covdb").unwrap()
}

#[test]
fn merges_three_files_and_prints_summary() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let b = write_db(dir.path(), "b.cdb", &[("b0", 2), ("b1", 1)], "t2");
    let c = write_db(dir.path(), "c.cdb", &[("b2", 4)], "t3");
    let out = dir.path().join("merged.cdb");

    covdb()
        .args(["merge", "-o"])
        .arg(&out)
        .args([&a, &b, &c])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 3 databases"))
        .stdout(predicate::str::contains("2 relational, 0 object"));

    let merged = SqliteDb::open_read_only(&out).unwrap();
    let snap = snapshot(&merged).unwrap();
    assert_eq!(snap.hit(&format!("{BIN}#b0")), Some(3));
    assert_eq!(snap.hit(&format!("{BIN}#b2")), Some(4));
    assert_eq!(snap.test_records, 3);
    assert_eq!(snap.merge_records, 1);
    assert!(!dir.path().join("merged.cdb.partial").exists());

    // Inputs are never written to.
    let base = snapshot(&SqliteDb::open_read_only(&a).unwrap()).unwrap();
    assert_eq!(base.hit(&format!("{BIN}#b0")), Some(1));
}

#[test]
fn json_output_reports_stats() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let b = write_db(dir.path(), "b.cdb", &[("b0", 5)], "t2");
    let out = dir.path().join("merged.cdb");

    let assert = covdb()
        .args(["merge", "--json", "--no-history", "-o"])
        .arg(&out)
        .args([&a, &b])
        .assert()
        .success();
    let stats: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(stats["total_hits_added"], 5);
    assert_eq!(stats["cover_items_matched"], 1);
    assert_eq!(stats["tests_merged"], 0);
}

#[test]
fn file_list_supplies_inputs() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let b = write_db(dir.path(), "b.cdb", &[("b0", 1)], "t2");
    let list = dir.path().join("inputs.txt");
    std::fs::write(&list, format!("# nightly\n{}\n\n{}\n", a.display(), b.display())).unwrap();
    let out = dir.path().join("merged.cdb");

    covdb()
        .args(["merge", "--squash-history", "--lib", "/opt/vendor/libucis.so", "--file-list"])
        .arg(&list)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let snap = snapshot(&SqliteDb::open_read_only(&out).unwrap()).unwrap();
    assert_eq!(snap.hit(&format!("{BIN}#b0")), Some(2));
    // The base keeps its own test record; merged ones are only counted.
    assert_eq!(snap.test_records, 1);
    assert_eq!(snap.merge_records, 1);
}

#[test]
fn single_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let out = dir.path().join("merged.cdb");

    covdb()
        .args(["merge", "-o"])
        .arg(&out)
        .arg(&a)
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least two input databases"));
    assert!(!out.exists());
}

#[test]
fn output_may_not_be_an_input() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let b = write_db(dir.path(), "b.cdb", &[("b0", 1)], "t2");

    covdb()
        .args(["merge", "-o"])
        .arg(&b)
        .args([&a, &b])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is also an input"));
}

#[test]
fn missing_input_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let out = dir.path().join("merged.cdb");

    covdb()
        .args(["merge", "-o"])
        .arg(&out)
        .arg(&a)
        .arg(dir.path().join("absent.cdb"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.cdb"));
    assert!(!out.exists());
    assert!(!dir.path().join("merged.cdb.partial").exists());
}

#[test]
fn failed_merge_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let b = write_db(dir.path(), "b.cdb", &[("b0", 1)], "t2");
    SqliteDb::open(&b)
        .unwrap()
        .conn()
        .execute(
            "INSERT INTO scopes (parent_id, scope_type, scope_name) VALUES (NULL, 0, 'again')",
            [],
        )
        .unwrap();
    let out = dir.path().join("merged.cdb");

    covdb()
        .args(["merge", "-o"])
        .arg(&out)
        .args([&a, &b])
        .assert()
        .failure()
        .stderr(predicate::str::contains("root scopes"));
    assert!(!out.exists());
    assert!(!dir.path().join("merged.cdb.partial").exists());
}

#[test]
fn config_file_sets_options() {
    let dir = TempDir::new().unwrap();
    let a = write_db(dir.path(), "a.cdb", &[("b0", 1)], "t1");
    let b = write_db(dir.path(), "b.cdb", &[("b0", 1)], "t2");
    let config = dir.path().join("merge.yaml");
    std::fs::write(&config, "relational: disabled\ncreate_history: false\n").unwrap();
    let out = dir.path().join("merged.cdb");

    covdb()
        .args(["merge", "--config"])
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .args([&a, &b])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 relational, 1 object"));

    let snap = snapshot(&SqliteDb::open_read_only(&out).unwrap()).unwrap();
    assert_eq!((snap.test_records, snap.merge_records), (1, 0));
}
