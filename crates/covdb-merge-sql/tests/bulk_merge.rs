use covdb_mem::MemoryDb;
use covdb_merge::MergeError;
use covdb_merge_sql::{BulkMerger, can_merge, merge, merge_many};
use covdb_ports::CoverageDb;
use covdb_schema::{HistoryKind, MergeOptions, PropertyValue, RelationalMode, ScopeKind, TESTS_MERGED_KEY};
use covdb_sqlite::SqliteDb;
use covdb_testkit::{DbSpec, ScopeNode, covergroup, populate, snapshot, sqlite_db};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CP: &str = "/cg:covergroup/cp:coverpoint";

fn one_bin(name: &str, hits: u64) -> DbSpec {
    DbSpec::new().scope(covergroup("cg", &[("cp", &[(name, hits)])]))
}

fn write(dir: &TempDir, name: &str, spec: &DbSpec) -> PathBuf {
    let path = dir.path().join(name);
    drop(sqlite_db(&path, spec).unwrap());
    path
}

fn read_only(path: &Path) -> SqliteDb {
    SqliteDb::open_read_only(path).unwrap()
}

#[test]
fn matched_bin_accumulates() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &one_bin("b0", 10)).unwrap();
    let src = read_only(&write(&dir, "s.cdb", &one_bin("b0", 7)));

    let stats = BulkMerger::new(MergeOptions::default())
        .merge(&mut tgt, &src)
        .unwrap();

    assert_eq!(snapshot(&tgt).unwrap().hit(&format!("{CP}#b0")), Some(17));
    assert_eq!(stats.scopes_matched, 2);
    assert_eq!(stats.cover_items_matched, 1);
    assert_eq!(stats.cover_items_added, 0);
    assert_eq!(stats.total_hits_added, 7);
    assert_eq!(stats.relational_merges, 1);
    assert!(!tgt.in_transaction());
}

#[test]
fn empty_target_receives_whole_chain() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &DbSpec::new()).unwrap();
    let src = read_only(&write(&dir, "s.cdb", &one_bin("x", 5)));

    let stats = BulkMerger::new(MergeOptions::default())
        .merge(&mut tgt, &src)
        .unwrap();

    let snap = snapshot(&tgt).unwrap();
    assert_eq!(snap.hit(&format!("{CP}#x")), Some(5));
    assert_eq!(stats.scopes_added, 2);
    assert_eq!(stats.cover_items_added, 1);
}

#[test]
fn merging_a_copy_of_itself_doubles_every_count() {
    let dir = TempDir::new().unwrap();
    let spec = DbSpec::new()
        .scope(covergroup("cg", &[("cp", &[("a", 3), ("b", 0)]), ("cp2", &[("c", 11)])]))
        .scope(ScopeNode::new("top", ScopeKind::Instance).bin("stmt", 2));
    let original = write(&dir, "orig.cdb", &spec);
    let copy = dir.path().join("copy.cdb");
    std::fs::copy(&original, &copy).unwrap();

    let mut tgt = SqliteDb::open(&original).unwrap();
    let before = snapshot(&tgt).unwrap();
    let rows_before = tgt.scope_count().unwrap();
    let stats = BulkMerger::new(MergeOptions::without_history())
        .merge(&mut tgt, &read_only(&copy))
        .unwrap();
    let after = snapshot(&tgt).unwrap();

    // Paths collapse in a snapshot, so count rows to catch duplicate siblings.
    assert_eq!(tgt.scope_count().unwrap(), rows_before);
    assert_eq!(after.items, before.items);
    assert_eq!(after.scopes, before.scopes);
    for (key, hits) in &before.hits {
        assert_eq!(after.hits[key], hits * 2, "{key}");
    }
    assert_eq!(stats.cover_items_added, 0);
    assert_eq!(stats.scopes_added, 0);
}

#[test]
fn in_memory_source_falls_back_to_object_driver() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &one_bin("b0", 1)).unwrap();
    let mut mem = MemoryDb::new("mem");
    populate(&mut mem, &one_bin("b0", 4)).unwrap();
    assert!(!can_merge(&tgt, &mem));

    let stats = merge(&mut tgt, &mem, &MergeOptions::default()).unwrap();
    assert_eq!(stats.object_merges, 1);
    assert_eq!(stats.relational_merges, 0);
    assert_eq!(snapshot(&tgt).unwrap().hit(&format!("{CP}#b0")), Some(5));
}

#[test]
fn required_mode_rejects_ineligible_source_before_writing() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &DbSpec::new()).unwrap();
    let mem = MemoryDb::new("mem");
    let before = snapshot(&tgt).unwrap();

    let options = MergeOptions::default().with_relational(RelationalMode::Required);
    let err = merge(&mut tgt, &mem, &options).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MergeError>(),
        Some(MergeError::RelationalUnavailable { source_name, .. }) if source_name == "memory:mem"
    ));
    assert_eq!(snapshot(&tgt).unwrap(), before);
}

#[test]
fn disabled_mode_uses_object_driver_for_eligible_sources() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &DbSpec::new()).unwrap();
    let src = read_only(&write(&dir, "s.cdb", &one_bin("b", 1)));
    assert!(can_merge(&tgt, &src));

    let options = MergeOptions::default().with_relational(RelationalMode::Disabled);
    let stats = merge(&mut tgt, &src, &options).unwrap();
    assert_eq!((stats.relational_merges, stats.object_merges), (0, 1));
}

#[test]
fn batch_mixes_drivers_and_keeps_one_merge_record() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &one_bin("b0", 1)).unwrap();
    let a = read_only(&write(&dir, "a.cdb", &one_bin("b0", 2).test("t1")));
    let mut mem = MemoryDb::new("mem");
    populate(&mut mem, &one_bin("b1", 3).test("t2")).unwrap();
    let c = read_only(&write(&dir, "c.cdb", &one_bin("b0", 4).test("t3")));

    let sources: [&dyn CoverageDb; 3] = [&a, &mem, &c];
    let stats = merge_many(&mut tgt, &sources, &MergeOptions::default()).unwrap();

    assert_eq!((stats.relational_merges, stats.object_merges), (2, 1));
    assert_eq!(stats.tests_merged, 3);
    assert_eq!(stats.history_nodes_merged, 3);
    let snap = snapshot(&tgt).unwrap();
    assert_eq!(snap.hit(&format!("{CP}#b0")), Some(7));
    assert_eq!(snap.hit(&format!("{CP}#b1")), Some(3));
    assert_eq!(snap.items, 2);
    assert_eq!((snap.test_records, snap.merge_records), (3, 1));

    let merge_id = tgt.history_nodes(Some(HistoryKind::Merge)).unwrap()[0];
    for id in tgt.history_nodes(Some(HistoryKind::Test)).unwrap() {
        assert_eq!(tgt.history_node(id).unwrap().parent, Some(merge_id));
    }
}

#[test]
fn squash_counts_tests_across_relational_merges() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &DbSpec::new()).unwrap();
    let merger = BulkMerger::new(MergeOptions::squashed());
    for (i, test) in ["t1", "t2", "t3"].iter().enumerate() {
        let src = read_only(&write(&dir, &format!("s{i}.cdb"), &one_bin("b", 1).test(test)));
        merger.merge(&mut tgt, &src).unwrap();
    }

    assert!(tgt.history_nodes(Some(HistoryKind::Test)).unwrap().is_empty());
    let merges = tgt.history_nodes(Some(HistoryKind::Merge)).unwrap();
    assert_eq!(merges.len(), 1);
    assert_eq!(
        tgt.history_int_property(merges[0], TESTS_MERGED_KEY).unwrap(),
        Some(3)
    );
}

#[test]
fn failure_rolls_back_and_detaches() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &one_bin("b0", 1)).unwrap();
    let src = read_only(&write(&dir, "s.cdb", &one_bin("b0", 1)));
    let before = snapshot(&tgt).unwrap();

    let options = MergeOptions {
        max_mapping_iterations: 1,
        ..MergeOptions::default()
    };
    let err = BulkMerger::new(options).merge(&mut tgt, &src).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MergeError>(),
        Some(MergeError::InvalidInput(_))
    ));

    assert_eq!(snapshot(&tgt).unwrap(), before);
    assert!(!tgt.in_transaction());
    let attached: i64 = tgt
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM pragma_database_list WHERE name = 'src'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(attached, 0);
}

#[test]
fn scope_properties_follow_the_mapping() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(
        &dir.path().join("t.cdb"),
        &DbSpec::new().scope(
            ScopeNode::new("top", ScopeKind::Instance).property("owner", PropertyValue::Str("a".into())),
        ),
    )
    .unwrap();
    let src = read_only(&write(
        &dir,
        "s.cdb",
        &DbSpec::new().scope(
            ScopeNode::new("top", ScopeKind::Instance)
                .property("owner", PropertyValue::Str("b".into()))
                .property("seed", PropertyValue::Int(9)),
        ),
    ));

    BulkMerger::new(MergeOptions::without_history())
        .merge(&mut tgt, &src)
        .unwrap();

    let root = tgt.root().unwrap();
    let top = tgt
        .child_scopes(root, covdb_schema::ScopeMask::ALL)
        .unwrap()[0];
    assert_eq!(
        tgt.scope_properties(top).unwrap(),
        vec![
            ("owner".to_string(), PropertyValue::Str("b".into())),
            ("seed".to_string(), PropertyValue::Int(9)),
        ]
    );
}

#[test]
fn stats_shape_is_stable() {
    let dir = TempDir::new().unwrap();
    let mut tgt = sqlite_db(&dir.path().join("t.cdb"), &one_bin("b0", 10)).unwrap();
    let src = read_only(&write(
        &dir,
        "s.cdb",
        &DbSpec::new()
            .scope(covergroup("cg", &[("cp", &[("b0", 7), ("b1", 2)])]))
            .test("t1"),
    ));
    let stats = BulkMerger::new(MergeOptions::default())
        .merge(&mut tgt, &src)
        .unwrap();
    insta::assert_json_snapshot!(stats.without_timing(), @r#"
    {
      "scopes_matched": 2,
      "scopes_added": 0,
      "cover_items_matched": 1,
      "cover_items_added": 1,
      "cover_items_skipped": 0,
      "total_hits_added": 9,
      "tests_merged": 1,
      "history_nodes_merged": 1,
      "duration_ms": 0,
      "relational_merges": 1,
      "object_merges": 0
    }
    "#);
}
