mod common;

use tempfile::tempdir;

use common::{build_relation, collect_scan, open_index, sorted, test_config, ATTR_OFFSET};
use treeline::{AttrType, BTreeIndex, IndexError, Operator};

#[test]
fn point_load_indexes_every_tuple() {
    let tmp = tempdir().unwrap();
    let keys: Vec<i32> = (0..200).rev().collect();
    let pairs = build_relation(tmp.path(), "people", &keys);

    let (mut index, name) = open_index(tmp.path(), "people");
    assert_eq!(name, "people.4");
    assert!(tmp.path().join(&name).exists());

    let rids = collect_scan(&mut index, 0, Operator::Gte, 199, Operator::Lte);
    assert_eq!(rids.len(), 200);
    assert_eq!(
        sorted(rids),
        sorted(pairs.iter().map(|&(_, rid)| rid).collect())
    );
    index.close().unwrap();
}

#[test]
fn empty_relation_builds_an_empty_index() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "empty", &[]);

    let (mut index, _) = open_index(tmp.path(), "empty");
    let err = index
        .start_scan(i32::MIN, Operator::Gte, i32::MAX, Operator::Lte)
        .unwrap_err();
    assert!(matches!(err, IndexError::NoSuchKeyFound));
    assert_eq!(index.pinned_pages(), 0);
    index.close().unwrap();
}

#[test]
fn reopen_returns_identical_scan_results() {
    let tmp = tempdir().unwrap();
    let keys: Vec<i32> = (0..120).map(|i| (i * 37) % 120).collect();
    build_relation(tmp.path(), "people", &keys);

    let (mut index, _) = open_index(tmp.path(), "people");
    let before = collect_scan(&mut index, 10, Operator::Gt, 90, Operator::Lt);
    index.close().unwrap();

    let (mut index, _) = open_index(tmp.path(), "people");
    let after = collect_scan(&mut index, 10, Operator::Gt, 90, Operator::Lt);
    assert_eq!(before, after);
    index.close().unwrap();
}

#[test]
fn reopen_rejects_a_renamed_relation() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "people", &[1, 2, 3]);
    let (index, name) = open_index(tmp.path(), "people");
    index.close().unwrap();

    // The file now answers for a different relation than its meta names.
    std::fs::rename(tmp.path().join(&name), tmp.path().join("crew.4")).unwrap();
    let err = BTreeIndex::open(tmp.path(), "crew", 4, AttrType::Int, test_config()).unwrap_err();
    assert!(matches!(err, IndexError::BadIndexInfo(n) if n == "crew.4"));
}

#[test]
fn reopen_rejects_a_mismatched_attribute_offset() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "people", &[1, 2, 3]);
    let (index, name) = open_index(tmp.path(), "people");
    index.close().unwrap();

    std::fs::rename(tmp.path().join(&name), tmp.path().join("people.8")).unwrap();
    let err = BTreeIndex::open(tmp.path(), "people", 8, AttrType::Int, test_config()).unwrap_err();
    assert!(matches!(err, IndexError::BadIndexInfo(_)));
}

#[test]
fn missing_relation_fails_and_removes_the_index_file() {
    let tmp = tempdir().unwrap();
    let err = BTreeIndex::open(
        tmp.path(),
        "nowhere",
        ATTR_OFFSET,
        AttrType::Int,
        test_config(),
    )
    .unwrap_err();
    assert!(matches!(err, IndexError::File(_)));
    assert!(!tmp.path().join("nowhere.4").exists());
}

#[test]
fn unsupported_key_types_are_rejected_up_front() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "people", &[1]);
    let err = BTreeIndex::open(
        tmp.path(),
        "people",
        ATTR_OFFSET,
        AttrType::Double,
        test_config(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        IndexError::KeyTypeUnsupported(AttrType::Double)
    ));
    assert!(!tmp.path().join("people.4").exists());
}
