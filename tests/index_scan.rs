mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use common::{build_relation, collect_scan, open_index, sorted};
use treeline::{IndexError, Operator, RecordId};

#[test]
fn single_insert_then_closed_scan() {
    let tmp = tempdir().unwrap();
    let pairs = build_relation(tmp.path(), "people", &[42]);

    let (mut index, _) = open_index(tmp.path(), "people");
    index
        .start_scan(42, Operator::Gte, 42, Operator::Lte)
        .unwrap();
    assert_eq!(index.scan_next().unwrap(), pairs[0].1);
    assert!(matches!(
        index.scan_next().unwrap_err(),
        IndexError::ScanComplete
    ));
    index.end_scan().unwrap();
    index.close().unwrap();
}

#[test]
fn strict_operators_exclude_the_bounds() {
    let tmp = tempdir().unwrap();
    let pairs = build_relation(tmp.path(), "people", &[1, 2, 3]);

    let (mut index, _) = open_index(tmp.path(), "people");
    let rids = collect_scan(&mut index, 1, Operator::Gt, 3, Operator::Lt);
    assert_eq!(rids, vec![pairs[1].1]);
    index.close().unwrap();
}

#[test]
fn scan_beyond_all_keys_finds_nothing() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "people", &[10, 20, 30]);

    let (mut index, _) = open_index(tmp.path(), "people");
    let err = index
        .start_scan(40, Operator::Gte, 50, Operator::Lte)
        .unwrap_err();
    assert!(matches!(err, IndexError::NoSuchKeyFound));
    assert_eq!(index.pinned_pages(), 0);
    index.close().unwrap();
}

#[test]
fn invalid_ranges_and_operators_are_rejected() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "people", &[1]);

    let (mut index, _) = open_index(tmp.path(), "people");
    assert!(matches!(
        index
            .start_scan(10, Operator::Gte, 5, Operator::Lte)
            .unwrap_err(),
        IndexError::BadScanRange
    ));
    assert!(matches!(
        index
            .start_scan(0, Operator::Lt, 5, Operator::Lte)
            .unwrap_err(),
        IndexError::BadOpcodes
    ));
    assert!(matches!(
        index
            .start_scan(0, Operator::Gte, 5, Operator::Gt)
            .unwrap_err(),
        IndexError::BadOpcodes
    ));
    index.close().unwrap();
}

#[test]
fn scan_calls_without_a_scan_fail() {
    let tmp = tempdir().unwrap();
    build_relation(tmp.path(), "people", &[1]);

    let (mut index, _) = open_index(tmp.path(), "people");
    assert!(matches!(
        index.scan_next().unwrap_err(),
        IndexError::ScanNotInitialized
    ));
    assert!(matches!(
        index.end_scan().unwrap_err(),
        IndexError::ScanNotInitialized
    ));
    index.close().unwrap();
}

#[test]
fn starting_a_scan_ends_the_previous_one() {
    let tmp = tempdir().unwrap();
    let pairs = build_relation(tmp.path(), "people", &[1, 2, 3, 4, 5]);

    let (mut index, _) = open_index(tmp.path(), "people");
    index
        .start_scan(1, Operator::Gte, 5, Operator::Lte)
        .unwrap();
    index.scan_next().unwrap();
    assert_eq!(index.pinned_pages(), 1);

    index
        .start_scan(4, Operator::Gte, 5, Operator::Lte)
        .unwrap();
    assert_eq!(index.pinned_pages(), 1);
    assert_eq!(index.scan_next().unwrap(), pairs[3].1);
    index.end_scan().unwrap();
    assert_eq!(index.pinned_pages(), 0);
    index.close().unwrap();
}

#[test]
fn duplicate_keys_are_all_returned() {
    let tmp = tempdir().unwrap();
    let mut keys = vec![7; 60];
    keys.extend([1, 3, 9, 7, 7]);
    let pairs = build_relation(tmp.path(), "people", &keys);

    let (mut index, _) = open_index(tmp.path(), "people");
    let rids = collect_scan(&mut index, 7, Operator::Gte, 7, Operator::Lte);
    let expected: Vec<RecordId> = pairs
        .iter()
        .filter(|&&(key, _)| key == 7)
        .map(|&(_, rid)| rid)
        .collect();
    assert_eq!(rids.len(), 62);
    assert_eq!(sorted(rids), sorted(expected));
    index.close().unwrap();
}

#[test]
fn incremental_inserts_join_loaded_entries() {
    let tmp = tempdir().unwrap();
    let pairs = build_relation(tmp.path(), "people", &[10, 30]);

    let (mut index, _) = open_index(tmp.path(), "people");
    let extra = RecordId {
        page_no: 900,
        slot_no: 3,
    };
    index.insert_entry(20, extra).unwrap();

    let rids = collect_scan(&mut index, 10, Operator::Gte, 30, Operator::Lte);
    assert_eq!(rids, vec![pairs[0].1, extra, pairs[1].1]);
    index.close().unwrap();
}

#[test]
fn range_iterator_yields_matches_and_releases_the_cursor() {
    let tmp = tempdir().unwrap();
    let pairs = build_relation(tmp.path(), "people", &[5, 6, 7, 8]);

    let (mut index, _) = open_index(tmp.path(), "people");
    {
        let rids: Vec<RecordId> = index
            .range(6, Operator::Gte, 7, Operator::Lte)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rids, vec![pairs[1].1, pairs[2].1]);
    }
    assert_eq!(index.pinned_pages(), 0);
    index.close().unwrap();
}

#[test]
fn scan_bounds_law_over_random_multisets() {
    let tmp = tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let keys: Vec<i32> = (0..300).map(|_| rng.gen_range(-40..40)).collect();
    let pairs = build_relation(tmp.path(), "people", &keys);

    let (mut index, _) = open_index(tmp.path(), "people");
    let ops = [
        (Operator::Gt, Operator::Lt),
        (Operator::Gt, Operator::Lte),
        (Operator::Gte, Operator::Lt),
        (Operator::Gte, Operator::Lte),
    ];
    for _ in 0..40 {
        let a = rng.gen_range(-50..50);
        let b = rng.gen_range(-50..50);
        let (low, high) = (a.min(b), a.max(b));
        for (low_op, high_op) in ops {
            let got = collect_scan(&mut index, low, low_op, high, high_op);
            let expected: Vec<RecordId> = pairs
                .iter()
                .filter(|&&(key, _)| {
                    let low_ok = if low_op == Operator::Gt {
                        key > low
                    } else {
                        key >= low
                    };
                    let high_ok = if high_op == Operator::Lt {
                        key < high
                    } else {
                        key <= high
                    };
                    low_ok && high_ok
                })
                .map(|&(_, rid)| rid)
                .collect();
            assert_eq!(
                sorted(got),
                sorted(expected),
                "bounds {low:?}{low_op:?}..{high:?}{high_op:?}"
            );
        }
    }
    index.close().unwrap();
}

#[test]
fn insert_then_scan_returns_the_full_multiset() {
    let tmp = tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let keys: Vec<i32> = (0..400).map(|_| rng.gen_range(-1000..1000)).collect();
    let pairs = build_relation(tmp.path(), "people", &keys);

    let min = *keys.iter().min().unwrap();
    let max = *keys.iter().max().unwrap();
    let (mut index, _) = open_index(tmp.path(), "people");
    let rids = collect_scan(&mut index, min, Operator::Gte, max, Operator::Lte);
    assert_eq!(rids.len(), keys.len());
    assert_eq!(
        sorted(rids),
        sorted(pairs.iter().map(|&(_, rid)| rid).collect())
    );
    index.close().unwrap();
}
