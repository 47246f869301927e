#![allow(dead_code)]

use std::path::Path;

use treeline::{
    AttrType, BTreeIndex, IndexConfig, IndexError, Operator, RecordId, RelationFile,
};

pub const PAGE_SIZE: usize = 512;
pub const RECORD_SIZE: usize = 16;
pub const ATTR_OFFSET: usize = 4;

pub fn test_config() -> IndexConfig {
    IndexConfig {
        page_size: PAGE_SIZE,
        pool_capacity: 64,
    }
}

/// Build a relation holding one 16-byte record per key, with the key
/// little-endian at `ATTR_OFFSET`. Returns `(key, rid)` pairs in
/// insertion order.
pub fn build_relation(dir: &Path, name: &str, keys: &[i32]) -> Vec<(i32, RecordId)> {
    let mut relation = RelationFile::create(dir.join(name), PAGE_SIZE, RECORD_SIZE).unwrap();
    let mut pairs = Vec::with_capacity(keys.len());
    for &key in keys {
        let mut record = [0u8; RECORD_SIZE];
        record[ATTR_OFFSET..ATTR_OFFSET + 4].copy_from_slice(&key.to_le_bytes());
        let rid = relation.append(&record).unwrap();
        pairs.push((key, rid));
    }
    relation.close().unwrap();
    pairs
}

pub fn open_index(dir: &Path, relation: &str) -> (BTreeIndex, String) {
    BTreeIndex::open(dir, relation, ATTR_OFFSET, AttrType::Int, test_config()).unwrap()
}

/// Drive a full scan, returning the matched rids in scan order. An
/// unpositionable scan counts as no matches.
pub fn collect_scan(
    index: &mut BTreeIndex,
    low: i32,
    low_op: Operator,
    high: i32,
    high_op: Operator,
) -> Vec<RecordId> {
    match index.start_scan(low, low_op, high, high_op) {
        Ok(()) => {}
        Err(IndexError::NoSuchKeyFound) => return Vec::new(),
        Err(err) => panic!("start_scan failed: {err}"),
    }
    let mut rids = Vec::new();
    loop {
        match index.scan_next() {
            Ok(rid) => rids.push(rid),
            Err(IndexError::ScanComplete) => break,
            Err(err) => panic!("scan_next failed: {err}"),
        }
    }
    index.end_scan().unwrap();
    rids
}

/// Sort rids into a canonical order for multiset comparisons.
pub fn sorted(mut rids: Vec<RecordId>) -> Vec<RecordId> {
    rids.sort_by_key(|rid| (rid.page_no, rid.slot_no));
    rids
}
