pub mod check;
pub mod layout;
pub mod scan;

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::errors::{BufferError, FileError, IndexError};
use crate::relation::{RecordId, RelationFile};
use crate::storage::buffer::{BufferManager, BufferPoolConfig};
use crate::storage::file::{PageId, PagedFile, INVALID_PAGE_NO};

use self::layout::{
    leaf_capacity, leaf_insert, leaf_probe, leaf_split, nonleaf_capacity, nonleaf_insert,
    nonleaf_probe, nonleaf_split, separator_slot, stored_relation_name, AttrType, LeafNode,
    MetaPage, NonLeafNode,
};
use self::scan::ScanState;

/// Sizing knobs for an index: the on-disk page size (fixed at creation)
/// and the number of buffer-pool frames.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub page_size: usize,
    pub pool_capacity: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            pool_capacity: 256,
        }
    }
}

/// Derive the index file name for a relation/attribute pair.
pub fn index_name(relation_name: &str, attr_byte_offset: usize) -> String {
    format!("{relation_name}.{attr_byte_offset}")
}

/// A split propagated upward during recursive insert: the separator to
/// hand to the parent and the freshly allocated right sibling.
#[derive(Debug, Clone, Copy)]
struct Split {
    key: i32,
    right_page_no: PageId,
}

/// A disk-resident B+ tree mapping an integer attribute of a base
/// relation to record identifiers.
#[derive(Debug)]
pub struct BTreeIndex {
    bufmgr: BufferManager,
    index_name: String,
    header_page_no: PageId,
    root_page_no: PageId,
    root_is_leaf: bool,
    attr_byte_offset: usize,
    leaf_cap: usize,
    nonleaf_cap: usize,
    pub(crate) scan: Option<ScanState>,
    closed: bool,
}

impl BTreeIndex {
    /// Open the index over `relation_name`'s attribute at
    /// `attr_byte_offset`, creating and point-loading it from the
    /// relation if it does not exist yet. Returns the handle and the
    /// index file name.
    ///
    /// Reopening validates the stored metadata against the arguments and
    /// fails with [`IndexError::BadIndexInfo`] on any disagreement.
    pub fn open<P: AsRef<Path>>(
        dir: P,
        relation_name: &str,
        attr_byte_offset: usize,
        attr_type: AttrType,
        config: IndexConfig,
    ) -> Result<(Self, String), IndexError> {
        if attr_type != AttrType::Int {
            return Err(IndexError::KeyTypeUnsupported(attr_type));
        }

        let name = index_name(relation_name, attr_byte_offset);
        let index_path = dir.as_ref().join(&name);
        match PagedFile::create(&index_path, config.page_size) {
            Ok(file) => {
                let relation_path = dir.as_ref().join(relation_name);
                let built = Self::build(
                    file,
                    &relation_path,
                    relation_name,
                    attr_byte_offset,
                    attr_type,
                    &config,
                    name.clone(),
                );
                match built {
                    Ok(index) => Ok((index, name)),
                    Err(err) => {
                        // A half-built index must not be trusted by a
                        // later open; remove the file before surfacing
                        // the error.
                        if let Err(rm_err) = std::fs::remove_file(&index_path) {
                            warn!(
                                index = %name,
                                error = %rm_err,
                                "failed to remove partially built index file"
                            );
                        }
                        Err(err)
                    }
                }
            }
            Err(FileError::Exists(_)) => {
                let file = PagedFile::open(&index_path)?;
                let index = Self::reopen(
                    file,
                    relation_name,
                    attr_byte_offset,
                    attr_type,
                    &config,
                    name.clone(),
                )?;
                Ok((index, name))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn build(
        file: PagedFile,
        relation_path: &Path,
        relation_name: &str,
        attr_byte_offset: usize,
        attr_type: AttrType,
        config: &IndexConfig,
        name: String,
    ) -> Result<Self, IndexError> {
        let page_size = file.page_size();
        let bufmgr = BufferManager::new(
            file,
            BufferPoolConfig {
                capacity_pages: config.pool_capacity,
            },
        );

        let mut header = bufmgr.alloc_page()?;
        let header_page_no = header.page_no();
        let mut root = bufmgr.alloc_page()?;
        let root_page_no = root.page_no();

        LeafNode::init(root.payload_mut())?;
        bufmgr.unpin_page(root, true)?;

        {
            let mut meta = MetaPage::init(
                header.payload_mut(),
                relation_name,
                attr_byte_offset,
                attr_type,
            )?;
            meta.set_root_page_no(root_page_no)?;
            meta.set_root_is_leaf(true)?;
        }
        bufmgr.unpin_page(header, true)?;

        let mut index = Self {
            bufmgr,
            index_name: name,
            header_page_no,
            root_page_no,
            root_is_leaf: true,
            attr_byte_offset,
            leaf_cap: leaf_capacity(page_size),
            nonleaf_cap: nonleaf_capacity(page_size),
            scan: None,
            closed: false,
        };
        index.load_relation(relation_path)?;
        Ok(index)
    }

    /// Point load: one insert per tuple of the base relation.
    fn load_relation(&mut self, relation_path: &Path) -> Result<(), IndexError> {
        let relation = RelationFile::open(relation_path)?;
        let mut scan = relation.scan();
        let mut loaded = 0usize;
        while let Some((rid, record)) = scan.next_tuple()? {
            let key = extract_key(&record, self.attr_byte_offset)?;
            self.insert_entry(key, rid)?;
            loaded += 1;
        }
        debug!(index = %self.index_name, tuples = loaded, "point load complete");
        Ok(())
    }

    fn reopen(
        file: PagedFile,
        relation_name: &str,
        attr_byte_offset: usize,
        attr_type: AttrType,
        config: &IndexConfig,
        name: String,
    ) -> Result<Self, IndexError> {
        let page_size = file.page_size();
        let bufmgr = BufferManager::new(
            file,
            BufferPoolConfig {
                capacity_pages: config.pool_capacity,
            },
        );

        let header_page_no = bufmgr.first_page_no();
        let mut header = bufmgr.fetch_page(header_page_no)?;
        let probe = (|| {
            let meta = MetaPage::open(header.payload_mut())?;
            let matches = meta.relation_name_bytes() == stored_relation_name(relation_name)
                && meta.attr_byte_offset()? == attr_byte_offset
                && meta.attr_type()? == attr_type;
            Ok::<_, IndexError>((meta.root_page_no()?, meta.root_is_leaf()?, matches))
        })();
        bufmgr.unpin_page(header, false)?;
        let (root_page_no, root_is_leaf, matches) = probe?;

        if !matches {
            return Err(IndexError::BadIndexInfo(name));
        }
        if root_page_no == INVALID_PAGE_NO || root_page_no > bufmgr.page_count() {
            return Err(IndexError::BadIndexInfo(name));
        }

        Ok(Self {
            bufmgr,
            index_name: name,
            header_page_no,
            root_page_no,
            root_is_leaf,
            attr_byte_offset,
            leaf_cap: leaf_capacity(page_size),
            nonleaf_cap: nonleaf_capacity(page_size),
            scan: None,
            closed: false,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn attr_byte_offset(&self) -> usize {
        self.attr_byte_offset
    }

    /// Number of buffer frames currently pinned; the only long-held pin
    /// is the scan cursor's leaf.
    pub fn pinned_pages(&self) -> usize {
        self.bufmgr.pinned_pages()
    }

    pub(crate) fn bufmgr(&self) -> &BufferManager {
        &self.bufmgr
    }

    pub(crate) fn root(&self) -> (PageId, bool) {
        (self.root_page_no, self.root_is_leaf)
    }

    /// Insert one `(key, rid)` pair. After the call, a scan positioned on
    /// `key` finds `rid` among its matches; order among equal keys is
    /// unspecified.
    pub fn insert_entry(&mut self, key: i32, rid: RecordId) -> Result<(), IndexError> {
        let split = self.insert_descend(self.root_page_no, key, rid, self.root_is_leaf)?;
        if let Some(split) = split {
            self.grow_root(split)?;
        }
        Ok(())
    }

    fn insert_descend(
        &mut self,
        page_no: PageId,
        key: i32,
        rid: RecordId,
        is_leaf: bool,
    ) -> Result<Option<Split>, IndexError> {
        if is_leaf {
            self.insert_into_leaf(page_no, key, rid)
        } else {
            self.insert_into_nonleaf(page_no, key, rid)
        }
    }

    fn insert_into_leaf(
        &mut self,
        page_no: PageId,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<Split>, IndexError> {
        let mut page = self.bufmgr.fetch_page(page_no)?;
        let probe = leaf_probe(page.payload_mut(), key);
        let (index, size) = match probe {
            Ok(v) => v,
            Err(err) => {
                self.bufmgr.unpin_page(page, false)?;
                return Err(err.into());
            }
        };

        if size < self.leaf_cap {
            match leaf_insert(page.payload_mut(), index, key, rid) {
                Ok(()) => {
                    self.bufmgr.unpin_page(page, true)?;
                    Ok(None)
                }
                Err(err) => {
                    self.bufmgr.unpin_page(page, false)?;
                    Err(err.into())
                }
            }
        } else {
            let mut right = match self.bufmgr.alloc_page() {
                Ok(right) => right,
                Err(err) => {
                    self.bufmgr.unpin_page(page, false)?;
                    return Err(err.into());
                }
            };
            let right_page_no = right.page_no();
            match leaf_split(
                page.payload_mut(),
                right.payload_mut(),
                index,
                key,
                rid,
                right_page_no,
            ) {
                Ok(sep) => {
                    self.bufmgr.unpin_page(page, true)?;
                    self.bufmgr.unpin_page(right, true)?;
                    Ok(Some(Split {
                        key: sep,
                        right_page_no,
                    }))
                }
                Err(err) => {
                    self.bufmgr.unpin_page(page, false)?;
                    self.bufmgr.unpin_page(right, false)?;
                    Err(err.into())
                }
            }
        }
    }

    fn insert_into_nonleaf(
        &mut self,
        page_no: PageId,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<Split>, IndexError> {
        // Probe for the child to follow, then release the parent so only
        // one node stays pinned across the recursion.
        let mut page = self.bufmgr.fetch_page(page_no)?;
        let probe = nonleaf_probe(page.payload_mut(), key);
        self.bufmgr.unpin_page(page, false)?;
        let (child_no, child_is_leaf) = probe?;

        let Some(split) = self.insert_descend(child_no, key, rid, child_is_leaf)? else {
            return Ok(None);
        };

        // The child split: re-pin the parent and place the promoted
        // separator, splitting again if the parent is full.
        let mut page = self.bufmgr.fetch_page(page_no)?;
        let slot = separator_slot(page.payload_mut(), split.key);
        let (index, size) = match slot {
            Ok(v) => v,
            Err(err) => {
                self.bufmgr.unpin_page(page, false)?;
                return Err(err.into());
            }
        };

        if size < self.nonleaf_cap {
            match nonleaf_insert(page.payload_mut(), index, split.key, split.right_page_no) {
                Ok(()) => {
                    self.bufmgr.unpin_page(page, true)?;
                    Ok(None)
                }
                Err(err) => {
                    self.bufmgr.unpin_page(page, false)?;
                    Err(err.into())
                }
            }
        } else {
            let mut right = match self.bufmgr.alloc_page() {
                Ok(right) => right,
                Err(err) => {
                    self.bufmgr.unpin_page(page, false)?;
                    return Err(err.into());
                }
            };
            let right_page_no = right.page_no();
            match nonleaf_split(
                page.payload_mut(),
                right.payload_mut(),
                index,
                split.key,
                split.right_page_no,
            ) {
                Ok(promoted) => {
                    self.bufmgr.unpin_page(page, true)?;
                    self.bufmgr.unpin_page(right, true)?;
                    Ok(Some(Split {
                        key: promoted,
                        right_page_no,
                    }))
                }
                Err(err) => {
                    self.bufmgr.unpin_page(page, false)?;
                    self.bufmgr.unpin_page(right, false)?;
                    Err(err.into())
                }
            }
        }
    }

    /// Replace the root with a fresh non-leaf over the old root and the
    /// split-off right sibling, committing the change to the meta page.
    fn grow_root(&mut self, split: Split) -> Result<(), IndexError> {
        let new_level = if self.root_is_leaf {
            1
        } else {
            let mut old_root = self.bufmgr.fetch_page(self.root_page_no)?;
            let level = NonLeafNode::open(old_root.payload_mut()).and_then(|node| node.level());
            self.bufmgr.unpin_page(old_root, false)?;
            level? + 1
        };

        let mut page = self.bufmgr.alloc_page()?;
        let new_root_no = page.page_no();
        let init = (|| {
            let mut root = NonLeafNode::init(page.payload_mut(), new_level)?;
            root.set_child_at(0, self.root_page_no)?;
            root.insert_separator_at(0, split.key, split.right_page_no)
        })();
        match init {
            Ok(()) => self.bufmgr.unpin_page(page, true)?,
            Err(err) => {
                self.bufmgr.unpin_page(page, false)?;
                return Err(err.into());
            }
        }

        let mut header = self.bufmgr.fetch_page(self.header_page_no)?;
        let update = (|| {
            let mut meta = MetaPage::open(header.payload_mut())?;
            meta.set_root_page_no(new_root_no)?;
            meta.set_root_is_leaf(false)
        })();
        match update {
            Ok(()) => self.bufmgr.unpin_page(header, true)?,
            Err(err) => {
                self.bufmgr.unpin_page(header, false)?;
                return Err(err.into());
            }
        }

        self.root_page_no = new_root_no;
        self.root_is_leaf = false;
        Ok(())
    }

    /// End any active scan, flush the pool, and release the file. Pages
    /// still pinned at flush time are reported and skipped rather than
    /// failing the close.
    pub fn close(mut self) -> Result<(), IndexError> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<(), IndexError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.end_scan() {
            Ok(()) | Err(IndexError::ScanNotInitialized) => {}
            Err(err) => return Err(err),
        }
        match self.bufmgr.flush_all() {
            Ok(()) => Ok(()),
            Err(BufferError::PagePinned(page_no)) => {
                warn!(
                    index = %self.index_name,
                    page_no,
                    "pages still pinned at close; skipping flush"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close_inner() {
            warn!(index = %self.index_name, error = %err, "error while closing index");
        }
    }
}

/// Read the indexed attribute out of a base-relation record.
fn extract_key(record: &[u8], offset: usize) -> Result<i32, IndexError> {
    let end = offset.checked_add(4).filter(|&end| end <= record.len());
    let Some(end) = end else {
        return Err(IndexError::ShortRecord {
            offset,
            len: record.len(),
        });
    };
    Ok(LittleEndian::read_i32(&record[offset..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_is_relation_dot_offset() {
        assert_eq!(index_name("people", 4), "people.4");
        assert_eq!(index_name("orders", 0), "orders.0");
    }

    #[test]
    fn extract_key_reads_little_endian_at_offset() {
        let mut record = vec![0u8; 12];
        record[4..8].copy_from_slice(&(-7i32).to_le_bytes());
        assert_eq!(extract_key(&record, 4).unwrap(), -7);
    }

    #[test]
    fn extract_key_rejects_short_records() {
        let record = vec![0u8; 6];
        let err = extract_key(&record, 4).unwrap_err();
        assert!(matches!(
            err,
            IndexError::ShortRecord { offset: 4, len: 6 }
        ));
    }
}
