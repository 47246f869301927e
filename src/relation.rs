use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::{FileError, IndexError};
use crate::storage::buffer::{BufferManager, BufferPoolConfig, PinnedPage};
use crate::storage::file::{PageId, PagedFile};

/// Identifies a tuple in the base relation: the data page holding it and
/// its slot within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecordId {
    pub page_no: PageId,
    pub slot_no: u16,
}

// Relation layout: page 1 stores the fixed record size (u32 at offset 0);
// data pages (2..) hold a u16 record count followed by packed records.
const REL_META_OFF_RECORD_SIZE: usize = 0;
const DATA_OFF_COUNT: usize = 0;
const DATA_HEADER_SIZE: usize = 2;

/// A relation file: fixed-layout records packed into pages, appended in
/// arrival order and scanned in file order.
#[derive(Debug)]
pub struct RelationFile {
    bufmgr: BufferManager,
    record_size: usize,
    records_per_page: usize,
}

impl RelationFile {
    pub fn create<P: AsRef<Path>>(
        path: P,
        page_size: usize,
        record_size: usize,
    ) -> Result<Self, IndexError> {
        if record_size == 0 || record_size > page_size.saturating_sub(DATA_HEADER_SIZE) {
            return Err(FileError::InvalidRecordSize(record_size).into());
        }
        let file = PagedFile::create(path, page_size)?;
        let bufmgr = BufferManager::new(file, BufferPoolConfig::default());

        let mut meta = bufmgr.alloc_page()?;
        LittleEndian::write_u32(
            &mut meta.payload_mut()[REL_META_OFF_RECORD_SIZE..REL_META_OFF_RECORD_SIZE + 4],
            record_size as u32,
        );
        bufmgr.unpin_page(meta, true)?;

        Ok(Self {
            bufmgr,
            record_size,
            records_per_page: (page_size - DATA_HEADER_SIZE) / record_size,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let file = PagedFile::open(path)?;
        let page_size = file.page_size();
        let bufmgr = BufferManager::new(file, BufferPoolConfig::default());

        let meta = bufmgr.fetch_page(bufmgr.first_page_no())?;
        let record_size = LittleEndian::read_u32(
            &meta.payload()[REL_META_OFF_RECORD_SIZE..REL_META_OFF_RECORD_SIZE + 4],
        ) as usize;
        bufmgr.unpin_page(meta, false)?;

        if record_size == 0 || record_size > page_size - DATA_HEADER_SIZE {
            return Err(FileError::InvalidRecordSize(record_size).into());
        }
        Ok(Self {
            bufmgr,
            record_size,
            records_per_page: (page_size - DATA_HEADER_SIZE) / record_size,
        })
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Append one record, returning the record id it was stored under.
    pub fn append(&mut self, record: &[u8]) -> Result<RecordId, IndexError> {
        if record.len() != self.record_size {
            return Err(FileError::InvalidRecordSize(record.len()).into());
        }

        // Try the last data page first.
        let last = self.bufmgr.page_count();
        if last >= 2 {
            let mut page = self.bufmgr.fetch_page(last)?;
            let count = LittleEndian::read_u16(&page.payload()[DATA_OFF_COUNT..DATA_OFF_COUNT + 2])
                as usize;
            if count < self.records_per_page {
                let off = DATA_HEADER_SIZE + count * self.record_size;
                page.payload_mut()[off..off + self.record_size].copy_from_slice(record);
                LittleEndian::write_u16(
                    &mut page.payload_mut()[DATA_OFF_COUNT..DATA_OFF_COUNT + 2],
                    (count + 1) as u16,
                );
                self.bufmgr.unpin_page(page, true)?;
                return Ok(RecordId {
                    page_no: last,
                    slot_no: count as u16,
                });
            }
            self.bufmgr.unpin_page(page, false)?;
        }

        let mut page = self.bufmgr.alloc_page()?;
        let page_no = page.page_no();
        LittleEndian::write_u16(&mut page.payload_mut()[DATA_OFF_COUNT..DATA_OFF_COUNT + 2], 1);
        page.payload_mut()[DATA_HEADER_SIZE..DATA_HEADER_SIZE + self.record_size]
            .copy_from_slice(record);
        self.bufmgr.unpin_page(page, true)?;
        Ok(RecordId {
            page_no,
            slot_no: 0,
        })
    }

    /// One-shot scan over every record in file order.
    pub fn scan(&self) -> RelationScan<'_> {
        RelationScan {
            relation: self,
            page: None,
            next_page_no: 2,
            next_slot: 0,
        }
    }

    /// Flush buffered pages and release the file.
    pub fn close(self) -> Result<(), IndexError> {
        self.bufmgr.flush_all()?;
        Ok(())
    }
}

/// Forward cursor over a relation's records. Holds at most one pinned
/// page, released on drop.
#[derive(Debug)]
pub struct RelationScan<'a> {
    relation: &'a RelationFile,
    page: Option<PinnedPage>,
    next_page_no: PageId,
    next_slot: usize,
}

impl RelationScan<'_> {
    /// Next record in file order, or `None` at end of file.
    pub fn next_tuple(&mut self) -> Result<Option<(RecordId, Vec<u8>)>, IndexError> {
        loop {
            if self.page.is_none() {
                if self.next_page_no > self.relation.bufmgr.page_count() {
                    return Ok(None);
                }
                let page = self.relation.bufmgr.fetch_page(self.next_page_no)?;
                self.next_slot = 0;
                self.page = Some(page);
            }
            let Some(page) = self.page.as_ref() else {
                continue;
            };

            let count = LittleEndian::read_u16(&page.payload()[DATA_OFF_COUNT..DATA_OFF_COUNT + 2])
                as usize;
            if self.next_slot >= count {
                if let Some(done) = self.page.take() {
                    self.relation.bufmgr.unpin_page(done, false)?;
                }
                self.next_page_no += 1;
                continue;
            }

            let off = DATA_HEADER_SIZE + self.next_slot * self.relation.record_size;
            let record = page.payload()[off..off + self.relation.record_size].to_vec();
            let rid = RecordId {
                page_no: page.page_no(),
                slot_no: self.next_slot as u16,
            };
            self.next_slot += 1;
            return Ok(Some((rid, record)));
        }
    }
}

impl Drop for RelationScan<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = self.relation.bufmgr.unpin_page(page, false);
        }
    }
}
