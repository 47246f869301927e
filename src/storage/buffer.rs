use std::collections::HashMap;

use parking_lot::Mutex;

use crate::errors::{BufferError, FileError};
use crate::storage::file::{PageId, PagedFile};

const DEFAULT_POOL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    pub capacity_pages: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity_pages: DEFAULT_POOL_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct Frame {
    payload: Vec<u8>,
    dirty: bool,
    pin_count: u32,
    last_access: u64,
}

#[derive(Debug)]
struct Pool {
    file: PagedFile,
    frames: HashMap<PageId, Frame>,
    capacity: usize,
    access_counter: u64,
}

/// A pinned page: a private copy of the frame payload, valid until the
/// guard is handed back to [`BufferManager::unpin_page`].
#[derive(Debug)]
pub struct PinnedPage {
    page_no: PageId,
    payload: Vec<u8>,
}

impl PinnedPage {
    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}

/// A bounded pool of page frames over a [`PagedFile`].
///
/// Pages enter the pool on fetch or allocation and stay resident while
/// pinned; unpinned frames are evicted least-recently-used, with dirty
/// victims written back first.
#[derive(Debug)]
pub struct BufferManager {
    pool: Mutex<Pool>,
}

impl BufferManager {
    pub fn new(file: PagedFile, config: BufferPoolConfig) -> Self {
        Self {
            pool: Mutex::new(Pool {
                file,
                frames: HashMap::new(),
                capacity: config.capacity_pages.max(1),
                access_counter: 0,
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.pool.lock().file.page_size()
    }

    pub fn page_count(&self) -> u32 {
        self.pool.lock().file.page_count()
    }

    pub fn first_page_no(&self) -> PageId {
        self.pool.lock().file.first_page_no()
    }

    /// Pin `page_no`, loading it from disk if it is not resident.
    pub fn fetch_page(&self, page_no: PageId) -> Result<PinnedPage, BufferError> {
        let mut pool = self.pool.lock();
        if !pool.frames.contains_key(&page_no) {
            pool.evict_if_full()?;
            let payload = pool.file.read_page(page_no)?;
            let access = pool.next_access();
            pool.frames.insert(
                page_no,
                Frame {
                    payload,
                    dirty: false,
                    pin_count: 0,
                    last_access: access,
                },
            );
        }
        let access = pool.next_access();
        let frame = pool
            .frames
            .get_mut(&page_no)
            .ok_or(BufferError::PageNotResident(page_no))?;
        frame.pin_count += 1;
        frame.last_access = access;
        Ok(PinnedPage {
            page_no,
            payload: frame.payload.clone(),
        })
    }

    /// Allocate a fresh page: zeroed, resident, and pinned.
    pub fn alloc_page(&self) -> Result<PinnedPage, BufferError> {
        let mut pool = self.pool.lock();
        pool.evict_if_full()?;
        let page_no = pool.file.allocate_page()?;
        let payload = vec![0u8; pool.file.page_size()];
        let access = pool.next_access();
        pool.frames.insert(
            page_no,
            Frame {
                payload: payload.clone(),
                dirty: false,
                pin_count: 1,
                last_access: access,
            },
        );
        Ok(PinnedPage { page_no, payload })
    }

    /// Release one pin. With `dirty = true` the guard's payload is
    /// committed back to the frame and scheduled for write-back; with
    /// `false` the local copy is discarded.
    pub fn unpin_page(&self, page: PinnedPage, dirty: bool) -> Result<(), BufferError> {
        let mut pool = self.pool.lock();
        let frame = pool
            .frames
            .get_mut(&page.page_no)
            .ok_or(BufferError::PageNotResident(page.page_no))?;
        if frame.pin_count == 0 {
            return Err(BufferError::PinUnderflow(page.page_no));
        }
        if dirty {
            frame.payload = page.payload;
            frame.dirty = true;
        }
        frame.pin_count -= 1;
        Ok(())
    }

    /// Write every dirty frame back and sync the file. Fails with
    /// [`BufferError::PagePinned`] if any frame still holds a pin.
    pub fn flush_all(&self) -> Result<(), BufferError> {
        let mut pool = self.pool.lock();
        if let Some(page_no) = pool
            .frames
            .iter()
            .find(|(_, frame)| frame.pin_count > 0)
            .map(|(page_no, _)| *page_no)
        {
            return Err(BufferError::PagePinned(page_no));
        }
        pool.flush_dirty()?;
        pool.file.sync_all()?;
        Ok(())
    }

    /// Number of frames currently holding at least one pin.
    pub fn pinned_pages(&self) -> usize {
        self.pool
            .lock()
            .frames
            .values()
            .filter(|frame| frame.pin_count > 0)
            .count()
    }
}

impl Pool {
    fn next_access(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn lru_unpinned(&self) -> Option<PageId> {
        let mut candidate: Option<(PageId, u64)> = None;
        for (page_no, frame) in &self.frames {
            if frame.pin_count > 0 {
                continue;
            }
            match candidate {
                None => candidate = Some((*page_no, frame.last_access)),
                Some((_, best)) if frame.last_access < best => {
                    candidate = Some((*page_no, frame.last_access));
                }
                _ => {}
            }
        }
        candidate.map(|(page_no, _)| page_no)
    }

    fn evict_if_full(&mut self) -> Result<(), BufferError> {
        if self.frames.len() < self.capacity {
            return Ok(());
        }
        let victim = self.lru_unpinned().ok_or(BufferError::PoolExhausted)?;
        let frame = self
            .frames
            .remove(&victim)
            .ok_or(BufferError::PageNotResident(victim))?;
        if frame.dirty {
            if let Err(err) = self.file.write_page(victim, &frame.payload) {
                self.frames.insert(victim, frame);
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn flush_dirty(&mut self) -> Result<(), FileError> {
        let Pool { file, frames, .. } = self;
        for (page_no, frame) in frames.iter_mut() {
            if !frame.dirty {
                continue;
            }
            file.write_page(*page_no, &frame.payload)?;
            frame.dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pool_with(capacity: usize) -> (tempfile::TempDir, BufferManager) {
        let tmp = tempdir().unwrap();
        let file = PagedFile::create(tmp.path().join("pool.tl"), 512).unwrap();
        let bufmgr = BufferManager::new(
            file,
            BufferPoolConfig {
                capacity_pages: capacity,
            },
        );
        (tmp, bufmgr)
    }

    #[test]
    fn pin_blocks_eviction_until_unpinned() {
        let (_tmp, bufmgr) = pool_with(1);

        let page1 = bufmgr.alloc_page().unwrap();
        let p1 = page1.page_no();
        bufmgr.unpin_page(page1, true).unwrap();
        let page2 = bufmgr.alloc_page().unwrap();
        let p2 = page2.page_no();
        bufmgr.unpin_page(page2, true).unwrap();

        let held = bufmgr.fetch_page(p1).unwrap();
        let err = bufmgr.fetch_page(p2).unwrap_err();
        assert!(matches!(err, BufferError::PoolExhausted));

        bufmgr.unpin_page(held, false).unwrap();
        let page2 = bufmgr.fetch_page(p2).unwrap();
        assert_eq!(page2.page_no(), p2);
        bufmgr.unpin_page(page2, false).unwrap();
    }

    #[test]
    fn eviction_writes_back_dirty_victims() {
        let (_tmp, bufmgr) = pool_with(1);

        let mut page1 = bufmgr.alloc_page().unwrap();
        let p1 = page1.page_no();
        page1.payload_mut()[0] = 42;
        bufmgr.unpin_page(page1, true).unwrap();

        // Allocating a second page evicts the first, which must hit disk.
        let page2 = bufmgr.alloc_page().unwrap();
        bufmgr.unpin_page(page2, false).unwrap();

        let page1 = bufmgr.fetch_page(p1).unwrap();
        assert_eq!(page1.payload()[0], 42);
        bufmgr.unpin_page(page1, false).unwrap();
    }

    #[test]
    fn flush_rejects_pinned_frames() {
        let (_tmp, bufmgr) = pool_with(4);

        let page = bufmgr.alloc_page().unwrap();
        let err = bufmgr.flush_all().unwrap_err();
        assert!(matches!(err, BufferError::PagePinned(_)));

        bufmgr.unpin_page(page, true).unwrap();
        bufmgr.flush_all().unwrap();
        assert_eq!(bufmgr.pinned_pages(), 0);
    }

    #[test]
    fn flush_persists_dirty_frames() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("pool.tl");
        let file = PagedFile::create(&path, 512).unwrap();
        let bufmgr = BufferManager::new(file, BufferPoolConfig::default());

        let mut page = bufmgr.alloc_page().unwrap();
        let p1 = page.page_no();
        page.payload_mut()[100] = 7;
        bufmgr.unpin_page(page, true).unwrap();
        bufmgr.flush_all().unwrap();
        drop(bufmgr);

        let mut file = PagedFile::open(&path).unwrap();
        assert_eq!(file.read_page(p1).unwrap()[100], 7);
    }

    #[test]
    fn clean_unpin_discards_local_edits() {
        let (_tmp, bufmgr) = pool_with(4);

        let mut page = bufmgr.alloc_page().unwrap();
        let p1 = page.page_no();
        bufmgr.unpin_page(page, true).unwrap();

        let mut page = bufmgr.fetch_page(p1).unwrap();
        page.payload_mut()[0] = 99;
        bufmgr.unpin_page(page, false).unwrap();

        let page = bufmgr.fetch_page(p1).unwrap();
        assert_eq!(page.payload()[0], 0);
        bufmgr.unpin_page(page, false).unwrap();
    }

    #[test]
    fn pinned_pages_tracks_outstanding_pins() {
        let (_tmp, bufmgr) = pool_with(4);

        let a = bufmgr.alloc_page().unwrap();
        let b = bufmgr.alloc_page().unwrap();
        assert_eq!(bufmgr.pinned_pages(), 2);

        bufmgr.unpin_page(a, true).unwrap();
        assert_eq!(bufmgr.pinned_pages(), 1);
        bufmgr.unpin_page(b, true).unwrap();
        assert_eq!(bufmgr.pinned_pages(), 0);
    }
}
