use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::errors::FileError;

/// Stable identifier of a page within a paged file.
///
/// Page numbers start at 1. The value 0 is never a valid page and is used
/// by the index as the "no right sibling" sentinel.
pub type PageId = u32;

pub const INVALID_PAGE_NO: PageId = 0;

pub const MIN_PAGE_SIZE: usize = 512;

const MAGIC: [u8; 8] = *b"TRLN0001";
const VERSION: u16 = 1;

// Header bytes at offset 0: magic (8), version (u16), page_size (u32),
// page_count (u32), crc32 of the preceding bytes (u32). The rest of the
// first page-size slot is padding, so page N lives at offset N * page_size.
const HEADER_FIXED_SIZE: usize = 8 + 2 + 4 + 4;
const HEADER_SIZE: usize = HEADER_FIXED_SIZE + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
    page_size: u32,
    page_count: u32,
}

impl FileHeader {
    fn pack(&self) -> Result<Vec<u8>, FileError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(&MAGIC);
        buf.write_u16::<LittleEndian>(VERSION)?;
        buf.write_u32::<LittleEndian>(self.page_size)?;
        buf.write_u32::<LittleEndian>(self.page_count)?;

        let mut hasher = Hasher::new();
        hasher.update(&buf);
        let crc = hasher.finalize();
        buf.write_u32::<LittleEndian>(crc)?;
        Ok(buf)
    }

    fn unpack(buf: &[u8]) -> Result<Self, FileError> {
        if buf.len() < HEADER_SIZE {
            return Err(FileError::BadHeader("header truncated".into()));
        }

        let mut hasher = Hasher::new();
        hasher.update(&buf[..HEADER_FIXED_SIZE]);
        let expected_crc = hasher.finalize();

        let mut rdr = io::Cursor::new(buf);
        let mut magic = [0u8; 8];
        rdr.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(FileError::BadHeader("bad magic".into()));
        }
        let version = rdr.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(FileError::BadHeader(format!(
                "unsupported version {version}"
            )));
        }
        let page_size = rdr.read_u32::<LittleEndian>()?;
        let page_count = rdr.read_u32::<LittleEndian>()?;
        let crc = rdr.read_u32::<LittleEndian>()?;
        if crc != expected_crc {
            return Err(FileError::BadHeader("header checksum mismatch".into()));
        }
        if (page_size as usize) < MIN_PAGE_SIZE {
            return Err(FileError::BadHeader(format!(
                "page size {page_size} below minimum"
            )));
        }

        Ok(Self {
            page_size,
            page_count,
        })
    }
}

/// A named file storing an ordered sequence of fixed-size pages with
/// stable page identifiers.
#[derive(Debug)]
pub struct PagedFile {
    path: PathBuf,
    file: std::fs::File,
    header: FileHeader,
}

impl PagedFile {
    /// Create a new paged file. Fails with [`FileError::Exists`] if `path`
    /// already names a file.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self, FileError> {
        if page_size < MIN_PAGE_SIZE {
            return Err(FileError::PageSizeTooSmall(page_size));
        }
        let path = path.as_ref().to_path_buf();
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FileError::Exists(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let header = FileHeader {
            page_size: page_size as u32,
            page_count: 0,
        };
        let mut paged = Self { path, file, header };
        paged.write_header()?;
        Ok(paged)
    }

    /// Open an existing paged file, validating its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();
        let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(FileError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let mut buf = [0u8; HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let header = FileHeader::unpack(&buf)?;
        Ok(Self { path, file, header })
    }

    pub fn page_size(&self) -> usize {
        self.header.page_size as usize
    }

    pub fn page_count(&self) -> u32 {
        self.header.page_count
    }

    /// First allocatable page number.
    pub fn first_page_no(&self) -> PageId {
        1
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_page(&mut self, page_no: PageId) -> Result<Vec<u8>, FileError> {
        self.check_bounds(page_no)?;
        let mut buf = vec![0u8; self.page_size()];
        self.file.seek(SeekFrom::Start(self.page_offset(page_no)))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn write_page(&mut self, page_no: PageId, payload: &[u8]) -> Result<(), FileError> {
        self.check_bounds(page_no)?;
        if payload.len() != self.page_size() {
            return Err(FileError::BadPayloadLength {
                expected: self.page_size(),
                got: payload.len(),
            });
        }
        self.file.seek(SeekFrom::Start(self.page_offset(page_no)))?;
        self.file.write_all(payload)?;
        Ok(())
    }

    /// Extend the file by one zeroed page and return its number.
    pub fn allocate_page(&mut self) -> Result<PageId, FileError> {
        let page_no = self.header.page_count + 1;
        let zeroes = vec![0u8; self.page_size()];
        self.file.seek(SeekFrom::Start(self.page_offset(page_no)))?;
        self.file.write_all(&zeroes)?;
        self.header.page_count = page_no;
        self.write_header()?;
        Ok(page_no)
    }

    pub fn sync_all(&mut self) -> Result<(), FileError> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Delete the file on disk, consuming the handle.
    pub fn remove(self) -> Result<(), FileError> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(&path)?;
        Ok(())
    }

    fn page_offset(&self, page_no: PageId) -> u64 {
        page_no as u64 * self.header.page_size as u64
    }

    fn check_bounds(&self, page_no: PageId) -> Result<(), FileError> {
        if page_no == INVALID_PAGE_NO || page_no > self.header.page_count {
            return Err(FileError::PageOutOfBounds(page_no));
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), FileError> {
        let buf = self.header.pack()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_open_roundtrip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("pages.tl");

        let mut pf = PagedFile::create(&path, 512).unwrap();
        assert_eq!(pf.page_size(), 512);
        assert_eq!(pf.page_count(), 0);
        assert_eq!(pf.first_page_no(), 1);

        let p1 = pf.allocate_page().unwrap();
        let p2 = pf.allocate_page().unwrap();
        assert_eq!((p1, p2), (1, 2));

        let mut payload = vec![0u8; 512];
        payload[0] = 7;
        payload[511] = 9;
        pf.write_page(p2, &payload).unwrap();
        pf.sync_all().unwrap();
        drop(pf);

        let mut pf = PagedFile::open(&path).unwrap();
        assert_eq!(pf.page_size(), 512);
        assert_eq!(pf.page_count(), 2);
        assert_eq!(pf.read_page(p2).unwrap(), payload);
        assert_eq!(pf.read_page(p1).unwrap(), vec![0u8; 512]);
    }

    #[test]
    fn create_is_exclusive() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("pages.tl");

        PagedFile::create(&path, 512).unwrap();
        let err = PagedFile::create(&path, 512).unwrap_err();
        assert!(matches!(err, FileError::Exists(_)));
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let tmp = tempdir().unwrap();
        let err = PagedFile::open(tmp.path().join("nope.tl")).unwrap_err();
        assert!(matches!(err, FileError::NotFound(_)));
    }

    #[test]
    fn rejects_tiny_pages() {
        let tmp = tempdir().unwrap();
        let err = PagedFile::create(tmp.path().join("pages.tl"), 128).unwrap_err();
        assert!(matches!(err, FileError::PageSizeTooSmall(128)));
    }

    #[test]
    fn corrupt_header_is_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("pages.tl");
        PagedFile::create(&path, 512).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[10] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let err = PagedFile::open(&path).unwrap_err();
        assert!(matches!(err, FileError::BadHeader(_)));
    }

    #[test]
    fn page_zero_and_unallocated_pages_are_out_of_bounds() {
        let tmp = tempdir().unwrap();
        let mut pf = PagedFile::create(tmp.path().join("pages.tl"), 512).unwrap();
        pf.allocate_page().unwrap();

        assert!(matches!(
            pf.read_page(0).unwrap_err(),
            FileError::PageOutOfBounds(0)
        ));
        assert!(matches!(
            pf.read_page(2).unwrap_err(),
            FileError::PageOutOfBounds(2)
        ));
    }
}
