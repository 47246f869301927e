use thiserror::Error;

use crate::index::layout::AttrType;

/// Umbrella error for every index operation.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index file exists but its metadata page disagrees with the
    /// caller's relation name, attribute offset, or attribute type.
    #[error("index metadata mismatch for {0}")]
    BadIndexInfo(String),

    #[error("scan operators must be GT/GTE below and LT/LTE above")]
    BadOpcodes,

    #[error("scan range is empty: low bound exceeds high bound")]
    BadScanRange,

    #[error("no key in the index satisfies the scan range")]
    NoSuchKeyFound,

    #[error("no scan in progress")]
    ScanNotInitialized,

    #[error("scan has passed the end of its range")]
    ScanComplete,

    #[error("key type {0:?} is not supported yet")]
    KeyTypeUnsupported(AttrType),

    #[error("record of {len} bytes is too short for an attribute at offset {offset}")]
    ShortRecord { offset: usize, len: usize },

    #[error("file error: {0}")]
    File(#[from] FileError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("node error: {0}")]
    Node(#[from] NodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the paged-file layer.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("file already exists: {0}")]
    Exists(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("page size {0} is too small (minimum 512)")]
    PageSizeTooSmall(usize),

    #[error("page {0} out of bounds")]
    PageOutOfBounds(u32),

    #[error("page payload must be {expected} bytes, got {got}")]
    BadPayloadLength { expected: usize, got: usize },

    #[error("invalid record size {0} for this relation")]
    InvalidRecordSize(usize),

    #[error("bad file header: {0}")]
    BadHeader(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the buffer pool.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("page {0} is still pinned")]
    PagePinned(u32),

    #[error("buffer pool exhausted: all frames pinned")]
    PoolExhausted,

    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(u32),

    #[error("pin count underflow for page {0}")]
    PinUnderflow(u32),

    #[error("file error: {0}")]
    File(#[from] FileError),
}

/// On-page structure violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("node corrupt: {0}")]
    Corrupt(String),
}
