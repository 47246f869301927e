//! treeline: a disk-resident B+ tree index for page-oriented storage.
//!
//! The index maps a scalar attribute, read at a fixed byte offset from the
//! records of a base relation, to the record identifiers of those records.
//! It supports point-loading from a relation file, incremental insertion,
//! and half-open/closed range scans, and it performs all I/O through a
//! pinning buffer pool over a paged file.

mod errors;
mod index;
mod relation;
mod storage;

pub use crate::errors::{BufferError, FileError, IndexError, NodeError};
pub use crate::index::check::TreeStats;
pub use crate::index::layout::{leaf_capacity, nonleaf_capacity, AttrType};
pub use crate::index::scan::{Operator, RangeScan};
pub use crate::index::{index_name, BTreeIndex, IndexConfig};
pub use crate::relation::{RecordId, RelationFile, RelationScan};
pub use crate::storage::buffer::{BufferManager, BufferPoolConfig, PinnedPage};
pub use crate::storage::file::{PageId, PagedFile, INVALID_PAGE_NO};
