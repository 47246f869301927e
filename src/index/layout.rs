use byteorder::{ByteOrder, LittleEndian};

use crate::errors::NodeError;
use crate::relation::RecordId;
use crate::storage::file::{PageId, INVALID_PAGE_NO};

/// Scalar type of the indexed attribute, persisted as a tag in the meta
/// page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Double,
    Str,
}

impl AttrType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            AttrType::Int => 0,
            AttrType::Double => 1,
            AttrType::Str => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self, NodeError> {
        match tag {
            0 => Ok(AttrType::Int),
            1 => Ok(AttrType::Double),
            2 => Ok(AttrType::Str),
            other => Err(NodeError::Corrupt(format!(
                "unknown attribute type tag: {other}"
            ))),
        }
    }
}

// Meta page layout (little-endian), offsets in bytes:
//   0..20: relation name, zero-terminated at byte 19
//   20: attr_byte_offset (u32)
//   24: attr_type (u8)
//   25: root_is_leaf (u8)
//   26: root_page_no (u32)
const META_OFF_NAME: usize = 0;
const META_NAME_LEN: usize = 20;
const META_OFF_ATTR_OFFSET: usize = 20;
const META_OFF_ATTR_TYPE: usize = 24;
const META_OFF_ROOT_IS_LEAF: usize = 25;
const META_OFF_ROOT_PAGE_NO: usize = 26;
const META_MIN_SIZE: usize = 30;

// Leaf node layout:
//   0: size (u16)              - number of live entries
//   2: right_sib_page_no (u32) - next leaf in key order, 0 if none
// Entries start at 6, each 10 bytes: key (i32), rid page (u32),
// rid slot (u16).
const LEAF_OFF_SIZE: usize = 0;
const LEAF_OFF_RIGHT_SIB: usize = 2;
const LEAF_HEADER_SIZE: usize = 6;
const LEAF_ENTRY_SIZE: usize = 10;

// Non-leaf node layout:
//   0: size (u16)  - number of live separator keys
//   2: level (u16) - 1 if children are leaves
// The child pointer array ((capacity + 1) x u32) starts at 4; the key
// array (capacity x i32) follows it.
const NONLEAF_OFF_SIZE: usize = 0;
const NONLEAF_OFF_LEVEL: usize = 2;
const NONLEAF_HEADER_SIZE: usize = 4;

/// Largest number of `(key, rid)` entries a leaf of `page_size` holds.
pub fn leaf_capacity(page_size: usize) -> usize {
    (page_size - LEAF_HEADER_SIZE) / LEAF_ENTRY_SIZE
}

/// Largest number of separator keys a non-leaf of `page_size` holds; such
/// a node carries `capacity + 1` child pointers.
pub fn nonleaf_capacity(page_size: usize) -> usize {
    (page_size - NONLEAF_HEADER_SIZE - 4) / 8
}

/// Mirror of the meta page's name truncation, for reopen comparisons.
pub(crate) fn stored_relation_name(name: &str) -> &[u8] {
    let bytes = name.as_bytes();
    &bytes[..bytes.len().min(META_NAME_LEN - 1)]
}

/// View over the index metadata page.
#[derive(Debug)]
pub(crate) struct MetaPage<'a> {
    buf: &'a mut [u8],
}

impl<'a> MetaPage<'a> {
    pub fn init(
        buf: &'a mut [u8],
        relation_name: &str,
        attr_byte_offset: usize,
        attr_type: AttrType,
    ) -> Result<Self, NodeError> {
        if buf.len() < META_MIN_SIZE {
            return Err(NodeError::Corrupt(format!(
                "page too small for index metadata: {}",
                buf.len()
            )));
        }
        let offset = u32::try_from(attr_byte_offset).map_err(|_| {
            NodeError::Corrupt(format!("attribute offset too large: {attr_byte_offset}"))
        })?;

        buf.fill(0);
        let mut page = Self { buf };
        let name = stored_relation_name(relation_name);
        page.buf[META_OFF_NAME..META_OFF_NAME + name.len()].copy_from_slice(name);
        write_u32(page.buf, META_OFF_ATTR_OFFSET, offset)?;
        write_u8(page.buf, META_OFF_ATTR_TYPE, attr_type.tag())?;
        Ok(page)
    }

    pub fn open(buf: &'a mut [u8]) -> Result<Self, NodeError> {
        if buf.len() < META_MIN_SIZE {
            return Err(NodeError::Corrupt(format!(
                "page too small for index metadata: {}",
                buf.len()
            )));
        }
        Ok(Self { buf })
    }

    pub fn relation_name_bytes(&self) -> &[u8] {
        let name = &self.buf[META_OFF_NAME..META_OFF_NAME + META_NAME_LEN];
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        &name[..end]
    }

    pub fn attr_byte_offset(&self) -> Result<usize, NodeError> {
        Ok(read_u32(self.buf, META_OFF_ATTR_OFFSET)? as usize)
    }

    pub fn attr_type(&self) -> Result<AttrType, NodeError> {
        AttrType::from_tag(read_u8(self.buf, META_OFF_ATTR_TYPE)?)
    }

    pub fn root_is_leaf(&self) -> Result<bool, NodeError> {
        Ok(read_u8(self.buf, META_OFF_ROOT_IS_LEAF)? != 0)
    }

    pub fn set_root_is_leaf(&mut self, root_is_leaf: bool) -> Result<(), NodeError> {
        write_u8(self.buf, META_OFF_ROOT_IS_LEAF, root_is_leaf as u8)
    }

    pub fn root_page_no(&self) -> Result<PageId, NodeError> {
        read_u32(self.buf, META_OFF_ROOT_PAGE_NO)
    }

    pub fn set_root_page_no(&mut self, page_no: PageId) -> Result<(), NodeError> {
        write_u32(self.buf, META_OFF_ROOT_PAGE_NO, page_no)
    }
}

/// View over a leaf node: a sorted run of `(key, rid)` entries plus the
/// right-sibling link.
#[derive(Debug)]
pub(crate) struct LeafNode<'a> {
    buf: &'a mut [u8],
    capacity: usize,
}

impl<'a> LeafNode<'a> {
    pub fn init(buf: &'a mut [u8]) -> Result<Self, NodeError> {
        if buf.len() < LEAF_HEADER_SIZE + LEAF_ENTRY_SIZE {
            return Err(NodeError::Corrupt(format!(
                "page too small for a leaf node: {}",
                buf.len()
            )));
        }
        buf.fill(0);
        let capacity = leaf_capacity(buf.len());
        Ok(Self { buf, capacity })
    }

    pub fn open(buf: &'a mut [u8]) -> Result<Self, NodeError> {
        if buf.len() < LEAF_HEADER_SIZE + LEAF_ENTRY_SIZE {
            return Err(NodeError::Corrupt(format!(
                "page too small for a leaf node: {}",
                buf.len()
            )));
        }
        let capacity = leaf_capacity(buf.len());
        let node = Self { buf, capacity };
        let size = node.size()?;
        if size > node.capacity {
            return Err(NodeError::Corrupt(format!(
                "leaf size {size} exceeds capacity {}",
                node.capacity
            )));
        }
        Ok(node)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> Result<usize, NodeError> {
        Ok(read_u16(self.buf, LEAF_OFF_SIZE)? as usize)
    }

    fn set_size(&mut self, size: usize) -> Result<(), NodeError> {
        write_u16(self.buf, LEAF_OFF_SIZE, size as u16)
    }

    pub fn right_sibling(&self) -> Result<PageId, NodeError> {
        read_u32(self.buf, LEAF_OFF_RIGHT_SIB)
    }

    pub fn set_right_sibling(&mut self, page_no: PageId) -> Result<(), NodeError> {
        write_u32(self.buf, LEAF_OFF_RIGHT_SIB, page_no)
    }

    fn entry_off(&self, index: usize) -> Result<usize, NodeError> {
        if index >= self.capacity {
            return Err(NodeError::Corrupt(format!(
                "leaf entry index out of bounds: {index} (capacity {})",
                self.capacity
            )));
        }
        Ok(LEAF_HEADER_SIZE + index * LEAF_ENTRY_SIZE)
    }

    pub fn key_at(&self, index: usize) -> Result<i32, NodeError> {
        let off = self.entry_off(index)?;
        read_i32(self.buf, off)
    }

    pub fn rid_at(&self, index: usize) -> Result<RecordId, NodeError> {
        let off = self.entry_off(index)?;
        Ok(RecordId {
            page_no: read_u32(self.buf, off + 4)?,
            slot_no: read_u16(self.buf, off + 8)?,
        })
    }

    fn write_entry(&mut self, index: usize, key: i32, rid: RecordId) -> Result<(), NodeError> {
        let off = self.entry_off(index)?;
        write_i32(self.buf, off, key)?;
        write_u32(self.buf, off + 4, rid.page_no)?;
        write_u16(self.buf, off + 8, rid.slot_no)
    }

    /// Insert `(key, rid)` at `index`, shifting later entries right.
    pub fn insert_at(&mut self, index: usize, key: i32, rid: RecordId) -> Result<(), NodeError> {
        let size = self.size()?;
        if size >= self.capacity {
            return Err(NodeError::Corrupt("insert into full leaf".into()));
        }
        if index > size {
            return Err(NodeError::Corrupt(format!(
                "leaf insertion index out of bounds: {index} (size {size})"
            )));
        }
        if index < size {
            let start = LEAF_HEADER_SIZE + index * LEAF_ENTRY_SIZE;
            let end = LEAF_HEADER_SIZE + size * LEAF_ENTRY_SIZE;
            self.buf.copy_within(start..end, start + LEAF_ENTRY_SIZE);
        }
        self.write_entry(index, key, rid)?;
        self.set_size(size + 1)
    }

    /// Smallest index whose key is strictly greater than `key`, else
    /// `size`. Equal keys therefore insert after existing equals.
    pub fn upper_bound(&self, key: i32) -> Result<usize, NodeError> {
        let mut lo = 0usize;
        let mut hi = self.size()?;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid)? <= key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Smallest index whose key is greater than or equal to `key`, else
    /// `size`.
    pub fn lower_bound(&self, key: i32) -> Result<usize, NodeError> {
        let mut lo = 0usize;
        let mut hi = self.size()?;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid)? < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Move entries `[from..size)` into `right` (which must be empty),
    /// zeroing the vacated slots.
    fn move_tail_to(&mut self, right: &mut LeafNode<'_>, from: usize) -> Result<(), NodeError> {
        let size = self.size()?;
        if from > size {
            return Err(NodeError::Corrupt(format!(
                "leaf split point out of bounds: {from} (size {size})"
            )));
        }
        let count = size - from;
        if count > right.capacity {
            return Err(NodeError::Corrupt("leaf split tail too large".into()));
        }
        let start = LEAF_HEADER_SIZE + from * LEAF_ENTRY_SIZE;
        let end = LEAF_HEADER_SIZE + size * LEAF_ENTRY_SIZE;
        right.buf[LEAF_HEADER_SIZE..LEAF_HEADER_SIZE + (end - start)]
            .copy_from_slice(&self.buf[start..end]);
        self.buf[start..end].fill(0);
        right.set_size(count)?;
        self.set_size(from)
    }
}

/// View over a non-leaf node: separator keys routing into `size + 1`
/// children.
#[derive(Debug)]
pub(crate) struct NonLeafNode<'a> {
    buf: &'a mut [u8],
    capacity: usize,
}

impl<'a> NonLeafNode<'a> {
    pub fn init(buf: &'a mut [u8], level: u16) -> Result<Self, NodeError> {
        if buf.len() < NONLEAF_HEADER_SIZE + 12 {
            return Err(NodeError::Corrupt(format!(
                "page too small for a non-leaf node: {}",
                buf.len()
            )));
        }
        if level == 0 {
            return Err(NodeError::Corrupt("non-leaf level must be positive".into()));
        }
        buf.fill(0);
        let capacity = nonleaf_capacity(buf.len());
        let mut node = Self { buf, capacity };
        node.set_level(level)?;
        Ok(node)
    }

    pub fn open(buf: &'a mut [u8]) -> Result<Self, NodeError> {
        if buf.len() < NONLEAF_HEADER_SIZE + 12 {
            return Err(NodeError::Corrupt(format!(
                "page too small for a non-leaf node: {}",
                buf.len()
            )));
        }
        let capacity = nonleaf_capacity(buf.len());
        let node = Self { buf, capacity };
        let size = node.size()?;
        if size > node.capacity {
            return Err(NodeError::Corrupt(format!(
                "non-leaf size {size} exceeds capacity {}",
                node.capacity
            )));
        }
        if node.level()? == 0 {
            return Err(NodeError::Corrupt("non-leaf level must be positive".into()));
        }
        Ok(node)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> Result<usize, NodeError> {
        Ok(read_u16(self.buf, NONLEAF_OFF_SIZE)? as usize)
    }

    fn set_size(&mut self, size: usize) -> Result<(), NodeError> {
        write_u16(self.buf, NONLEAF_OFF_SIZE, size as u16)
    }

    pub fn level(&self) -> Result<u16, NodeError> {
        read_u16(self.buf, NONLEAF_OFF_LEVEL)
    }

    fn set_level(&mut self, level: u16) -> Result<(), NodeError> {
        write_u16(self.buf, NONLEAF_OFF_LEVEL, level)
    }

    fn key_off(&self, index: usize) -> Result<usize, NodeError> {
        if index >= self.capacity {
            return Err(NodeError::Corrupt(format!(
                "separator index out of bounds: {index} (capacity {})",
                self.capacity
            )));
        }
        Ok(NONLEAF_HEADER_SIZE + (self.capacity + 1) * 4 + index * 4)
    }

    fn child_off(&self, index: usize) -> Result<usize, NodeError> {
        if index > self.capacity {
            return Err(NodeError::Corrupt(format!(
                "child index out of bounds: {index} (capacity {})",
                self.capacity
            )));
        }
        Ok(NONLEAF_HEADER_SIZE + index * 4)
    }

    pub fn key_at(&self, index: usize) -> Result<i32, NodeError> {
        let off = self.key_off(index)?;
        read_i32(self.buf, off)
    }

    pub fn child_at(&self, index: usize) -> Result<PageId, NodeError> {
        let off = self.child_off(index)?;
        read_u32(self.buf, off)
    }

    pub fn set_child_at(&mut self, index: usize, page_no: PageId) -> Result<(), NodeError> {
        let off = self.child_off(index)?;
        write_u32(self.buf, off, page_no)
    }

    /// Smallest index whose key is strictly greater than `key`, else
    /// `size`. This is both the insertion slot for a promoted separator
    /// and the child to descend into for `key`.
    pub fn upper_bound(&self, key: i32) -> Result<usize, NodeError> {
        let mut lo = 0usize;
        let mut hi = self.size()?;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid)? <= key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Smallest index whose key is greater than or equal to `key`, else
    /// `size`. Scans descend through this bound so that equal keys spilled
    /// to the left of a separator are still ahead of the cursor.
    pub fn lower_bound(&self, key: i32) -> Result<usize, NodeError> {
        let mut lo = 0usize;
        let mut hi = self.size()?;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid)? < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Insert separator `key` at `index` with `right_child` as the pointer
    /// to its right, shifting later keys and pointers.
    pub fn insert_separator_at(
        &mut self,
        index: usize,
        key: i32,
        right_child: PageId,
    ) -> Result<(), NodeError> {
        let size = self.size()?;
        if size >= self.capacity {
            return Err(NodeError::Corrupt("insert into full non-leaf".into()));
        }
        if index > size {
            return Err(NodeError::Corrupt(format!(
                "separator insertion index out of bounds: {index} (size {size})"
            )));
        }
        if index < size {
            let key_start = self.key_off(index)?;
            let key_end = self.key_off(size - 1)? + 4;
            self.buf.copy_within(key_start..key_end, key_start + 4);
        }
        {
            let child_start = self.child_off(index + 1)?;
            let child_end = self.child_off(size)? + 4;
            if child_start < child_end {
                self.buf
                    .copy_within(child_start..child_end, child_start + 4);
            }
        }
        let key_off = self.key_off(index)?;
        write_i32(self.buf, key_off, key)?;
        self.set_child_at(index + 1, right_child)?;
        self.set_size(size + 1)
    }

    /// Split where the incoming separator is itself promoted: keys
    /// `[mid..size)` and pointers `[mid+1..size+1)` move to `right`, whose
    /// leftmost pointer becomes `incoming_child`.
    fn split_promote_incoming(
        &mut self,
        right: &mut NonLeafNode<'_>,
        mid: usize,
        incoming_child: PageId,
    ) -> Result<(), NodeError> {
        let size = self.size()?;
        if mid > size {
            return Err(NodeError::Corrupt("split point out of bounds".into()));
        }
        let moved = size - mid;
        for i in 0..moved {
            let key = self.key_at(mid + i)?;
            let key_off = right.key_off(i)?;
            write_i32(right.buf, key_off, key)?;
            right.set_child_at(i + 1, self.child_at(mid + 1 + i)?)?;
        }
        self.zero_keys(mid, size)?;
        self.zero_children(mid + 1, size + 1)?;
        right.set_child_at(0, incoming_child)?;
        right.set_size(moved)?;
        self.set_size(mid)
    }

    /// Split promoting the resident separator at `mid`: keys
    /// `[mid+1..size)` and pointers `[mid+1..size+1)` move to `right`, the
    /// promoted slot is cleared, and the promoted key is returned.
    fn split_promote_resident(
        &mut self,
        right: &mut NonLeafNode<'_>,
        mid: usize,
    ) -> Result<i32, NodeError> {
        let size = self.size()?;
        if mid >= size {
            return Err(NodeError::Corrupt("split point out of bounds".into()));
        }
        let promoted = self.key_at(mid)?;
        let moved = size - mid - 1;
        for i in 0..moved {
            let key = self.key_at(mid + 1 + i)?;
            let key_off = right.key_off(i)?;
            write_i32(right.buf, key_off, key)?;
            right.set_child_at(i, self.child_at(mid + 1 + i)?)?;
        }
        right.set_child_at(moved, self.child_at(size)?)?;
        self.zero_keys(mid, size)?;
        self.zero_children(mid + 1, size + 1)?;
        right.set_size(moved)?;
        self.set_size(mid)?;
        Ok(promoted)
    }

    fn zero_keys(&mut self, from: usize, to: usize) -> Result<(), NodeError> {
        if from >= to {
            return Ok(());
        }
        let start = self.key_off(from)?;
        let end = self.key_off(to - 1)? + 4;
        self.buf[start..end].fill(0);
        Ok(())
    }

    fn zero_children(&mut self, from: usize, to: usize) -> Result<(), NodeError> {
        if from >= to {
            return Ok(());
        }
        let start = self.child_off(from)?;
        let end = self.child_off(to - 1)? + 4;
        self.buf[start..end].fill(0);
        Ok(())
    }
}

/// Probe a leaf for an insertion: returns the insertion index and the
/// current size.
pub(crate) fn leaf_probe(buf: &mut [u8], key: i32) -> Result<(usize, usize), NodeError> {
    let leaf = LeafNode::open(buf)?;
    Ok((leaf.upper_bound(key)?, leaf.size()?))
}

/// Insert into a leaf known to have room.
pub(crate) fn leaf_insert(
    buf: &mut [u8],
    index: usize,
    key: i32,
    rid: RecordId,
) -> Result<(), NodeError> {
    LeafNode::open(buf)?.insert_at(index, key, rid)
}

/// Split a full leaf into `right_buf`, inserting `(key, rid)` on the
/// correct side and splicing `right_page_no` into the sibling chain.
/// Returns the right sibling's first key, the separator to promote.
pub(crate) fn leaf_split(
    left_buf: &mut [u8],
    right_buf: &mut [u8],
    index: usize,
    key: i32,
    rid: RecordId,
    right_page_no: PageId,
) -> Result<i32, NodeError> {
    let capacity = leaf_capacity(left_buf.len());
    let mut mid = capacity / 2;
    if capacity % 2 == 1 && index > mid {
        mid += 1;
    }

    let mut left = LeafNode::open(left_buf)?;
    let mut right = LeafNode::init(right_buf)?;
    left.move_tail_to(&mut right, mid)?;

    if index > capacity / 2 {
        right.insert_at(index - mid, key, rid)?;
    } else {
        left.insert_at(index, key, rid)?;
    }

    right.set_right_sibling(left.right_sibling()?)?;
    left.set_right_sibling(right_page_no)?;
    right.key_at(0)
}

/// Probe a non-leaf for descent: returns the child to follow for `key`
/// and whether that child is a leaf.
pub(crate) fn nonleaf_probe(buf: &mut [u8], key: i32) -> Result<(PageId, bool), NodeError> {
    let node = NonLeafNode::open(buf)?;
    let index = node.upper_bound(key)?;
    let child = node.child_at(index)?;
    if child == INVALID_PAGE_NO {
        return Err(NodeError::Corrupt(format!(
            "null child pointer at index {index}"
        )));
    }
    Ok((child, node.level()? == 1))
}

/// Locate the slot for a promoted separator: returns the insertion index
/// and the current size.
pub(crate) fn separator_slot(buf: &mut [u8], key: i32) -> Result<(usize, usize), NodeError> {
    let node = NonLeafNode::open(buf)?;
    Ok((node.upper_bound(key)?, node.size()?))
}

/// Insert a promoted separator into a non-leaf known to have room.
pub(crate) fn nonleaf_insert(
    buf: &mut [u8],
    index: usize,
    key: i32,
    right_child: PageId,
) -> Result<(), NodeError> {
    NonLeafNode::open(buf)?.insert_separator_at(index, key, right_child)
}

/// Split a full non-leaf into `right_buf`, promoting exactly one
/// separator. Returns the promoted key.
///
/// `index` is where the incoming separator `key` would land. When it lands
/// exactly at the midpoint the incoming separator is promoted and its
/// right child becomes the split-off node's leftmost pointer; otherwise
/// the resident midpoint separator is promoted and the incoming pair is
/// inserted on whichever side it sorts into.
pub(crate) fn nonleaf_split(
    left_buf: &mut [u8],
    right_buf: &mut [u8],
    index: usize,
    key: i32,
    right_child: PageId,
) -> Result<i32, NodeError> {
    let capacity = nonleaf_capacity(left_buf.len());
    let mut mid = capacity / 2;

    let mut left = NonLeafNode::open(left_buf)?;
    let level = left.level()?;
    let mut right = NonLeafNode::init(right_buf, level)?;

    if index == mid {
        left.split_promote_incoming(&mut right, mid, right_child)?;
        return Ok(key);
    }

    if capacity % 2 == 0 && index < mid {
        mid -= 1;
    }
    let promoted = left.split_promote_resident(&mut right, mid)?;
    if index < capacity / 2 {
        left.insert_separator_at(index, key, right_child)?;
    } else {
        right.insert_separator_at(index - mid - 1, key, right_child)?;
    }
    Ok(promoted)
}

fn read_u8(buf: &[u8], off: usize) -> Result<u8, NodeError> {
    buf.get(off)
        .copied()
        .ok_or_else(|| NodeError::Corrupt("read_u8 out of bounds".into()))
}

fn write_u8(buf: &mut [u8], off: usize, v: u8) -> Result<(), NodeError> {
    let Some(b) = buf.get_mut(off) else {
        return Err(NodeError::Corrupt("write_u8 out of bounds".into()));
    };
    *b = v;
    Ok(())
}

fn read_u16(buf: &[u8], off: usize) -> Result<u16, NodeError> {
    if off + 2 > buf.len() {
        return Err(NodeError::Corrupt("read_u16 out of bounds".into()));
    }
    Ok(LittleEndian::read_u16(&buf[off..off + 2]))
}

fn write_u16(buf: &mut [u8], off: usize, v: u16) -> Result<(), NodeError> {
    if off + 2 > buf.len() {
        return Err(NodeError::Corrupt("write_u16 out of bounds".into()));
    }
    LittleEndian::write_u16(&mut buf[off..off + 2], v);
    Ok(())
}

fn read_u32(buf: &[u8], off: usize) -> Result<u32, NodeError> {
    if off + 4 > buf.len() {
        return Err(NodeError::Corrupt("read_u32 out of bounds".into()));
    }
    Ok(LittleEndian::read_u32(&buf[off..off + 4]))
}

fn write_u32(buf: &mut [u8], off: usize, v: u32) -> Result<(), NodeError> {
    if off + 4 > buf.len() {
        return Err(NodeError::Corrupt("write_u32 out of bounds".into()));
    }
    LittleEndian::write_u32(&mut buf[off..off + 4], v);
    Ok(())
}

fn read_i32(buf: &[u8], off: usize) -> Result<i32, NodeError> {
    if off + 4 > buf.len() {
        return Err(NodeError::Corrupt("read_i32 out of bounds".into()));
    }
    Ok(LittleEndian::read_i32(&buf[off..off + 4]))
}

fn write_i32(buf: &mut [u8], off: usize, v: i32) -> Result<(), NodeError> {
    if off + 4 > buf.len() {
        return Err(NodeError::Corrupt("write_i32 out of bounds".into()));
    }
    LittleEndian::write_i32(&mut buf[off..off + 4], v);
    Ok(())
}
