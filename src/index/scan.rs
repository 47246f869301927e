use crate::errors::{IndexError, NodeError};
use crate::relation::RecordId;
use crate::storage::buffer::PinnedPage;
use crate::storage::file::{PageId, INVALID_PAGE_NO};

use super::layout::{LeafNode, NonLeafNode};
use super::BTreeIndex;

/// Comparison operator for scan bounds. The low bound accepts `Gt`/`Gte`,
/// the high bound `Lt`/`Lte`; any other pairing is rejected with
/// [`IndexError::BadOpcodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Gte,
    Gt,
}

fn satisfies_low(key: i32, low: i32, low_op: Operator) -> bool {
    match low_op {
        Operator::Gt => key > low,
        _ => key >= low,
    }
}

fn satisfies_high(key: i32, high: i32, high_op: Operator) -> bool {
    match high_op {
        Operator::Lt => key < high,
        _ => key <= high,
    }
}

/// Cursor state between `start_scan` and `end_scan`: the pinned leaf the
/// scan is positioned on and the next entry to report.
#[derive(Debug)]
pub(crate) struct ScanState {
    low: i32,
    high: i32,
    low_op: Operator,
    high_op: Operator,
    page: PinnedPage,
    next_entry: usize,
}

/// Outcome of probing one leaf for the first in-range entry.
enum Landing {
    Match(usize),
    PastHigh,
    Continue(PageId),
}

fn first_in_range(
    buf: &mut [u8],
    low: i32,
    low_op: Operator,
    high: i32,
    high_op: Operator,
) -> Result<Landing, NodeError> {
    let leaf = LeafNode::open(buf)?;
    let size = leaf.size()?;
    let start = if low_op == Operator::Gt {
        leaf.upper_bound(low)?
    } else {
        leaf.lower_bound(low)?
    };
    if start < size {
        let key = leaf.key_at(start)?;
        if satisfies_high(key, high, high_op) {
            Ok(Landing::Match(start))
        } else {
            Ok(Landing::PastHigh)
        }
    } else {
        Ok(Landing::Continue(leaf.right_sibling()?))
    }
}

/// One descent step toward the leaf that would contain `low`. The child
/// is chosen left of any separator equal to the bound: a run of equal
/// keys can straddle a split, and the sibling-chain walk picks up the
/// remainder.
fn descend_step(buf: &mut [u8], low: i32) -> Result<(PageId, bool), NodeError> {
    let node = NonLeafNode::open(buf)?;
    let index = node.lower_bound(low)?;
    let child = node.child_at(index)?;
    if child == INVALID_PAGE_NO {
        return Err(NodeError::Corrupt(format!(
            "null child pointer at index {index}"
        )));
    }
    Ok((child, node.level()? == 1))
}

impl BTreeIndex {
    /// Position a scan on the first entry within the given bounds.
    ///
    /// An already-executing scan is ended first. The landing leaf stays
    /// pinned until [`BTreeIndex::end_scan`] releases it; if no entry
    /// satisfies both bounds the scan fails with
    /// [`IndexError::NoSuchKeyFound`] and holds nothing.
    pub fn start_scan(
        &mut self,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<(), IndexError> {
        if low > high {
            return Err(IndexError::BadScanRange);
        }
        if !matches!(low_op, Operator::Gt | Operator::Gte)
            || !matches!(high_op, Operator::Lt | Operator::Lte)
        {
            return Err(IndexError::BadOpcodes);
        }
        if self.scan.is_some() {
            self.end_scan()?;
        }

        // Descend to the leaf that would contain the low bound.
        let (mut page_no, mut at_leaf) = self.root();
        while !at_leaf {
            let mut page = self.bufmgr().fetch_page(page_no)?;
            let step = descend_step(page.payload_mut(), low);
            self.bufmgr().unpin_page(page, false)?;
            let (child, child_is_leaf) = step?;
            page_no = child;
            at_leaf = child_is_leaf;
        }

        // Walk the sibling chain to the first entry inside the range.
        let mut page = self.bufmgr().fetch_page(page_no)?;
        loop {
            let landing = match first_in_range(page.payload_mut(), low, low_op, high, high_op) {
                Ok(landing) => landing,
                Err(err) => {
                    self.bufmgr().unpin_page(page, false)?;
                    return Err(err.into());
                }
            };
            match landing {
                Landing::Match(index) => {
                    self.scan = Some(ScanState {
                        low,
                        high,
                        low_op,
                        high_op,
                        page,
                        next_entry: index,
                    });
                    return Ok(());
                }
                Landing::PastHigh => {
                    self.bufmgr().unpin_page(page, false)?;
                    return Err(IndexError::NoSuchKeyFound);
                }
                Landing::Continue(right) => {
                    self.bufmgr().unpin_page(page, false)?;
                    if right == INVALID_PAGE_NO {
                        return Err(IndexError::NoSuchKeyFound);
                    }
                    page = self.bufmgr().fetch_page(right)?;
                }
            }
        }
    }

    /// Record id of the next entry matching the scan, advancing the
    /// cursor. Fails with [`IndexError::ScanComplete`] once the range or
    /// the sibling chain is exhausted; the scan stays active until
    /// [`BTreeIndex::end_scan`].
    pub fn scan_next(&mut self) -> Result<RecordId, IndexError> {
        let Some(state) = self.scan.as_mut() else {
            return Err(IndexError::ScanNotInitialized);
        };

        loop {
            let (size, right) = {
                let leaf = LeafNode::open(state.page.payload_mut())?;
                (leaf.size()?, leaf.right_sibling()?)
            };

            if state.next_entry >= size {
                if right == INVALID_PAGE_NO {
                    return Err(IndexError::ScanComplete);
                }
                let next = self.bufmgr.fetch_page(right)?;
                let done = std::mem::replace(&mut state.page, next);
                self.bufmgr.unpin_page(done, false)?;
                state.next_entry = 0;
                continue;
            }

            let (key, rid) = {
                let leaf = LeafNode::open(state.page.payload_mut())?;
                (
                    leaf.key_at(state.next_entry)?,
                    leaf.rid_at(state.next_entry)?,
                )
            };
            if !satisfies_high(key, state.high, state.high_op) {
                return Err(IndexError::ScanComplete);
            }
            if !satisfies_low(key, state.low, state.low_op) {
                state.next_entry += 1;
                continue;
            }
            state.next_entry += 1;
            return Ok(rid);
        }
    }

    /// Terminate the scan and release the cursor's pinned leaf.
    pub fn end_scan(&mut self) -> Result<(), IndexError> {
        let Some(state) = self.scan.take() else {
            return Err(IndexError::ScanNotInitialized);
        };
        self.bufmgr.unpin_page(state.page, false)?;
        Ok(())
    }

    /// Start a scan and drive it as an iterator over matching record ids.
    /// The scan ends when the cursor is dropped.
    pub fn range(
        &mut self,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<RangeScan<'_>, IndexError> {
        self.start_scan(low, low_op, high, high_op)?;
        Ok(RangeScan {
            index: self,
            done: false,
        })
    }
}

/// Iterator adapter over the scan primitives.
#[derive(Debug)]
pub struct RangeScan<'a> {
    index: &'a mut BTreeIndex,
    done: bool,
}

impl Iterator for RangeScan<'_> {
    type Item = Result<RecordId, IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.index.scan_next() {
            Ok(rid) => Some(Ok(rid)),
            Err(IndexError::ScanComplete) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl Drop for RangeScan<'_> {
    fn drop(&mut self) {
        let _ = self.index.end_scan();
    }
}
