use crate::errors::{IndexError, NodeError};
use crate::storage::file::{PageId, INVALID_PAGE_NO};

use super::layout::{LeafNode, NonLeafNode};
use super::BTreeIndex;

/// Shape summary reported by [`BTreeIndex::check_consistency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of node levels on every root-to-leaf path.
    pub height: usize,
    pub leaf_pages: usize,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct WalkTotals {
    leaf_pages: usize,
    entries: usize,
    leaf_depth: Option<usize>,
}

impl BTreeIndex {
    /// Walk the whole tree and verify its structural invariants:
    /// separator bounds per subtree, sorted keys, uniform root-to-leaf
    /// depth, level bookkeeping, and a sibling chain that enumerates
    /// every entry in ascending order exactly once.
    ///
    /// Subtree bounds are checked inclusively on both sides because a run
    /// of equal keys forced across a leaf split leaves the separator
    /// equal to keys on its left.
    pub fn check_consistency(&mut self) -> Result<TreeStats, IndexError> {
        let (root, root_is_leaf) = self.root();
        let mut totals = WalkTotals::default();
        let height = if root_is_leaf {
            self.walk_leaf(root, None, None, 1, &mut totals)?;
            1
        } else {
            let (height, _) = self.walk_nonleaf(root, None, None, 1, &mut totals)?;
            height
        };
        self.check_sibling_chain(totals.leaf_pages, totals.entries)?;
        Ok(TreeStats {
            height,
            leaf_pages: totals.leaf_pages,
            entries: totals.entries,
        })
    }

    fn walk_nonleaf(
        &mut self,
        page_no: PageId,
        lo: Option<i32>,
        hi: Option<i32>,
        depth: usize,
        totals: &mut WalkTotals,
    ) -> Result<(usize, u16), IndexError> {
        let mut page = self.bufmgr.fetch_page(page_no)?;
        let gathered = (|| {
            let node = NonLeafNode::open(page.payload_mut())?;
            let size = node.size()?;
            if size == 0 {
                return Err(NodeError::Corrupt(format!("empty non-leaf node {page_no}")));
            }
            let level = node.level()?;
            let mut keys = Vec::with_capacity(size);
            for i in 0..size {
                keys.push(node.key_at(i)?);
            }
            let mut children = Vec::with_capacity(size + 1);
            for i in 0..=size {
                children.push(node.child_at(i)?);
            }
            Ok((level, keys, children))
        })();
        self.bufmgr.unpin_page(page, false)?;
        let (level, keys, children) = gathered?;

        for pair in keys.windows(2) {
            if pair[0] > pair[1] {
                return Err(
                    NodeError::Corrupt(format!("separators out of order in node {page_no}"))
                        .into(),
                );
            }
        }
        if let (Some(lo), Some(&first)) = (lo, keys.first()) {
            if first < lo {
                return Err(NodeError::Corrupt(format!(
                    "separator below subtree bound in node {page_no}"
                ))
                .into());
            }
        }
        if let (Some(hi), Some(&last)) = (hi, keys.last()) {
            if last > hi {
                return Err(NodeError::Corrupt(format!(
                    "separator above subtree bound in node {page_no}"
                ))
                .into());
            }
        }
        if children.contains(&INVALID_PAGE_NO) {
            return Err(
                NodeError::Corrupt(format!("null child pointer in node {page_no}")).into(),
            );
        }

        let mut subtree_height: Option<usize> = None;
        for (i, &child) in children.iter().enumerate() {
            let child_lo = if i == 0 { lo } else { Some(keys[i - 1]) };
            let child_hi = if i == keys.len() { hi } else { Some(keys[i]) };
            let height = if level == 1 {
                self.walk_leaf(child, child_lo, child_hi, depth + 1, totals)?;
                1
            } else {
                let (height, child_level) =
                    self.walk_nonleaf(child, child_lo, child_hi, depth + 1, totals)?;
                if child_level != level - 1 {
                    return Err(NodeError::Corrupt(format!(
                        "level {child_level} under level {level} in node {page_no}"
                    ))
                    .into());
                }
                height
            };
            match subtree_height {
                None => subtree_height = Some(height),
                Some(prev) if prev != height => {
                    return Err(NodeError::Corrupt(format!(
                        "uneven subtree heights under node {page_no}"
                    ))
                    .into());
                }
                _ => {}
            }
        }

        let Some(below) = subtree_height else {
            return Err(NodeError::Corrupt(format!("childless node {page_no}")).into());
        };
        Ok((below + 1, level))
    }

    fn walk_leaf(
        &mut self,
        page_no: PageId,
        lo: Option<i32>,
        hi: Option<i32>,
        depth: usize,
        totals: &mut WalkTotals,
    ) -> Result<(), IndexError> {
        let mut page = self.bufmgr.fetch_page(page_no)?;
        let gathered = (|| {
            let leaf = LeafNode::open(page.payload_mut())?;
            let size = leaf.size()?;
            let mut keys = Vec::with_capacity(size);
            for i in 0..size {
                keys.push(leaf.key_at(i)?);
            }
            Ok::<_, NodeError>(keys)
        })();
        self.bufmgr.unpin_page(page, false)?;
        let keys = gathered?;

        for pair in keys.windows(2) {
            if pair[0] > pair[1] {
                return Err(
                    NodeError::Corrupt(format!("keys out of order in leaf {page_no}")).into(),
                );
            }
        }
        for &key in &keys {
            if lo.is_some_and(|lo| key < lo) || hi.is_some_and(|hi| key > hi) {
                return Err(NodeError::Corrupt(format!(
                    "key {key} outside subtree bounds in leaf {page_no}"
                ))
                .into());
            }
        }

        match totals.leaf_depth {
            None => totals.leaf_depth = Some(depth),
            Some(expected) if expected != depth => {
                return Err(NodeError::Corrupt(format!(
                    "leaf {page_no} at depth {depth}, expected {expected}"
                ))
                .into());
            }
            _ => {}
        }
        totals.leaf_pages += 1;
        totals.entries += keys.len();
        Ok(())
    }

    /// Follow `right_sib_page_no` from the leftmost leaf and require the
    /// chain to visit exactly the leaves and entries the tree walk found,
    /// in ascending key order, terminating at the null sentinel.
    fn check_sibling_chain(
        &mut self,
        expected_leaves: usize,
        expected_entries: usize,
    ) -> Result<(), IndexError> {
        let (mut page_no, mut at_leaf) = self.root();
        while !at_leaf {
            let mut page = self.bufmgr.fetch_page(page_no)?;
            let step = (|| {
                let node = NonLeafNode::open(page.payload_mut())?;
                Ok::<_, NodeError>((node.child_at(0)?, node.level()? == 1))
            })();
            self.bufmgr.unpin_page(page, false)?;
            let (child, child_is_leaf) = step?;
            page_no = child;
            at_leaf = child_is_leaf;
        }

        let mut leaves = 0usize;
        let mut entries = 0usize;
        let mut last_key: Option<i32> = None;
        loop {
            let mut page = self.bufmgr.fetch_page(page_no)?;
            let gathered = (|| {
                let leaf = LeafNode::open(page.payload_mut())?;
                let size = leaf.size()?;
                let mut keys = Vec::with_capacity(size);
                for i in 0..size {
                    keys.push(leaf.key_at(i)?);
                }
                Ok::<_, NodeError>((keys, leaf.right_sibling()?))
            })();
            self.bufmgr.unpin_page(page, false)?;
            let (keys, right) = gathered?;

            for key in keys {
                if last_key.is_some_and(|last| key < last) {
                    return Err(NodeError::Corrupt(format!(
                        "sibling chain out of order at leaf {page_no}"
                    ))
                    .into());
                }
                last_key = Some(key);
                entries += 1;
            }
            leaves += 1;

            if right == INVALID_PAGE_NO {
                break;
            }
            page_no = right;
        }

        if leaves != expected_leaves || entries != expected_entries {
            return Err(NodeError::Corrupt(format!(
                "sibling chain covers {leaves} leaves / {entries} entries, tree has {expected_leaves} / {expected_entries}"
            ))
            .into());
        }
        Ok(())
    }
}
