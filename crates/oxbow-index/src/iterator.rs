//! Ordered iteration over the leaf chain.

use crate::node::LeafPage;
use bytes::Bytes;
use oxbow_buffer::{BufferPool, ReadPageGuard};
use oxbow_common::page::{PageId, RecordId};
use oxbow_common::Result;

/// Cursor over the tree's leaves in ascending key order.
///
/// Holds at most one read guard, on the current leaf; stepping past the
/// last slot releases that guard before latching the next leaf through
/// the sibling chain. The end iterator holds no guard and names no page.
pub struct TreeIterator<'a> {
    bpm: &'a BufferPool,
    guard: Option<ReadPageGuard<'a>>,
    page_id: PageId,
    slot: usize,
}

impl<'a> TreeIterator<'a> {
    /// Iterator positioned at (page, slot).
    pub(crate) fn at(
        bpm: &'a BufferPool,
        guard: ReadPageGuard<'a>,
        page_id: PageId,
        slot: usize,
    ) -> Self {
        Self {
            bpm,
            guard: Some(guard),
            page_id,
            slot,
        }
    }

    /// The end sentinel.
    pub(crate) fn end(bpm: &'a BufferPool) -> Self {
        Self {
            bpm,
            guard: None,
            page_id: PageId::INVALID,
            slot: 0,
        }
    }

    /// Returns true if the iterator is exhausted.
    pub fn is_end(&self) -> bool {
        !self.page_id.is_valid()
    }

    /// Current position as (page id, slot); the end iterator reports
    /// (INVALID, 0).
    pub fn position(&self) -> (PageId, usize) {
        (self.page_id, self.slot)
    }

    /// Yields the entry under the cursor and advances, following the leaf
    /// chain when the current page is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(Bytes, RecordId)>> {
        let (key, record, next_page_id, leaf_size) = match &self.guard {
            None => return Ok(None),
            Some(guard) => {
                let leaf = LeafPage::new(guard.data());
                (
                    Bytes::copy_from_slice(leaf.key_at(self.slot)),
                    leaf.record_at(self.slot),
                    leaf.next_page_id(),
                    leaf.size(),
                )
            }
        };

        self.slot += 1;
        if self.slot >= leaf_size {
            // Release the current leaf before latching the next one.
            self.guard = None;
            if next_page_id.is_valid() {
                let guard = self.bpm.fetch_read(next_page_id)?;
                self.guard = Some(guard);
                self.page_id = next_page_id;
                self.slot = 0;
            } else {
                self.page_id = PageId::INVALID;
                self.slot = 0;
            }
        }

        Ok(Some((key, record)))
    }
}

impl Iterator for TreeIterator<'_> {
    type Item = Result<(Bytes, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
