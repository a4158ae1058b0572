//! Page table mapping resident pages to buffer frames.

use crate::frame::FrameId;
use oxbow_common::page::PageId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Number of shards. Must be a power of two.
const SHARD_COUNT: usize = 16;

/// Concurrent map from resident page ids to the frames holding them.
///
/// The map is sharded by page id so concurrent descents through different
/// subtrees rarely contend on the same lock. An index over a single data
/// file stays small enough that per-shard `HashMap`s are all the
/// structure this needs.
pub struct PageTable {
    shards: Vec<RwLock<HashMap<PageId, FrameId>>>,
}

impl PageTable {
    /// Creates a page table sized for the given number of frames.
    pub fn new(capacity: usize) -> Self {
        let per_shard = (capacity / SHARD_COUNT).max(8);
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::with_capacity(per_shard)))
            .collect();
        Self { shards }
    }

    #[inline]
    fn shard(&self, page_id: PageId) -> &RwLock<HashMap<PageId, FrameId>> {
        &self.shards[page_id.0 as usize & (SHARD_COUNT - 1)]
    }

    /// Looks up the frame holding a page, if it is resident.
    #[inline]
    pub fn get(&self, page_id: PageId) -> Option<FrameId> {
        self.shard(page_id).read().get(&page_id).copied()
    }

    /// Maps a page to a frame, replacing any existing mapping.
    pub fn insert(&self, page_id: PageId, frame_id: FrameId) {
        self.shard(page_id).write().insert(page_id, frame_id);
    }

    /// Removes a page's mapping. Returns the frame it occupied, if any.
    pub fn remove(&self, page_id: PageId) -> Option<FrameId> {
        self.shard(page_id).write().remove(&page_id)
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.shard(page_id).read().contains_key(&page_id)
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Returns true if no page is resident.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Visits every mapping. Stops early if the callback returns false.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(PageId, FrameId) -> bool,
    {
        for shard in &self.shards {
            for (page_id, frame_id) in shard.read().iter() {
                if !f(*page_id, *frame_id) {
                    return;
                }
            }
        }
    }
}
