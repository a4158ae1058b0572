//! Disk-backed B+tree index over the buffer pool.

use crate::comparator::{I64Comparator, KeyComparator};
use crate::context::Context;
use crate::iterator::TreeIterator;
use crate::node::{self, HeaderPage, InternalPage, LeafPage};
use oxbow_buffer::BufferPool;
use oxbow_common::config::IndexConfig;
use oxbow_common::page::{PageId, PageType, RecordId};
use oxbow_common::{OxbowError, Result};
use std::cmp::Ordering;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// A B+tree index mapping fixed-size keys to record ids.
///
/// Keys are unique. Every node is one page; a dedicated header page holds
/// the current root page id so concurrent operations always enter the
/// tree through a single latched word.
pub struct BPlusTree {
    /// Index name, for diagnostics.
    name: String,
    /// Page holding the root page id.
    header_page_id: PageId,
    /// Buffer pool backing every node page.
    bpm: Arc<BufferPool>,
    /// Injected total order over key bytes.
    comparator: Arc<dyn KeyComparator>,
    /// Maximum (key, record id) slots per leaf.
    leaf_max_size: u16,
    /// Maximum child pointers per internal node.
    internal_max_size: u16,
    /// Key width in bytes.
    key_size: u16,
}

impl BPlusTree {
    /// Creates a tree over an existing header page, resetting it to empty.
    pub fn new(
        name: impl Into<String>,
        header_page_id: PageId,
        bpm: Arc<BufferPool>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: u16,
        internal_max_size: u16,
        key_size: u16,
    ) -> Result<Self> {
        if key_size == 0 {
            return Err(OxbowError::InvalidParameter {
                name: "key_size".to_string(),
                value: key_size.to_string(),
            });
        }
        if leaf_max_size < 3 || leaf_max_size as usize > node::leaf_capacity(key_size as usize) {
            return Err(OxbowError::InvalidParameter {
                name: "leaf_max_size".to_string(),
                value: leaf_max_size.to_string(),
            });
        }
        if internal_max_size < 3
            || internal_max_size as usize > node::internal_capacity(key_size as usize)
        {
            return Err(OxbowError::InvalidParameter {
                name: "internal_max_size".to_string(),
                value: internal_max_size.to_string(),
            });
        }

        let tree = Self {
            name: name.into(),
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            key_size,
        };

        let mut header_guard = tree.bpm.fetch_write(header_page_id)?;
        HeaderPage::new(header_guard.data_mut()).set_root_page_id(PageId::INVALID);
        debug!(index = %tree.name, header = %header_page_id, "initialized index header");
        drop(header_guard);

        Ok(tree)
    }

    /// Creates a tree from an [`IndexConfig`].
    pub fn with_config(
        name: impl Into<String>,
        header_page_id: PageId,
        bpm: Arc<BufferPool>,
        comparator: Arc<dyn KeyComparator>,
        config: &IndexConfig,
    ) -> Result<Self> {
        Self::new(
            name,
            header_page_id,
            bpm,
            comparator,
            config.leaf_max_size,
            config.internal_max_size,
            config.key_size,
        )
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the buffer pool this tree runs on.
    pub(crate) fn pool(&self) -> &BufferPool {
        &self.bpm
    }

    /// Returns the injected comparator.
    pub(crate) fn comparator(&self) -> &dyn KeyComparator {
        self.comparator.as_ref()
    }

    /// Returns true if the tree holds no keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.get_root_page_id()?.is_valid())
    }

    /// Returns the current root page id, or INVALID for an empty tree.
    pub fn get_root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.fetch_read(self.header_page_id)?;
        Ok(HeaderPage::new(guard.data()).root_page_id())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_size as usize {
            return Err(OxbowError::KeySizeMismatch {
                expected: self.key_size as usize,
                actual: key.len(),
            });
        }
        Ok(())
    }

    /// Point lookup. Returns the record id mapped to `key`, if any.
    ///
    /// Descends with shared latches, acquiring each child before releasing
    /// its parent, then linearly scans the leaf for exact equality.
    pub fn get_value(&self, key: &[u8]) -> Result<Option<RecordId>> {
        self.check_key(key)?;

        let root_id = {
            let header_guard = self.bpm.fetch_read(self.header_page_id)?;
            HeaderPage::new(header_guard.data()).root_page_id()
        };
        if !root_id.is_valid() {
            return Ok(None);
        }

        let mut guard = self.bpm.fetch_read(root_id)?;
        loop {
            match node::page_type(guard.data()) {
                PageType::Leaf => {
                    let leaf = LeafPage::new(guard.data());
                    for i in 0..leaf.size() {
                        if self.comparator.compare(leaf.key_at(i), key) == Ordering::Equal {
                            return Ok(Some(leaf.record_at(i)));
                        }
                    }
                    return Ok(None);
                }
                PageType::Internal => {
                    let internal = InternalPage::new(guard.data());
                    let idx = internal.binary_find(self.comparator.as_ref(), key);
                    let child = internal.child_at(idx);
                    // Latch the child before the parent guard is released.
                    guard = self.bpm.fetch_read(child)?;
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        }
    }

    /// Inserts a (key, record id) pair. Returns false iff the key already
    /// exists; the tree is left unchanged in that case.
    pub fn insert(&self, key: &[u8], record: RecordId) -> Result<bool> {
        self.check_key(key)?;

        let mut ctx = Context::new(&self.bpm);
        let mut header_guard = self.bpm.fetch_write(self.header_page_id)?;
        let root_id = HeaderPage::new(header_guard.data()).root_page_id();

        if !root_id.is_valid() {
            // Empty tree: start a new root leaf with this single entry.
            let (new_root_id, basic) = self.bpm.new_page()?;
            let mut root_guard = basic.upgrade_write();
            let mut leaf = LeafPage::new(root_guard.data_mut());
            leaf.init(self.leaf_max_size, self.key_size);
            leaf.set_size(1);
            leaf.set_entry(0, key, record);
            HeaderPage::new(header_guard.data_mut()).set_root_page_id(new_root_id);
            debug!(index = %self.name, root = %new_root_id, "created root leaf");
            return Ok(true);
        }

        ctx.root_page_id = root_id;
        ctx.header = Some(header_guard);

        // Pessimistic write-crab from the root to the leaf, retaining the
        // whole ancestor chain so a split can reach upward.
        let mut pid = root_id;
        loop {
            let guard = self.bpm.fetch_write(pid)?;
            match node::page_type(guard.data()) {
                PageType::Leaf => {
                    ctx.write_set.push(guard);
                    break;
                }
                PageType::Internal => {
                    let internal = InternalPage::new(guard.data());
                    let idx = internal.binary_find(self.comparator.as_ref(), key);
                    pid = internal.child_at(idx);
                    ctx.write_set.push(guard);
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        }

        let leaf_pos = ctx.write_set.len() - 1;
        let (duplicate, insert_index) = {
            let leaf = LeafPage::new(ctx.write_set[leaf_pos].data());
            match leaf.binary_find(self.comparator.as_ref(), key) {
                Some(i) if self.comparator.compare(leaf.key_at(i), key) == Ordering::Equal => {
                    (true, i)
                }
                Some(i) => (false, i + 1),
                None => (false, 0),
            }
        };
        if duplicate {
            ctx.drop_all();
            return Ok(false);
        }

        let leaf_size = LeafPage::new(ctx.write_set[leaf_pos].data()).size();
        if leaf_size < self.leaf_max_size as usize {
            let mut leaf = LeafPage::new(ctx.write_set[leaf_pos].data_mut());
            leaf.insert_at(insert_index, key, record);
            ctx.drop_all();
            return Ok(true);
        }

        // Leaf is full: split, then push the right page's smallest key up.
        let (new_leaf_id, basic) = self.bpm.new_page()?;
        let mut new_guard = basic.upgrade_write();
        {
            let mut right = LeafPage::new(new_guard.data_mut());
            right.init(self.leaf_max_size, self.key_size);
        }
        {
            let mut left = LeafPage::new(ctx.write_set[leaf_pos].data_mut());
            let retain = left.min_size();
            let mut right = LeafPage::new(new_guard.data_mut());
            left.split_into(&mut right);
            right.set_next_page_id(left.next_page_id());
            left.set_next_page_id(new_leaf_id);
            if insert_index < retain {
                left.insert_at(insert_index, key, record);
            } else {
                right.insert_at(insert_index - retain, key, record);
            }
        }
        trace!(index = %self.name, right = %new_leaf_id, "split leaf");

        let push_up_key = LeafPage::new(new_guard.data()).key_at(0).to_vec();
        let depth = leaf_pos as isize - 1;
        self.insert_into_parent(&mut ctx, &push_up_key, new_leaf_id, depth)?;

        drop(new_guard);
        ctx.drop_all();
        Ok(true)
    }

    /// Inserts a promoted (key, right child) pair into the ancestor at
    /// `index` in the write set, splitting upward as needed. `index < 0`
    /// means the root itself split.
    fn insert_into_parent(
        &self,
        ctx: &mut Context<'_>,
        key: &[u8],
        right_page_id: PageId,
        index: isize,
    ) -> Result<()> {
        if index < 0 {
            // Root split: the old root becomes child 0 of a new root.
            let (new_root_id, basic) = self.bpm.new_page()?;
            let mut root_guard = basic.upgrade_write();
            let mut root = InternalPage::new(root_guard.data_mut());
            root.init(self.internal_max_size, self.key_size);
            root.set_size(2);
            root.set_child_at(0, ctx.write_set[0].page_id());
            root.set_key_at(1, key);
            root.set_child_at(1, right_page_id);

            let header = ctx.header.as_mut().ok_or_else(|| {
                OxbowError::IndexCorrupted("header guard missing during root split".to_string())
            })?;
            HeaderPage::new(header.data_mut()).set_root_page_id(new_root_id);
            debug!(index = %self.name, root = %new_root_id, "root split");
            return Ok(());
        }

        let parent_pos = index as usize;
        let insert_pos = {
            let parent = InternalPage::new(ctx.write_set[parent_pos].data());
            parent.binary_find(self.comparator.as_ref(), key) + 1
        };

        let parent_size = InternalPage::new(ctx.write_set[parent_pos].data()).size();
        if parent_size < self.internal_max_size as usize {
            let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
            parent.insert_at(insert_pos, key, right_page_id);
            return Ok(());
        }

        let (mid_key, new_internal_id) =
            self.split_internal(ctx, parent_pos, insert_pos, key, right_page_id)?;
        self.insert_into_parent(ctx, &mid_key, new_internal_id, index - 1)
    }

    /// Splits the full internal node at `parent_pos` while inserting the
    /// incoming (key, child) at `insert_pos` of the unified slot list.
    ///
    /// Returns the promoted middle key (removed from both halves) and the
    /// new right sibling's page id.
    fn split_internal(
        &self,
        ctx: &mut Context<'_>,
        parent_pos: usize,
        insert_pos: usize,
        key: &[u8],
        right_page_id: PageId,
    ) -> Result<(Vec<u8>, PageId)> {
        let (mut all_keys, mut all_children) = {
            let parent = InternalPage::new(ctx.write_set[parent_pos].data());
            let size = parent.size();
            let mut keys: Vec<Vec<u8>> = Vec::with_capacity(size);
            let mut children: Vec<PageId> = Vec::with_capacity(size + 1);
            for i in 0..size {
                children.push(parent.child_at(i));
                if i != 0 {
                    keys.push(parent.key_at(i).to_vec());
                }
            }
            (keys, children)
        };
        all_keys.insert(insert_pos - 1, key.to_vec());
        all_children.insert(insert_pos, right_page_id);

        let (new_internal_id, basic) = self.bpm.new_page()?;
        let mut new_guard = basic.upgrade_write();

        let total = all_children.len();
        let mid = total / 2;
        let mid_key = all_keys[mid - 1].clone();

        {
            let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
            parent.set_size(mid);
            for (i, child) in all_children[..mid].iter().enumerate() {
                parent.set_child_at(i, *child);
            }
            for i in 1..mid {
                parent.set_key_at(i, &all_keys[i - 1]);
            }
        }
        {
            let mut right = InternalPage::new(new_guard.data_mut());
            right.init(self.internal_max_size, self.key_size);
            right.set_size(total - mid);
            for i in 0..(total - mid) {
                right.set_child_at(i, all_children[i + mid]);
            }
            for i in 1..(total - mid) {
                right.set_key_at(i, &all_keys[i + mid - 1]);
            }
        }
        trace!(index = %self.name, right = %new_internal_id, "split internal node");

        Ok((mid_key, new_internal_id))
    }

    /// Removes `key` from the tree. No-op if the key is absent.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;

        let mut ctx = Context::new(&self.bpm);
        let header_guard = self.bpm.fetch_write(self.header_page_id)?;
        let root_id = HeaderPage::new(header_guard.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(());
        }
        ctx.root_page_id = root_id;
        ctx.header = Some(header_guard);

        // Write-crab down, recording the child index taken at each level
        // so underflow repair can find siblings through the parent.
        let mut pid = root_id;
        loop {
            let guard = self.bpm.fetch_write(pid)?;
            match node::page_type(guard.data()) {
                PageType::Leaf => {
                    ctx.write_set.push(guard);
                    break;
                }
                PageType::Internal => {
                    let internal = InternalPage::new(guard.data());
                    let idx = internal.binary_find(self.comparator.as_ref(), key);
                    pid = internal.child_at(idx);
                    ctx.child_indexes.push(idx);
                    ctx.write_set.push(guard);
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        }

        let leaf_pos = ctx.write_set.len() - 1;
        let leaf_page_id = ctx.write_set[leaf_pos].page_id();

        let found = {
            let leaf = LeafPage::new(ctx.write_set[leaf_pos].data());
            match leaf.binary_find(self.comparator.as_ref(), key) {
                Some(i) if self.comparator.compare(leaf.key_at(i), key) == Ordering::Equal => {
                    Some(i)
                }
                _ => None,
            }
        };
        let Some(remove_index) = found else {
            ctx.drop_all();
            return Ok(());
        };
        {
            let mut leaf = LeafPage::new(ctx.write_set[leaf_pos].data_mut());
            leaf.remove_at(remove_index);
        }

        let (leaf_size, leaf_min) = {
            let leaf = LeafPage::new(ctx.write_set[leaf_pos].data());
            (leaf.size(), leaf.min_size())
        };
        if leaf_size >= leaf_min {
            ctx.drop_all();
            return Ok(());
        }

        if ctx.root_page_id == leaf_page_id {
            // A root leaf may shrink to a single entry; at zero the tree
            // becomes empty and the root page is freed.
            if leaf_size == 0 {
                let header = ctx.header.as_mut().ok_or_else(|| {
                    OxbowError::IndexCorrupted("header guard missing during root collapse".into())
                })?;
                HeaderPage::new(header.data_mut()).set_root_page_id(PageId::INVALID);
                ctx.schedule_delete(leaf_page_id);
                debug!(index = %self.name, "tree emptied");
            }
            ctx.drop_all();
            return Ok(());
        }

        self.rebalance_leaf(&mut ctx, leaf_pos, leaf_size)?;
        ctx.drop_all();
        Ok(())
    }

    /// Repairs an underfull leaf against a same-parent sibling: right
    /// sibling first, else left; merge when both fit in one page, else
    /// borrow one entry.
    fn rebalance_leaf(
        &self,
        ctx: &mut Context<'_>,
        leaf_pos: usize,
        leaf_size: usize,
    ) -> Result<()> {
        let parent_pos = leaf_pos - 1;
        let pos_in_parent = *ctx.child_indexes.last().ok_or_else(|| {
            OxbowError::IndexCorrupted("descent recorded no child index".to_string())
        })?;
        let parent_size = InternalPage::new(ctx.write_set[parent_pos].data()).size();
        let leaf_page_id = ctx.write_set[leaf_pos].page_id();

        if pos_in_parent + 1 < parent_size {
            // The next leaf in the chain shares this parent.
            let right_id =
                InternalPage::new(ctx.write_set[parent_pos].data()).child_at(pos_in_parent + 1);
            let mut right_guard = self.bpm.fetch_write(right_id)?;
            let right_size = LeafPage::new(right_guard.data()).size();

            if leaf_size + right_size <= self.leaf_max_size as usize {
                // Merge the right sibling into this leaf.
                let (entries, right_next) = {
                    let right = LeafPage::new(right_guard.data());
                    let mut entries = Vec::with_capacity(right.size());
                    for i in 0..right.size() {
                        entries.push((right.key_at(i).to_vec(), right.record_at(i)));
                    }
                    (entries, right.next_page_id())
                };
                {
                    let mut leaf = LeafPage::new(ctx.write_set[leaf_pos].data_mut());
                    for (k, r) in &entries {
                        leaf.push_back(k, *r);
                    }
                    leaf.set_next_page_id(right_next);
                }
                drop(right_guard);
                self.bpm.delete_page(right_id);
                trace!(index = %self.name, absorbed = %right_id, "merged right leaf");
                self.remove_from_parent(ctx, pos_in_parent + 1, parent_pos)?;
            } else {
                // Borrow the smallest entry from the right sibling.
                let (borrowed_key, borrowed_record) = {
                    let right = LeafPage::new(right_guard.data());
                    (right.key_at(0).to_vec(), right.record_at(0))
                };
                {
                    let mut leaf = LeafPage::new(ctx.write_set[leaf_pos].data_mut());
                    leaf.push_back(&borrowed_key, borrowed_record);
                }
                {
                    let mut right = LeafPage::new(right_guard.data_mut());
                    right.remove_at(0);
                }
                let new_separator = LeafPage::new(right_guard.data()).key_at(0).to_vec();
                {
                    let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
                    parent.set_key_at(pos_in_parent + 1, &new_separator);
                }
                trace!(index = %self.name, from = %right_id, "borrowed from right leaf");
            }
        } else if pos_in_parent > 0 {
            let left_id =
                InternalPage::new(ctx.write_set[parent_pos].data()).child_at(pos_in_parent - 1);
            let mut left_guard = self.bpm.fetch_write(left_id)?;
            let left_size = LeafPage::new(left_guard.data()).size();

            if leaf_size + left_size <= self.leaf_max_size as usize {
                // Merge this leaf into the left sibling.
                let (entries, leaf_next) = {
                    let leaf = LeafPage::new(ctx.write_set[leaf_pos].data());
                    let mut entries = Vec::with_capacity(leaf.size());
                    for i in 0..leaf.size() {
                        entries.push((leaf.key_at(i).to_vec(), leaf.record_at(i)));
                    }
                    (entries, leaf.next_page_id())
                };
                {
                    let mut left = LeafPage::new(left_guard.data_mut());
                    for (k, r) in &entries {
                        left.push_back(k, *r);
                    }
                    left.set_next_page_id(leaf_next);
                }
                drop(left_guard);
                ctx.schedule_delete(leaf_page_id);
                trace!(index = %self.name, absorbed = %leaf_page_id, "merged into left leaf");
                self.remove_from_parent(ctx, pos_in_parent, parent_pos)?;
            } else {
                // Borrow the largest entry from the left sibling.
                let (borrowed_key, borrowed_record) = {
                    let left = LeafPage::new(left_guard.data());
                    let last = left.size() - 1;
                    (left.key_at(last).to_vec(), left.record_at(last))
                };
                {
                    let mut left = LeafPage::new(left_guard.data_mut());
                    let last = left.size() - 1;
                    left.remove_at(last);
                }
                {
                    let mut leaf = LeafPage::new(ctx.write_set[leaf_pos].data_mut());
                    leaf.insert_at(0, &borrowed_key, borrowed_record);
                }
                {
                    let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
                    parent.set_key_at(pos_in_parent, &borrowed_key);
                }
                trace!(index = %self.name, from = %left_id, "borrowed from left leaf");
            }
        }
        Ok(())
    }

    /// Removes the (key, child) slot at `child_index` from the internal
    /// node at `parent_pos`, then repairs any underflow by borrowing from
    /// a sibling (right first, then left) or merging, cascading upward.
    fn remove_from_parent(
        &self,
        ctx: &mut Context<'_>,
        child_index: usize,
        parent_pos: usize,
    ) -> Result<()> {
        let parent_page_id = ctx.write_set[parent_pos].page_id();
        {
            let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
            parent.remove_at(child_index);
        }

        let (parent_size, parent_min) = {
            let parent = InternalPage::new(ctx.write_set[parent_pos].data());
            (parent.size(), parent.min_size())
        };
        if parent_size >= parent_min {
            return Ok(());
        }

        if ctx.root_page_id == parent_page_id {
            // The root may thin out to a single child; promote it and free
            // the old root page.
            if parent_size == 1 {
                let only_child =
                    InternalPage::new(ctx.write_set[parent_pos].data()).child_at(0);
                let header = ctx.header.as_mut().ok_or_else(|| {
                    OxbowError::IndexCorrupted("header guard missing during root collapse".into())
                })?;
                HeaderPage::new(header.data_mut()).set_root_page_id(only_child);
                ctx.schedule_delete(parent_page_id);
                debug!(index = %self.name, root = %only_child, "root collapsed");
            }
            return Ok(());
        }

        let grand_pos = parent_pos - 1;
        let pos_in_grand = {
            let grand = InternalPage::new(ctx.write_set[grand_pos].data());
            let mut found = None;
            for i in 0..grand.size() {
                if grand.child_at(i) == parent_page_id {
                    found = Some(i);
                    break;
                }
            }
            found.ok_or_else(|| {
                OxbowError::IndexCorrupted("parent not found in grandparent".to_string())
            })?
        };
        let grand_size = InternalPage::new(ctx.write_set[grand_pos].data()).size();

        // Borrow from the right sibling if it has slack.
        if pos_in_grand + 1 < grand_size {
            let right_id =
                InternalPage::new(ctx.write_set[grand_pos].data()).child_at(pos_in_grand + 1);
            let mut right_guard = self.bpm.fetch_write(right_id)?;
            let (right_size, right_min) = {
                let right = InternalPage::new(right_guard.data());
                (right.size(), right.min_size())
            };
            if right_size > right_min {
                // Rotate left: the separator comes down to this node, the
                // right sibling's first child moves over, and its next key
                // becomes the new separator.
                let separator = InternalPage::new(ctx.write_set[grand_pos].data())
                    .key_at(pos_in_grand + 1)
                    .to_vec();
                let (moved_child, new_separator) = {
                    let right = InternalPage::new(right_guard.data());
                    (right.child_at(0), right.key_at(1).to_vec())
                };
                {
                    let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
                    let n = parent.size();
                    parent.set_size(n + 1);
                    parent.set_key_at(n, &separator);
                    parent.set_child_at(n, moved_child);
                }
                {
                    let mut grand = InternalPage::new(ctx.write_set[grand_pos].data_mut());
                    grand.set_key_at(pos_in_grand + 1, &new_separator);
                }
                {
                    let mut right = InternalPage::new(right_guard.data_mut());
                    right.remove_at(0);
                }
                trace!(index = %self.name, from = %right_id, "borrowed from right internal");
                return Ok(());
            }
        }

        // Borrow from the left sibling if it has slack.
        if pos_in_grand > 0 {
            let left_id =
                InternalPage::new(ctx.write_set[grand_pos].data()).child_at(pos_in_grand - 1);
            let mut left_guard = self.bpm.fetch_write(left_id)?;
            let (left_size, left_min) = {
                let left = InternalPage::new(left_guard.data());
                (left.size(), left.min_size())
            };
            if left_size > left_min {
                // Rotate right: the separator comes down as this node's
                // first key, the left sibling's last child moves over, and
                // its last key rises into the grandparent.
                let separator = InternalPage::new(ctx.write_set[grand_pos].data())
                    .key_at(pos_in_grand)
                    .to_vec();
                let (moved_child, risen_key) = {
                    let left = InternalPage::new(left_guard.data());
                    let last = left.size() - 1;
                    (left.child_at(last), left.key_at(last).to_vec())
                };
                {
                    let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
                    // Slot 0's key region is unused, so the separator is
                    // seated at slot 1 after the shift.
                    parent.insert_at(0, &separator, moved_child);
                    parent.set_key_at(1, &separator);
                }
                {
                    let mut grand = InternalPage::new(ctx.write_set[grand_pos].data_mut());
                    grand.set_key_at(pos_in_grand, &risen_key);
                }
                {
                    let mut left = InternalPage::new(left_guard.data_mut());
                    left.set_size(left_size - 1);
                }
                trace!(index = %self.name, from = %left_id, "borrowed from left internal");
                return Ok(());
            }
        }

        // No slack anywhere: merge. The grandparent separator joins the
        // two halves, seated at the absorbed side's slot-0 key position.
        if pos_in_grand + 1 < grand_size {
            let right_id =
                InternalPage::new(ctx.write_set[grand_pos].data()).child_at(pos_in_grand + 1);
            let right_guard = self.bpm.fetch_write(right_id)?;
            let separator = InternalPage::new(ctx.write_set[grand_pos].data())
                .key_at(pos_in_grand + 1)
                .to_vec();
            let entries = {
                let right = InternalPage::new(right_guard.data());
                let mut entries = Vec::with_capacity(right.size());
                for i in 0..right.size() {
                    entries.push((right.key_at(i).to_vec(), right.child_at(i)));
                }
                entries
            };
            {
                let mut parent = InternalPage::new(ctx.write_set[parent_pos].data_mut());
                let old_size = parent.size();
                parent.set_size(old_size + entries.len());
                for (i, (k, child)) in entries.iter().enumerate() {
                    parent.set_child_at(old_size + i, *child);
                    if i == 0 {
                        parent.set_key_at(old_size, &separator);
                    } else {
                        parent.set_key_at(old_size + i, k);
                    }
                }
            }
            drop(right_guard);
            self.bpm.delete_page(right_id);
            trace!(index = %self.name, absorbed = %right_id, "merged right internal");
            self.remove_from_parent(ctx, pos_in_grand + 1, grand_pos)
        } else if pos_in_grand > 0 {
            let left_id =
                InternalPage::new(ctx.write_set[grand_pos].data()).child_at(pos_in_grand - 1);
            let mut left_guard = self.bpm.fetch_write(left_id)?;
            let separator = InternalPage::new(ctx.write_set[grand_pos].data())
                .key_at(pos_in_grand)
                .to_vec();
            let entries = {
                let parent = InternalPage::new(ctx.write_set[parent_pos].data());
                let mut entries = Vec::with_capacity(parent.size());
                for i in 0..parent.size() {
                    entries.push((parent.key_at(i).to_vec(), parent.child_at(i)));
                }
                entries
            };
            {
                let mut left = InternalPage::new(left_guard.data_mut());
                let old_size = left.size();
                left.set_size(old_size + entries.len());
                for (i, (k, child)) in entries.iter().enumerate() {
                    left.set_child_at(old_size + i, *child);
                    if i == 0 {
                        left.set_key_at(old_size, &separator);
                    } else {
                        left.set_key_at(old_size + i, k);
                    }
                }
            }
            drop(left_guard);
            ctx.schedule_delete(parent_page_id);
            trace!(index = %self.name, absorbed = %parent_page_id, "merged into left internal");
            self.remove_from_parent(ctx, pos_in_grand, grand_pos)
        } else {
            Err(OxbowError::IndexCorrupted(
                "underfull internal node has no siblings".to_string(),
            ))
        }
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<TreeIterator<'_>> {
        let root_id = {
            let header_guard = self.bpm.fetch_read(self.header_page_id)?;
            HeaderPage::new(header_guard.data()).root_page_id()
        };
        if !root_id.is_valid() {
            return Ok(self.end());
        }

        let mut guard = self.bpm.fetch_read(root_id)?;
        loop {
            match node::page_type(guard.data()) {
                PageType::Leaf => {
                    let page_id = guard.page_id();
                    return Ok(TreeIterator::at(&self.bpm, guard, page_id, 0));
                }
                PageType::Internal => {
                    let child = InternalPage::new(guard.data()).child_at(0);
                    guard = self.bpm.fetch_read(child)?;
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        }
    }

    /// Iterator positioned at `key`, or the end iterator if `key` is not
    /// present (exact-match seek).
    pub fn begin_from(&self, key: &[u8]) -> Result<TreeIterator<'_>> {
        self.check_key(key)?;

        let root_id = {
            let header_guard = self.bpm.fetch_read(self.header_page_id)?;
            HeaderPage::new(header_guard.data()).root_page_id()
        };
        if !root_id.is_valid() {
            return Ok(self.end());
        }

        let mut guard = self.bpm.fetch_read(root_id)?;
        loop {
            match node::page_type(guard.data()) {
                PageType::Leaf => {
                    let slot = {
                        let leaf = LeafPage::new(guard.data());
                        match leaf.binary_find(self.comparator.as_ref(), key) {
                            Some(i)
                                if self.comparator.compare(leaf.key_at(i), key)
                                    == Ordering::Equal =>
                            {
                                Some(i)
                            }
                            _ => None,
                        }
                    };
                    return match slot {
                        Some(slot) => {
                            let page_id = guard.page_id();
                            Ok(TreeIterator::at(&self.bpm, guard, page_id, slot))
                        }
                        None => Ok(self.end()),
                    };
                }
                PageType::Internal => {
                    let internal = InternalPage::new(guard.data());
                    let idx = internal.binary_find(self.comparator.as_ref(), key);
                    let child = internal.child_at(idx);
                    guard = self.bpm.fetch_read(child)?;
                }
                PageType::Invalid => return Err(OxbowError::InvalidNodeType),
            }
        }
    }

    /// The end iterator.
    pub fn end(&self) -> TreeIterator<'_> {
        TreeIterator::end(&self.bpm)
    }

    /// Inserts integer keys read from a file, one per line. Harness helper.
    pub fn insert_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::open(path)?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(value) = trimmed.parse::<i64>() {
                self.insert(&I64Comparator::encode(value), record_for(value))?;
            }
        }
        Ok(())
    }

    /// Removes integer keys read from a file, one per line. Harness helper.
    pub fn remove_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::open(path)?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(value) = trimmed.parse::<i64>() {
                self.remove(&I64Comparator::encode(value))?;
            }
        }
        Ok(())
    }

    /// Applies `i <key>` / `d <key>` operations read from a file. Harness
    /// helper.
    pub fn batch_ops_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::open(path)?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let (Some(op), Some(raw_key)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(value) = raw_key.parse::<i64>() else {
                continue;
            };
            match op {
                "i" => {
                    self.insert(&I64Comparator::encode(value), record_for(value))?;
                }
                "d" => {
                    self.remove(&I64Comparator::encode(value))?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Record id the batch harness derives from an integer key.
fn record_for(value: i64) -> RecordId {
    RecordId::new(PageId((value >> 32) as u32), value as u16)
}
