//! Descent context for structural mutations.

use oxbow_buffer::{BufferPool, WritePageGuard};
use oxbow_common::page::PageId;

/// The ordered set of guards a structural operation holds while it works:
/// the header page and every ancestor on the path down to the current
/// node, plus the child index taken at each internal level (recorded by
/// the deletion descent for sibling lookup).
///
/// Pages that become unreachable while their guard is still buried in the
/// write set are scheduled here and freed after `drop_all` releases the
/// guards, since the pool refuses to delete a pinned page.
pub struct Context<'a> {
    bpm: &'a BufferPool,
    /// Root page id snapshotted under the header latch.
    pub root_page_id: PageId,
    /// Write guard on the header page, held across the whole mutation.
    pub header: Option<WritePageGuard<'a>>,
    /// Write guards from the root down to the current node.
    pub write_set: Vec<WritePageGuard<'a>>,
    /// Child index taken at each internal level of the descent.
    pub child_indexes: Vec<usize>,
    /// Pages to free once their guards are released.
    pending_deletes: Vec<PageId>,
}

impl<'a> Context<'a> {
    /// Creates an empty context over the given pool.
    pub fn new(bpm: &'a BufferPool) -> Self {
        Self {
            bpm,
            root_page_id: PageId::INVALID,
            header: None,
            write_set: Vec::new(),
            child_indexes: Vec::new(),
            pending_deletes: Vec::new(),
        }
    }

    /// Schedules a page for deletion after the guards are released.
    pub fn schedule_delete(&mut self, page_id: PageId) {
        self.pending_deletes.push(page_id);
    }

    /// Releases every held guard in reverse acquisition order (write set
    /// from the deepest node up, header last), then frees the scheduled
    /// pages.
    pub fn drop_all(&mut self) {
        while let Some(guard) = self.write_set.pop() {
            drop(guard);
        }
        self.header = None;
        for page_id in std::mem::take(&mut self.pending_deletes) {
            self.bpm.delete_page(page_id);
        }
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        self.drop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxbow_buffer::{BufferPoolConfig, DiskManager, DiskManagerConfig};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_pool() -> (BufferPool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let disk = Arc::new(
            DiskManager::new(DiskManagerConfig {
                data_dir: dir.path().to_path_buf(),
                fsync_enabled: false,
            })
            .unwrap(),
        );
        (
            BufferPool::new(BufferPoolConfig { num_frames: 8 }, disk),
            dir,
        )
    }

    #[test]
    fn test_drop_all_releases_guards() {
        let (pool, _dir) = test_pool();
        let (pid_a, ga) = pool.new_page().unwrap();
        let (pid_b, gb) = pool.new_page().unwrap();

        let mut ctx = Context::new(&pool);
        ctx.header = Some(ga.upgrade_write());
        ctx.write_set.push(gb.upgrade_write());
        ctx.drop_all();

        // Both pages are unpinned now, so they can be deleted.
        assert!(pool.delete_page(pid_a));
        assert!(pool.delete_page(pid_b));
    }

    #[test]
    fn test_pending_deletes_run_after_release() {
        let (pool, _dir) = test_pool();
        let (pid, guard) = pool.new_page().unwrap();

        let mut ctx = Context::new(&pool);
        ctx.write_set.push(guard.upgrade_write());
        // The page is pinned by the write guard; deletion must wait.
        ctx.schedule_delete(pid);
        ctx.drop_all();

        assert!(!pool.contains(pid));
        // The id was recycled.
        let (pid2, _g) = pool.new_page().unwrap();
        assert_eq!(pid2, pid);
    }

    #[test]
    fn test_context_drop_releases_everything() {
        let (pool, _dir) = test_pool();
        let (pid, guard) = pool.new_page().unwrap();

        {
            let mut ctx = Context::new(&pool);
            ctx.write_set.push(guard.upgrade_write());
            ctx.schedule_delete(pid);
            // No explicit drop_all: the Drop impl covers error unwinds.
        }

        assert!(!pool.contains(pid));
    }
}
