//! Buffer pool manager.

use crate::disk::DiskManager;
use crate::frame::{BufferFrame, FrameId};
use crate::guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use crate::page_table::PageTable;
use crate::replacer::{ClockReplacer, Replacer};
use oxbow_common::page::{PageId, PAGE_SIZE};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use sysinfo::System;
use tracing::trace;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with:
/// - Page id to frame id mapping (lock-free page table)
/// - Free frame list for new pages
/// - Clock replacement for eviction, with write-back of dirty victims
/// - Pin counting and per-page latches handed out through typed guards
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Page id to frame id mapping, sharded by page id.
    page_table: PageTable,
    /// List of free frame ids.
    free_list: Mutex<Vec<FrameId>>,
    /// Page replacement policy.
    replacer: ClockReplacer,
    /// Backing store for page data.
    disk: Arc<DiskManager>,
    /// Recycled page ids, reused before extending the data file.
    free_pages: Mutex<Vec<PageId>>,
    /// Serializes the miss path so one page never occupies two frames.
    load_lock: Mutex<()>,
}

impl BufferPool {
    /// Creates a new buffer pool over the given disk manager.
    pub fn new(config: BufferPoolConfig, disk: Arc<DiskManager>) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list
        let free_list: Vec<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            config,
            frames,
            page_table: PageTable::new(num_frames),
            free_list: Mutex::new(free_list),
            replacer: ClockReplacer::new(num_frames),
            disk,
            free_pages: Mutex::new(Vec::new()),
            load_lock: Mutex::new(()),
        }
    }

    /// Creates a buffer pool sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so caching stays useful on low-memory systems.
    pub fn auto_sized(disk: Arc<DiskManager>) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(BufferPoolConfig { num_frames }, disk)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of pages currently in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Checks if a page is resident in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.contains(page_id)
    }

    /// Pins the frame holding `page_id`, loading the page from disk on a miss.
    fn fetch_frame(&self, page_id: PageId) -> Result<&BufferFrame> {
        loop {
            if let Some(frame_id) = self.page_table.get(page_id) {
                let frame = &self.frames[frame_id.0 as usize];
                frame.pin();
                // Validate the mapping after pinning: eviction may have
                // claimed this frame between the lookup and the pin.
                if self.page_table.get(page_id) == Some(frame_id)
                    && frame.page_id() == page_id
                {
                    self.replacer.record_access(frame_id);
                    return Ok(frame);
                }
                frame.unpin();
                continue;
            }

            let _load = self.load_lock.lock();
            // Another thread may have loaded the page while we waited.
            if self.page_table.get(page_id).is_some() {
                continue;
            }

            let frame_id = self.take_frame()?;
            let frame = &self.frames[frame_id.0 as usize];

            let data = match self.disk.read_page(page_id) {
                Ok(data) => data,
                Err(e) => {
                    self.free_list.lock().push(frame_id);
                    return Err(e);
                }
            };
            frame.load(&data);
            frame.set_page_id(page_id);
            frame.pin();
            self.replacer.record_access(frame_id);
            self.page_table.insert(page_id, frame_id);
            return Ok(frame);
        }
    }

    /// Obtains a reset frame: from the free list, else by eviction.
    ///
    /// Dirty victims are written back to disk before their frame is reused.
    fn take_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            self.frames[frame_id.0 as usize].reset();
            return Ok(frame_id);
        }

        loop {
            let victim = self
                .replacer
                .evict(&|fid| {
                    let frame = &self.frames[fid.0 as usize];
                    frame.pin_count() == 0 && !frame.is_free()
                })
                .ok_or(OxbowError::BufferPoolFull)?;

            let frame = &self.frames[victim.0 as usize];
            let old_page_id = frame.page_id();
            if !old_page_id.is_valid() {
                continue;
            }

            // Unmap first so no new reader can pin it, then re-check the
            // pin count to settle races with fetches already in flight.
            self.page_table.remove(old_page_id);
            if frame.pin_count() > 0 {
                self.page_table.insert(old_page_id, victim);
                continue;
            }

            if frame.is_dirty() {
                let data = frame.latch_shared();
                let written = self.disk.write_page(old_page_id, &data);
                drop(data);
                if let Err(e) = written {
                    self.page_table.insert(old_page_id, victim);
                    return Err(e);
                }
                trace!(page = %old_page_id, "wrote back dirty page on eviction");
            }

            frame.reset();
            return Ok(victim);
        }
    }

    /// Fetches a page with a shared latch.
    pub fn fetch_read(&self, page_id: PageId) -> Result<ReadPageGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        Ok(ReadPageGuard::new(frame, page_id))
    }

    /// Fetches a page with an exclusive latch.
    pub fn fetch_write(&self, page_id: PageId) -> Result<WritePageGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        Ok(WritePageGuard::new(frame, page_id))
    }

    /// Fetches a page with a pin but no latch.
    pub fn fetch_basic(&self, page_id: PageId) -> Result<BasicPageGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        Ok(BasicPageGuard::new(frame, page_id))
    }

    /// Allocates a new zeroed page and returns it pinned behind a basic
    /// guard, upgradable to a write guard without unpinning.
    pub fn new_page(&self) -> Result<(PageId, BasicPageGuard<'_>)> {
        let page_id = match self.free_pages.lock().pop() {
            Some(pid) => pid,
            None => self.disk.allocate_page()?,
        };

        let _load = self.load_lock.lock();
        let frame_id = match self.take_frame() {
            Ok(fid) => fid,
            Err(e) => {
                self.free_pages.lock().push(page_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0 as usize];
        frame.set_page_id(page_id);
        // A fresh page only exists in memory until written back.
        frame.set_dirty(true);
        frame.pin();
        self.replacer.record_access(frame_id);
        self.page_table.insert(page_id, frame_id);

        Ok((page_id, BasicPageGuard::new(frame, page_id)))
    }

    /// Deletes a page, recycling its id for future allocations.
    ///
    /// Returns false if the page is still pinned. Idempotent once the page
    /// is unmapped.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        if let Some(frame_id) = self.page_table.remove(page_id) {
            let frame = &self.frames[frame_id.0 as usize];

            // Cannot delete a pinned page - restore the mapping
            if frame.is_pinned() {
                self.page_table.insert(page_id, frame_id);
                return false;
            }

            self.replacer.remove(frame_id);
            frame.reset();
            self.free_list.lock().push(frame_id);
        }

        let mut free_pages = self.free_pages.lock();
        if !free_pages.contains(&page_id) {
            free_pages.push(page_id);
        }
        true
    }

    /// Writes every dirty resident page back to disk.
    ///
    /// Returns the number of pages flushed.
    pub fn flush_all(&self) -> Result<usize> {
        let mut entries = Vec::new();
        self.page_table.for_each(|page_id, frame_id| {
            entries.push((page_id, frame_id));
            true
        });

        let mut flushed = 0;
        for (page_id, frame_id) in entries {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_dirty() && frame.page_id() == page_id {
                let data = frame.latch_shared();
                self.disk.write_page(page_id, &data)?;
                drop(data);
                frame.set_dirty(false);
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned_count = 0;
        let mut dirty_count = 0;

        self.page_table.for_each(|_, frame_id| {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_count += 1;
            }
            if frame.is_dirty() {
                dirty_count += 1;
            }
            true
        });

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: self.free_count(),
            used_frames: self.page_table.len(),
            pinned_frames: pinned_count,
            dirty_frames: dirty_count,
        }
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames with pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}
