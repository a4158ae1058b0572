//! Typed RAII page guards.
//!
//! Each guard binds exactly one (pin + latch) acquisition on one page.
//! Dropping a guard releases the latch first, then the pin; Rust ownership
//! makes release at-most-once by construction, and early release is a
//! plain `drop(guard)`.

use crate::frame::BufferFrame;
use oxbow_common::page::{PageId, PAGE_SIZE};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

/// Shared-latch page guard: pin plus a held read latch.
pub struct ReadPageGuard<'a> {
    frame: &'a BufferFrame,
    page_id: PageId,
    latch: Option<RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>>,
}

impl<'a> ReadPageGuard<'a> {
    pub(crate) fn new(frame: &'a BufferFrame, page_id: PageId) -> Self {
        let latch = frame.latch_shared();
        Self {
            frame,
            page_id,
            latch: Some(latch),
        }
    }

    /// Returns the guarded page id.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        self.latch
            .as_ref()
            .map(|latch| &***latch)
            .expect("page guard used after release")
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        // Latch first, then pin.
        self.latch.take();
        self.frame.unpin();
    }
}

/// Exclusive-latch page guard: pin plus a held write latch.
pub struct WritePageGuard<'a> {
    frame: &'a BufferFrame,
    page_id: PageId,
    latch: Option<RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>>,
}

impl<'a> WritePageGuard<'a> {
    pub(crate) fn new(frame: &'a BufferFrame, page_id: PageId) -> Self {
        let latch = frame.latch_exclusive();
        Self {
            frame,
            page_id,
            latch: Some(latch),
        }
    }

    pub(crate) fn from_parts(
        frame: &'a BufferFrame,
        page_id: PageId,
        latch: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
    ) -> Self {
        Self {
            frame,
            page_id,
            latch: Some(latch),
        }
    }

    /// Returns the guarded page id.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        self.latch
            .as_ref()
            .map(|latch| &***latch)
            .expect("page guard used after release")
    }

    /// Returns the page bytes mutably, marking the frame dirty.
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.frame.set_dirty(true);
        self.latch
            .as_mut()
            .map(|latch| &mut ***latch)
            .expect("page guard used after release")
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.latch.take();
        self.frame.unpin();
    }
}

/// Pin-only page guard, used for debug traversal and freshly allocated
/// pages.
pub struct BasicPageGuard<'a> {
    frame: &'a BufferFrame,
    page_id: PageId,
}

impl<'a> BasicPageGuard<'a> {
    pub(crate) fn new(frame: &'a BufferFrame, page_id: PageId) -> Self {
        Self { frame, page_id }
    }

    /// Returns the guarded page id.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Reads the page bytes under a transient read latch.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.latch_shared()
    }

    /// Converts this guard into a write guard without releasing the pin.
    pub fn upgrade_write(self) -> WritePageGuard<'a> {
        let frame = self.frame;
        let page_id = self.page_id;
        // The pin transfers to the write guard, so this guard must not
        // unpin on drop.
        std::mem::forget(self);
        let latch = frame.latch_exclusive();
        WritePageGuard::from_parts(frame, page_id, latch)
    }
}

impl Drop for BasicPageGuard<'_> {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}
