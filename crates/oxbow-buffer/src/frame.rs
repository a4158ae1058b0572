//! Buffer frame management.

use oxbow_common::page::{PageId, PAGE_SIZE};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single page.
///
/// The data `RwLock` is the page latch: read guards hold it shared, write
/// guards hold it exclusive. The pin count keeps the frame resident
/// independently of latching. Access history for eviction lives in the
/// replacer, not here.
pub struct BufferFrame {
    /// Frame identifier.
    frame_id: FrameId,
    /// Page resident in this frame; `PageId::INVALID` marks a free frame.
    page_id: AtomicU32,
    /// Page bytes, guarded by the page latch.
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
    /// Number of guards currently holding this page.
    pin_count: AtomicU32,
    /// Whether the page has been modified since it was loaded.
    is_dirty: AtomicBool,
}

impl BufferFrame {
    /// Creates a new free buffer frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(PageId::INVALID.0),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page resident in this frame, or INVALID for a free
    /// frame.
    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId(self.page_id.load(Ordering::Acquire))
    }

    /// Binds the frame to a page; INVALID frees it.
    #[inline]
    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.0, Ordering::Release);
    }

    /// Returns true if no page is resident.
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.page_id().is_valid()
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Takes one pin. Returns the previous pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Releases one pin, saturating at zero. Returns the new pin count.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let mut current = self.pin_count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return 0;
            }
            match self.pin_count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return current - 1,
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Marks this frame as dirty or clean.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Takes the page latch shared and returns the data guard.
    #[inline]
    pub fn latch_shared(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Takes the page latch exclusive and returns the data guard.
    #[inline]
    pub fn latch_exclusive(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Loads page bytes into the frame.
    #[inline]
    pub fn load(&self, src: &[u8]) {
        let mut data = self.data.write();
        let len = src.len().min(PAGE_SIZE);
        data[..len].copy_from_slice(&src[..len]);
    }

    /// Returns the frame to the free state and zeroes its bytes.
    #[inline]
    pub fn reset(&self) {
        self.page_id.store(PageId::INVALID.0, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        let mut data = self.data.write();
        data.fill(0);
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_sentinel() {
        assert!(FrameId(0).is_valid());
        assert!(!FrameId::INVALID.is_valid());
        assert_eq!(FrameId(42).to_string(), "frame:42");
    }

    #[test]
    fn test_new_frame_is_free() {
        let frame = BufferFrame::new(FrameId(3));

        assert_eq!(frame.frame_id(), FrameId(3));
        assert!(frame.is_free());
        assert_eq!(frame.page_id(), PageId::INVALID);
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_bind_and_free_page() {
        let frame = BufferFrame::new(FrameId(0));

        frame.set_page_id(PageId(100));
        assert_eq!(frame.page_id(), PageId(100));
        assert!(!frame.is_free());

        frame.set_page_id(PageId::INVALID);
        assert!(frame.is_free());
    }

    #[test]
    fn test_pin_count_lifecycle() {
        let frame = BufferFrame::new(FrameId(0));

        assert_eq!(frame.pin(), 0);
        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin_count(), 2);
        assert!(frame.is_pinned());

        assert_eq!(frame.unpin(), 1);
        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_unpin_saturates_at_zero() {
        let frame = BufferFrame::new(FrameId(0));

        assert_eq!(frame.unpin(), 0);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_dirty_flag() {
        let frame = BufferFrame::new(FrameId(0));

        frame.set_dirty(true);
        assert!(frame.is_dirty());
        frame.set_dirty(false);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_latch_round_trip() {
        let frame = BufferFrame::new(FrameId(0));

        {
            let mut data = frame.latch_exclusive();
            data[0] = 0xAB;
            data[PAGE_SIZE - 1] = 0xCD;
        }

        let data = frame.latch_shared();
        assert_eq!(data[0], 0xAB);
        assert_eq!(data[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn test_load_copies_bytes() {
        let frame = BufferFrame::new(FrameId(0));

        frame.load(&[1u8, 2, 3, 4, 5]);

        let data = frame.latch_shared();
        assert_eq!(&data[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(data[5], 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let frame = BufferFrame::new(FrameId(0));

        frame.set_page_id(PageId(7));
        frame.pin();
        frame.set_dirty(true);
        frame.load(&[0xFF; 8]);

        frame.reset();

        assert!(frame.is_free());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert_eq!(frame.latch_shared()[0], 0);
    }

    #[test]
    fn test_debug_format() {
        let frame = BufferFrame::new(FrameId(5));
        frame.set_page_id(PageId(10));
        frame.pin();

        let debug_str = format!("{:?}", frame);
        assert!(debug_str.contains("BufferFrame"));
        assert!(debug_str.contains("pin_count"));
    }
}
