//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Trait for page replacement algorithms.
///
/// Eligibility (pin count zero, frame occupied) is the pool's business, so
/// `evict` takes it as a predicate instead of tracking an evictable set.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Selects a victim frame among those the predicate accepts.
    ///
    /// Returns None if no eligible frame was found.
    fn evict(&self, eligible: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Forgets a frame's access history (frame freed or deleted).
    fn remove(&self, frame_id: FrameId);
}

/// Clock replacement algorithm.
///
/// Reference bits are atomic for lock-free access recording; only the
/// clock hand sits behind a mutex.
pub struct ClockReplacer {
    /// Number of frames.
    num_frames: usize,
    /// Reference bits for each frame.
    reference_bits: Vec<AtomicBool>,
    /// Current clock hand position.
    clock_hand: Mutex<usize>,
}

impl ClockReplacer {
    /// Creates a new clock replacer with the given number of frames.
    pub fn new(num_frames: usize) -> Self {
        let reference_bits: Vec<AtomicBool> =
            (0..num_frames).map(|_| AtomicBool::new(false)).collect();

        Self {
            num_frames,
            reference_bits,
            clock_hand: Mutex::new(0),
        }
    }

    /// Returns the total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_frames
    }
}

impl Replacer for ClockReplacer {
    #[inline]
    fn record_access(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(true, Ordering::Relaxed);
        }
    }

    fn evict(&self, eligible: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut hand = self.clock_hand.lock();

        // At most two full rotations: the first clears reference bits, the
        // second finds any eligible frame whose bit stayed clear.
        for _ in 0..(2 * self.num_frames) {
            let pos = *hand;
            *hand = (pos + 1) % self.num_frames;

            let frame_id = FrameId(pos as u32);
            if !eligible(frame_id) {
                continue;
            }

            if self.reference_bits[pos].load(Ordering::Relaxed) {
                // Second chance
                self.reference_bits[pos].store(false, Ordering::Relaxed);
            } else {
                return Some(frame_id);
            }
        }

        None
    }

    fn remove(&self, frame_id: FrameId) {
        let idx = frame_id.0 as usize;
        if idx < self.num_frames {
            self.reference_bits[idx].store(false, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_replacer_new() {
        let replacer = ClockReplacer::new(10);
        assert_eq!(replacer.capacity(), 10);
    }

    #[test]
    fn test_clock_replacer_evict_none_eligible() {
        let replacer = ClockReplacer::new(10);
        assert!(replacer.evict(&|_| false).is_none());
    }

    #[test]
    fn test_clock_replacer_evict_single() {
        let replacer = ClockReplacer::new(10);

        let victim = replacer.evict(&|fid| fid == FrameId(5));
        assert_eq!(victim, Some(FrameId(5)));
    }

    #[test]
    fn test_clock_replacer_second_chance() {
        let replacer = ClockReplacer::new(3);

        // Frames 0 and 1 were accessed; frame 2 was not.
        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));

        let victim = replacer.evict(&|_| true);
        assert_eq!(victim, Some(FrameId(2)));
    }

    #[test]
    fn test_clock_replacer_evict_all_referenced() {
        let replacer = ClockReplacer::new(3);

        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));
        replacer.record_access(FrameId(2));

        // Reference bits are cleared on the first rotation, so the second
        // rotation still finds a victim.
        let victim = replacer.evict(&|_| true);
        assert!(victim.is_some());
    }

    #[test]
    fn test_clock_replacer_remove_clears_reference() {
        let replacer = ClockReplacer::new(3);

        replacer.record_access(FrameId(0));
        replacer.remove(FrameId(0));

        // With its bit cleared, frame 0 is evictable immediately.
        let victim = replacer.evict(&|fid| fid == FrameId(0));
        assert_eq!(victim, Some(FrameId(0)));
    }

    #[test]
    fn test_clock_replacer_respects_eligibility() {
        let replacer = ClockReplacer::new(4);

        let victim = replacer.evict(&|fid| fid.0 >= 2);
        assert!(victim.is_some());
        assert!(victim.unwrap().0 >= 2);
    }

    #[test]
    fn test_clock_replacer_out_of_bounds() {
        let replacer = ClockReplacer::new(5);

        // These should not panic
        replacer.record_access(FrameId(100));
        replacer.remove(FrameId(100));
    }
}
