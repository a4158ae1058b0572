//! Buffer pool management for OxbowDB.
//!
//! This crate provides in-memory page caching with:
//! - A disk manager for page-granular file I/O
//! - A fixed-size buffer pool with configurable frame count
//! - Clock eviction for cache management
//! - Pin counting plus per-page read/write latches
//! - Typed RAII page guards binding one (pin + latch) acquisition each

mod disk;
mod frame;
mod guard;
mod page_table;
mod pool;
mod replacer;

pub use disk::{DiskManager, DiskManagerConfig};
pub use frame::{BufferFrame, FrameId};
pub use guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
pub use pool::{BufferPool, BufferPoolConfig, BufferPoolStats};
pub use replacer::{ClockReplacer, Replacer};
