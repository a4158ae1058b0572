//! Disk-backed B+tree index for OxbowDB.
//!
//! The tree maps fixed-size keys to fixed-size record ids. Every node is
//! one page owned by the buffer pool; a dedicated header page tracks the
//! root. Lookups descend with shared latches (crab-down); inserts and
//! removes take exclusive latches along the whole path so splits and
//! merges can reach upward through the descent context.

mod comparator;
mod context;
mod draw;
mod iterator;
mod node;
mod tree;

pub use comparator::{I64Comparator, KeyComparator, LexicographicComparator};
pub use iterator::TreeIterator;
pub use node::{page_type, HeaderPage, InternalPage, LeafPage};
pub use tree::BPlusTree;
