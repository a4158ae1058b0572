//! Configuration structures for OxbowDB.

use serde::{Deserialize, Serialize};

/// Configuration for a B+ tree index.
///
/// Fan-outs and key width are fixed at deployment time; the tree validates
/// them against the page size on construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Maximum number of (key, record id) slots per leaf page.
    pub leaf_max_size: u16,
    /// Maximum number of child pointers per internal page.
    pub internal_max_size: u16,
    /// Key width in bytes.
    pub key_size: u16,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            leaf_max_size: 255,
            internal_max_size: 255,
            key_size: 8,
        }
    }
}
