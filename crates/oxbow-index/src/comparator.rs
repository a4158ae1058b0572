//! Key comparison for the B+tree.
//!
//! Keys are opaque fixed-size byte strings; the tree orders them through a
//! comparator bound at construction.

use std::cmp::Ordering;

/// A total order over key bytes.
pub trait KeyComparator: Send + Sync {
    /// Compares two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Renders a key for debug output. Defaults to hex.
    fn format_key(&self, key: &[u8]) -> String {
        key.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Comparator for 8-byte little-endian signed integer keys.
///
/// This is the comparator the batch-file harness uses: keys are integers,
/// encoded with [`I64Comparator::encode`].
#[derive(Debug, Default, Clone, Copy)]
pub struct I64Comparator;

impl I64Comparator {
    /// Encodes an integer as key bytes.
    pub fn encode(value: i64) -> [u8; 8] {
        value.to_le_bytes()
    }

    /// Decodes key bytes back to an integer. Short keys zero-extend.
    pub fn decode(key: &[u8]) -> i64 {
        let mut buf = [0u8; 8];
        let n = key.len().min(8);
        buf[..n].copy_from_slice(&key[..n]);
        i64::from_le_bytes(buf)
    }
}

impl KeyComparator for I64Comparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        Self::decode(a).cmp(&Self::decode(b))
    }

    fn format_key(&self, key: &[u8]) -> String {
        Self::decode(key).to_string()
    }
}

/// Comparator ordering keys as plain byte strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicographicComparator;

impl KeyComparator for LexicographicComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
