//! Page identity for OxbowDB storage.

use serde::{Deserialize, Serialize};

/// Page size in bytes (16 KB). The unit of I/O and latching.
pub const PAGE_SIZE: usize = 16 * 1024;

/// Unique identifier for a page within the data file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PageId(pub u32);

impl PageId {
    /// Reserved sentinel naming no page.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Returns true if this names a real page.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page:{}", self.0)
    }
}

/// Page types in OxbowDB storage.
///
/// A zeroed page decodes as `Invalid`; node init stamps the real type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PageType {
    /// Unallocated or uninitialized page.
    Invalid = 0,
    /// B+ tree leaf page.
    Leaf = 1,
    /// B+ tree internal page.
    Internal = 2,
}

impl PageType {
    /// Decodes a page type from its on-disk byte.
    pub fn from_u8(value: u8) -> PageType {
        match value {
            1 => PageType::Leaf,
            2 => PageType::Internal,
            _ => PageType::Invalid,
        }
    }
}

/// Identifier for a record in the table heap: the page holding it plus a
/// slot number within that page. The index stores these as opaque
/// fixed-size leaf payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    /// Heap page containing the record.
    pub page_id: PageId,
    /// Slot number within the page.
    pub slot: u16,
}

impl RecordId {
    /// Size of a record id on disk (page id + slot).
    pub const SIZE: usize = 6;

    /// Invalid record id.
    pub const INVALID: RecordId = RecordId {
        page_id: PageId::INVALID,
        slot: u16::MAX,
    };

    /// Creates a new record id.
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }

    /// Returns true if this is a valid record id.
    pub fn is_valid(&self) -> bool {
        self.page_id.is_valid()
    }

    /// Serializes to the 6-byte on-disk form.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_id.0.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot.to_le_bytes());
        buf
    }

    /// Deserializes from the 6-byte on-disk form.
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            page_id: PageId(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            slot: u16::from_le_bytes([buf[4], buf[5]]),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_constant() {
        assert_eq!(PAGE_SIZE, 16 * 1024);
        assert_eq!(PAGE_SIZE, 16384);
    }

    #[test]
    fn test_page_id_validity() {
        assert!(PageId(0).is_valid());
        assert!(PageId(12345).is_valid());
        assert!(!PageId::INVALID.is_valid());
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId(5).to_string(), "page:5");
        assert_eq!(PageId(0).to_string(), "page:0");
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId(1) < PageId(2));
        assert!(PageId(2) < PageId::INVALID);
    }

    #[test]
    fn test_page_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(PageId(1));
        set.insert(PageId(2));
        set.insert(PageId(1)); // Duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_page_type_repr() {
        assert_eq!(PageType::Invalid as u8, 0);
        assert_eq!(PageType::Leaf as u8, 1);
        assert_eq!(PageType::Internal as u8, 2);
    }

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::Leaf);
        assert_eq!(PageType::from_u8(2), PageType::Internal);
        // Unknown bytes decode as Invalid
        assert_eq!(PageType::from_u8(99), PageType::Invalid);
    }

    #[test]
    fn test_record_id_roundtrip() {
        let rid = RecordId::new(PageId(42), 7);
        let bytes = rid.to_bytes();
        assert_eq!(RecordId::from_bytes(&bytes), rid);
    }

    #[test]
    fn test_record_id_roundtrip_edge_cases() {
        for rid in [
            RecordId::new(PageId(0), 0),
            RecordId::new(PageId(u32::MAX - 1), u16::MAX),
            RecordId::INVALID,
        ] {
            assert_eq!(RecordId::from_bytes(&rid.to_bytes()), rid);
        }
    }

    #[test]
    fn test_record_id_validity() {
        assert!(RecordId::new(PageId(1), 0).is_valid());
        assert!(!RecordId::INVALID.is_valid());
    }

    #[test]
    fn test_record_id_display() {
        let rid = RecordId::new(PageId(3), 12);
        assert_eq!(rid.to_string(), "page:3:12");
    }

    #[test]
    fn test_page_id_serde_roundtrip() {
        let original = PageId(500);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: PageId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_record_id_serde_roundtrip() {
        let original = RecordId::new(PageId(10), 3);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: RecordId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
