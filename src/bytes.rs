//! Bounds-checked byte access
//!
//! [`ByteSource`] is the leaf dependency of every parser in this crate: an
//! immutable, offset-addressable byte region with checked big- and
//! little-endian reads. A source is cheap to clone (the backing storage is
//! reference counted), so several documents may share one source — a sequence
//! embedded inside an instrument bank file is the common case.
//!
//! Every read past the end returns [`ChipseqError::OutOfRange`]. Callers treat
//! that as fatal to the current candidate or track only, never to the whole
//! scan.

use std::sync::Arc;

use crate::{ChipseqError, Result};

/// Immutable, bounds-checked random access over a byte region.
#[derive(Debug, Clone)]
pub struct ByteSource {
    data: Arc<[u8]>,
}

impl ByteSource {
    /// Create a source from owned bytes.
    pub fn new(data: Vec<u8>) -> Self {
        ByteSource { data: data.into() }
    }

    /// Total size of the region in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `offset` addresses a byte inside the region.
    pub fn contains(&self, offset: usize) -> bool {
        offset < self.data.len()
    }

    fn check(&self, offset: usize, width: usize) -> Result<()> {
        if offset.checked_add(width).is_none_or(|end| end > self.data.len()) {
            return Err(ChipseqError::OutOfRange {
                offset,
                width,
                size: self.data.len(),
            });
        }
        Ok(())
    }

    /// Read one byte.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(u16::from_le_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Read a big-endian u16.
    pub fn read_u16_be(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    /// Read a big-endian u24 (three bytes, high byte first).
    pub fn read_u24_be(&self, offset: usize) -> Result<u32> {
        self.check(offset, 3)?;
        Ok(((self.data[offset] as u32) << 16)
            | ((self.data[offset + 1] as u32) << 8)
            | self.data[offset + 2] as u32)
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    /// Read a big-endian u32.
    pub fn read_u32_be(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(u32::from_be_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    /// Borrow `count` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, count: usize) -> Result<&[u8]> {
        self.check(offset, count)?;
        Ok(&self.data[offset..offset + count])
    }

    /// Whether the bytes at `offset` equal `needle`. False near the end of the
    /// region rather than an error, so signature sliding stays branch-light.
    pub fn matches_at(&self, offset: usize, needle: &[u8]) -> bool {
        match self.read_bytes(offset, needle.len()) {
            Ok(window) => window == needle,
            Err(_) => false,
        }
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(data: Vec<u8>) -> Self {
        ByteSource::new(data)
    }
}

impl From<&[u8]> for ByteSource {
    fn from(data: &[u8]) -> Self {
        ByteSource::new(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_reads() {
        let src = ByteSource::new(vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(src.read_u16_le(0).unwrap(), 0x3412);
        assert_eq!(src.read_u16_be(0).unwrap(), 0x1234);
        assert_eq!(src.read_u24_be(0).unwrap(), 0x123456);
        assert_eq!(src.read_u32_le(0).unwrap(), 0x78563412);
        assert_eq!(src.read_u32_be(0).unwrap(), 0x12345678);
    }

    #[test]
    fn test_out_of_range_reports_position() {
        let src = ByteSource::new(vec![0u8; 4]);
        let err = src.read_u32_be(2).unwrap_err();
        match err {
            ChipseqError::OutOfRange { offset, width, size } => {
                assert_eq!(offset, 2);
                assert_eq!(width, 4);
                assert_eq!(size, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_at_exact_end() {
        let src = ByteSource::new(vec![1, 2, 3, 4]);
        assert_eq!(src.read_u16_le(2).unwrap(), 0x0403);
        assert!(src.read_u16_le(3).is_err());
        assert!(src.read_u8(4).is_err());
    }

    #[test]
    fn test_contains_and_len() {
        let src = ByteSource::new(vec![0; 8]);
        assert_eq!(src.len(), 8);
        assert!(src.contains(7));
        assert!(!src.contains(8));
        assert!(!ByteSource::new(vec![]).contains(0));
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = ByteSource::new((0..=255).collect());
        let b = a.clone();
        assert_eq!(a.read_u8(200).unwrap(), b.read_u8(200).unwrap());
    }

    #[test]
    fn test_matches_at_near_end() {
        let src = ByteSource::new(b"pQES".to_vec());
        assert!(src.matches_at(0, b"pQES"));
        assert!(!src.matches_at(1, b"pQES"));
        assert!(!src.matches_at(2, b"ESxx"));
    }
}
