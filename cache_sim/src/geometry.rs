use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::bits::{extract, log2_exact, low_mask, shr};

/// width of an address in bits.
pub const ADDR_BITS: u32 = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("cache size must be a positive power of 2 (got {0})")]
    CacheSizeNotPowerOfTwo(u32),
    #[error("line size must be a positive power of 2 (got {0})")]
    LineSizeNotPowerOfTwo(u32),
    #[error("line size {line_size} exceeds cache size {cache_size}")]
    LineLargerThanCache { cache_size: u32, line_size: u32 },
    #[error("{index_bits} index bits + {offset_bits} offset bits do not fit in a 32-bit address")]
    TooWide { index_bits: u32, offset_bits: u32 },
}

/// Bit layout of an address for a direct-mapped cache.
///
/// ```text
/// | tag (tag_bits) | index (index_bits) | offset (offset_bits) |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheGeometry {
    cache_size: u32,
    line_size: u32,
    line_count: u32,
    index_bits: u32,
    offset_bits: u32,
    tag_bits: u32,
}

/// an address split along a [`CacheGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressParts {
    pub tag: u32,
    pub index: u32,
    pub offset: u32,
}

impl CacheGeometry {
    pub fn new(cache_size: u32, line_size: u32) -> Result<Self, GeometryError> {
        let Some(cache_bits) = log2_exact(cache_size) else {
            return Err(GeometryError::CacheSizeNotPowerOfTwo(cache_size));
        };
        let Some(offset_bits) = log2_exact(line_size) else {
            return Err(GeometryError::LineSizeNotPowerOfTwo(line_size));
        };
        if line_size > cache_size {
            return Err(GeometryError::LineLargerThanCache {
                cache_size,
                line_size,
            });
        }
        let index_bits = cache_bits - offset_bits;
        if index_bits + offset_bits > ADDR_BITS {
            return Err(GeometryError::TooWide {
                index_bits,
                offset_bits,
            });
        }
        let geometry = Self {
            cache_size,
            line_size,
            line_count: cache_size / line_size,
            index_bits,
            offset_bits,
            tag_bits: ADDR_BITS - index_bits - offset_bits,
        };
        log::debug!("derived geometry: {geometry}");
        Ok(geometry)
    }
    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }
    pub fn line_size(&self) -> u32 {
        self.line_size
    }
    pub fn line_count(&self) -> u32 {
        self.line_count
    }
    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }
    pub fn tag_bits(&self) -> u32 {
        self.tag_bits
    }
    #[inline]
    pub fn index_of(&self, addr: u32) -> u32 {
        extract(addr, self.offset_bits, self.index_bits)
    }
    #[inline]
    pub fn tag_of(&self, addr: u32) -> u32 {
        shr(addr, self.index_bits + self.offset_bits)
    }
    #[inline]
    pub fn offset_of(&self, addr: u32) -> u32 {
        addr & low_mask(self.offset_bits)
    }
    pub fn decompose(&self, addr: u32) -> AddressParts {
        AddressParts {
            tag: self.tag_of(addr),
            index: self.index_of(addr),
            offset: self.offset_of(addr),
        }
    }
}

impl fmt::Display for CacheGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes / {} bytes per line = {} lines (tag: {} bits, index: {} bits, offset: {} bits)",
            self.cache_size,
            self.line_size,
            self.line_count,
            self.tag_bits,
            self.index_bits,
            self.offset_bits
        )
    }
}

impl fmt::Display for AddressParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tag = {:#x}, index = {}, offset = {}",
            self.tag, self.index, self.offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_geometry() {
        let g = CacheGeometry::new(16, 4).unwrap();
        assert_eq!(4, g.line_count());
        assert_eq!(2, g.index_bits());
        assert_eq!(2, g.offset_bits());
        assert_eq!(28, g.tag_bits());
    }
    #[test]
    fn test_bit_widths_sum_to_address_width() {
        for cache_bits in 0..32 {
            for offset_bits in 0..=cache_bits {
                let g = CacheGeometry::new(1 << cache_bits, 1 << offset_bits).unwrap();
                assert_eq!(ADDR_BITS, g.index_bits() + g.offset_bits() + g.tag_bits());
                assert_eq!(1 << g.index_bits(), g.line_count());
            }
        }
    }
    #[test]
    fn test_decompose() {
        let g = CacheGeometry::new(1024, 32).unwrap();
        // 32 lines, 5 index bits, 5 offset bits
        let addr = (0x1234 << 10) | (17 << 5) | 9;
        let parts = g.decompose(addr);
        assert_eq!(
            AddressParts {
                tag: 0x1234,
                index: 17,
                offset: 9
            },
            parts
        );
        assert_eq!(0, g.decompose(0).index);
        assert_eq!(1, CacheGeometry::new(16, 4).unwrap().index_of(4));
    }
    #[test]
    fn test_index_in_range() {
        let g = CacheGeometry::new(256, 8).unwrap();
        for addr in [0, 1, 7, 8, 255, 256, 0x8000_0000, u32::MAX] {
            assert!(g.index_of(addr) < g.line_count(), "addr: {addr:#x}");
        }
    }
    #[test]
    fn test_degenerate_geometries() {
        // a single line: every address shares index 0
        let g = CacheGeometry::new(64, 64).unwrap();
        assert_eq!(0, g.index_bits());
        assert_eq!(0, g.index_of(u32::MAX));
        assert_eq!(u32::MAX >> 6, g.tag_of(u32::MAX));
        // one-byte lines: no offset bits
        let g = CacheGeometry::new(8, 1).unwrap();
        assert_eq!(0, g.offset_of(u32::MAX));
        assert_eq!(7, g.index_of(u32::MAX));
    }
    #[test]
    fn test_whole_address_space() {
        let g = CacheGeometry::new(1 << 31, 1 << 31).unwrap();
        assert_eq!(1, g.tag_bits());
        assert_eq!(1, g.tag_of(u32::MAX));
        assert_eq!(u32::MAX >> 1, g.offset_of(u32::MAX));
    }
    #[test]
    fn test_invalid_geometry() {
        assert_eq!(
            Err(GeometryError::CacheSizeNotPowerOfTwo(0)),
            CacheGeometry::new(0, 4)
        );
        assert_eq!(
            Err(GeometryError::CacheSizeNotPowerOfTwo(24)),
            CacheGeometry::new(24, 4)
        );
        assert_eq!(
            Err(GeometryError::LineSizeNotPowerOfTwo(0)),
            CacheGeometry::new(16, 0)
        );
        assert_eq!(
            Err(GeometryError::LineSizeNotPowerOfTwo(6)),
            CacheGeometry::new(16, 6)
        );
        assert_eq!(
            Err(GeometryError::LineLargerThanCache {
                cache_size: 16,
                line_size: 32
            }),
            CacheGeometry::new(16, 32)
        );
    }
}
