/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// The fixed prefix describing one on-disk page: its chain link, dimensions, owning schema,
/// and free-slot bookkeeping.
use crate::codec::Endianness;
use crate::constants::{OffsetT, NO_NEXT_PAGE};
use crate::error::{Error, Result};

const NEXT_PAGE_OFFSET_WIDTH: usize = 8;
const SLOT_COUNT_WIDTH: usize = 8;
const RAW_PAGE_SIZE_WIDTH: usize = 8;
const HEADER_SIZE_WIDTH: usize = 4;
const FREE_SLOT_COUNT_WIDTH: usize = 8;

/// Byte length of the fixed fields that precede the NUL-terminated `schema_name`: enough to
/// learn `header_size` (and thus how many more bytes to read) without knowing the schema ahead
/// of time. Used when walking a file that interleaves pages of different schemas.
pub const PREFIX_WIDTH: usize =
    NEXT_PAGE_OFFSET_WIDTH + SLOT_COUNT_WIDTH + RAW_PAGE_SIZE_WIDTH + HEADER_SIZE_WIDTH;

/// Decode just `header_size` out of a `PREFIX_WIDTH`-byte prefix, without requiring the
/// `schema_name` (and everything after it) to be present.
pub fn decode_header_size(bytes: &[u8], endianness: Endianness) -> Result<u32> {
    let offset = NEXT_PAGE_OFFSET_WIDTH + SLOT_COUNT_WIDTH + RAW_PAGE_SIZE_WIDTH;
    endianness.decode_u32(&bytes[offset..offset + HEADER_SIZE_WIDTH])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub next_page_offset: OffsetT,
    pub slot_count: u64,
    pub raw_page_size: u64,
    pub header_size: u32,
    pub schema_name: String,
    pub free_slot_count: u64,
}

impl PageHeader {
    /// Compute the header length for a page of `schema_name`, before the occupancy bitmap.
    pub fn header_size_for(schema_name: &str) -> u32 {
        (NEXT_PAGE_OFFSET_WIDTH
            + SLOT_COUNT_WIDTH
            + RAW_PAGE_SIZE_WIDTH
            + HEADER_SIZE_WIDTH
            + schema_name.len()
            + 1 // NUL terminator
            + FREE_SLOT_COUNT_WIDTH) as u32
    }

    /// Build a fresh header for a newly created, fully-free page.
    pub fn new(schema_name: &str, slot_count: u64, row_size: u64) -> Self {
        let header_size = Self::header_size_for(schema_name);
        let raw_page_size = header_size as u64 + slot_count + slot_count * row_size;
        Self {
            next_page_offset: NO_NEXT_PAGE,
            slot_count,
            raw_page_size,
            header_size,
            schema_name: schema_name.to_string(),
            free_slot_count: slot_count,
        }
    }

    pub fn is_full(&self) -> bool {
        self.free_slot_count == 0
    }

    pub fn increment_free_slot_count(&mut self) -> Result<()> {
        if self.free_slot_count + 1 > self.slot_count {
            return Err(Error::CapacityExceeded {
                free: (self.free_slot_count + 1) as usize,
                capacity: self.slot_count as usize,
            });
        }
        self.free_slot_count += 1;
        Ok(())
    }

    pub fn decrement_free_slot_count(&mut self) -> Result<()> {
        if self.free_slot_count == 0 {
            return Err(Error::Underflow);
        }
        self.free_slot_count -= 1;
        Ok(())
    }

    /// Parse a header from the first bytes of a page image.
    pub fn decode(bytes: &[u8], endianness: Endianness) -> Result<Self> {
        let mut cursor = 0usize;

        let next_page_offset =
            endianness.decode_i64(&bytes[cursor..cursor + NEXT_PAGE_OFFSET_WIDTH])?;
        cursor += NEXT_PAGE_OFFSET_WIDTH;

        let slot_count = endianness.decode_u64(&bytes[cursor..cursor + SLOT_COUNT_WIDTH])?;
        cursor += SLOT_COUNT_WIDTH;

        let raw_page_size =
            endianness.decode_u64(&bytes[cursor..cursor + RAW_PAGE_SIZE_WIDTH])?;
        cursor += RAW_PAGE_SIZE_WIDTH;

        let header_size = endianness.decode_u32(&bytes[cursor..cursor + HEADER_SIZE_WIDTH])?;
        cursor += HEADER_SIZE_WIDTH;

        let name_end = bytes[cursor..]
            .iter()
            .position(|b| *b == 0)
            .map(|p| cursor + p)
            .unwrap_or(cursor);
        let schema_name = String::from_utf8_lossy(&bytes[cursor..name_end]).into_owned();
        cursor = name_end + 1;

        let free_slot_count =
            endianness.decode_u64(&bytes[cursor..cursor + FREE_SLOT_COUNT_WIDTH])?;

        Ok(Self {
            next_page_offset,
            slot_count,
            raw_page_size,
            header_size,
            schema_name,
            free_slot_count,
        })
    }

    /// Emit this header into `out`, which must be at least `header_size` bytes long.
    pub fn encode(&self, out: &mut [u8], endianness: Endianness) {
        let mut cursor = 0usize;

        out[cursor..cursor + NEXT_PAGE_OFFSET_WIDTH]
            .copy_from_slice(&endianness.encode_i64(self.next_page_offset));
        cursor += NEXT_PAGE_OFFSET_WIDTH;

        out[cursor..cursor + SLOT_COUNT_WIDTH]
            .copy_from_slice(&endianness.encode_u64(self.slot_count));
        cursor += SLOT_COUNT_WIDTH;

        out[cursor..cursor + RAW_PAGE_SIZE_WIDTH]
            .copy_from_slice(&endianness.encode_u64(self.raw_page_size));
        cursor += RAW_PAGE_SIZE_WIDTH;

        out[cursor..cursor + HEADER_SIZE_WIDTH]
            .copy_from_slice(&endianness.encode_u32(self.header_size));
        cursor += HEADER_SIZE_WIDTH;

        let name_bytes = self.schema_name.as_bytes();
        out[cursor..cursor + name_bytes.len()].copy_from_slice(name_bytes);
        out[cursor + name_bytes.len()] = 0;
        cursor += name_bytes.len() + 1;

        out[cursor..cursor + FREE_SLOT_COUNT_WIDTH]
            .copy_from_slice(&endianness.encode_u64(self.free_slot_count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = PageHeader::new("Book", 4, 29);
        let mut buf = vec![0u8; header.header_size as usize];
        header.encode(&mut buf, Endianness::Little);
        let decoded = PageHeader::decode(&buf, Endianness::Little).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_round_trip_big_endian() {
        let header = PageHeader::new("Runner", 8, 16);
        let mut buf = vec![0u8; header.header_size as usize];
        header.encode(&mut buf, Endianness::Big);
        let decoded = PageHeader::decode(&buf, Endianness::Big).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_raw_page_size_identity() {
        let header = PageHeader::new("Book", 4, 29);
        assert_eq!(
            header.raw_page_size,
            header.header_size as u64 + header.slot_count + header.slot_count * 29
        );
    }

    #[test]
    fn test_free_slot_count_bounds() {
        let mut header = PageHeader::new("Book", 2, 10);
        header.decrement_free_slot_count().unwrap();
        header.decrement_free_slot_count().unwrap();
        assert!(header.decrement_free_slot_count().is_err());

        header.increment_free_slot_count().unwrap();
        header.increment_free_slot_count().unwrap();
        assert!(header.increment_free_slot_count().is_err());
    }

    #[test]
    fn test_decode_header_size_from_prefix() {
        let header = PageHeader::new("Runner", 4, 16);
        let mut buf = vec![0u8; header.header_size as usize];
        header.encode(&mut buf, Endianness::Little);
        let size = decode_header_size(&buf[..PREFIX_WIDTH], Endianness::Little).unwrap();
        assert_eq!(size, header.header_size);
    }

    #[test]
    fn test_is_full() {
        let mut header = PageHeader::new("Book", 1, 10);
        assert!(!header.is_full());
        header.decrement_free_slot_count().unwrap();
        assert!(header.is_full());
    }
}
