/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// In-memory representation of a single page: its header, occupancy bitmap, and row area.
pub mod header;

use std::sync::Arc;

use crate::codec::Endianness;
use crate::constants::{OffsetT, SlotIdT};
use crate::error::{Error, Result};
use crate::row::Row;
use crate::schema::Schema;

pub use header::PageHeader;

#[derive(Debug, Clone)]
pub struct Page {
    header: PageHeader,
    bitmap: Vec<u8>,
    rows: Vec<u8>,
    row_size: u64,
    dirty: bool,
}

impl Page {
    /// Build a fresh, fully-free page for `schema` with room for `slot_count` rows.
    pub fn new(schema: &Schema, slot_count: u64) -> Self {
        let row_size = schema.row_size() as u64;
        let header = PageHeader::new(schema.name(), slot_count, row_size);
        Self {
            bitmap: vec![0u8; slot_count as usize],
            rows: vec![0u8; (slot_count * row_size) as usize],
            header,
            row_size,
            dirty: true,
        }
    }

    /// Reconstruct a page from its full on-disk image.
    pub fn decode(bytes: &[u8], endianness: Endianness) -> Result<Self> {
        let header = PageHeader::decode(bytes, endianness)?;
        let bitmap_start = header.header_size as usize;
        let bitmap_end = bitmap_start + header.slot_count as usize;
        let bitmap = bytes[bitmap_start..bitmap_end].to_vec();

        let row_size = if header.slot_count > 0 {
            (bytes.len() - bitmap_end) as u64 / header.slot_count
        } else {
            0
        };
        let rows = bytes[bitmap_end..].to_vec();

        Ok(Self {
            header,
            bitmap,
            rows,
            row_size,
            dirty: false,
        })
    }

    /// Serialize this page's full on-disk image.
    pub fn encode(&self, endianness: Endianness) -> Vec<u8> {
        let mut out = vec![0u8; self.header.raw_page_size as usize];
        self.header.encode(&mut out[..self.header.header_size as usize], endianness);
        let bitmap_start = self.header.header_size as usize;
        out[bitmap_start..bitmap_start + self.bitmap.len()].copy_from_slice(&self.bitmap);
        out[bitmap_start + self.bitmap.len()..].copy_from_slice(&self.rows);
        out
    }

    pub fn schema_name(&self) -> &str {
        &self.header.schema_name
    }

    pub fn slot_count(&self) -> u64 {
        self.header.slot_count
    }

    pub fn raw_page_size(&self) -> u64 {
        self.header.raw_page_size
    }

    pub fn next_page_offset(&self) -> OffsetT {
        self.header.next_page_offset
    }

    pub fn set_next_page_offset(&mut self, offset: OffsetT) {
        self.header.next_page_offset = offset;
        self.dirty = true;
    }

    pub fn is_full(&self) -> bool {
        self.header.is_full()
    }

    pub fn free_slot_count(&self) -> u64 {
        self.header.free_slot_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn is_free(&self, index: SlotIdT) -> bool {
        self.bitmap[index] == 0
    }

    fn first_free_slot(&self) -> Option<SlotIdT> {
        self.bitmap.iter().position(|b| *b == 0)
    }

    /// Insert `row` into the lowest-index free slot. Returns the slot index, or `None` if the
    /// page has no free slot.
    pub fn add(&mut self, row: &Row) -> Result<Option<SlotIdT>> {
        let index = match self.first_free_slot() {
            Some(i) => i,
            None => return Ok(None),
        };
        self.write_slot(index, row);
        self.bitmap[index] = 1;
        self.header.decrement_free_slot_count()?;
        self.dirty = true;
        Ok(Some(index))
    }

    /// Overwrite the row occupying `index`. The row's schema must match this page's schema.
    /// Replacing a free slot is an error.
    pub fn replace(&mut self, index: SlotIdT, row: &Row) -> Result<()> {
        if row.schema().name() != self.header.schema_name {
            return Err(Error::SchemaMismatch {
                expected: self.header.schema_name.clone(),
                actual: row.schema().name().to_string(),
            });
        }
        if self.is_free(index) {
            return Err(Error::SchemaMismatch {
                expected: self.header.schema_name.clone(),
                actual: "<free slot>".to_string(),
            });
        }
        self.write_slot(index, row);
        self.dirty = true;
        Ok(())
    }

    /// Remove the row at `index`. A no-op if the slot was already free.
    pub fn remove(&mut self, index: SlotIdT) -> Result<()> {
        if self.is_free(index) {
            return Ok(());
        }
        self.bitmap[index] = 0;
        self.header.increment_free_slot_count()?;
        self.dirty = true;
        Ok(())
    }

    /// Read the row currently occupying `index`, regardless of occupancy.
    pub fn read_row(&self, index: SlotIdT, schema: Arc<Schema>) -> Row {
        let start = index * self.row_size as usize;
        let end = start + self.row_size as usize;
        Row::from_bytes(schema, &self.rows[start..end])
    }

    fn write_slot(&mut self, index: SlotIdT, row: &Row) {
        let start = index * self.row_size as usize;
        let end = start + self.row_size as usize;
        self.rows[start..end].copy_from_slice(row.as_bytes());
    }
}
