/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// A row is a byte image of one tuple conforming to a `Schema`.
use std::sync::Arc;

use crate::codec::{read_fixed_bytes_trimmed, write_fixed_bytes, Endianness};
use crate::error::Result;
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone)]
pub struct Row {
    schema: Arc<Schema>,
    data: Vec<u8>,
}

impl Row {
    /// Construct an all-zero row bound to `schema`.
    pub fn empty(schema: Arc<Schema>) -> Self {
        let data = vec![0u8; schema.row_size() as usize];
        Self { schema, data }
    }

    /// Wrap an existing byte buffer as a row. `bytes.len()` must equal `schema.row_size()`.
    pub fn from_bytes(schema: Arc<Schema>, bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), schema.row_size() as usize);
        Self {
            schema,
            data: bytes.to_vec(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn field_bounds(&self, index: usize) -> (usize, usize) {
        let offset = self.schema.field_offset(index) as usize;
        let width = self.schema.field(index).data_type.size_of() as usize;
        (offset, offset + width)
    }

    /// Decode the integer/float/character value of field `index` as raw bytes, trimming
    /// trailing zero bytes for `Character`/`Binary` fields.
    pub fn get_bytes(&self, index: usize) -> &[u8] {
        let (start, end) = self.field_bounds(index);
        &self.data[start..end]
    }

    pub fn get_trimmed(&self, index: usize) -> Vec<u8> {
        let offset = self.schema.field_offset(index) as usize;
        let width = self.schema.field(index).data_type.size_of() as usize;
        read_fixed_bytes_trimmed(&self.data, offset, width)
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        let bytes = self.get_trimmed(index);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn get_u32(&self, index: usize, endianness: Endianness) -> Result<u32> {
        endianness.decode_u32(self.get_bytes(index))
    }

    pub fn get_i64(&self, index: usize, endianness: Endianness) -> Result<i64> {
        endianness.decode_i64(self.get_bytes(index))
    }

    pub fn get_f32(&self, index: usize, endianness: Endianness) -> Result<f32> {
        endianness.decode_f32(self.get_bytes(index))
    }

    pub fn get_f64(&self, index: usize, endianness: Endianness) -> Result<f64> {
        endianness.decode_f64(self.get_bytes(index))
    }

    /// Set field `index` to a string value, zero-padding the remainder of the field.
    pub fn set_string(&mut self, index: usize, value: &str) {
        let offset = self.schema.field_offset(index) as usize;
        let width = self.schema.field(index).data_type.size_of() as usize;
        write_fixed_bytes(&mut self.data, offset, width, value.as_bytes());
    }

    pub fn set_u32(&mut self, index: usize, value: u32, endianness: Endianness) {
        let (start, _) = self.field_bounds(index);
        let bytes = endianness.encode_u32(value);
        self.data[start..start + 4].copy_from_slice(&bytes);
    }

    pub fn set_i64(&mut self, index: usize, value: i64, endianness: Endianness) {
        let (start, _) = self.field_bounds(index);
        let bytes = endianness.encode_i64(value);
        self.data[start..start + 8].copy_from_slice(&bytes);
    }

    pub fn set_f32(&mut self, index: usize, value: f32, endianness: Endianness) {
        let (start, _) = self.field_bounds(index);
        let bytes = endianness.encode_f32(value);
        self.data[start..start + 4].copy_from_slice(&bytes);
    }

    pub fn set_f64(&mut self, index: usize, value: f64, endianness: Endianness) {
        let (start, _) = self.field_bounds(index);
        let bytes = endianness.encode_f64(value);
        self.data[start..start + 8].copy_from_slice(&bytes);
    }

    /// Set raw bytes for a field, e.g. an opaque `Date`. Truncated/zero-padded to field width.
    pub fn set_raw(&mut self, index: usize, value: &[u8]) {
        let offset = self.schema.field_offset(index) as usize;
        let width = self.schema.field(index).data_type.size_of() as usize;
        write_fixed_bytes(&mut self.data, offset, width, value);
    }

    /// Set a field by name, matching its declared `DataType` to the value's natural encoding.
    pub fn set_field_by_name(&mut self, name: &str, value: &str, endianness: Endianness) -> Option<()> {
        let index = self.schema.find_field(name)?;
        match self.schema.field(index).data_type {
            DataType::Character(_) | DataType::Binary(_) | DataType::Date => {
                self.set_string(index, value)
            }
            DataType::Int | DataType::Boolean | DataType::TinyInt | DataType::SmallInt => {
                let v: u32 = value.parse().ok()?;
                self.set_u32(index, v, endianness)
            }
            DataType::BigInt => {
                let v: i64 = value.parse().ok()?;
                self.set_i64(index, v, endianness)
            }
            DataType::Float => {
                let v: f32 = value.parse().ok()?;
                self.set_f32(index, v, endianness)
            }
            DataType::Double => {
                let v: f64 = value.parse().ok()?;
                self.set_f64(index, v, endianness)
            }
        }
        Some(())
    }
}
