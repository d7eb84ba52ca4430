/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

use crate::codec::Endianness;
use std::path::PathBuf;

use crate::constants::{DEFAULT_BUFFER_SIZE, DEFAULT_SLOT_COUNT};

/// Runtime parameters for a `DbSystem` instance: where its two files live, how many row
/// slots a freshly created page holds, how many frames the buffer pool keeps resident, and
/// the byte order used throughout the data file.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_path: PathBuf,
    pub schema_path: PathBuf,
    pub slot_count: usize,
    pub buffer_size: usize,
    pub endianness: Endianness,
}

impl StorageConfig {
    pub fn new<P: Into<PathBuf>>(data_path: P, schema_path: P) -> Self {
        Self {
            data_path: data_path.into(),
            schema_path: schema_path.into(),
            slot_count: DEFAULT_SLOT_COUNT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            endianness: Endianness::default(),
        }
    }

    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_can_be_overridden() {
        let config = StorageConfig::new("db.dat", "db.schema")
            .with_slot_count(2)
            .with_buffer_size(1)
            .with_endianness(Endianness::Big);

        assert_eq!(config.slot_count, 2);
        assert_eq!(config.buffer_size, 1);
        assert_eq!(config.endianness, Endianness::Big);
    }
}
