/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// The disk manager is responsible for reading and writing raw bytes to the data file.
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};

pub struct PageIo {
    file: File,
}

impl PageIo {
    /// Open (creating if necessary) the data file at `path` for combined read/write/append.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Read exactly `buf.len()` bytes starting at `offset`. Reading past the end of the file
    /// is an error.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.len()? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of data file",
            )));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Overwrite `buf.len()` bytes starting at `offset`. Flushes before returning.
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.file.flush()?;
        Ok(())
    }

    /// Append `buf` to the end of the file, returning the offset at which the append began.
    pub fn append(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.len()?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(buf)?;
        self.file.flush()?;
        Ok(offset)
    }

    /// Current length of the data file in bytes.
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the file currently has no bytes.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Seek the underlying cursor back to the start of the file.
    pub fn seek_to_start(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}
