/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// The buffer pool caches disk pages in memory behind pin-counted frames, replacing them
/// according to a pluggable policy, and threads per-schema page-chain discovery on top.
pub mod replacement;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::codec::Endianness;
use crate::constants::{FrameIdT, OffsetT, SlotIdT, NO_NEXT_PAGE};
use crate::error::Result;
use crate::io::PageIo;
use crate::page::header::{self, PageHeader};
use crate::page::Page;
use crate::row::Row;
use crate::schema::Schema;

use replacement::{LruPolicy, ReplacementPolicy};

/// A resident copy of a page: the page itself, plus the file offset it was read from (or will
/// be written to).
struct Frame {
    page: Page,
    offset: OffsetT,
}

struct Inner {
    frames: Vec<Frame>,
    pin_counts: Vec<u32>,
    offset_to_frame: HashMap<OffsetT, FrameIdT>,
    first_page_offset: HashMap<String, OffsetT>,
    first_available_offset: HashMap<String, OffsetT>,
    policy: Box<dyn ReplacementPolicy>,
    io: PageIo,
    capacity: usize,
    endianness: Endianness,
}

impl Inner {
    fn new(io: PageIo, capacity: usize, endianness: Endianness) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            pin_counts: Vec::with_capacity(capacity),
            offset_to_frame: HashMap::new(),
            first_page_offset: HashMap::new(),
            first_available_offset: HashMap::new(),
            policy: Box::new(LruPolicy::new()),
            io,
            capacity,
            endianness,
        }
    }

    fn pin(&mut self, frame_id: FrameIdT) {
        let was_unpinned = self.pin_counts[frame_id] == 0;
        self.pin_counts[frame_id] += 1;
        if was_unpinned {
            self.policy.use_page(frame_id);
        }
        log::trace!(
            "pin frame {} (pin count now {})",
            frame_id,
            self.pin_counts[frame_id]
        );
    }

    fn unpin(&mut self, frame_id: FrameIdT) -> Result<()> {
        if self.pin_counts[frame_id] == 0 {
            return Err(crate::error::Error::DoubleRelease);
        }
        self.pin_counts[frame_id] -= 1;
        log::trace!(
            "unpin frame {} (pin count now {})",
            frame_id,
            self.pin_counts[frame_id]
        );
        if self.pin_counts[frame_id] == 0 {
            self.policy.release_page(frame_id);
        }
        Ok(())
    }

    fn flush(&mut self, frame_id: FrameIdT) -> Result<()> {
        let frame = &mut self.frames[frame_id];
        if frame.page.is_dirty() {
            let bytes = frame.page.encode(self.endianness);
            self.io.write_at(frame.offset as u64, &bytes)?;
            frame.page.clear_dirty();
            log::debug!("flushed dirty frame {} at offset {}", frame_id, frame.offset);
        }
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        for frame_id in 0..self.frames.len() {
            self.flush(frame_id)?;
        }
        Ok(())
    }

    /// Write a newly-formed page's bytes as a brand new append to the data file.
    fn append(&mut self, bytes: &[u8]) -> Result<OffsetT> {
        Ok(self.io.append(bytes)? as OffsetT)
    }

    fn read_header_at(&mut self, offset: OffsetT, header_size: u32) -> Result<PageHeader> {
        let mut buf = vec![0u8; header_size as usize];
        self.io.read_at(offset as u64, &mut buf)?;
        PageHeader::decode(&buf, self.endianness)
    }

    /// Read a page's header without knowing which schema it belongs to ahead of time.
    fn read_header_any(&mut self, offset: OffsetT) -> Result<PageHeader> {
        let mut prefix = [0u8; header::PREFIX_WIDTH];
        self.io.read_at(offset as u64, &mut prefix)?;
        let header_size = header::decode_header_size(&prefix, self.endianness)?;
        self.read_header_at(offset, header_size)
    }

    /// Install a freshly read or created page into a frame, evicting a victim if the pool is
    /// at capacity. Returns `None` if the pool is full and every frame is pinned (the pool is
    /// hard-capped rather than growing past `capacity`).
    fn install_frame(&mut self, offset: OffsetT, page: Page) -> Result<Option<FrameIdT>> {
        if self.frames.len() < self.capacity {
            let frame_id = self.frames.len();
            self.frames.push(Frame { page, offset });
            self.pin_counts.push(0);
            self.offset_to_frame.insert(offset, frame_id);
            return Ok(Some(frame_id));
        }

        match self.policy.pick_candidate() {
            Some(victim_id) => {
                self.flush(victim_id)?;
                let old_offset = self.frames[victim_id].offset;
                self.offset_to_frame.remove(&old_offset);
                log::debug!(
                    "evicting frame {} (offset {}) to make room for offset {}",
                    victim_id,
                    old_offset,
                    offset
                );
                self.frames[victim_id] = Frame { page, offset };
                self.offset_to_frame.insert(offset, victim_id);
                Ok(Some(victim_id))
            }
            None => {
                log::warn!(
                    "buffer pool exhausted: all {} frames pinned, cannot fetch offset {}",
                    self.capacity,
                    offset
                );
                Ok(None)
            }
        }
    }

    fn fetch_page(&mut self, offset: OffsetT) -> Result<Option<FrameIdT>> {
        if let Some(&frame_id) = self.offset_to_frame.get(&offset) {
            return Ok(Some(frame_id));
        }
        let header = self.read_header_any(offset)?;
        let mut buf = vec![0u8; header.raw_page_size as usize];
        self.io.read_at(offset as u64, &mut buf)?;
        let page = Page::decode(&buf, self.endianness)?;
        self.install_frame(offset, page)
    }

    fn request_page(&mut self, offset: OffsetT) -> Result<Option<FrameIdT>> {
        let frame_id = match self.fetch_page(offset)? {
            Some(f) => f,
            None => return Ok(None),
        };
        self.pin(frame_id);
        Ok(Some(frame_id))
    }

    fn request_first_page(&mut self, schema_name: &str) -> Result<Option<FrameIdT>> {
        match self.look_for_first_page(schema_name)? {
            Some(offset) => self.request_page(offset),
            None => Ok(None),
        }
    }

    fn request_next_page(&mut self, current_frame_id: FrameIdT) -> Result<Option<FrameIdT>> {
        let next_offset = self.frames[current_frame_id].page.next_page_offset();
        if next_offset == NO_NEXT_PAGE {
            return Ok(None);
        }
        self.request_page(next_offset)
    }

    fn request_free_page(&mut self, schema: &Schema) -> Result<Option<FrameIdT>> {
        let name = schema.name().to_string();

        if let Some(offset) = self.first_available_offset.get(&name).copied() {
            if let Some(&frame_id) = self.offset_to_frame.get(&offset) {
                if !self.frames[frame_id].page.is_full() {
                    self.pin(frame_id);
                    return Ok(Some(frame_id));
                }
                self.first_available_offset.remove(&name);
            } else {
                let header_size = PageHeader::header_size_for(&name);
                let header = self.read_header_at(offset, header_size)?;
                if !header.is_full() {
                    return match self.fetch_page(offset)? {
                        Some(frame_id) => {
                            self.first_available_offset.insert(name, offset);
                            self.pin(frame_id);
                            Ok(Some(frame_id))
                        }
                        None => Ok(None),
                    };
                }
                self.first_available_offset.remove(&name);
            }
        }

        match self.look_for_first_free_page(&name)? {
            Some(offset) => match self.fetch_page(offset)? {
                Some(frame_id) => {
                    self.first_available_offset.insert(name, offset);
                    self.pin(frame_id);
                    Ok(Some(frame_id))
                }
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn look_for_first_page(&mut self, schema_name: &str) -> Result<Option<OffsetT>> {
        if let Some(&offset) = self.first_page_offset.get(schema_name) {
            return Ok(Some(offset));
        }

        let file_len = self.io.len()?;
        let mut offset: u64 = 0;
        while offset < file_len {
            let header = self.read_header_any(offset as OffsetT)?;
            if header.schema_name == schema_name {
                self.first_page_offset
                    .insert(schema_name.to_string(), offset as OffsetT);
                return Ok(Some(offset as OffsetT));
            }
            offset += header.raw_page_size;
        }
        Ok(None)
    }

    fn look_for_last_page(&mut self, schema_name: &str) -> Result<Option<OffsetT>> {
        let mut current = match self.look_for_first_page(schema_name)? {
            Some(o) => o,
            None => return Ok(None),
        };
        let header_size = PageHeader::header_size_for(schema_name);
        loop {
            let next = if let Some(&frame_id) = self.offset_to_frame.get(&current) {
                self.frames[frame_id].page.next_page_offset()
            } else {
                self.read_header_at(current, header_size)?.next_page_offset
            };
            if next == NO_NEXT_PAGE {
                return Ok(Some(current));
            }
            current = next;
        }
    }

    fn look_for_first_free_page(&mut self, schema_name: &str) -> Result<Option<OffsetT>> {
        let mut current = match self.look_for_first_page(schema_name)? {
            Some(o) => o,
            None => return Ok(None),
        };
        let header_size = PageHeader::header_size_for(schema_name);
        let mut steps = 0u32;
        loop {
            let (free, next) = if let Some(&frame_id) = self.offset_to_frame.get(&current) {
                let page = &self.frames[frame_id].page;
                (page.free_slot_count(), page.next_page_offset())
            } else {
                let header = self.read_header_at(current, header_size)?;
                (header.free_slot_count, header.next_page_offset)
            };
            if free > 0 {
                return Ok(Some(current));
            }
            if next == NO_NEXT_PAGE {
                return Ok(None);
            }
            current = next;
            steps += 1;
            if steps == 1000 {
                log::warn!("long chain walk for schema `{}` (1000+ pages)", schema_name);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let count = self.frames.len();
        if let Err(e) = self.flush_all() {
            log::warn!("buffer pool shutdown flush failed: {}", e);
        } else {
            log::debug!("buffer pool shutdown: flushed {} frame(s)", count);
        }
    }
}

/// A bounded, pin-aware cache of disk pages. Cheaply cloneable: clones share the same
/// underlying pool, which is the mechanism by which `PageHandle`s and `RowIterator`s can each
/// hold a reference to the pool while it is also reachable elsewhere.
#[derive(Clone)]
pub struct BufferPool(Rc<RefCell<Inner>>);

impl BufferPool {
    pub fn open(io: PageIo, capacity: usize, endianness: Endianness) -> Self {
        Self(Rc::new(RefCell::new(Inner::new(io, capacity, endianness))))
    }

    fn wrap(&self, frame_id: Option<FrameIdT>) -> PageHandle {
        match frame_id {
            Some(frame_id) => PageHandle {
                pool: Some(self.clone()),
                frame_id: Some(frame_id),
            },
            None => PageHandle::empty(),
        }
    }

    /// Append a newly-created page's bytes directly to the data file, without caching it.
    pub fn append(&self, bytes: &[u8]) -> Result<OffsetT> {
        self.0.borrow_mut().append(bytes)
    }

    pub fn request_free_page(&self, schema: &Schema) -> Result<PageHandle> {
        let frame_id = self.0.borrow_mut().request_free_page(schema)?;
        Ok(self.wrap(frame_id))
    }

    pub fn request_page(&self, offset: OffsetT) -> Result<PageHandle> {
        let frame_id = self.0.borrow_mut().request_page(offset)?;
        Ok(self.wrap(frame_id))
    }

    pub fn request_first_page(&self, schema_name: &str) -> Result<PageHandle> {
        let frame_id = self.0.borrow_mut().request_first_page(schema_name)?;
        Ok(self.wrap(frame_id))
    }

    pub fn request_next_page(&self, handle: &PageHandle) -> Result<PageHandle> {
        let frame_id = match handle.frame_id {
            Some(current) => self.0.borrow_mut().request_next_page(current)?,
            None => None,
        };
        Ok(self.wrap(frame_id))
    }

    pub fn look_for_last_page(&self, schema_name: &str) -> Result<Option<OffsetT>> {
        self.0.borrow_mut().look_for_last_page(schema_name)
    }

    pub fn flush(&self, frame_id: FrameIdT) -> Result<()> {
        self.0.borrow_mut().flush(frame_id)
    }

    /// Flush every dirty frame currently resident in the pool.
    pub fn flush_all(&self) -> Result<()> {
        self.0.borrow_mut().flush_all()
    }

    /// Whether `self` and `other` are clones of the same underlying pool.
    pub fn same_pool(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn pin(&self, frame_id: FrameIdT) {
        self.0.borrow_mut().pin(frame_id)
    }

    fn unpin(&self, frame_id: FrameIdT) -> Result<()> {
        self.0.borrow_mut().unpin(frame_id)
    }

    fn with_page<T>(&self, frame_id: FrameIdT, f: impl FnOnce(&Page) -> T) -> T {
        let inner = self.0.borrow();
        f(&inner.frames[frame_id].page)
    }

    fn with_page_mut<T>(&self, frame_id: FrameIdT, f: impl FnOnce(&mut Page) -> T) -> T {
        let mut inner = self.0.borrow_mut();
        f(&mut inner.frames[frame_id].page)
    }
}

/// A scoped, move-only borrow of a cached frame. Pinning happens when the pool produces the
/// handle; dropping (or explicitly `release`-ing) it decrements the pin count exactly once.
/// A handle is either engaged (addresses a frame) or empty; accessing an empty handle yields
/// `None` from every accessor.
pub struct PageHandle {
    pool: Option<BufferPool>,
    frame_id: Option<FrameIdT>,
}

impl PageHandle {
    pub(crate) fn empty() -> Self {
        Self {
            pool: None,
            frame_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frame_id.is_none()
    }

    pub fn slot_count(&self) -> Option<u64> {
        self.with_page(|p| p.slot_count())
    }

    pub fn is_free(&self, index: SlotIdT) -> Option<bool> {
        self.with_page(|p| p.is_free(index))
    }

    pub fn next_page_offset(&self) -> Option<OffsetT> {
        self.with_page(|p| p.next_page_offset())
    }

    pub fn schema_name(&self) -> Option<String> {
        self.with_page(|p| p.schema_name().to_string())
    }

    pub fn read_row(&self, index: SlotIdT, schema: std::sync::Arc<Schema>) -> Option<Row> {
        self.with_page(|p| p.read_row(index, schema))
    }

    /// Insert `row` into this page's lowest free slot.
    pub fn add(&self, row: &Row) -> Option<Result<Option<SlotIdT>>> {
        self.with_page_mut(|p| p.add(row))
    }

    pub fn replace(&self, index: SlotIdT, row: &Row) -> Option<Result<()>> {
        self.with_page_mut(|p| p.replace(index, row))
    }

    pub fn remove(&self, index: SlotIdT) -> Option<Result<()>> {
        self.with_page_mut(|p| p.remove(index))
    }

    pub fn set_next_page_offset(&self, offset: OffsetT) -> Option<()> {
        self.with_page_mut(|p| p.set_next_page_offset(offset))
    }

    /// Flush this handle's frame to disk if it is dirty.
    pub fn flush(&self) -> Result<()> {
        match (&self.pool, self.frame_id) {
            (Some(pool), Some(frame_id)) => pool.flush(frame_id),
            _ => Ok(()),
        }
    }

    fn with_page<T>(&self, f: impl FnOnce(&Page) -> T) -> Option<T> {
        match (&self.pool, self.frame_id) {
            (Some(pool), Some(frame_id)) => Some(pool.with_page(frame_id, f)),
            _ => None,
        }
    }

    fn with_page_mut<T>(&self, f: impl FnOnce(&mut Page) -> T) -> Option<T> {
        match (&self.pool, self.frame_id) {
            (Some(pool), Some(frame_id)) => Some(pool.with_page_mut(frame_id, f)),
            _ => None,
        }
    }

    /// Release this handle before it would otherwise drop. Releasing an already-empty handle
    /// is an error.
    pub fn release(&mut self) -> Result<()> {
        match (self.pool.take(), self.frame_id.take()) {
            (Some(pool), Some(frame_id)) => pool.unpin(frame_id),
            _ => Err(crate::error::Error::DoubleRelease),
        }
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        if let (Some(pool), Some(frame_id)) = (self.pool.take(), self.frame_id.take()) {
            if let Err(e) = pool.unpin(frame_id) {
                log::warn!("failed to unpin frame {} on handle drop: {}", frame_id, e);
            }
        }
    }
}

impl PartialEq for PageHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.pool, &other.pool) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a.0, &b.0) && self.frame_id == other.frame_id,
            (None, None) => true,
            _ => false,
        }
    }
}
