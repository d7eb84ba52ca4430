/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// Scans the pages of one schema's chain through the buffer pool, and drives predicate-based
/// update/delete over the rows it visits.
use std::sync::Arc;

use crate::buffer::{BufferPool, PageHandle};
use crate::codec::Endianness;
use crate::constants::SlotIdT;
use crate::error::Result;
use crate::row::Row;
use crate::schema::Schema;

/// A forward-only cursor over every occupied row of a schema's page chain. Construction
/// obtains the first page's handle through the pool; if the schema owns no pages, the
/// iterator starts out equal to the end iterator.
pub struct RowIterator {
    pool: BufferPool,
    schema: Arc<Schema>,
    handle: PageHandle,
    slot_index: SlotIdT,
}

impl RowIterator {
    pub fn new(pool: BufferPool, schema: Arc<Schema>) -> Result<Self> {
        let handle = pool.request_first_page(schema.name())?;
        let mut iter = Self {
            pool,
            schema,
            handle,
            slot_index: 0,
        };
        iter.skip_holes()?;
        Ok(iter)
    }

    /// The sentinel "one past the end" iterator for `schema`: an empty handle.
    pub fn end(pool: BufferPool, schema: Arc<Schema>) -> Self {
        Self {
            pool,
            schema,
            handle: PageHandle::empty(),
            slot_index: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.handle.is_empty()
    }

    /// The row at the current position, or `None` if this is the end iterator.
    pub fn current(&self) -> Option<Row> {
        self.handle.read_row(self.slot_index, self.schema.clone())
    }

    pub fn slot_index(&self) -> SlotIdT {
        self.slot_index
    }

    /// Move to the next occupied slot, crossing page boundaries and skipping holes. A no-op
    /// once already at the end.
    pub fn advance(&mut self) -> Result<()> {
        if self.handle.is_empty() {
            return Ok(());
        }
        loop {
            self.step()?;
            if self.handle.is_empty() {
                return Ok(());
            }
            if !self.handle.is_free(self.slot_index).unwrap_or(true) {
                return Ok(());
            }
        }
    }

    /// Replace the row at the current position. Only valid while not at the end.
    pub fn replace_current(&self, row: &Row) -> Result<()> {
        self.handle
            .replace(self.slot_index, row)
            .expect("iterator holds an engaged handle while not at the end")
    }

    /// Remove the row at the current position. Only valid while not at the end.
    pub fn remove_current(&self) -> Result<()> {
        self.handle
            .remove(self.slot_index)
            .expect("iterator holds an engaged handle while not at the end")
    }

    fn step(&mut self) -> Result<()> {
        self.slot_index += 1;
        let slot_count = self.handle.slot_count().unwrap_or(0) as usize;
        if self.slot_index == slot_count {
            self.handle = self.pool.request_next_page(&self.handle)?;
            self.slot_index = 0;
        }
        Ok(())
    }

    fn skip_holes(&mut self) -> Result<()> {
        while !self.handle.is_empty() && self.handle.is_free(self.slot_index).unwrap_or(true) {
            self.step()?;
        }
        Ok(())
    }
}

impl PartialEq for RowIterator {
    fn eq(&self, other: &Self) -> bool {
        self.pool.same_pool(&other.pool)
            && Arc::ptr_eq(&self.schema, &other.schema)
            && self.handle == other.handle
            && self.slot_index == other.slot_index
    }
}

/// For every row of `schema` satisfying `predicate`, set field `field_name` to `value` and
/// write the row back through `Page::replace`. Returns the number of rows updated.
pub fn update_where(
    pool: &BufferPool,
    schema: &Arc<Schema>,
    field_name: &str,
    value: &str,
    endianness: Endianness,
    mut predicate: impl FnMut(&Row) -> bool,
) -> Result<usize> {
    if schema.find_field(field_name).is_none() {
        return Ok(0);
    }

    let mut iter = RowIterator::new(pool.clone(), schema.clone())?;
    let mut updated = 0usize;
    while !iter.is_end() {
        let mut row = iter
            .current()
            .expect("a non-end iterator always yields a row");
        if predicate(&row) {
            row.set_field_by_name(field_name, value, endianness);
            iter.replace_current(&row)?;
            updated += 1;
        }
        iter.advance()?;
    }
    Ok(updated)
}

/// Remove every row of `schema` satisfying `predicate`. Returns the number of rows removed.
pub fn remove_where(
    pool: &BufferPool,
    schema: &Arc<Schema>,
    mut predicate: impl FnMut(&Row) -> bool,
) -> Result<usize> {
    let mut iter = RowIterator::new(pool.clone(), schema.clone())?;
    let mut removed = 0usize;
    while !iter.is_end() {
        let row = iter
            .current()
            .expect("a non-end iterator always yields a row");
        if predicate(&row) {
            iter.remove_current()?;
            removed += 1;
        }
        iter.advance()?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OffsetT;
    use crate::io::PageIo;
    use crate::page::Page;
    use crate::schema::{DataType, Field};
    use tempfile::NamedTempFile;

    fn runner_schema() -> Arc<Schema> {
        Arc::new(Schema::new(
            "Runner",
            vec![Field::new("Name", DataType::Character(8))],
        ))
    }

    /// Build a chain of pages for `schema`, `slot_count` rows apiece, filling them in order
    /// with one row per name and linking each full page to the next via the pool.
    fn pool_with(slot_count: u64, schema: &Arc<Schema>, names: &[&str]) -> (BufferPool, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let io = PageIo::open(tmp.path()).unwrap();
        let pool = BufferPool::open(io, 8, Endianness::Little);

        let mut current = Page::new(schema, slot_count);
        let mut prev_offset: Option<OffsetT> = None;
        let mut any_rows = false;

        for name in names {
            any_rows = true;
            let mut row = Row::empty(schema.clone());
            row.set_string(0, name);

            if current.add(&row).unwrap().is_none() {
                let offset = pool.append(&current.encode(Endianness::Little)).unwrap();
                link(&pool, prev_offset, offset);
                prev_offset = Some(offset);

                current = Page::new(schema, slot_count);
                current.add(&row).unwrap();
            }
        }
        if any_rows {
            let offset = pool.append(&current.encode(Endianness::Little)).unwrap();
            link(&pool, prev_offset, offset);
        }

        (pool, tmp)
    }

    fn link(pool: &BufferPool, prev_offset: Option<OffsetT>, next_offset: OffsetT) {
        if let Some(prev) = prev_offset {
            let handle = pool.request_page(prev).unwrap();
            handle.set_next_page_offset(next_offset);
            handle.flush().unwrap();
        }
    }

    #[test]
    fn test_iteration_completeness_across_page_boundary() {
        let schema = runner_schema();
        let (pool, _tmp) = pool_with(2, &schema, &["1", "2", "3", "4", "5"]);

        let mut iter = RowIterator::new(pool.clone(), schema.clone()).unwrap();
        let mut seen = Vec::new();
        while !iter.is_end() {
            seen.push(iter.current().unwrap().get_string(0).unwrap());
            iter.advance().unwrap();
        }
        assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_empty_schema_iterator_equals_end() {
        let schema = runner_schema();
        let (pool, _tmp) = pool_with(2, &schema, &[]);
        let iter = RowIterator::new(pool.clone(), schema.clone()).unwrap();
        assert!(iter.is_end());
    }

    #[test]
    fn test_update_where_sets_matching_field() {
        let schema = runner_schema();
        let (pool, _tmp) = pool_with(2, &schema, &["1", "2", "3", "4", "5"]);

        let updated = update_where(&pool, &schema, "Name", "Norbert", Endianness::Little, |row| {
            row.get_string(0).unwrap() == "4"
        })
        .unwrap();
        assert_eq!(updated, 1);

        let mut iter = RowIterator::new(pool.clone(), schema.clone()).unwrap();
        let mut seen = Vec::new();
        while !iter.is_end() {
            seen.push(iter.current().unwrap().get_string(0).unwrap());
            iter.advance().unwrap();
        }
        assert_eq!(seen, vec!["1", "2", "3", "Norbert", "5"]);
    }

    #[test]
    fn test_remove_where_deletes_matching_rows_and_iteration_skips_holes() {
        let schema = runner_schema();
        let (pool, _tmp) = pool_with(2, &schema, &["1", "2", "3", "4", "5"]);

        let removed = remove_where(&pool, &schema, |row| {
            let name = row.get_string(0).unwrap();
            name == "2" || name == "4"
        })
        .unwrap();
        assert_eq!(removed, 2);

        let mut iter = RowIterator::new(pool.clone(), schema.clone()).unwrap();
        let mut seen = Vec::new();
        while !iter.is_end() {
            seen.push(iter.current().unwrap().get_string(0).unwrap());
            iter.advance().unwrap();
        }
        assert_eq!(seen, vec!["1", "3", "5"]);
    }

    #[test]
    fn test_update_where_on_unknown_field_updates_nothing() {
        let schema = runner_schema();
        let (pool, _tmp) = pool_with(2, &schema, &["1"]);
        let updated =
            update_where(&pool, &schema, "Nonexistent", "X", Endianness::Little, |_| true).unwrap();
        assert_eq!(updated, 0);
    }
}
