/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// The façade a caller actually talks to: wires the catalog, buffer pool, and data file
/// together and implements the one operation none of them owns alone, insert.
use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::config::StorageConfig;
use crate::constants::OffsetT;
use crate::error::Result;
use crate::io::PageIo;
use crate::iterator::{self, RowIterator};
use crate::page::Page;
use crate::row::Row;
use crate::schema::Schema;

pub struct DbSystem {
    config: StorageConfig,
    catalog: Catalog,
    pool: BufferPool,
    last_page_offset: HashMap<String, OffsetT>,
}

impl DbSystem {
    /// Open (creating if necessary) the data and schema files named in `config`, loading the
    /// catalog and discovering each known schema's current chain tail.
    pub fn open(config: StorageConfig) -> Result<Self> {
        let catalog = Catalog::open(&config.schema_path)?;
        let io = PageIo::open(&config.data_path)?;
        let pool = BufferPool::open(io, config.buffer_size, config.endianness);

        let mut last_page_offset = HashMap::new();
        for schema in catalog.schemas() {
            if let Some(offset) = pool.look_for_last_page(schema.name())? {
                last_page_offset.insert(schema.name().to_string(), offset);
            }
        }

        log::debug!(
            "opened db at {:?} with {} known schema(s)",
            config.data_path,
            catalog.schemas().len()
        );
        Ok(Self {
            config,
            catalog,
            pool,
            last_page_offset,
        })
    }

    /// Register a new schema in the catalog. Takes effect in the schema file on `close`.
    pub fn add_schema(&mut self, schema: Schema) {
        self.catalog.add_schema(schema);
    }

    fn resolve(&self, schema_name: &str) -> Option<Arc<Schema>> {
        self.catalog.find(schema_name)
    }

    /// Look up a registered schema by name.
    pub fn schema(&self, schema_name: &str) -> Option<Arc<Schema>> {
        self.resolve(schema_name)
    }

    /// Insert `row` into its schema's chain: reuse a page with a free slot if one exists,
    /// otherwise append a fresh page and link it onto the chain's previous tail.
    pub fn add(&mut self, row: &Row) -> Result<()> {
        let schema = row.schema().clone();

        let handle = self.pool.request_free_page(&schema)?;
        if !handle.is_empty() {
            handle.add(row).expect("handle is engaged")?;
            handle.flush()?;
            return Ok(());
        }
        drop(handle);

        let mut page = Page::new(&schema, self.config.slot_count as u64);
        page.add(row).expect("fresh page always has a free slot");
        let offset = self.pool.append(&page.encode(self.config.endianness))?;

        if let Some(&prev_offset) = self.last_page_offset.get(schema.name()) {
            let prev_handle = self.pool.request_page(prev_offset)?;
            prev_handle
                .set_next_page_offset(offset)
                .expect("previous tail handle is engaged");
            prev_handle.flush()?;
        }
        self.last_page_offset
            .insert(schema.name().to_string(), offset);

        log::debug!(
            "appended new page for schema `{}` at offset {}",
            schema.name(),
            offset
        );
        Ok(())
    }

    /// A scan cursor positioned at the first row of `schema_name`, or the end iterator if the
    /// schema has no pages or is unknown.
    pub fn iterator(&self, schema_name: &str) -> Result<RowIterator> {
        match self.resolve(schema_name) {
            Some(schema) => RowIterator::new(self.pool.clone(), schema),
            None => Ok(self.end_iterator(schema_name)),
        }
    }

    /// The sentinel end iterator for `schema_name`. Valid even if the schema is unknown.
    pub fn end_iterator(&self, schema_name: &str) -> RowIterator {
        let schema = self
            .resolve(schema_name)
            .unwrap_or_else(|| Arc::new(Schema::new(schema_name, Vec::new())));
        RowIterator::end(self.pool.clone(), schema)
    }

    /// For every row of `schema_name` satisfying `predicate`, set `field_name` to `value`.
    /// Returns the number of rows updated; 0 if the schema is unknown.
    pub fn update_where(
        &self,
        schema_name: &str,
        field_name: &str,
        value: &str,
        predicate: impl FnMut(&Row) -> bool,
    ) -> Result<usize> {
        match self.resolve(schema_name) {
            Some(schema) => iterator::update_where(
                &self.pool,
                &schema,
                field_name,
                value,
                self.config.endianness,
                predicate,
            ),
            None => Ok(0),
        }
    }

    /// Remove every row of `schema_name` satisfying `predicate`. Returns the number removed;
    /// 0 if the schema is unknown.
    pub fn remove_where(&self, schema_name: &str, predicate: impl FnMut(&Row) -> bool) -> Result<usize> {
        match self.resolve(schema_name) {
            Some(schema) => iterator::remove_where(&self.pool, &schema, predicate),
            None => Ok(0),
        }
    }

    /// Flush every dirty frame and rewrite the schema file, consuming the façade.
    pub fn close(self) -> Result<()> {
        self.pool.flush_all()?;
        self.catalog.close()?;
        log::debug!("closed db at {:?}", self.config.data_path);
        Ok(())
    }
}

impl Drop for DbSystem {
    fn drop(&mut self) {
        if let Err(e) = self.pool.flush_all() {
            log::warn!("db shutdown flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, Field};
    use tempfile::tempdir;

    fn book_schema() -> Schema {
        Schema::new(
            "Book",
            vec![
                Field::new("Title", DataType::Character(10)),
                Field::new("Editor", DataType::Character(15)),
                Field::new("Parution", DataType::Date),
            ],
        )
    }

    fn open_db(dir: &tempfile::TempDir, slot_count: usize) -> DbSystem {
        let config = StorageConfig::new(dir.path().join("db.dat"), dir.path().join("db.schema"))
            .with_slot_count(slot_count)
            .with_buffer_size(8);
        let mut db = DbSystem::open(config).unwrap();
        db.add_schema(book_schema());
        db
    }

    #[test]
    fn test_insert_and_read_back() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir, 64);
        let schema = db.resolve("Book").unwrap();

        let mut row = Row::empty(schema);
        row.set_string(0, "Elric");
        row.set_string(1, "Omnibus");
        row.set_raw(2, &[0x10, 0x02, 0x07, 0xe0]);
        db.add(&row).unwrap();

        let mut iter = db.iterator("Book").unwrap();
        let read_back = iter.current().unwrap();
        assert_eq!(read_back.get_string(0).unwrap(), "Elric");
        assert_eq!(read_back.get_string(1).unwrap(), "Omnibus");
        assert_eq!(read_back.get_bytes(2), &[0x10, 0x02, 0x07, 0xe0]);
        iter.advance().unwrap();
        assert!(iter.is_end());
    }

    #[test]
    fn test_page_full_creates_new_linked_page() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir, 2);
        let schema = db.resolve("Book").unwrap();

        for name in ["1", "2", "3"] {
            let mut row = Row::empty(schema.clone());
            row.set_string(0, name);
            db.add(&row).unwrap();
        }

        let mut iter = db.iterator("Book").unwrap();
        let mut seen = Vec::new();
        while !iter.is_end() {
            seen.push(iter.current().unwrap().get_string(0).unwrap());
            iter.advance().unwrap();
        }
        assert_eq!(seen, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_remove_then_reuse_slot() {
        let dir = tempdir().unwrap();
        let mut db = open_db(&dir, 2);
        let schema = db.resolve("Book").unwrap();

        for name in ["1", "2"] {
            let mut row = Row::empty(schema.clone());
            row.set_string(0, name);
            db.add(&row).unwrap();
        }
        let removed = db.remove_where("Book", |row| row.get_string(0).unwrap() == "1").unwrap();
        assert_eq!(removed, 1);

        let mut row = Row::empty(schema);
        row.set_string(0, "3");
        db.add(&row).unwrap();

        let mut iter = db.iterator("Book").unwrap();
        let mut seen = Vec::new();
        while !iter.is_end() {
            seen.push(iter.current().unwrap().get_string(0).unwrap());
            iter.advance().unwrap();
        }
        seen.sort();
        assert_eq!(seen, vec!["2", "3"]);
    }

    #[test]
    fn test_close_and_reopen_preserves_schema_and_rows() {
        let dir = tempdir().unwrap();
        {
            let mut db = open_db(&dir, 64);
            let schema = db.resolve("Book").unwrap();
            let mut row = Row::empty(schema);
            row.set_string(0, "Elric");
            db.add(&row).unwrap();
            db.close().unwrap();
        }

        let config = StorageConfig::new(dir.path().join("db.dat"), dir.path().join("db.schema"));
        let db = DbSystem::open(config).unwrap();
        let mut iter = db.iterator("Book").unwrap();
        assert_eq!(iter.current().unwrap().get_string(0).unwrap(), "Elric");
        iter.advance().unwrap();
        assert!(iter.is_end());
    }

    #[test]
    fn test_unknown_schema_iterator_is_end() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir, 64);
        assert!(db.iterator("Nonexistent").unwrap().is_end());
        assert_eq!(db.remove_where("Nonexistent", |_| true).unwrap(), 0);
    }
}
