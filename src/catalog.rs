/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// The catalog holds every schema known to the database for the lifetime of the process. It is
/// read once, in full, when the database opens, and rewritten in full when it closes.
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use std::collections::HashMap;

use crate::codec::Endianness;
use crate::error::Result;
use crate::schema::Schema;

/// Schema records are always framed little-endian, independent of the data file's configured
/// endianness: the catalog is a separate on-disk concern from the page format it describes.
const RECORD_ENDIANNESS: Endianness = Endianness::Little;

pub struct Catalog {
    path: PathBuf,
    schemas: Vec<Arc<Schema>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Load every schema record from `path`. A missing file is treated as an empty catalog.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut schemas = Vec::new();
        let mut index = HashMap::new();

        if path.exists() {
            let mut file = File::open(&path)?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;

            let mut cursor = 0usize;
            while cursor < bytes.len() {
                let len = RECORD_ENDIANNESS.decode_u64(&bytes[cursor..cursor + 8])? as usize;
                cursor += 8;
                let schema = Schema::decode(&bytes[cursor..cursor + len], RECORD_ENDIANNESS)?;
                cursor += len;

                index.insert(schema.name().to_string(), schemas.len());
                schemas.push(Arc::new(schema));
            }
        }

        log::debug!("catalog loaded {} schema(s) from {:?}", schemas.len(), path);
        Ok(Self {
            path,
            schemas,
            index,
        })
    }

    /// Append a new schema to the catalog. Takes effect on disk only once `close` is called.
    pub fn add_schema(&mut self, schema: Schema) {
        let name = schema.name().to_string();
        self.index.insert(name, self.schemas.len());
        self.schemas.push(Arc::new(schema));
    }

    pub fn get_schema(&self, index: usize) -> Option<Arc<Schema>> {
        self.schemas.get(index).cloned()
    }

    /// Resolve a schema by name.
    pub fn find(&self, name: &str) -> Option<Arc<Schema>> {
        self.index
            .get(name)
            .and_then(|&i| self.schemas.get(i))
            .cloned()
    }

    pub fn schemas(&self) -> &[Arc<Schema>] {
        &self.schemas
    }

    /// Rewrite the schema file from the in-memory schema list.
    pub fn close(&self) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        for schema in &self.schemas {
            let payload = schema.encode(RECORD_ENDIANNESS);
            file.write_all(&RECORD_ENDIANNESS.encode_u64(payload.len() as u64))?;
            file.write_all(&payload)?;
        }
        file.flush()?;
        log::debug!("catalog rewrote {} schema(s) to {:?}", self.schemas.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, Field};
    use tempfile::NamedTempFile;

    fn book_schema() -> Schema {
        Schema::new(
            "Book",
            vec![
                Field::new("Title", DataType::Character(10)),
                Field::new("Editor", DataType::Character(15)),
            ],
        )
    }

    #[test]
    fn test_add_schema_then_find_before_close() {
        let tmp = NamedTempFile::new().unwrap();
        let mut catalog = Catalog::open(tmp.path()).unwrap();
        catalog.add_schema(book_schema());

        assert!(catalog.find("Book").is_some());
        assert_eq!(catalog.get_schema(0).unwrap().name(), "Book");
    }

    #[test]
    fn test_catalog_round_trips_across_close_and_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        let mut catalog = Catalog::open(tmp.path()).unwrap();
        catalog.add_schema(book_schema());
        catalog.add_schema(Schema::new(
            "Runner",
            vec![Field::new("Name", DataType::Character(20))],
        ));
        catalog.close().unwrap();

        let reloaded = Catalog::open(tmp.path()).unwrap();
        assert_eq!(reloaded.schemas().len(), 2);
        assert_eq!(reloaded.find("Book").unwrap().name(), "Book");
        assert_eq!(reloaded.find("Runner").unwrap().name(), "Runner");
        assert!(reloaded.find("Nonexistent").is_none());
    }

    #[test]
    fn test_open_missing_file_is_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.schema");
        let catalog = Catalog::open(&path).unwrap();
        assert!(catalog.schemas().is_empty());
    }
}
