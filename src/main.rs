/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

use pagedb::schema::{DataType, Field, Schema};
use pagedb::{DbSystem, Row, StorageConfig};

fn main() {
    env_logger::init();
    println!("pagedb (2021)");

    let config = StorageConfig::new("pagedb.dat", "pagedb.schema");
    let mut db = DbSystem::open(config).expect("failed to open database");

    db.add_schema(Schema::new(
        "Book",
        vec![
            Field::new("Title", DataType::Character(32)),
            Field::new("Editor", DataType::Character(32)),
        ],
    ));

    let schema = db.schema("Book").expect("Book schema just registered");
    let mut row = Row::empty(schema);
    row.set_string(0, "Elric");
    row.set_string(1, "Omnibus");
    db.add(&row).expect("insert failed");

    db.close().expect("failed to close database");
}
