/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// Crate-wide error type.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot release a page handle that is already empty")]
    DoubleRelease,

    #[error("byte buffer has length {actual} but {expected} were required")]
    DecodeWidthMismatch { expected: usize, actual: usize },

    #[error("row schema `{expected}` does not match page schema `{actual}`")]
    SchemaMismatch { expected: String, actual: String },

    #[error("free slot count {free} cannot exceed slot count {capacity}")]
    CapacityExceeded { free: usize, capacity: usize },

    #[error("free slot count cannot drop below zero")]
    Underflow,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
