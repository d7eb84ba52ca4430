/*
 * Copyright (c) 2020 - 2021.  Shoyo Inokuchi.
 * Please refer to github.com/shoyo/jin for more information about this project and its license.
 */

/// Type aliases and default values shared across the crate.

/// Identifies a frame slot inside the buffer pool.
pub type FrameIdT = usize;

/// A byte offset into the data file. Zero is reserved to mean "no next page".
pub type OffsetT = i64;

/// Index of a row slot within a single page.
pub type SlotIdT = usize;

/// Default number of row slots per page when a caller does not override it.
pub const DEFAULT_SLOT_COUNT: usize = 64;

/// Default number of frames kept resident in the buffer pool.
pub const DEFAULT_BUFFER_SIZE: usize = 32;

/// Sentinel offset meaning "this page has no successor in its chain".
pub const NO_NEXT_PAGE: OffsetT = 0;
