//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::path::Path;

use tikfetch_core::{DuplicateCheck, OutputLayout};

/// Identity of the first test video; others count up from here.
pub const BASE_ID: u64 = 7_123_456_789_012_345_670;

/// Output layout rooted at `root` with default file names.
pub fn layout_in(root: &Path, duplicate_check: DuplicateCheck) -> OutputLayout {
    OutputLayout::new(root.to_path_buf(), None, duplicate_check)
}
