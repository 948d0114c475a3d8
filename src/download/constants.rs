//! Constants for the download module.

use std::time::Duration;

/// Bytes per write (and per progress update) when streaming a body to disk.
pub const CHUNK_SIZE: usize = 8192;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 16;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// How long a cancelled blocking transfer gets to notice and release its file.
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);
