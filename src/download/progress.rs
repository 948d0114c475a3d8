//! Progress reporting hooks for the download stage.
//!
//! The orchestrator reports through a [`ProgressSink`]; the CLI renders it with
//! progress bars, tests count calls, and library users can ignore it with
//! [`NoProgress`]. Calls may arrive from blocking worker threads.

use crate::video::VideoStatus;

/// Observer for per-item download progress.
pub trait ProgressSink: Send + Sync {
    /// A transfer is starting. `total_bytes` is the size known from extraction.
    fn started(&self, _video_id: u64, _label: &str, _total_bytes: u64) {}

    /// `bytes` more bytes were written.
    fn advanced(&self, _video_id: u64, _bytes: u64) {}

    /// The item reached a terminal status.
    fn finished(&self, _video_id: u64, _status: VideoStatus) {}
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
