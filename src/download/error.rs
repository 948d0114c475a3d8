//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

use super::DownloadReport;
use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Errors that end a single transfer.
///
/// These never abort a run; the item is marked interrupted and the error is logged.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout { url: String },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The video reached the download stage without an address or output path.
    #[error("video {video_id} has no {missing}")]
    MissingTarget {
        video_id: u64,
        missing: &'static str,
    },

    /// The run was cancelled mid-transfer.
    #[error("download cancelled")]
    Cancelled,

    /// The blocking transfer worker panicked.
    #[error("download task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DownloadError {
    /// Creates a network error, classifying timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the orchestrator itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency { value: usize },

    /// The run was cancelled. Statuses were recorded and interrupted files
    /// removed before this was returned.
    #[error("downloads cancelled ({report})")]
    Cancelled { report: DownloadReport },
}
