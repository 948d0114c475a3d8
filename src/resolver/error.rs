//! Error types for link resolution and output-path assignment.

use std::path::PathBuf;

use thiserror::Error;

use crate::video::VideoError;

/// Errors that reject a link before it reaches the queue.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The input matches none of the accepted link shapes.
    #[error(
        "invalid video link: {link}\n  Suggestion: use a full watch link, a short link, or a 19-digit video ID"
    )]
    InvalidReference {
        /// The rejected input.
        link: String,
    },

    /// No numeric identity could be found in the normalized link.
    #[error("could not extract a video ID from {link}")]
    IdentityExtraction {
        /// The normalized link that was searched.
        link: String,
    },

    /// A file for this video already exists in the output tree.
    #[error("video {video_id} already downloaded as {file_name} (under {username})")]
    AlreadyDownloaded {
        video_id: u64,
        /// Name of the existing file.
        file_name: String,
        /// Directory (uploader) the file was found under.
        username: String,
    },

    /// Following a short link failed.
    #[error("network error following {link}: {source}")]
    Redirect {
        link: String,
        #[source]
        source: reqwest::Error,
    },

    /// Creating or inspecting the output tree failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The redirect probe client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The duplicate scan worker did not finish.
    #[error("duplicate scan task failed: {0}")]
    ScanTask(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Video(#[from] VideoError),
}

impl ResolveError {
    /// Creates an invalid-reference error.
    pub fn invalid_reference(link: impl Into<String>) -> Self {
        Self::InvalidReference { link: link.into() }
    }

    /// Creates an identity-extraction error.
    pub fn identity_extraction(link: impl Into<String>) -> Self {
        Self::IdentityExtraction { link: link.into() }
    }

    /// Creates a redirect (network) error.
    pub fn redirect(link: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Redirect {
            link: link.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for rejections caused by a previous download.
    #[must_use]
    pub fn is_already_downloaded(&self) -> bool {
        matches!(self, Self::AlreadyDownloaded { .. })
    }
}
