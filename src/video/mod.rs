//! Per-video state carried through resolution, extraction and download.
//!
//! A [`Video`] is created once a link has been normalized and its numeric
//! identity decoded. The remaining fields (username, output location, media
//! address, byte size) are filled in by later stages and may each be assigned
//! only once.

mod error;
mod identity;
mod template;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};

pub use error::VideoError;
pub use identity::{
    LinkKind, VIDEO_ID_LENGTH, classify_link, extract_username, extract_video_id, is_bare_id,
    upload_time,
};
pub use template::{DEFAULT_DATE_FORMAT, FilenameTemplate, TemplateError};
pub(crate) use template::default_file_name;

/// Lifecycle status of a video within a run.
///
/// `Unstarted -> Queued -> Completed | Interrupted`. Both `Completed` and
/// `Interrupted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VideoStatus {
    /// Created but not yet accepted into the queue.
    #[default]
    Unstarted,
    /// Accepted into the queue, waiting for or in the middle of a download.
    Queued,
    /// Download was rejected, failed or cancelled. Any partial file is removed.
    Interrupted,
    /// Download finished and the file is complete on disk.
    Completed,
}

impl VideoStatus {
    /// Returns the lowercase string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Queued => "queued",
            Self::Interrupted => "interrupted",
            Self::Completed => "completed",
        }
    }

    /// Returns true for `Completed` and `Interrupted`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Interrupted)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unstarted" => Ok(Self::Unstarted),
            "queued" => Ok(Self::Queued),
            "interrupted" => Ok(Self::Interrupted),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("invalid video status: {s}")),
        }
    }
}

/// One video moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Video {
    link: String,
    id: u64,
    uploaded_at: DateTime<Utc>,
    username: Option<String>,
    output_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
    download_address: Option<String>,
    byte_size: Option<u64>,
    status: VideoStatus,
}

impl Video {
    /// Creates a video from a normalized link and its numeric identity.
    ///
    /// The upload time is decoded from the identity.
    #[must_use]
    pub fn new(link: impl Into<String>, id: u64) -> Self {
        Self {
            link: link.into(),
            id,
            uploaded_at: upload_time(id),
            username: None,
            output_dir: None,
            output_path: None,
            download_address: None,
            byte_size: None,
            status: VideoStatus::Unstarted,
        }
    }

    /// Normalized link (full watch link or bare identity).
    #[must_use]
    pub fn link(&self) -> &str {
        &self.link
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Upload time decoded from the identity.
    #[must_use]
    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Sets the uploader name, dropping a leading `@`.
    ///
    /// The name becomes a directory under the output root, so it must be a
    /// single plain path component.
    ///
    /// # Errors
    ///
    /// - [`VideoError::AlreadyAssigned`] if a username is already set
    /// - [`VideoError::InvalidUsername`] if the name is empty, `.`, `..`, or
    ///   contains a path separator or NUL
    pub fn set_username(&mut self, username: &str) -> Result<(), VideoError> {
        if self.username.is_some() {
            return Err(VideoError::already_assigned(self.id, "username"));
        }
        let username = username.strip_prefix('@').unwrap_or(username);
        if !is_safe_path_component(username) {
            return Err(VideoError::InvalidUsername {
                video_id: self.id,
                username: username.to_string(),
            });
        }
        self.username = Some(username.to_string());
        Ok(())
    }

    #[must_use]
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Records where the video will be written.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::AlreadyAssigned`] if paths were already assigned.
    pub fn assign_output(&mut self, dir: PathBuf, path: PathBuf) -> Result<(), VideoError> {
        if self.output_path.is_some() {
            return Err(VideoError::already_assigned(self.id, "output path"));
        }
        self.output_dir = Some(dir);
        self.output_path = Some(path);
        Ok(())
    }

    #[must_use]
    pub fn download_address(&self) -> Option<&str> {
        self.download_address.as_deref()
    }

    /// Records the resolved media address and its size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::AlreadyAssigned`] if media details were already set.
    pub fn set_media(&mut self, address: impl Into<String>, byte_size: u64) -> Result<(), VideoError> {
        if self.download_address.is_some() {
            return Err(VideoError::already_assigned(self.id, "download address"));
        }
        self.download_address = Some(address.into());
        self.byte_size = Some(byte_size);
        Ok(())
    }

    /// Returns the media size in bytes.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Video::set_media`]. Only extracted videos
    /// reach the download stage, so this indicates a pipeline bug.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn byte_size(&self) -> u64 {
        self.byte_size
            .expect("byte size read before extraction assigned it")
    }

    /// Returns the media size if it has been assigned.
    #[must_use]
    pub fn byte_size_if_known(&self) -> Option<u64> {
        self.byte_size
    }

    #[must_use]
    pub fn status(&self) -> VideoStatus {
        self.status
    }

    pub fn set_status(&mut self, status: VideoStatus) {
        self.status = status;
    }
}

/// True if `name` is usable as a single directory name under the output root.
fn is_safe_path_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Formats a byte count for log lines (`B`, `KB`, `MB`, `GB`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
