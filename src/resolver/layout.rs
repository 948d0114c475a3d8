//! Output tree layout: `<root>/<username>/<file name>`.
//!
//! Also owns duplicate detection, since both the whole-tree scan and the
//! exact-path guard are questions about what already exists under the root.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::ResolveError;
use crate::video::{FilenameTemplate, Video, default_file_name};

/// How aggressively existing downloads are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateCheck {
    /// Scan the whole output tree for any file name containing the identity,
    /// and refuse to reuse an existing output path.
    #[default]
    Strict,
    /// Only refuse to reuse an existing output path.
    Lazy,
    /// Never refuse; existing files are overwritten.
    Off,
}

impl DuplicateCheck {
    /// Maps the `lazy_duplicate_check` setting.
    #[must_use]
    pub fn from_lazy_flag(lazy: bool) -> Self {
        if lazy { Self::Lazy } else { Self::Strict }
    }
}

/// Where and under what name videos are written.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    template: Option<FilenameTemplate>,
    duplicate_check: DuplicateCheck,
}

impl OutputLayout {
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        template: Option<FilenameTemplate>,
        duplicate_check: DuplicateCheck,
    ) -> Self {
        Self {
            root: root.into(),
            template,
            duplicate_check,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn duplicate_check(&self) -> DuplicateCheck {
        self.duplicate_check
    }

    /// File name for `video` when written under `username`.
    #[must_use]
    pub fn file_name_for(&self, video: &Video, username: &str) -> String {
        match &self.template {
            Some(template) => template.render(video.id(), username, video.uploaded_at()),
            None => default_file_name(video.id()),
        }
    }

    /// Assigns the output directory and path of a video whose username is known.
    ///
    /// Creates the per-user directory. Does nothing when the username is
    /// still unknown.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::AlreadyDownloaded`] if the computed path exists and
    ///   duplicate checking is not [`DuplicateCheck::Off`]
    /// - [`ResolveError::Io`] if the directory cannot be created
    /// - [`ResolveError::Video`] if paths were already assigned
    #[instrument(skip(self, video), fields(video_id = video.id()))]
    pub async fn assign(&self, video: &mut Video) -> Result<(), ResolveError> {
        let Some(username) = video.username().map(str::to_string) else {
            debug!("username unknown; deferring output path assignment");
            return Ok(());
        };

        let dir = self.root.join(&username);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ResolveError::io(&dir, e))?;

        let file_name = self.file_name_for(video, &username);
        let path = dir.join(&file_name);

        if self.duplicate_check != DuplicateCheck::Off
            && tokio::fs::try_exists(&path)
                .await
                .map_err(|e| ResolveError::io(&path, e))?
        {
            return Err(ResolveError::AlreadyDownloaded {
                video_id: video.id(),
                file_name,
                username,
            });
        }

        debug!(path = %path.display(), "assigned output path");
        video.assign_output(dir, path)?;
        Ok(())
    }

    /// Scans the output tree for an earlier download of `video_id`.
    ///
    /// Only runs under [`DuplicateCheck::Strict`]. Creates the root if it does
    /// not exist yet. The walk runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::AlreadyDownloaded`] for the first matching file,
    /// or [`ResolveError::Io`] if the root cannot be created or read.
    #[instrument(skip(self))]
    pub async fn check_duplicate(&self, video_id: u64) -> Result<(), ResolveError> {
        if self.duplicate_check != DuplicateCheck::Strict {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ResolveError::io(&self.root, e))?;

        let root = self.root.clone();
        let needle = video_id.to_string();
        let found = tokio::task::spawn_blocking(move || find_file_containing(&root, &needle))
            .await?
            .map_err(|e| ResolveError::io(&self.root, e))?;

        match found {
            Some((file_name, username)) => Err(ResolveError::AlreadyDownloaded {
                video_id,
                file_name,
                username,
            }),
            None => Ok(()),
        }
    }
}

/// Walks `root` depth-first for a file whose name contains `needle`.
///
/// Returns the file name and the name of its parent directory. Unreadable
/// subdirectories are skipped.
fn find_file_containing(root: &Path, needle: &str) -> io::Result<Option<(String, String)>> {
    let mut pending = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(e),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        is_root = false;

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(needle) {
                let parent = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Ok(Some((name, parent)));
            }
        }
    }

    Ok(None)
}
