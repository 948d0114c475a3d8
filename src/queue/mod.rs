//! In-memory, insertion-ordered queue of videos for one run.
//!
//! The queue is filled by link resolution, narrowed to the videos whose
//! extraction succeeded, and then handed to the download orchestrator which
//! updates each item's status in place.

use std::collections::HashSet;

use tracing::debug;

use crate::video::{Video, VideoStatus};

/// Per-status counts for a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub unstarted: usize,
    pub queued: usize,
    pub interrupted: usize,
    pub completed: usize,
}

impl StatusCounts {
    /// Total number of items counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.unstarted + self.queued + self.interrupted + self.completed
    }
}

/// Ordered collection of videos.
#[derive(Debug, Default)]
pub struct Queue {
    videos: Vec<Video>,
}

impl Queue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a video, marking it [`VideoStatus::Queued`].
    ///
    /// Returns false (and drops the video) if one with the same identity is
    /// already queued.
    pub fn enqueue(&mut self, mut video: Video) -> bool {
        if self.contains(video.id()) {
            debug!(video_id = video.id(), "video already queued; skipping");
            return false;
        }
        video.set_status(VideoStatus::Queued);
        self.videos.push(video);
        true
    }

    #[must_use]
    pub fn contains(&self, video_id: u64) -> bool {
        self.videos.iter().any(|v| v.id() == video_id)
    }

    /// Replaces the queue contents, dropping duplicate identities.
    pub fn replace(&mut self, videos: Vec<Video>) {
        let mut seen = HashSet::with_capacity(videos.len());
        self.videos = videos.into_iter().filter(|v| seen.insert(v.id())).collect();
    }

    /// Removes and returns every queued video.
    pub fn take_all(&mut self) -> Vec<Video> {
        std::mem::take(&mut self.videos)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Video> {
        self.videos.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Video> {
        self.videos.iter_mut()
    }

    /// Videos currently in `status`.
    pub fn list_by_status(&self, status: VideoStatus) -> impl Iterator<Item = &Video> {
        self.videos.iter().filter(move |v| v.status() == status)
    }

    #[must_use]
    pub fn count_by_status(&self, status: VideoStatus) -> usize {
        self.list_by_status(status).count()
    }

    /// Counts items in every status.
    #[must_use]
    pub fn status_counts(&self) -> StatusCounts {
        self.videos
            .iter()
            .fold(StatusCounts::default(), |mut counts, video| {
                match video.status() {
                    VideoStatus::Unstarted => counts.unstarted += 1,
                    VideoStatus::Queued => counts.queued += 1,
                    VideoStatus::Interrupted => counts.interrupted += 1,
                    VideoStatus::Completed => counts.completed += 1,
                }
                counts
            })
    }
}

impl<'a> IntoIterator for &'a Queue {
    type Item = &'a Video;
    type IntoIter = std::slice::Iter<'a, Video>;

    fn into_iter(self) -> Self::IntoIter {
        self.videos.iter()
    }
}
