//! Errors raised by [`super::Video`] field assignment.

/// A field assignment was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    /// A single-assignment field was written twice.
    #[error("{field} is already assigned for video {video_id}")]
    AlreadyAssigned {
        video_id: u64,
        field: &'static str,
    },

    /// The username cannot be used as a directory name under the output root.
    #[error("username {username:?} of video {video_id} is not a valid directory name")]
    InvalidUsername { video_id: u64, username: String },
}

impl VideoError {
    pub(crate) fn already_assigned(video_id: u64, field: &'static str) -> Self {
        Self::AlreadyAssigned { video_id, field }
    }
}
