//! Download orchestrator for concurrent, cancellable video downloads.
//!
//! # Concurrency Model
//!
//! - Every queued video gets its own future; all of them are driven together
//! - A semaphore permit is acquired before a transfer starts and released when
//!   it ends (RAII), so at most `concurrency` transfers are in flight
//! - Blocking-session transfers run on the blocking pool; async-session
//!   transfers run on the runtime
//!
//! # Status Rules
//!
//! - 2xx response, body fully written: `Completed`
//! - non-2xx response, transport error, or cancellation: `Interrupted`
//!
//! After every future has settled, files of interrupted videos are deleted.
//! This happens on cancellation as well; the cancellation is then reported as
//! [`EngineError::Cancelled`] carrying the final counts.

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::transport::{TransferJob, TransferOutcome, transfer};
use super::{DownloadError, EngineError, ProgressSink};
use crate::queue::Queue;
use crate::session::Session;
use crate::video::{Video, VideoStatus};

/// Final counts of a download run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub completed: usize,
    pub interrupted: usize,
    /// Videos that never reached a terminal status.
    pub unstarted: usize,
}

impl DownloadReport {
    /// Derives the report from the statuses in `queue`.
    #[must_use]
    pub fn from_queue(queue: &Queue) -> Self {
        let counts = queue.status_counts();
        Self {
            completed: counts.completed,
            interrupted: counts.interrupted,
            unstarted: counts.unstarted + counts.queued,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.interrupted + self.unstarted
    }
}

impl fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} successful, {} failed, {} unstarted",
            self.completed, self.interrupted, self.unstarted
        )
    }
}

/// Runs the download stage over a queue.
#[derive(Debug)]
pub struct DownloadOrchestrator {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator allowing `concurrency` simultaneous transfers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-16).
    #[instrument]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!("creating download orchestrator");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every queued video, updating statuses in place.
    ///
    /// Videos already `Completed` are left alone. Once all transfers have
    /// settled, [`cleanup_interrupted`] runs, whether or not the run was
    /// cancelled.
    ///
    /// # Errors
    ///
    /// [`EngineError::Cancelled`] if `cancel` fired during the run.
    #[instrument(skip_all, fields(videos = queue.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        queue: &mut Queue,
        session: &Session,
        progress: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport, EngineError> {
        info!("starting downloads");

        let downloads = queue
            .iter_mut()
            .filter(|video| video.status() != VideoStatus::Completed)
            .map(|video| self.download_one(video, session, &progress, cancel));
        join_all(downloads).await;

        let removed = cleanup_interrupted(queue).await;
        let report = DownloadReport::from_queue(queue);
        info!(
            completed = report.completed,
            interrupted = report.interrupted,
            unstarted = report.unstarted,
            removed_partials = removed,
            "downloads finished"
        );

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled { report });
        }
        Ok(report)
    }

    #[instrument(skip_all, fields(video_id = video.id()))]
    async fn download_one(
        &self,
        video: &mut Video,
        session: &Session,
        progress: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) {
        let status = self.transfer_status(video, session, progress, cancel).await;
        video.set_status(status);
        progress.finished(video.id(), status);
    }

    async fn transfer_status(
        &self,
        video: &Video,
        session: &Session,
        progress: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> VideoStatus {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("cancelled before start");
                return VideoStatus::Interrupted;
            }
            permit = self.semaphore.acquire() => permit,
        };
        let Ok(_permit) = permit else {
            warn!("download slots closed");
            return VideoStatus::Interrupted;
        };

        let job = match TransferJob::for_video(video) {
            Ok(job) => job,
            Err(error) => {
                warn!("cannot download: {error}");
                return VideoStatus::Interrupted;
            }
        };

        let label = video
            .username()
            .map_or_else(|| video.id().to_string(), |u| format!("@{u} {}", video.id()));
        progress.started(video.id(), &label, video.byte_size_if_known().unwrap_or(0));

        match transfer(session, job, progress, cancel).await {
            Ok(TransferOutcome::Completed { bytes }) => {
                info!(bytes, "download completed");
                VideoStatus::Completed
            }
            Ok(TransferOutcome::Rejected { status }) => {
                warn!(status, "download rejected by server");
                VideoStatus::Interrupted
            }
            Err(DownloadError::Cancelled) => {
                debug!("download cancelled");
                VideoStatus::Interrupted
            }
            Err(error) => {
                warn!("download failed: {error}");
                VideoStatus::Interrupted
            }
        }
    }
}

/// Deletes the output file of every interrupted video.
///
/// Missing files are ignored. Returns the number of files removed.
pub async fn cleanup_interrupted(queue: &Queue) -> usize {
    let mut removed = 0;
    for video in queue.list_by_status(VideoStatus::Interrupted) {
        let Some(path) = video.output_path() else {
            continue;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(video_id = video.id(), path = %path.display(), "removed partial download");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(video_id = video.id(), path = %path.display(), error = %e, "failed to remove partial download");
            }
        }
    }
    removed
}
