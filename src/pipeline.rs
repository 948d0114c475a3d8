//! The three-stage run: resolve links, extract media addresses, download.
//!
//! One [`Session`] is opened after resolution and closed exactly once when the
//! run ends, whichever way it ends. Cancellation is observed between stages,
//! during extraction, and inside every transfer.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::RunConfig;
use crate::download::{DownloadOrchestrator, DownloadReport, EngineError, ProgressSink};
use crate::extract::{ExtractError, ExtractFailure, Extractor, build_extractor, split_outcomes};
use crate::queue::Queue;
use crate::resolver::{RejectedLink, ResolveError, VideoResolver, populate_queue};
use crate::session::{Session, SessionError};

/// Errors that stop a run as a whole.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot set up link resolution: {0}")]
    Resolver(#[from] ResolveError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Extractor setup failed in a way retries cannot fix.
    #[error("extractor unavailable: {0}")]
    Extractor(#[from] ExtractError),

    #[error(transparent)]
    Engine(EngineError),
}

/// What happened to every input link.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    /// Links dropped during resolution.
    pub rejected: Vec<RejectedLink>,
    /// Videos dropped during extraction.
    pub extraction_failures: Vec<ExtractFailure>,
    pub report: DownloadReport,
    pub cancelled: bool,
}

impl PipelineSummary {
    /// Links skipped because their video is already on disk.
    #[must_use]
    pub fn already_downloaded(&self) -> usize {
        self.rejected
            .iter()
            .filter(|r| r.error.is_already_downloaded())
            .count()
    }

    /// True when some item failed or the run was cut short.
    ///
    /// Links rejected as already downloaded do not count as failures.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.cancelled
            || self.report.interrupted > 0
            || self.report.unstarted > 0
            || !self.extraction_failures.is_empty()
            || self.rejected.len() > self.already_downloaded()
    }
}

/// Runs the whole pipeline over `links`.
///
/// # Errors
///
/// Returns [`PipelineError`] only for run-wide failures: client or session
/// setup, a missing browser, an invalid download limit. Per-link problems
/// end up in the returned [`PipelineSummary`].
#[instrument(skip_all, fields(links = links.len(), extractor = %config.extractor))]
pub async fn run(
    config: &RunConfig,
    links: &[String],
    progress: Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<PipelineSummary, PipelineError> {
    let orchestrator = DownloadOrchestrator::new(config.max_concurrent_downloads)
        .map_err(PipelineError::Engine)?;
    let resolver = VideoResolver::new(config.layout(), config.proxy.as_deref())?;

    let populated = populate_queue(&resolver, links).await;
    let mut summary = PipelineSummary {
        rejected: populated.rejected,
        ..PipelineSummary::default()
    };
    let mut queue = populated.queue;

    if queue.is_empty() {
        info!("nothing to download");
        return Ok(summary);
    }
    if cancel.is_cancelled() {
        summary.cancelled = true;
        summary.report = DownloadReport::from_queue(&queue);
        return Ok(summary);
    }

    let session = Session::open(config.extractor.session_kind(), config.proxy.as_deref()).await?;
    session
        .scoped(async |session: &Session| {
            run_with_session(
                config,
                session,
                &mut queue,
                &mut summary,
                &orchestrator,
                progress,
                cancel,
            )
            .await
        })
        .await?;

    Ok(summary)
}

async fn run_with_session(
    config: &RunConfig,
    session: &Session,
    queue: &mut Queue,
    summary: &mut PipelineSummary,
    orchestrator: &DownloadOrchestrator,
    progress: Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let mut extractor = build_extractor(&config.extractor_settings(), session, config.layout())?;

    if let Err(error) = extractor.initialize().await {
        error!("{error}");
        extractor.cleanup().await;
        return Err(error.into());
    }

    let extracted = extract_all(&*extractor, queue, summary, cancel).await;
    extractor.cleanup().await;
    if !extracted {
        return Ok(());
    }

    if queue.is_empty() {
        warn!("no download links were retrieved");
        return Ok(());
    }

    match orchestrator.run(queue, session, progress, cancel).await {
        Ok(report) => summary.report = report,
        Err(EngineError::Cancelled { report }) => {
            summary.report = report;
            summary.cancelled = true;
        }
        Err(error) => return Err(PipelineError::Engine(error)),
    }
    Ok(())
}

/// Replaces the queue contents with the successfully extracted videos.
///
/// Returns false when the run was cancelled mid-extraction; the summary then
/// counts every queued video as unstarted.
async fn extract_all(
    extractor: &dyn Extractor,
    queue: &mut Queue,
    summary: &mut PipelineSummary,
    cancel: &CancellationToken,
) -> bool {
    let pending = queue.len();
    info!(videos = pending, extractor = extractor.name(), "extracting download links");

    let batch = queue.take_all();
    let outcomes = tokio::select! {
        outcomes = extractor.process_batch(batch) => outcomes,
        () = cancel.cancelled() => {
            warn!("cancelled during extraction");
            summary.cancelled = true;
            summary.report = DownloadReport {
                unstarted: pending,
                ..DownloadReport::default()
            };
            return false;
        }
    };

    let (extracted, failed) = split_outcomes(outcomes);
    for failure in &failed {
        warn!(video_id = failure.video.id(), "extraction failed: {}", failure.error);
    }
    info!(extracted = extracted.len(), failed = failed.len(), "extraction finished");
    summary.extraction_failures = failed;
    queue.replace(extracted);
    true
}
