//! Moving one media body from the network to disk.
//!
//! The async session streams the body with `bytes_stream()`; the blocking
//! session reads fixed-size chunks on the blocking pool. Both write through a
//! buffered writer, report every chunk to the progress sink, and stop at the
//! next chunk boundary once the run is cancelled.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::constants::{CANCEL_GRACE, CHUNK_SIZE};
use super::{DownloadError, ProgressSink};
use crate::session::Session;
use crate::video::Video;

/// What to fetch and where to put it.
#[derive(Debug, Clone)]
pub(crate) struct TransferJob {
    pub video_id: u64,
    pub url: String,
    pub path: PathBuf,
}

impl TransferJob {
    /// Builds the job for an extracted video.
    pub(crate) fn for_video(video: &Video) -> Result<Self, DownloadError> {
        let missing = |missing| DownloadError::MissingTarget {
            video_id: video.id(),
            missing,
        };
        Ok(Self {
            video_id: video.id(),
            url: video
                .download_address()
                .ok_or_else(|| missing("download address"))?
                .to_string(),
            path: video
                .output_path()
                .ok_or_else(|| missing("output path"))?
                .to_path_buf(),
        })
    }
}

/// How a transfer ended when no error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferOutcome {
    /// 2xx response, body fully written.
    Completed { bytes: u64 },
    /// Non-2xx response; nothing was written.
    Rejected { status: u16 },
}

/// Runs `job` over `session`.
pub(crate) async fn transfer(
    session: &Session,
    job: TransferJob,
    progress: &Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<TransferOutcome, DownloadError> {
    match session {
        Session::Async(client) => transfer_async(client, &job, progress.as_ref(), cancel).await,
        Session::Blocking(client) => {
            let client = client.clone();
            let progress = Arc::clone(progress);
            let token = cancel.clone();
            let mut handle = tokio::task::spawn_blocking(move || {
                transfer_blocking(&client, &job, progress.as_ref(), &token)
            });

            tokio::select! {
                joined = &mut handle => joined?,
                () = cancel.cancelled() => {
                    // The worker checks the token between chunks and drops its file.
                    if tokio::time::timeout(CANCEL_GRACE, handle).await.is_err() {
                        debug!("blocking transfer did not stop within grace period");
                    }
                    Err(DownloadError::Cancelled)
                }
            }
        }
    }
}

async fn transfer_async(
    client: &reqwest::Client,
    job: &TransferJob,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<TransferOutcome, DownloadError> {
    let response = tokio::select! {
        () = cancel.cancelled() => return Err(DownloadError::Cancelled),
        sent = client.get(&job.url).send() => sent.map_err(|e| DownloadError::network(&job.url, e))?,
    };

    let status = response.status();
    if !status.is_success() {
        return Ok(TransferOutcome::Rejected {
            status: status.as_u16(),
        });
    }

    let file = File::create(&job.path)
        .await
        .map_err(|e| DownloadError::io(&job.path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| DownloadError::network(&job.url, e))?;

        for piece in chunk.chunks(CHUNK_SIZE) {
            writer
                .write_all(piece)
                .await
                .map_err(|e| DownloadError::io(&job.path, e))?;
            written += piece.len() as u64;
            progress.advanced(job.video_id, piece.len() as u64);
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(&job.path, e))?;

    Ok(TransferOutcome::Completed { bytes: written })
}

fn transfer_blocking(
    client: &reqwest::blocking::Client,
    job: &TransferJob,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<TransferOutcome, DownloadError> {
    let mut response = client
        .get(&job.url)
        .send()
        .map_err(|e| DownloadError::network(&job.url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Ok(TransferOutcome::Rejected {
            status: status.as_u16(),
        });
    }

    let file = std::fs::File::create(&job.path).map_err(|e| DownloadError::io(&job.path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut written: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let read = response
            .read(&mut buffer)
            .map_err(|e| DownloadError::io(&job.path, e))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .map_err(|e| DownloadError::io(&job.path, e))?;
        written += read as u64;
        progress.advanced(job.video_id, read as u64);
    }

    writer.flush().map_err(|e| DownloadError::io(&job.path, e))?;
    Ok(TransferOutcome::Completed { bytes: written })
}
