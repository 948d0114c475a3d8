//! Download stage: streaming extracted videos to disk.
//!
//! # Features
//!
//! - Semaphore-bounded concurrency (1-16, default 4)
//! - Works over either session flavour; blocking transfers are offloaded
//! - Per-chunk progress reporting through [`ProgressSink`]
//! - Cooperative cancellation with guaranteed cleanup of partial files
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tikfetch_core::download::{DownloadOrchestrator, NoProgress};
//! use tikfetch_core::queue::Queue;
//! use tikfetch_core::session::{Session, SessionKind};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(mut queue: Queue) -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::open(SessionKind::Async, None).await?;
//! let orchestrator = DownloadOrchestrator::new(4)?;
//! let report = orchestrator
//!     .run(&mut queue, &session, Arc::new(NoProgress), &CancellationToken::new())
//!     .await;
//! session.close().await;
//! println!("{}", report?);
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod engine;
mod error;
mod progress;
mod transport;

pub use constants::{CHUNK_SIZE, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use engine::{DownloadOrchestrator, DownloadReport, cleanup_interrupted};
pub use error::{DownloadError, EngineError};
pub use progress::{NoProgress, ProgressSink};
