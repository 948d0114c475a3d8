//! Tikfetch Core Library
//!
//! Batch downloader for short-form videos. Raw links go in; watermark-free
//! video files come out, one folder per uploader.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`video`] - The `Video` record, identity decoding, filename templates
//! - [`resolver`] - Link normalization, duplicate checks, output paths
//! - [`queue`] - Insertion-ordered collection of videos
//! - [`session`] - The shared HTTP session, async or blocking
//! - [`extract`] - Media address extraction strategies
//! - [`download`] - Concurrent download orchestration and cleanup
//! - [`config`] - Config file loading and validation
//! - [`pipeline`] - The full resolve, extract, download run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod extract;
pub mod http_client;
pub mod links;
mod patterns;
pub mod pipeline;
pub mod queue;
pub mod resolver;
pub mod session;
mod user_agent;
pub mod video;

// Re-export commonly used types
pub use config::{ConfigError, LoadedConfig, RunConfig, Settings, load_default_config};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadOrchestrator, DownloadReport, EngineError, NoProgress,
    ProgressSink,
};
pub use extract::{ExtractError, Extractor, ExtractorKind};
pub use links::collect_links;
pub use pipeline::{PipelineError, PipelineSummary};
pub use queue::Queue;
pub use resolver::{DuplicateCheck, OutputLayout, ResolveError, VideoResolver, populate_queue};
pub use session::{Session, SessionKind};
pub use video::{FilenameTemplate, Video, VideoStatus, format_size};
