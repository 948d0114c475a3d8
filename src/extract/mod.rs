//! Extraction: turning a queued video into a downloadable media address.
//!
//! Two strategies implement [`Extractor`]:
//!
//! - [`DirectExtractor`] reads the data embedded in the video's watch page
//!   (blocking session).
//! - [`BrowserExtractor`] drives a real browser through a third-party resolver
//!   page (async session).
//!
//! The strategy is chosen once per run from [`ExtractorKind`]. Both follow the
//! same lifecycle: `initialize`, one `process_batch`, `cleanup`.
//!
//! # Batch results
//!
//! `process_batch` returns one outcome per input, in input order. A failure is
//! captured in its slot and never prevents other items from completing.
//!
//! # Design Note
//!
//! `async_trait` is used because Rust 2024 native async trait methods are not
//! object-safe, and the pipeline holds the chosen strategy as `Box<dyn Extractor>`.

pub mod browser;
mod delay_gate;
mod direct;
mod error;
pub mod page_data;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

pub use browser::{BrowserDriver, BrowserExtractor, Locator, WebDriverBrowser};
pub use delay_gate::DelayGate;
pub use direct::{DirectExtractor, MAX_CONCURRENT_EXTRACTIONS};
pub use error::ExtractError;

use crate::resolver::OutputLayout;
use crate::session::{Session, SessionKind};
use crate::video::{Video, format_size};

/// A video whose extraction failed, with the reason.
#[derive(Debug)]
pub struct ExtractFailure {
    pub video: Video,
    pub error: ExtractError,
}

/// Result slot for one video in a batch.
pub type ExtractOutcome = Result<Video, ExtractFailure>;

/// Strategy for resolving media addresses.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Acquires any resources the strategy needs (e.g. launches a browser).
    ///
    /// # Errors
    ///
    /// Fatal errors such as [`ExtractError::MissingRuntimeDependency`].
    async fn initialize(&mut self) -> Result<(), ExtractError>;

    /// Extracts every video, returning outcomes positionally aligned with the input.
    async fn process_batch(&self, videos: Vec<Video>) -> Vec<ExtractOutcome>;

    /// Releases resources acquired by `initialize`. Safe to call after a
    /// failed or skipped `initialize`.
    async fn cleanup(&mut self);
}

/// Which extraction strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorKind {
    /// Browser automation against the tikwm resolver page.
    #[default]
    Tikwm,
    /// Direct watch-page parsing.
    Direct,
}

impl ExtractorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tikwm => "tikwm",
            Self::Direct => "direct",
        }
    }

    /// Session flavour this strategy runs with.
    #[must_use]
    pub fn session_kind(&self) -> SessionKind {
        match self {
            Self::Tikwm => SessionKind::Async,
            Self::Direct => SessionKind::Blocking,
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tikwm" => Ok(Self::Tikwm),
            "direct" => Ok(Self::Direct),
            other => Err(format!(
                "unknown extractor '{other}'. Expected one of: tikwm, direct"
            )),
        }
    }
}

/// Settings for constructing an extractor.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub kind: ExtractorKind,
    /// Pause between consecutive extraction starts.
    pub delay: Duration,
    /// Persistent browser profile directory (browser strategy only).
    pub browser_profile_dir: PathBuf,
}

/// Builds the configured strategy bound to `session`.
///
/// # Errors
///
/// [`ExtractError::SessionMismatch`] if the session flavour does not match
/// the strategy.
pub fn build_extractor(
    settings: &ExtractorSettings,
    session: &Session,
    layout: OutputLayout,
) -> Result<Box<dyn Extractor>, ExtractError> {
    let gate = DelayGate::new(settings.delay);
    match (settings.kind, session) {
        (ExtractorKind::Direct, Session::Blocking(client)) => Ok(Box::new(DirectExtractor::new(
            client.clone(),
            layout,
            gate,
        ))),
        (ExtractorKind::Tikwm, Session::Async(client)) => {
            let driver = WebDriverBrowser::new(settings.browser_profile_dir.clone());
            Ok(Box::new(BrowserExtractor::new(
                driver,
                client.clone(),
                layout,
                gate,
            )))
        }
        (kind, _) => Err(ExtractError::SessionMismatch {
            extractor: kind.as_str(),
            expected: kind.session_kind().as_str(),
        }),
    }
}

/// Splits batch outcomes into successes and failures, keeping order.
#[must_use]
pub fn split_outcomes(outcomes: Vec<ExtractOutcome>) -> (Vec<Video>, Vec<ExtractFailure>) {
    let mut extracted = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(video) => extracted.push(video),
            Err(failure) => failed.push(failure),
        }
    }
    (extracted, failed)
}

/// Records extraction results on `video`.
///
/// If the username was unknown until now, it is set and the output path is
/// assigned.
pub(crate) async fn finish_extraction(
    video: &mut Video,
    layout: &OutputLayout,
    username: &str,
    address: String,
    byte_size: u64,
) -> Result<(), ExtractError> {
    if video.username().is_none() {
        video.set_username(username)?;
        layout.assign(video).await?;
    }
    video.set_media(address, byte_size)?;

    info!(
        video_id = video.id(),
        username = video.username().unwrap_or_default(),
        size = %format_size(byte_size),
        "download link retrieved"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::DuplicateCheck;
    use crate::video::VideoError;
    use tempfile::TempDir;

    const ID: u64 = 7_123_456_789_012_345_678;

    #[test]
    fn test_extractor_kind_parse() {
        assert_eq!("tikwm".parse::<ExtractorKind>().unwrap(), ExtractorKind::Tikwm);
        assert_eq!(" Direct ".parse::<ExtractorKind>().unwrap(), ExtractorKind::Direct);
        assert!("ytdl".parse::<ExtractorKind>().is_err());
        assert_eq!(ExtractorKind::default(), ExtractorKind::Tikwm);
    }

    #[test]
    fn test_extractor_kind_session_pairing() {
        assert_eq!(ExtractorKind::Tikwm.session_kind(), SessionKind::Async);
        assert_eq!(ExtractorKind::Direct.session_kind(), SessionKind::Blocking);
    }

    #[test]
    fn test_split_outcomes_keeps_order() {
        let outcomes = vec![
            Ok(Video::new("1", 1)),
            Err(ExtractFailure {
                video: Video::new("2", 2),
                error: ExtractError::HrefMissing,
            }),
            Ok(Video::new("3", 3)),
        ];
        let (extracted, failed) = split_outcomes(outcomes);
        assert_eq!(extracted.iter().map(Video::id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].video.id(), 2);
    }

    #[tokio::test]
    async fn test_finish_extraction_assigns_path_for_new_username() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), None, DuplicateCheck::Strict);
        let mut video = Video::new(ID.to_string(), ID);

        finish_extraction(&mut video, &layout, "@dave", "https://cdn/v".into(), 10)
            .await
            .unwrap();

        assert_eq!(video.username(), Some("dave"));
        assert!(video.output_path().unwrap().starts_with(tmp.path().join("dave")));
        assert_eq!(video.download_address(), Some("https://cdn/v"));
        assert_eq!(video.byte_size(), 10);
    }

    #[tokio::test]
    async fn test_finish_extraction_rejects_path_like_username() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("out");
        let layout = OutputLayout::new(&root, None, DuplicateCheck::Lazy);

        for name in ["..", "nested/name", "back\\slash"] {
            let mut video = Video::new(ID.to_string(), ID);
            let err = finish_extraction(&mut video, &layout, name, "https://cdn/v".into(), 1)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ExtractError::Video(VideoError::InvalidUsername { .. })),
                "{name:?}: {err}"
            );
            assert!(video.output_path().is_none());
            assert!(video.download_address().is_none());
        }
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_finish_extraction_keeps_known_username() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), None, DuplicateCheck::Strict);
        let mut video = Video::new(ID.to_string(), ID);
        video.set_username("erin").unwrap();
        layout.assign(&mut video).await.unwrap();

        finish_extraction(&mut video, &layout, "someone-else", "https://cdn/v".into(), 1)
            .await
            .unwrap();

        assert_eq!(video.username(), Some("erin"));
        assert!(video.output_path().unwrap().starts_with(tmp.path().join("erin")));
    }

    #[tokio::test]
    async fn test_build_extractor_rejects_session_mismatch() {
        let tmp = TempDir::new().unwrap();
        let session = Session::open(SessionKind::Async, None).await.unwrap();
        let settings = ExtractorSettings {
            kind: ExtractorKind::Direct,
            delay: Duration::ZERO,
            browser_profile_dir: tmp.path().to_path_buf(),
        };
        let layout = OutputLayout::new(tmp.path(), None, DuplicateCheck::Lazy);

        let result = build_extractor(&settings, &session, layout);
        assert!(matches!(
            result,
            Err(ExtractError::SessionMismatch { extractor: "direct", expected: "blocking" })
        ));
        session.close().await;
    }
}
