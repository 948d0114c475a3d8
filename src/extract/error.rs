//! Error types for link extraction.

use thiserror::Error;

use crate::resolver::ResolveError;
use crate::video::VideoError;

/// Errors that fail extraction for a single video, or the whole extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The watch page has no embedded data block.
    #[error("embedded page data not found at {url}")]
    SourceDataMissing {
        /// Page that was fetched.
        url: String,
    },

    /// The embedded data block is not valid JSON.
    #[error("embedded page data at {url} is not valid JSON: {source}")]
    MalformedSourceData {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The embedded data no longer has the expected shape.
    #[error("page data structure has changed; cannot find {what}. Failed at {path}")]
    StructureMismatch {
        /// What was being looked up.
        what: &'static str,
        /// Key path up to and including the key that failed, joined by `" -> "`.
        path: String,
    },

    /// The page data lists no downloadable variants.
    #[error("page data lists no download variants")]
    NoVariants,

    /// The resolver page reported that it could not handle the link.
    #[error("resolver page could not parse the link: {reason}")]
    UrlParsingFailure { reason: String },

    /// A required page element is absent.
    #[error("page element not found: {selector}")]
    ElementMissing { selector: String },

    /// The download link element has no target.
    #[error("download link element has no href")]
    HrefMissing,

    /// No expected page state appeared in time.
    #[error("timed out after {seconds}s waiting for the resolver page")]
    Timeout { seconds: u64 },

    /// A required external program is not installed.
    #[error(
        "required dependency not found: {dependency}\n  Suggestion: install {dependency} and make sure it is on PATH"
    )]
    MissingRuntimeDependency { dependency: String },

    /// The browser automation backend failed.
    #[error("browser automation error: {message}")]
    Browser { message: String },

    /// The extractor cannot run with the given session.
    #[error("{extractor} extractor requires a {expected} session")]
    SessionMismatch {
        extractor: &'static str,
        expected: &'static str,
    },

    /// Network-level failure talking to a page or media host.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success response from a page or media host.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Output path assignment failed after the username was discovered.
    #[error(transparent)]
    Output(#[from] ResolveError),

    #[error(transparent)]
    Video(#[from] VideoError),

    /// The extractor's concurrency slots were closed.
    #[error("extractor was shut down")]
    Shutdown,

    /// A worker task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExtractError {
    /// Creates a structure-mismatch error for `keys[..=failed_at]`.
    pub fn structure_mismatch(what: &'static str, keys: &[&str], failed_at: usize) -> Self {
        let end = (failed_at + 1).min(keys.len());
        Self::StructureMismatch {
            what,
            path: keys[..end].join(" -> "),
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a browser backend error.
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser {
            message: message.into(),
        }
    }

    /// Creates an element-missing error.
    pub fn element_missing(selector: impl Into<String>) -> Self {
        Self::ElementMissing {
            selector: selector.into(),
        }
    }

    /// True when the whole extractor cannot run, not just one item.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingRuntimeDependency { .. } | Self::SessionMismatch { .. }
        )
    }
}
