//! Link resolution: from raw user input to a queued [`Video`].
//!
//! Resolution runs these steps for each link:
//!
//! 1. Classify the link (full, short, bare identity); reject anything else.
//! 2. Follow short links to their full form.
//! 3. Extract the numeric identity from the normalized link.
//! 4. Under strict duplicate checking, scan the output tree for the identity.
//! 5. If the original link carries the username, assign the output path now.
//!
//! Links whose username is unknown (short links, bare identities) get their
//! output path once extraction discovers the username.

mod error;
mod layout;

pub use error::ResolveError;
pub use layout::{DuplicateCheck, OutputLayout};

use tracing::{debug, info, instrument, warn};

use crate::http_client::build_redirect_client;
use crate::queue::Queue;
use crate::video::{LinkKind, Video, classify_link, extract_username, extract_video_id};

/// Resolves raw links into videos.
#[derive(Debug, Clone)]
pub struct VideoResolver {
    client: reqwest::Client,
    layout: OutputLayout,
}

impl VideoResolver {
    /// Creates a resolver writing into `layout`, following short links through
    /// `proxy` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] when the redirect client cannot be built.
    pub fn new(layout: OutputLayout, proxy: Option<&str>) -> Result<Self, ResolveError> {
        let client = build_redirect_client(proxy).map_err(ResolveError::Client)?;
        Ok(Self { client, layout })
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Returns the normalized form of `link`.
    ///
    /// Full links and bare identities are returned unchanged; short links are
    /// followed to their final location.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidReference`] for unrecognized input,
    /// [`ResolveError::Redirect`] when following a short link fails.
    pub async fn normalize(&self, link: &str) -> Result<String, ResolveError> {
        let link = link.trim();
        match classify_link(link) {
            Some(LinkKind::Full | LinkKind::BareId) => Ok(link.to_string()),
            Some(LinkKind::Short) => {
                let with_scheme = if link.starts_with("http://") || link.starts_with("https://") {
                    link.to_string()
                } else {
                    format!("https://{link}")
                };
                self.follow_redirects(&with_scheme).await
            }
            None => Err(ResolveError::invalid_reference(link)),
        }
    }

    /// Follows redirects from `url` and returns the final location.
    #[instrument(skip(self))]
    pub(crate) async fn follow_redirects(&self, url: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::redirect(url, e))?;
        let final_url = response.url().to_string();
        debug!(final_url = %final_url, status = response.status().as_u16(), "short link followed");
        Ok(final_url)
    }

    /// Resolves one raw link into a video.
    ///
    /// # Errors
    ///
    /// Any [`ResolveError`]; the link should be skipped.
    #[instrument(skip(self))]
    pub async fn resolve(&self, link: &str) -> Result<Video, ResolveError> {
        let normalized = self.normalize(link).await?;
        let id = extract_video_id(&normalized)
            .ok_or_else(|| ResolveError::identity_extraction(&normalized))?;

        self.layout.check_duplicate(id).await?;

        let mut video = Video::new(normalized, id);
        if let Some(username) = extract_username(link) {
            video.set_username(&username)?;
            self.layout.assign(&mut video).await?;
        }

        debug!(video_id = id, username = ?video.username(), "link resolved");
        Ok(video)
    }
}

/// A link that did not make it into the queue.
#[derive(Debug)]
pub struct RejectedLink {
    pub link: String,
    pub error: ResolveError,
}

/// Outcome of [`populate_queue`].
#[derive(Debug, Default)]
pub struct PopulateReport {
    pub queue: Queue,
    pub rejected: Vec<RejectedLink>,
}

impl PopulateReport {
    /// Links rejected because they were downloaded before.
    #[must_use]
    pub fn already_downloaded(&self) -> usize {
        self.rejected
            .iter()
            .filter(|r| r.error.is_already_downloaded())
            .count()
    }
}

/// Resolves every link in order, queueing the successes.
///
/// Failures are logged and collected; they never abort the batch. Two links
/// resolving to the same identity are queued once.
#[instrument(skip_all, fields(links = links.len()))]
pub async fn populate_queue(resolver: &VideoResolver, links: &[String]) -> PopulateReport {
    let mut report = PopulateReport::default();

    for link in links {
        match resolver.resolve(link).await {
            Ok(video) => {
                let id = video.id();
                if !report.queue.enqueue(video) {
                    debug!(video_id = id, link = %link, "duplicate link in input; skipped");
                }
            }
            Err(error) => {
                if error.is_already_downloaded() {
                    info!(link = %link, "{error}; skipping");
                } else {
                    warn!(link = %link, "skipping link: {error}");
                }
                report.rejected.push(RejectedLink {
                    link: link.clone(),
                    error,
                });
            }
        }
    }

    info!(
        queued = report.queue.len(),
        rejected = report.rejected.len(),
        "links resolved"
    );
    report
}
