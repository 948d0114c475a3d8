//! Extraction straight from the video site's watch page.
//!
//! Each video's page is fetched with the run's blocking session (offloaded to
//! the blocking pool), the embedded data block is parsed, and the best media
//! variant is chosen. Concurrency is capped by a semaphore and request starts
//! are paced by the shared [`DelayGate`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use super::page_data::{self, MediaDetails};
use super::{DelayGate, ExtractError, ExtractFailure, ExtractOutcome, Extractor, finish_extraction};
use crate::resolver::OutputLayout;
use crate::video::{Video, is_bare_id};

/// Maximum number of page fetches in flight at once.
pub const MAX_CONCURRENT_EXTRACTIONS: usize = 5;

const WATCH_PAGE_TEMPLATE: &str = "https://m.tiktok.com/v/{id}.html";

/// Extractor reading the embedded page data.
#[derive(Debug)]
pub struct DirectExtractor {
    client: reqwest::blocking::Client,
    layout: OutputLayout,
    gate: DelayGate,
    slots: Arc<Semaphore>,
}

impl DirectExtractor {
    /// Creates an extractor using `client` (a blocking session client).
    #[must_use]
    pub fn new(client: reqwest::blocking::Client, layout: OutputLayout, gate: DelayGate) -> Self {
        Self {
            client,
            layout,
            gate,
            slots: Arc::new(Semaphore::new(MAX_CONCURRENT_EXTRACTIONS)),
        }
    }

    /// Page to fetch for a normalized link.
    #[must_use]
    pub fn page_url(link: &str) -> String {
        if is_bare_id(link) {
            WATCH_PAGE_TEMPLATE.replace("{id}", link)
        } else {
            link.to_string()
        }
    }

    #[instrument(skip(self, video), fields(video_id = video.id()))]
    async fn extract_one(&self, mut video: Video) -> ExtractOutcome {
        match self.extract_into(&mut video).await {
            Ok(()) => Ok(video),
            Err(error) => {
                warn!(video_id = video.id(), "skipping video: {error}");
                Err(ExtractFailure { video, error })
            }
        }
    }

    async fn extract_into(&self, video: &mut Video) -> Result<(), ExtractError> {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| ExtractError::Shutdown)?;
        self.gate.acquire().await;

        let url = Self::page_url(video.link());
        let data = self.fetch_page_data(url).await?;

        let variants = page_data::download_variants(&data)?;
        let best = page_data::best_variant(variants).ok_or(ExtractError::NoVariants)?;
        let MediaDetails { address, byte_size } = page_data::media_details(best)?;
        let username = page_data::username(&data)?;

        finish_extraction(video, &self.layout, &username, address, byte_size).await
    }

    async fn fetch_page_data(&self, url: String) -> Result<Value, ExtractError> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || {
            debug!(url = %url, "fetching watch page");
            let response = client
                .get(&url)
                .send()
                .map_err(|e| ExtractError::network(&url, e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ExtractError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }
            let html = response.text().map_err(|e| ExtractError::network(&url, e))?;
            page_data::parse_embedded_data(&html, &url)
        })
        .await?
    }
}

#[async_trait]
impl Extractor for DirectExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn initialize(&mut self) -> Result<(), ExtractError> {
        Ok(())
    }

    #[instrument(skip_all, fields(extractor = "direct", videos = videos.len()))]
    async fn process_batch(&self, videos: Vec<Video>) -> Vec<ExtractOutcome> {
        join_all(videos.into_iter().map(|video| self.extract_one(video))).await
    }

    async fn cleanup(&mut self) {
        debug!("direct extractor has nothing to release");
    }
}
