//! Extraction through a third-party resolver page driven by a real browser.
//!
//! For each video the resolver page is opened, the link is submitted, and the
//! page is polled until it shows the watermark-free download link or an error
//! banner. The page is shared by all items, so interactions are serialized;
//! the file size is then probed over the run's async session.

mod webdriver;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

pub use webdriver::WebDriverBrowser;

use super::{DelayGate, ExtractError, ExtractFailure, ExtractOutcome, Extractor, finish_extraction};
use crate::resolver::OutputLayout;
use crate::video::Video;

/// Resolver page the browser drives.
pub const RESOLVER_PAGE_URL: &str = "https://www.tikwm.com/originalDownloader.html";

/// How long to wait for the resolver page to show a result.
pub const RESULT_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Position of the username among the page's `h4` headings.
const USERNAME_HEADING_INDEX: usize = 2;

/// How to find an element on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl Locator {
    /// W3C WebDriver location strategy name.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css selector",
            Self::XPath(_) => "xpath",
        }
    }

    #[must_use]
    pub fn value(&self) -> &'static str {
        match self {
            Self::Css(v) | Self::XPath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Elements of the resolver page.
pub mod selectors {
    use super::Locator;

    pub const LINK_INPUT: Locator = Locator::Css("input#params");
    pub const SUBMIT_BUTTON: Locator =
        Locator::XPath("//button[contains(normalize-space(.), 'Submit')]");
    pub const DOWNLOAD_LINK: Locator = Locator::XPath("//a[contains(., 'Watermark')]");
    pub const PARSE_ERROR: Locator =
        Locator::XPath("//div[contains(., 'Url parsing is failed!')]");
    /// Innermost `div` whose rendered text mentions an error. Script and
    /// style text is ignored.
    pub const GENERAL_ERROR: Locator = Locator::XPath(
        "//div[not(descendant::div)][descendant::text()[not(ancestor::script or ancestor::style)]\
         [contains(translate(., 'ERROR', 'error'), 'error')]]",
    );
    pub const HEADINGS: Locator = Locator::Css("h4");
}

/// Minimal page automation surface.
///
/// Element-level calls fail with [`ExtractError::ElementMissing`] when the
/// locator matches nothing.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Starts the browser.
    ///
    /// # Errors
    ///
    /// [`ExtractError::MissingRuntimeDependency`] when the browser or its
    /// driver is not installed.
    async fn launch(&mut self) -> Result<(), ExtractError>;

    async fn open(&self, url: &str) -> Result<(), ExtractError>;

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), ExtractError>;

    async fn click(&self, locator: &Locator) -> Result<(), ExtractError>;

    /// True if the first match exists and is displayed.
    async fn is_visible(&self, locator: &Locator) -> Result<bool, ExtractError>;

    /// Attribute of the first match; `None` if the attribute is absent.
    async fn attribute(&self, locator: &Locator, name: &str)
    -> Result<Option<String>, ExtractError>;

    /// Visible text of every match, in document order.
    async fn texts(&self, locator: &Locator) -> Result<Vec<String>, ExtractError>;

    /// Shuts the browser down. Safe to call when `launch` failed or never ran.
    async fn close(&mut self);
}

/// Page state the resolver settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageResult {
    DownloadLink,
    ParseError,
    GeneralError,
}

/// Extractor driving the resolver page.
#[derive(Debug)]
pub struct BrowserExtractor<D> {
    driver: D,
    page: Mutex<()>,
    client: reqwest::Client,
    layout: OutputLayout,
    gate: DelayGate,
    result_timeout: Duration,
}

impl<D: BrowserDriver> BrowserExtractor<D> {
    #[must_use]
    pub fn new(driver: D, client: reqwest::Client, layout: OutputLayout, gate: DelayGate) -> Self {
        Self {
            driver,
            page: Mutex::new(()),
            client,
            layout,
            gate,
            result_timeout: RESULT_TIMEOUT,
        }
    }

    /// Overrides how long to wait for a result.
    #[must_use]
    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = timeout;
        self
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
        self.gate.acquire().await;

        let (address, username) = {
            let _page = self.page.lock().await;
            self.submit(video.link()).await?
        };

        let byte_size = self.probe_size(&address).await?;
        finish_extraction(video, &self.layout, &username, address, byte_size).await
    }

    /// Submits `link` on the resolver page and reads back the download
    /// address and username.
    async fn submit(&self, link: &str) -> Result<(String, String), ExtractError> {
        self.driver.open(RESOLVER_PAGE_URL).await?;
        self.driver.fill(&selectors::LINK_INPUT, link).await?;
        self.driver.click(&selectors::SUBMIT_BUTTON).await?;

        match self.wait_for_result().await? {
            PageResult::ParseError => {
                return Err(ExtractError::UrlParsingFailure {
                    reason: "Url parsing is failed!".to_string(),
                });
            }
            PageResult::GeneralError => {
                return Err(ExtractError::UrlParsingFailure {
                    reason: "resolver page reported an error".to_string(),
                });
            }
            PageResult::DownloadLink => {}
        }

        let address = self
            .driver
            .attribute(&selectors::DOWNLOAD_LINK, "href")
            .await?
            .filter(|href| !href.trim().is_empty())
            .ok_or(ExtractError::HrefMissing)?;

        let username = self
            .driver
            .texts(&selectors::HEADINGS)
            .await?
            .into_iter()
            .nth(USERNAME_HEADING_INDEX)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ExtractError::element_missing(format!(
                    "{} #{}",
                    selectors::HEADINGS,
                    USERNAME_HEADING_INDEX + 1
                ))
            })?;

        debug!(address = %address, username = %username, "resolver page returned a link");
        Ok((address, username))
    }

    /// Polls until one of the result states is visible. Error banners take
    /// precedence over the download link.
    async fn wait_for_result(&self) -> Result<PageResult, ExtractError> {
        let deadline = Instant::now() + self.result_timeout;
        loop {
            if self.driver.is_visible(&selectors::PARSE_ERROR).await? {
                return Ok(PageResult::ParseError);
            }
            if self.driver.is_visible(&selectors::GENERAL_ERROR).await? {
                return Ok(PageResult::GeneralError);
            }
            if self.driver.is_visible(&selectors::DOWNLOAD_LINK).await? {
                return Ok(PageResult::DownloadLink);
            }
            if Instant::now() >= deadline {
                return Err(ExtractError::Timeout {
                    seconds: self.result_timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Reads the media size from the `Content-Length` of a GET, without
    /// consuming the body. A missing header counts as zero.
    async fn probe_size(&self, address: &str) -> Result<u64, ExtractError> {
        let response = self
            .client
            .get(address)
            .send()
            .await
            .map_err(|e| ExtractError::network(address, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::HttpStatus {
                url: address.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.content_length().unwrap_or(0))
    }
}

#[async_trait]
impl<D: BrowserDriver> Extractor for BrowserExtractor<D> {
    fn name(&self) -> &'static str {
        "tikwm"
    }

    async fn initialize(&mut self) -> Result<(), ExtractError> {
        self.driver.launch().await
    }

    #[instrument(skip_all, fields(extractor = "tikwm", videos = videos.len()))]
    async fn process_batch(&self, videos: Vec<Video>) -> Vec<ExtractOutcome> {
        join_all(videos.into_iter().map(|video| self.extract_one(video))).await
    }

    async fn cleanup(&mut self) {
        self.driver.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::DuplicateCheck;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Scripted page: which result is visible and what the link/headings hold.
    #[derive(Debug, Default)]
    struct FakePage {
        visible: Vec<Locator>,
        href: Option<String>,
        headings: Vec<String>,
        missing_input: bool,
        launched: AtomicUsize,
        closed: AtomicUsize,
        submissions: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BrowserDriver for FakePage {
        async fn launch(&mut self) -> Result<(), ExtractError> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn open(&self, url: &str) -> Result<(), ExtractError> {
            assert_eq!(url, RESOLVER_PAGE_URL);
            Ok(())
        }

        async fn fill(&self, locator: &Locator, text: &str) -> Result<(), ExtractError> {
            if self.missing_input {
                return Err(ExtractError::element_missing(locator.to_string()));
            }
            self.submissions.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn click(&self, _locator: &Locator) -> Result<(), ExtractError> {
            Ok(())
        }

        async fn is_visible(&self, locator: &Locator) -> Result<bool, ExtractError> {
            Ok(self.visible.contains(locator))
        }

        async fn attribute(
            &self,
            locator: &Locator,
            _name: &str,
        ) -> Result<Option<String>, ExtractError> {
            if self.visible.contains(locator) {
                Ok(self.href.clone())
            } else {
                Err(ExtractError::element_missing(locator.to_string()))
            }
        }

        async fn texts(&self, _locator: &Locator) -> Result<Vec<String>, ExtractError> {
            Ok(self.headings.clone())
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn extractor(page: FakePage, root: &std::path::Path) -> BrowserExtractor<FakePage> {
        BrowserExtractor::new(
            page,
            reqwest::Client::new(),
            OutputLayout::new(root, None, DuplicateCheck::Lazy),
            DelayGate::disabled(),
        )
        .with_result_timeout(Duration::from_millis(600))
    }

    fn video() -> Video {
        Video::new("7123456789012345678", 7_123_456_789_012_345_678)
    }

    #[tokio::test]
    async fn test_parse_error_banner_fails_item() {
        let tmp = TempDir::new().unwrap();
        let page = FakePage {
            visible: vec![selectors::PARSE_ERROR, selectors::DOWNLOAD_LINK],
            ..FakePage::default()
        };
        let outcomes = extractor(page, tmp.path()).process_batch(vec![video()]).await;

        match &outcomes[0] {
            Err(ExtractFailure { error, video }) => {
                assert!(matches!(error, ExtractError::UrlParsingFailure { .. }));
                assert_eq!(video.id(), 7_123_456_789_012_345_678);
            }
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_general_error_banner_fails_item() {
        let tmp = TempDir::new().unwrap();
        let page = FakePage {
            visible: vec![selectors::GENERAL_ERROR],
            ..FakePage::default()
        };
        let outcomes = extractor(page, tmp.path()).process_batch(vec![video()]).await;
        assert!(matches!(
            outcomes[0],
            Err(ExtractFailure {
                error: ExtractError::UrlParsingFailure { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_href_fails_item() {
        let tmp = TempDir::new().unwrap();
        let page = FakePage {
            visible: vec![selectors::DOWNLOAD_LINK],
            href: Some("  ".to_string()),
            ..FakePage::default()
        };
        let outcomes = extractor(page, tmp.path()).process_batch(vec![video()]).await;
        assert!(matches!(
            outcomes[0],
            Err(ExtractFailure {
                error: ExtractError::HrefMissing,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_username_heading_fails_item() {
        let tmp = TempDir::new().unwrap();
        let page = FakePage {
            visible: vec![selectors::DOWNLOAD_LINK],
            href: Some("https://cdn.example/v.mp4".to_string()),
            headings: vec!["a".to_string(), "b".to_string()],
            ..FakePage::default()
        };
        let outcomes = extractor(page, tmp.path()).process_batch(vec![video()]).await;
        assert!(matches!(
            outcomes[0],
            Err(ExtractFailure {
                error: ExtractError::ElementMissing { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_input_fails_item() {
        let tmp = TempDir::new().unwrap();
        let page = FakePage {
            missing_input: true,
            ..FakePage::default()
        };
        let outcomes = extractor(page, tmp.path()).process_batch(vec![video()]).await;
        match &outcomes[0] {
            Err(ExtractFailure {
                error: ExtractError::ElementMissing { selector },
                ..
            }) => assert_eq!(selector, "input#params"),
            other => panic!("expected ElementMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_result_times_out() {
        let tmp = TempDir::new().unwrap();
        let outcomes = extractor(FakePage::default(), tmp.path())
            .process_batch(vec![video()])
            .await;
        assert!(matches!(
            outcomes[0],
            Err(ExtractFailure {
                error: ExtractError::Timeout { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_delegates_to_driver() {
        let tmp = TempDir::new().unwrap();
        let mut extractor = extractor(FakePage::default(), tmp.path());
        extractor.initialize().await.unwrap();
        extractor.cleanup().await;
        assert_eq!(extractor.driver.launched.load(Ordering::SeqCst), 1);
        assert_eq!(extractor.driver.closed.load(Ordering::SeqCst), 1);
        assert_eq!(extractor.name(), "tikwm");
    }

    #[tokio::test]
    async fn test_submits_normalized_link() {
        let tmp = TempDir::new().unwrap();
        let page = FakePage {
            visible: vec![selectors::PARSE_ERROR],
            ..FakePage::default()
        };
        let extractor = extractor(page, tmp.path());
        let _ = extractor.process_batch(vec![video()]).await;
        assert_eq!(
            *extractor.driver.submissions.lock().unwrap(),
            vec!["7123456789012345678".to_string()]
        );
    }

    #[test]
    fn test_locator_strategies() {
        assert_eq!(selectors::LINK_INPUT.strategy(), "css selector");
        assert_eq!(selectors::DOWNLOAD_LINK.strategy(), "xpath");
        assert_eq!(selectors::HEADINGS.to_string(), "h4");
    }

    #[test]
    fn test_general_error_matches_leaf_divs_outside_scripts() {
        let xpath = selectors::GENERAL_ERROR.value();
        assert!(xpath.starts_with("//div[not(descendant::div)]"));
        assert!(xpath.contains("not(ancestor::script or ancestor::style)"));
        assert!(!xpath.contains("  "), "{xpath}");
    }
}
