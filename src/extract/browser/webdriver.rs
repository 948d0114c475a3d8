//! [`BrowserDriver`] backed by a W3C WebDriver server (`chromedriver`).
//!
//! `launch` spawns `chromedriver` on a free local port (or attaches to an
//! already running server), waits until it reports ready, and opens a Chrome
//! session on a persistent profile. Commands are plain JSON over HTTP.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{BrowserDriver, Locator};
use crate::extract::ExtractError;

/// Default driver program, looked up on `PATH`.
pub const DEFAULT_DRIVER_PROGRAM: &str = "chromedriver";

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const READY_TIMEOUT: Duration = Duration::from_secs(15);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(90);

/// Error messages chromedriver uses when Chrome itself is missing.
const CHROME_MISSING_MARKERS: [&str; 3] = [
    "cannot find chrome binary",
    "no chrome binary",
    "chrome not found",
];

/// WebDriver-backed browser.
#[derive(Debug)]
pub struct WebDriverBrowser {
    driver_program: PathBuf,
    profile_dir: PathBuf,
    http: reqwest::Client,
    endpoint: Option<String>,
    process: Option<Child>,
    session_id: Option<String>,
}

impl WebDriverBrowser {
    /// Creates a browser that will spawn `chromedriver` with the given
    /// persistent profile directory.
    #[must_use]
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            driver_program: PathBuf::from(DEFAULT_DRIVER_PROGRAM),
            profile_dir: profile_dir.into(),
            http: reqwest::Client::new(),
            endpoint: None,
            process: None,
            session_id: None,
        }
    }

    /// Uses a WebDriver server already listening at `endpoint` instead of
    /// spawning one.
    #[must_use]
    pub fn attach(endpoint: impl Into<String>, profile_dir: impl Into<PathBuf>) -> Self {
        let mut browser = Self::new(profile_dir);
        browser.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        browser
    }

    /// Overrides the driver program path.
    #[must_use]
    pub fn with_driver_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.driver_program = program.into();
        self
    }

    /// Browser arguments for the persistent context.
    #[must_use]
    pub fn chrome_args(&self) -> Vec<String> {
        vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            "--window-size=500,200".to_string(),
            format!("--user-data-dir={}", self.profile_dir.display()),
        ]
    }

    fn endpoint(&self) -> Result<&str, ExtractError> {
        self.endpoint
            .as_deref()
            .ok_or_else(|| ExtractError::browser("browser is not launched"))
    }

    fn session_path(&self, suffix: &str) -> Result<String, ExtractError> {
        let session_id = self
            .session_id
            .as_deref()
            .ok_or_else(|| ExtractError::browser("browser session is not open"))?;
        Ok(format!("/session/{session_id}{suffix}"))
    }

    fn spawn_driver(&mut self) -> Result<String, ExtractError> {
        let port = free_local_port()?;
        let child = Command::new(&self.driver_program)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractError::MissingRuntimeDependency {
                        dependency: self.driver_program.display().to_string(),
                    }
                } else {
                    ExtractError::browser(format!(
                        "failed to start {}: {e}",
                        self.driver_program.display()
                    ))
                }
            })?;
        self.process = Some(child);
        debug!(port, "webdriver process started");
        Ok(format!("http://127.0.0.1:{port}"))
    }

    async fn wait_until_ready(&self) -> Result<(), ExtractError> {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            if let Ok(value) = self.command(Method::GET, "/status", None).await
                && value["ready"].as_bool().unwrap_or(false)
            {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ExtractError::browser(
                    "webdriver server did not become ready",
                ));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn create_session(&mut self) -> Result<(), ExtractError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": self.chrome_args() }
                }
            }
        });

        let value = self
            .command(Method::POST, "/session", Some(capabilities))
            .await
            .map_err(|error| match error {
                ExtractError::Browser { message }
                    if CHROME_MISSING_MARKERS
                        .iter()
                        .any(|m| message.to_ascii_lowercase().contains(m)) =>
                {
                    ExtractError::MissingRuntimeDependency {
                        dependency: "Google Chrome".to_string(),
                    }
                }
                other => other,
            })?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| ExtractError::browser("new session response has no sessionId"))?;
        self.session_id = Some(session_id.to_string());
        Ok(())
    }

    /// Sends one WebDriver command and returns its `value`.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ExtractError> {
        let url = format!("{}{path}", self.endpoint()?);
        let mut request = self.http.request(method.clone(), &url).timeout(COMMAND_TIMEOUT);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExtractError::network(&url, e))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractError::network(&url, e))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(value);
        }

        let error = value["error"].as_str().unwrap_or("unknown error");
        let message = value["message"].as_str().unwrap_or_default();
        Err(ExtractError::browser(format!("{error}: {message}")))
    }

    async fn element_ids(&self, locator: &Locator) -> Result<Vec<String>, ExtractError> {
        let path = self.session_path("/elements")?;
        let body = json!({ "using": locator.strategy(), "value": locator.value() });
        let value = self.command(Method::POST, &path, Some(body)).await?;
        Ok(value
            .as_array()
            .map(|elements| {
                elements
                    .iter()
                    .filter_map(|e| e[ELEMENT_KEY].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn first_element(&self, locator: &Locator) -> Result<String, ExtractError> {
        self.element_ids(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::element_missing(locator.to_string()))
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    #[instrument(skip(self), fields(profile = %self.profile_dir.display()))]
    async fn launch(&mut self) -> Result<(), ExtractError> {
        if self.endpoint.is_none() {
            let endpoint = self.spawn_driver()?;
            self.endpoint = Some(endpoint);
        }
        self.wait_until_ready().await?;
        self.create_session().await?;
        info!("browser launched");
        Ok(())
    }

    async fn open(&self, url: &str) -> Result<(), ExtractError> {
        let path = self.session_path("/url")?;
        self.command(Method::POST, &path, Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), ExtractError> {
        let element = self.first_element(locator).await?;
        let clear = self.session_path(&format!("/element/{element}/clear"))?;
        self.command(Method::POST, &clear, None).await?;
        let value = self.session_path(&format!("/element/{element}/value"))?;
        self.command(Method::POST, &value, Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    async fn click(&self, locator: &Locator) -> Result<(), ExtractError> {
        let element = self.first_element(locator).await?;
        let path = self.session_path(&format!("/element/{element}/click"))?;
        self.command(Method::POST, &path, None).await.map(|_| ())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, ExtractError> {
        let Some(element) = self.element_ids(locator).await?.into_iter().next() else {
            return Ok(false);
        };
        let path = self.session_path(&format!("/element/{element}/displayed"))?;
        Ok(self
            .command(Method::GET, &path, None)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn attribute(
        &self,
        locator: &Locator,
        name: &str,
    ) -> Result<Option<String>, ExtractError> {
        let element = self.first_element(locator).await?;
        let path = self.session_path(&format!("/element/{element}/attribute/{name}"))?;
        Ok(self
            .command(Method::GET, &path, None)
            .await?
            .as_str()
            .map(str::to_string))
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>, ExtractError> {
        let mut texts = Vec::new();
        for element in self.element_ids(locator).await? {
            let path = self.session_path(&format!("/element/{element}/text"))?;
            let text = self.command(Method::GET, &path, None).await?;
            texts.push(text.as_str().unwrap_or_default().to_string());
        }
        Ok(texts)
    }

    async fn close(&mut self) {
        if let Ok(path) = self.session_path("") {
            if let Err(error) = self.command(Method::DELETE, &path, None).await {
                debug!(%error, "failed to end browser session");
            }
            self.session_id = None;
        }
        if let Some(mut child) = self.process.take() {
            if let Err(error) = child.kill().await {
                warn!(%error, "failed to stop webdriver process");
            }
            self.endpoint = None;
        }
        debug!("browser closed");
    }
}

fn free_local_port() -> Result<u16, ExtractError> {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(|e| ExtractError::browser(format!("no free local port for webdriver: {e}")))
}
