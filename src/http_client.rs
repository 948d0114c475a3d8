//! Shared HTTP client construction policy.
//!
//! Centralizes timeouts, User-Agent, compression and proxy handling so the
//! redirect probe, the extraction sessions and the media downloads behave the
//! same way.

use std::time::Duration;

use reqwest::Proxy;
use reqwest::redirect::Policy;

use crate::user_agent::{BROWSER_USER_AGENT, default_user_agent};

/// Connect timeout for every client.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout between body chunks for session clients.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Whole-request timeout for following a short link.
pub const REDIRECT_TIMEOUT_SECS: u64 = 30;

/// Maximum redirect hops followed for a short link.
const MAX_REDIRECTS: usize = 10;

/// Checks that `proxy` is a proxy URL reqwest accepts.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the URL cannot be used as a proxy.
pub fn validate_proxy(proxy: &str) -> Result<(), reqwest::Error> {
    Proxy::all(proxy).map(|_| ())
}

/// Builds the async client used for redirect probes.
pub(crate) fn build_redirect_client(proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(default_user_agent())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REDIRECT_TIMEOUT_SECS));
    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }
    builder.build()
}

/// Builds the async session client (page automation probes and downloads).
pub(crate) fn build_async_client(proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .cookie_store(true)
        .gzip(true)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS));
    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }
    builder.build()
}

/// Builds the blocking session client.
///
/// Must be called off the async runtime (inside `spawn_blocking`).
pub(crate) fn build_blocking_client(
    proxy: Option<&str>,
) -> Result<reqwest::blocking::Client, reqwest::Error> {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .cookie_store(true)
        .gzip(true)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(None::<Duration>);
    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }
    builder.build()
}
