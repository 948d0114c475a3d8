//! Shared User-Agent strings for the HTTP sessions.
//!
//! The session clients (page fetches and media downloads) use a desktop
//! browser UA because the video pages serve their embedded data only to
//! browser-like clients. Only the short-link redirect probe identifies the
//! tool.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/tikfetch";

/// Desktop browser User-Agent used by the session clients.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// User-Agent identifying the tool (short-link redirect probes).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("tikfetch/{version} (+{PROJECT_UA_URL})")
}
