//! Network session shared by extraction and download for one run.
//!
//! The browser-driven extractor pairs with an async client; the direct
//! extractor pairs with a blocking client whose calls are offloaded to the
//! blocking thread pool. A session is opened once per run and closed exactly
//! once: [`Session::close`] consumes it, and [`Session::scoped`] closes it after
//! the body finishes regardless of how the body ended.

use tracing::{debug, instrument};

use crate::http_client::{build_async_client, build_blocking_client};

/// Transport flavour of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Async,
    Blocking,
}

impl SessionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Async => "async",
            Self::Blocking => "blocking",
        }
    }
}

/// Errors opening a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to build {kind} HTTP session: {source}")]
    Build {
        kind: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("session setup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An open HTTP session.
#[derive(Debug)]
pub enum Session {
    Async(reqwest::Client),
    /// Requests and the drop of the last clone must happen on a blocking thread.
    Blocking(reqwest::blocking::Client),
}

impl Session {
    /// Opens a session of the given kind, routed through `proxy` if set.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Build`] when the client cannot be constructed
    /// (for example an unusable proxy URL).
    #[instrument(skip(proxy), fields(kind = kind.as_str(), proxied = proxy.is_some()))]
    pub async fn open(kind: SessionKind, proxy: Option<&str>) -> Result<Self, SessionError> {
        let build_error = |source| SessionError::Build {
            kind: kind.as_str(),
            source,
        };
        let session = match kind {
            SessionKind::Async => Self::Async(build_async_client(proxy).map_err(build_error)?),
            SessionKind::Blocking => {
                let proxy = proxy.map(str::to_string);
                let client =
                    tokio::task::spawn_blocking(move || build_blocking_client(proxy.as_deref()))
                        .await?
                        .map_err(build_error)?;
                Self::Blocking(client)
            }
        };
        debug!("session opened");
        Ok(session)
    }

    #[must_use]
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Async(_) => SessionKind::Async,
            Self::Blocking(_) => SessionKind::Blocking,
        }
    }

    /// Releases the session.
    pub async fn close(self) {
        let kind = self.kind();
        match self {
            Self::Async(client) => drop(client),
            Self::Blocking(client) => {
                // The blocking client owns an internal runtime that cannot be
                // dropped from async context.
                if let Err(error) = tokio::task::spawn_blocking(move || drop(client)).await {
                    tracing::warn!(%error, "blocking session shutdown task failed");
                }
            }
        }
        debug!(kind = kind.as_str(), "session closed");
    }

    /// Runs `body` with a borrowed session, then closes it.
    pub async fn scoped<T>(self, body: impl AsyncFnOnce(&Session) -> T) -> T {
        let output = body(&self).await;
        self.close().await;
        output
    }
}
