//! Transports used by source adapters to retrieve documents.
//!
//! Every adapter owns one [`FetchChain`], which owns one or two
//! [`FetchBackend`]s:
//!
//! | Backend | Module | Session | Notes |
//! |---------|--------|---------|-------|
//! | Lightweight | [`lightweight`] | no | Plain HTTP with rotating user agent and referrer |
//! | Session | [`session`] | yes | Logs in, renders pages through a headless browser endpoint |
//!
//! Backends are never shared between adapters.

pub mod chain;
pub mod lightweight;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use crate::credentials::Credentials;
use crate::error::{ExtractError, FetchError};
use async_trait::async_trait;
use std::fmt;

pub use chain::{ActiveBackend, FetchChain};
pub use lightweight::{HttpConfig, LightweightTransport};
pub use session::{LoginForm, RendererEndpoint, SessionConfig, SessionTransport};

/// Which transport produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Lightweight,
    Session,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Lightweight => f.write_str("lightweight"),
            BackendKind::Session => f.write_str("session"),
        }
    }
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub backend: BackendKind,
}

/// Content markers that identify a login or paywall page.
///
/// A body is walled when it contains every marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthWall {
    markers: Vec<String>,
}

impl AuthWall {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, body: &str) -> bool {
        !self.markers.is_empty() && self.markers.iter().all(|m| body.contains(m.as_str()))
    }
}

/// A transport that can retrieve documents.
#[async_trait]
pub trait FetchBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Prepare the backend. Called once, before the first request.
    async fn initialize(&mut self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Retrieve one document. A single attempt; retries live in the caller.
    async fn fetch(&mut self, url: &str) -> Result<Document, FetchError>;

    /// Establish an authenticated session.
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ExtractError>;

    /// Drop any session state.
    async fn shutdown(&mut self) {}
}
