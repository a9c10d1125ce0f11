//! Primary/fallback backend selection for one adapter.
//!
//! The primary backend is initialized on first use. If that fails, the chain
//! moves to the fallback backend and stays there for the rest of its life;
//! the primary is never initialized again. The transition is recorded in
//! [`ActiveBackend`] and can be inspected with [`FetchChain::active_backend`].
//!
//! Independently of which backend is active, a document that matches the
//! adapter's [`AuthWall`] triggers one re-authentication on the active
//! backend followed by one more fetch of the same URL.

use super::{AuthWall, BackendKind, Document, FetchBackend};
use crate::credentials::Credentials;
use crate::error::ExtractError;
use crate::retry::{RetryPolicy, fetch_with_retry};
use tracing::{error, info, instrument, warn};

/// Where the chain currently sends requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveBackend {
    /// Nothing initialized yet.
    Pending,
    Primary(BackendKind),
    /// The primary failed to initialize; final state.
    Fallback(BackendKind),
    /// Neither backend could be initialized; final state.
    Unavailable(String),
}

pub struct FetchChain {
    primary: Box<dyn FetchBackend>,
    fallback: Option<Box<dyn FetchBackend>>,
    active: ActiveBackend,
    policy: RetryPolicy,
    auth_wall: Option<AuthWall>,
    credentials: Option<Credentials>,
}

impl FetchChain {
    pub fn new(primary: Box<dyn FetchBackend>, policy: RetryPolicy) -> Self {
        Self {
            primary,
            fallback: None,
            active: ActiveBackend::Pending,
            policy,
            auth_wall: None,
            credentials: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn FetchBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_auth_wall(mut self, wall: AuthWall) -> Self {
        self.auth_wall = Some(wall);
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn active_backend(&self) -> &ActiveBackend {
        &self.active
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn ensure_ready(&mut self) -> Result<(), ExtractError> {
        match &self.active {
            ActiveBackend::Primary(_) | ActiveBackend::Fallback(_) => return Ok(()),
            ActiveBackend::Unavailable(reason) => {
                return Err(ExtractError::Configuration(reason.clone()));
            }
            ActiveBackend::Pending => {}
        }

        let primary_err = match self.primary.initialize().await {
            Ok(()) => {
                info!(backend = %self.primary.kind(), "Primary backend initialized");
                self.active = ActiveBackend::Primary(self.primary.kind());
                return Ok(());
            }
            Err(e) => e,
        };

        let Some(fallback) = self.fallback.as_mut() else {
            let reason = format!("{} backend unavailable: {primary_err}", self.primary.kind());
            error!(%reason, "No fallback backend configured");
            self.active = ActiveBackend::Unavailable(reason.clone());
            return Err(ExtractError::Configuration(reason));
        };

        warn!(
            primary = %self.primary.kind(),
            fallback = %fallback.kind(),
            error = %primary_err,
            "Primary backend failed to initialize; switching to fallback for good"
        );
        match fallback.initialize().await {
            Ok(()) => {
                self.active = ActiveBackend::Fallback(fallback.kind());
                Ok(())
            }
            Err(e) => {
                let reason = format!("no backend available: {primary_err}; {e}");
                self.active = ActiveBackend::Unavailable(reason.clone());
                Err(ExtractError::Configuration(reason))
            }
        }
    }

    /// Log in on the active backend.
    #[instrument(level = "info", skip_all)]
    pub async fn authenticate(&mut self) -> Result<(), ExtractError> {
        self.ensure_ready().await?;
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ExtractError::Configuration("no credentials configured".to_string()))?;
        let backend: &mut dyn FetchBackend = match self.active {
            ActiveBackend::Fallback(_) => match self.fallback.as_deref_mut() {
                Some(b) => b,
                None => self.primary.as_mut(),
            },
            _ => self.primary.as_mut(),
        };
        backend.authenticate(credentials).await
    }

    /// Fetch one URL with retries and auth-wall recovery.
    pub async fn fetch(&mut self, url: &str) -> Result<Document, ExtractError> {
        self.ensure_ready().await?;

        let backend: &mut dyn FetchBackend = match self.active {
            ActiveBackend::Fallback(_) => match self.fallback.as_deref_mut() {
                Some(b) => b,
                None => self.primary.as_mut(),
            },
            _ => self.primary.as_mut(),
        };

        let doc = fetch_with_retry(&self.policy, backend, url).await?;

        let Some(wall) = self.auth_wall.as_ref() else {
            return Ok(doc);
        };
        if !wall.matches(&doc.body) {
            return Ok(doc);
        }

        warn!(%url, backend = %backend.kind(), "Auth wall detected; re-authenticating once");
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ExtractError::Authentication("auth wall hit and no credentials to log in".to_string())
        })?;
        backend.authenticate(credentials).await?;

        let doc = fetch_with_retry(&self.policy, backend, url).await?;
        if wall.matches(&doc.body) {
            return Err(ExtractError::Authentication(format!(
                "{url} still behind auth wall after re-authentication"
            )));
        }
        Ok(doc)
    }

    pub async fn shutdown(&mut self) {
        self.primary.shutdown().await;
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.shutdown().await;
        }
    }
}
