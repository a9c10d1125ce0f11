//! Error taxonomy for the extraction pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`FetchError`]: what a single transport call can report.
//! - [`ExtractError`]: what a source adapter reports for one URL or for its
//!   whole cycle. These never cross the orchestrator boundary as errors; they
//!   are turned into [`SourceError`] entries stored in the batch.
//! - [`PipelineError`]: the only error the orchestrator hands to its caller,
//!   once the pipeline retry budget is spent.

use crate::models::SourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure of one transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("backend failed to initialize: {0}")]
    BackendInit(String),

    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),
}

impl FetchError {
    /// Classify a `reqwest` error the way the retry policy needs it.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else if err.is_builder() {
            FetchError::InvalidUrl(err.to_string())
        } else {
            // Anything else happened on the wire before a response arrived.
            FetchError::Connect(err.to_string())
        }
    }
}

/// Per-source error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("{url}: gave up after {attempts} attempts ({reason})")]
    TransientNetwork {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("{url}: permanent HTTP {status}")]
    PermanentHttp { url: String, status: u16 },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{url}: could not parse document ({reason})")]
    Parse { url: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            ExtractError::PermanentHttp { .. } => ErrorKind::PermanentHttp,
            ExtractError::Authentication(_) => ErrorKind::Authentication,
            ExtractError::Parse { .. } => ErrorKind::Parse,
            ExtractError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// URL the error is scoped to, when it is scoped to one.
    pub fn url(&self) -> Option<&str> {
        match self {
            ExtractError::TransientNetwork { url, .. }
            | ExtractError::PermanentHttp { url, .. }
            | ExtractError::Parse { url, .. } => Some(url),
            ExtractError::Authentication(_) | ExtractError::Configuration(_) => None,
        }
    }
}

/// Serializable error category stored alongside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientNetwork,
    PermanentHttp,
    Authentication,
    Parse,
    Configuration,
    /// The worker running the adapter panicked.
    WorkerPanic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::PermanentHttp => "permanent_http",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Parse => "parse",
            ErrorKind::Configuration => "configuration",
            ErrorKind::WorkerPanic => "worker_panic",
        };
        f.write_str(s)
    }
}

/// A non-fatal error recorded against one source during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: SourceId,
    /// Set when the error concerns a single document rather than the source.
    pub url: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(source: SourceId, err: &ExtractError) -> Self {
        Self {
            source,
            url: err.url().map(str::to_string),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn worker_panic(source: SourceId, detail: impl Into<String>) -> Self {
        Self {
            source,
            url: None,
            kind: ErrorKind::WorkerPanic,
            message: detail.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.kind, self.message)
    }
}

/// Failure reported to the caller of the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no records after {attempts} attempts ({} source errors in the last attempt)", .errors.len())]
    Exhausted {
        attempts: u32,
        errors: Vec<SourceError>,
    },
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: String,
        value: String,
    },

    #[error("pacing min ({min_ms}ms) exceeds max ({max_ms}ms)")]
    PacingRange { min_ms: u64, max_ms: u64 },
}
