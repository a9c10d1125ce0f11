//! Run configuration.
//!
//! Everything has a default, so the YAML file is optional and may set any
//! subset of keys. Command-line flags are applied on top of the file (see
//! [`crate::cli::Cli::apply`]) and the result is checked with
//! [`ExtractorConfig::validate`] before anything runs.
//!
//! ```yaml
//! search:
//!   query: "fusão aquisição M&A"
//!   days: 30
//!   max_pages: 5
//!   mode: parallel
//! retry:
//!   max_attempts: 3
//!   base_delay: 2000        # milliseconds
//!   backoff_multiplier: 1.5
//!   jitter: 1000
//!   max_delay: 30000
//! pipeline:
//!   max_batch_retries: 2
//!   batch_retry_delay: 10000
//! pacing:
//!   min: 1000
//!   max: 3000
//! renderer:
//!   base_url: "http://localhost:3000"
//! ```

use crate::error::ConfigError;
use crate::fetch::{HttpConfig, RendererEndpoint};
use crate::orchestrator::{Mode, PipelineSettings, RunRequest};
use crate::retry::RetryPolicy;
use crate::sources::{AdapterSettings, Pacing};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// What a run searches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub query: String,
    /// Lookback window in days.
    pub days: u32,
    /// Result pages per source.
    pub max_pages: u32,
    pub mode: Mode,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            query: "fusão aquisição M&A".to_string(),
            days: 30,
            max_pages: 5,
            mode: Mode::Parallel,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub search: SearchDefaults,
    pub retry: RetryPolicy,
    pub pipeline: PipelineSettings,
    pub pacing: Pacing,
    pub http: HttpConfig,
    pub renderer: Option<RendererEndpoint>,
}

impl ExtractorConfig {
    pub fn from_yaml(yaml: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Read a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_display = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;
        let config = Self::from_yaml(&yaml, &path_display)?;
        info!(path = %path_display, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.max_pages < 1 {
            return Err(too_small("search.max_pages", 1, self.search.max_pages));
        }
        if self.retry.max_attempts < 1 {
            return Err(too_small("retry.max_attempts", 1, self.retry.max_attempts));
        }
        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(too_small("retry.backoff_multiplier", 1.0, self.retry.backoff_multiplier));
        }
        if self.pacing.min > self.pacing.max {
            return Err(ConfigError::PacingRange {
                min_ms: self.pacing.min.as_millis() as u64,
                max_ms: self.pacing.max.as_millis() as u64,
            });
        }
        Ok(())
    }

    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            query: self.search.query.clone(),
            days: self.search.days,
            max_pages: self.search.max_pages,
            mode: self.search.mode,
        }
    }

    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            retry: self.retry.clone(),
            http: self.http.clone(),
            pacing: self.pacing.clone(),
            renderer: self.renderer.clone(),
        }
    }
}

fn too_small(field: &'static str, min: impl ToString, value: impl ToString) -> ConfigError {
    ConfigError::TooSmall {
        field,
        min: min.to_string(),
        value: value.to_string(),
    }
}
