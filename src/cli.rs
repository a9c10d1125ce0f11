//! Command-line interface definitions for deal_feed.
//!
//! Every flag is optional and overrides the matching key of the YAML config
//! file (or its default). The rendering endpoint can also come from the
//! environment.

use crate::config::ExtractorConfig;
use crate::fetch::RendererEndpoint;
use crate::orchestrator::Mode;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for deal_feed.
///
/// # Examples
///
/// ```sh
/// # Last 30 days, defaults everywhere else
/// deal_feed -o ./output
///
/// # Narrower search, one source at a time
/// deal_feed -q "aquisição varejo" -d 7 -p 2 --mode sequential
///
/// # Render Valor Econômico pages through a local Browserless
/// deal_feed --browserless-url http://localhost:3000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory for batch JSON files
    #[arg(short, long, env = "DEAL_FEED_OUTPUT_DIR", default_value = "./output")]
    pub output_dir: PathBuf,

    /// Search terms
    #[arg(short, long)]
    pub query: Option<String>,

    /// Lookback window in days
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Result pages to scan per source
    #[arg(short = 'p', long)]
    pub max_pages: Option<u32>,

    /// Run sources one after another or all at once
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Full reruns allowed when a run finds nothing
    #[arg(long)]
    pub max_batch_retries: Option<u32>,

    /// Attempts per request, the first one included
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Initial backoff between request attempts, in milliseconds
    #[arg(long)]
    pub base_delay_ms: Option<u64>,

    /// Growth factor of the backoff
    #[arg(long)]
    pub backoff_multiplier: Option<f64>,

    /// Browserless base URL used to render subscriber pages
    #[arg(long, env = "BROWSERLESS_URL")]
    pub browserless_url: Option<String>,

    /// Browserless API token
    #[arg(long, env = "BROWSERLESS_TOKEN", hide_env_values = true)]
    pub browserless_token: Option<String>,
}

impl Cli {
    /// Overlay the flags that were given on `config`.
    pub fn apply(&self, config: &mut ExtractorConfig) {
        if let Some(ref query) = self.query {
            config.search.query = query.clone();
        }
        if let Some(days) = self.days {
            config.search.days = days;
        }
        if let Some(max_pages) = self.max_pages {
            config.search.max_pages = max_pages;
        }
        if let Some(mode) = self.mode {
            config.search.mode = mode;
        }
        if let Some(retries) = self.max_batch_retries {
            config.pipeline.max_batch_retries = retries;
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = self.base_delay_ms {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = self.backoff_multiplier {
            config.retry.backoff_multiplier = multiplier;
        }
        if let Some(ref base_url) = self.browserless_url {
            config.renderer = Some(RendererEndpoint {
                base_url: base_url.clone(),
                token: self.browserless_token.clone(),
            });
        }
    }
}
