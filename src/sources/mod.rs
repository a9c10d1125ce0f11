//! Source adapters: one per news site.
//!
//! | Source | Module | Transport | Auth |
//! |--------|--------|-----------|------|
//! | Pipeline Valor | [`pipeline_valor`] | lightweight | no |
//! | Valor Econômico | [`valor_economico`] | session, lightweight fallback | yes |
//! | Fusões e Aquisições | [`fusoes_aquisicoes`] | lightweight | no |
//!
//! Every adapter implements [`SourceAdapter`]; [`run_cycle`] drives one full
//! search/fetch/parse cycle and isolates per-URL failures.

pub mod article;
pub mod fusoes_aquisicoes;
pub mod html;
pub mod listing;
pub mod pipeline_valor;
pub mod rules;
pub mod valor_economico;

#[cfg(test)]
pub(crate) mod testing;

use crate::credentials::CredentialStore;
use crate::error::{ExtractError, FetchError, SourceError};
use crate::fetch::{Document, HttpConfig, RendererEndpoint};
use crate::models::{ExtractionRecord, SourceId};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use itertools::Itertools;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

pub use fusoes_aquisicoes::FusoesAquisicoes;
pub use pipeline_valor::PipelineValor;
pub use valor_economico::ValorEconomico;

/// What to look for and how far back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub days: u32,
    pub max_pages: u32,
    /// Reference date for the lookback window.
    pub today: NaiveDate,
}

impl SearchRequest {
    /// Oldest publication date still inside the window.
    pub fn cutoff(&self) -> NaiveDate {
        self.today
            .checked_sub_days(Days::new(u64::from(self.days)))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Courtesy delay between requests to the same site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    #[serde(with = "crate::retry::millis")]
    pub min: Duration,
    #[serde(with = "crate::retry::millis")]
    pub max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1000),
            max: Duration::from_millis(3000),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// A uniformly drawn delay in `[min, max]`.
    pub fn draw(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let ms = rng().random_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(ms as u64)
    }

    pub async fn pause(&self) {
        let delay = self.draw();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

/// Transport settings every adapter is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterSettings {
    pub retry: RetryPolicy,
    pub http: HttpConfig,
    pub pacing: Pacing,
    /// Rendering endpoint for session transports.
    pub renderer: Option<RendererEndpoint>,
}

/// A news source that can be searched for transaction mentions.
#[async_trait]
pub trait SourceAdapter: Send {
    fn id(&self) -> SourceId;

    /// Collect article URLs inside the request's lookback window.
    ///
    /// Each call starts over from the first result page.
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<String>, ExtractError>;

    async fn fetch_detail(&mut self, url: &str) -> Result<Document, ExtractError>;

    /// Build a record from a fetched article. Fields the page does not
    /// report stay unset.
    fn parse(&self, document: &Document) -> Result<ExtractionRecord, ExtractError>;

    /// Release transports and sessions.
    async fn shutdown(&mut self) {}
}

/// The three built-in sources, in their usual order.
pub fn default_adapters(
    settings: &AdapterSettings,
    credentials: &dyn CredentialStore,
) -> Result<Vec<Box<dyn SourceAdapter>>, FetchError> {
    let valor_credentials = credentials.credentials(SourceId::ValorEconomico);
    if valor_credentials.is_none() {
        warn!("No Valor Econômico credentials; that source will report a configuration error");
    }
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(PipelineValor::new(settings)?),
        Box::new(ValorEconomico::new(settings, valor_credentials)?),
        Box::new(FusoesAquisicoes::new(settings)?),
    ];
    Ok(adapters)
}

/// Records and errors of one adapter cycle.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: SourceId,
    pub records: Vec<ExtractionRecord>,
    pub errors: Vec<SourceError>,
}

impl SourceOutcome {
    pub fn empty(source: SourceId) -> Self {
        Self {
            source,
            records: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Run search, then fetch and parse every URL found.
///
/// A failing URL is logged, recorded and skipped. A failing search ends the
/// cycle with no records and a single adapter-level error.
#[instrument(level = "info", skip_all, fields(source = %adapter.id()))]
pub async fn run_cycle(
    adapter: &mut dyn SourceAdapter,
    request: &SearchRequest,
    pacing: &Pacing,
) -> SourceOutcome {
    let source = adapter.id();
    let mut outcome = SourceOutcome::empty(source);

    let urls = match adapter.search(request).await {
        Ok(urls) => urls.into_iter().unique().collect::<Vec<_>>(),
        Err(e) => {
            error!(error = %e, "Search failed");
            outcome.errors.push(SourceError::new(source, &e));
            return outcome;
        }
    };
    info!(found = urls.len(), "Search finished");

    for (i, url) in urls.iter().enumerate() {
        if i > 0 {
            pacing.pause().await;
        }
        let parsed = match adapter.fetch_detail(url).await {
            Ok(doc) => adapter.parse(&doc),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!(%url, error = %e, "Skipping article");
                outcome.errors.push(SourceError::new(source, &e));
            }
        }
    }

    info!(
        records = outcome.records.len(),
        errors = outcome.errors.len(),
        "Cycle finished"
    );
    outcome
}
