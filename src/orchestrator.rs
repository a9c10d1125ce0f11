//! Drives every registered source adapter through one extraction run.
//!
//! A run executes one *cycle* (every adapter searches, fetches and parses)
//! and merges the outcomes. When the merged list is empty the whole cycle is
//! repeated from scratch after an exponentially growing delay, up to
//! `max_batch_retries` times.
//!
//! ```text
//! Idle ──run──▶ Running ──records──▶ Completed
//!                  │ ▲
//!            empty │ │ sleep batch_retry_delay * 2^k
//!                  ▼ │
//!               (retry) ──budget spent──▶ Exhausted
//! ```
//!
//! Adapters are kept behind `Arc<Mutex<_>>` so their transport state (the
//! fallback switch, a logged-in session) survives from one attempt to the
//! next and from one run to the next.

use crate::error::{PipelineError, SourceError};
use crate::models::{ExtractionBatch, ExtractionRecord, SourceId};
use crate::sources::{Pacing, SearchRequest, SourceAdapter, SourceOutcome, run_cycle};
use chrono::{Local, NaiveDate, Utc};
use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

type SharedAdapter = Arc<Mutex<Box<dyn SourceAdapter>>>;

/// How adapters are scheduled within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One adapter at a time, in registration order.
    Sequential,
    /// One task per adapter, joined before merging.
    #[default]
    Parallel,
}

/// Arguments of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub query: String,
    pub days: u32,
    pub max_pages: u32,
    pub mode: Mode,
}

impl RunRequest {
    fn search_request(&self, today: NaiveDate) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            days: self.days,
            max_pages: self.max_pages,
            today,
        }
    }
}

/// Whole-cycle retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Extra cycles allowed after the first one came back empty.
    pub max_batch_retries: u32,
    #[serde(with = "crate::retry::millis")]
    pub batch_retry_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_batch_retries: 2,
            batch_retry_delay: Duration::from_secs(10),
        }
    }
}

impl PipelineSettings {
    /// Wait before retry `k` (0-indexed): `batch_retry_delay * 2^k`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.batch_retry_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Exhausted,
}

/// A cycle that produced no records and was retried.
#[derive(Debug, Clone, PartialEq)]
pub struct EmptyAttempt {
    /// 1-indexed cycle number.
    pub attempt: u32,
    pub delay: Duration,
    pub errors: Vec<SourceError>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub batch: ExtractionBatch,
    /// Cycles executed, the successful one included.
    pub attempts: u32,
    pub empty_attempts: Vec<EmptyAttempt>,
}

pub struct Orchestrator {
    adapters: Vec<(SourceId, SharedAdapter)>,
    settings: PipelineSettings,
    pacing: Pacing,
    state: RunState,
}

impl Orchestrator {
    pub fn new(settings: PipelineSettings, pacing: Pacing) -> Self {
        Self {
            adapters: Vec::new(),
            settings,
            pacing,
            state: RunState::Idle,
        }
    }

    /// Add an adapter; cycles merge outcomes in registration order.
    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) -> &mut Self {
        let id = adapter.id();
        self.adapters.push((id, Arc::new(Mutex::new(adapter))));
        self
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.adapters.iter().map(|(id, _)| *id).collect()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run cycles until one yields records or the retry budget is spent.
    #[instrument(level = "info", skip_all, fields(query = %request.query, days = request.days, mode = ?request.mode))]
    pub async fn run(&mut self, request: &RunRequest) -> Result<RunReport, PipelineError> {
        self.state = RunState::Running;
        let search = request.search_request(Local::now().date_naive());
        let mut empty_attempts = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(attempt, sources = self.adapters.len(), "Starting extraction cycle");

            let outcomes = match request.mode {
                Mode::Sequential => self.run_sequential(&search).await,
                Mode::Parallel => self.run_parallel(&search).await,
            };
            let (records, counts, errors) = merge(outcomes);

            if !records.is_empty() {
                let batch = ExtractionBatch::build(records, counts, errors, Utc::now());
                info!(
                    attempt,
                    records = batch.len(),
                    errors = batch.errors().len(),
                    "Extraction run completed"
                );
                self.state = RunState::Completed;
                return Ok(RunReport {
                    batch,
                    attempts: attempt,
                    empty_attempts,
                });
            }

            let retries_used = attempt - 1;
            if retries_used >= self.settings.max_batch_retries {
                error!(attempts = attempt, errors = errors.len(), "Every cycle came back empty; giving up");
                self.state = RunState::Exhausted;
                return Err(PipelineError::Exhausted {
                    attempts: attempt,
                    errors,
                });
            }

            let delay = self.settings.delay_for(retries_used);
            warn!(
                attempt,
                errors = errors.len(),
                ?delay,
                "Cycle produced no records; rerunning every source"
            );
            empty_attempts.push(EmptyAttempt {
                attempt,
                delay,
                errors,
            });
            sleep(delay).await;
        }
    }

    async fn run_sequential(&self, search: &SearchRequest) -> Vec<SourceOutcome> {
        let mut outcomes = Vec::with_capacity(self.adapters.len());
        for (id, adapter) in &self.adapters {
            let mut guard = adapter.lock().await;
            let cycle = AssertUnwindSafe(run_cycle(guard.as_mut(), search, &self.pacing));
            let outcome = match cycle.catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => panicked(*id, payload),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_parallel(&self, search: &SearchRequest) -> Vec<SourceOutcome> {
        let (ids, workers): (Vec<_>, Vec<_>) = self
            .adapters
            .iter()
            .map(|(id, adapter)| {
                let adapter = Arc::clone(adapter);
                let search = search.clone();
                let pacing = self.pacing.clone();
                let worker = tokio::spawn(async move {
                    let mut guard = adapter.lock().await;
                    run_cycle(guard.as_mut(), &search, &pacing).await
                });
                (*id, worker)
            })
            .unzip();

        join_all(workers)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, id)| match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => panicked(id, e.into_panic()),
                Err(e) => {
                    error!(source = %id, error = %e, "Worker did not finish");
                    let mut outcome = SourceOutcome::empty(id);
                    outcome.errors.push(SourceError::worker_panic(id, e.to_string()));
                    outcome
                }
            })
            .collect()
    }

    /// Release every adapter's transports.
    pub async fn shutdown(&mut self) {
        for (id, adapter) in &self.adapters {
            adapter.lock().await.shutdown().await;
            info!(source = %id, "Adapter shut down");
        }
    }
}

fn panicked(id: SourceId, payload: Box<dyn Any + Send>) -> SourceOutcome {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(source = %id, %detail, "Adapter panicked");
    let mut outcome = SourceOutcome::empty(id);
    outcome.errors.push(SourceError::worker_panic(id, detail));
    outcome
}

/// Concatenate outcomes in order, counting each source's raw records.
fn merge(
    outcomes: Vec<SourceOutcome>,
) -> (Vec<ExtractionRecord>, BTreeMap<SourceId, usize>, Vec<SourceError>) {
    let mut records = Vec::new();
    let mut counts = BTreeMap::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        *counts.entry(outcome.source).or_insert(0) += outcome.records.len();
        records.extend(outcome.records);
        errors.extend(outcome.errors);
    }
    (records, counts, errors)
}
