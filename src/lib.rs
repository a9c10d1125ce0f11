//! # deal_feed
//!
//! Collects mentions of mergers and acquisitions from Brazilian business news
//! sites into one deduplicated, dated batch.
//!
//! ## Architecture
//!
//! 1. **Search**: each [`sources::SourceAdapter`] pages through its site's
//!    listing and collects article URLs inside the lookback window
//! 2. **Fetch**: articles are downloaded through the adapter's own
//!    [`fetch::FetchChain`] (retries, backend fallback, re-login on paywalls)
//! 3. **Parse**: site selectors plus [`sources::rules`] turn a page into an
//!    [`models::ExtractionRecord`]
//! 4. **Merge**: the [`orchestrator::Orchestrator`] runs the adapters
//!    sequentially or in parallel, isolates their failures, and reruns the
//!    whole cycle when nothing came back
//! 5. **Normalize**: [`normalize::normalize`] dedupes, dates, fills and sorts
//!    the records into an [`models::ExtractionBatch`]

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod outputs;
pub mod retry;
pub mod sources;
pub mod utils;
