//! # deal_feed
//!
//! Runs one extraction over Pipeline Valor, Valor Econômico and Fusões e
//! Aquisições and writes the resulting batch as JSON.
//!
//! ## Usage
//!
//! ```sh
//! VALOR_EMAIL=... VALOR_PASSWORD=... deal_feed -o ./output -d 7
//! ```
//!
//! Exits with a non-zero status when every attempt came back empty.

use clap::Parser;
use deal_feed::cli::Cli;
use deal_feed::config::ExtractorConfig;
use deal_feed::credentials::EnvCredentials;
use deal_feed::error::PipelineError;
use deal_feed::orchestrator::Orchestrator;
use deal_feed::outputs::json;
use deal_feed::sources;
use deal_feed::utils::{ensure_writable_dir, truncate_for_log};
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("deal_feed starting up");
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    // Parse CLI
    let args = Cli::parse();
    debug!(config = ?args.config, output_dir = %args.output_dir.display(), "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match args.config {
        Some(ref path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::default(),
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // ---- Adapters ----
    let adapters = sources::default_adapters(&config.adapter_settings(), &EnvCredentials)?;
    let mut orchestrator = Orchestrator::new(config.pipeline.clone(), config.pacing.clone());
    for adapter in adapters {
        orchestrator.register(adapter);
    }
    info!(
        sources = ?orchestrator.sources(),
        renderer = config.renderer.as_ref().map(|r| r.base_url.as_str()).unwrap_or("none"),
        "Adapters registered"
    );

    // ---- Run ----
    let request = config.run_request();
    let result = orchestrator.run(&request).await;
    orchestrator.shutdown().await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            let PipelineError::Exhausted { ref errors, .. } = e;
            for err in errors {
                error!(
                    source = %err.source,
                    kind = %err.kind,
                    url = err.url.as_deref().unwrap_or("-"),
                    message = %truncate_for_log(&err.message, 300),
                    "Source error in final attempt"
                );
            }
            error!(error = %e, "Extraction failed");
            return Err(e.into());
        }
    };

    let batch = &report.batch;
    for (source, count) in batch.source_counts() {
        info!(%source, count, "Source contribution");
    }
    for err in batch.errors() {
        warn!(
            source = %err.source,
            kind = %err.kind,
            url = err.url.as_deref().unwrap_or("-"),
            message = %truncate_for_log(&err.message, 300),
            "Source error"
        );
    }

    // ---- Output ----
    match json::write_batch(batch, &args.output_dir).await {
        Ok(path) => info!(path = %path.display(), records = batch.len(), "Batch written"),
        Err(e) => {
            error!(error = %e, "Failed to write batch JSON");
            return Err(e);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        attempts = report.attempts,
        empty_attempts = report.empty_attempts.len(),
        records = batch.len(),
        "Execution complete"
    );

    Ok(())
}
