//! JSON export of an [`ExtractionBatch`].
//!
//! Files are grouped by the local date of the batch timestamp and named after
//! its local time, so several runs on the same day never overwrite each other:
//! `{output_dir}/{YYYY-MM-DD}/deals_{HHMMSS}.json`.

use crate::models::ExtractionBatch;
use chrono::Local;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path the batch will be written to under `output_dir`.
pub fn batch_path(batch: &ExtractionBatch, output_dir: &Path) -> PathBuf {
    let local = batch.extracted_at().with_timezone(&Local);
    output_dir
        .join(local.format("%Y-%m-%d").to_string())
        .join(format!("deals_{}.json", local.format("%H%M%S")))
}

/// Serialize `batch` (records, per-source counts and errors) as pretty JSON.
///
/// Returns the path of the written file.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_batch(batch: &ExtractionBatch, output_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(batch)?;
    let path = batch_path(batch, output_dir);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), records = batch.len(), "Wrote batch JSON");
    Ok(path)
}
