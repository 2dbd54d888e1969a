//! Result validator - Post-run audit of produced audio files

use std::io::ErrorKind;
use std::path::Path;

use domain::{RunSummary, WorkItem};
use tracing::{debug, instrument};

/// Checks outputs on disk, independent of in-run bookkeeping
#[derive(Debug, Clone, Copy)]
pub struct ResultValidator {
    min_output_bytes: u64,
}

impl ResultValidator {
    /// Create a validator
    pub const fn new(min_output_bytes: u64) -> Self {
        Self { min_output_bytes }
    }

    /// Check a single output file
    ///
    /// Returns the reason when the file is missing or too small.
    pub async fn check_output(&self, path: &Path) -> Result<u64, String> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if !meta.is_file() => Err("output is not a regular file".to_string()),
            Ok(meta) if meta.len() < self.min_output_bytes => Err(format!(
                "output too small: {} bytes, expected at least {}",
                meta.len(),
                self.min_output_bytes
            )),
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err("output missing".to_string()),
            Err(e) => Err(format!("output unreadable: {e}")),
        }
    }

    /// Judge every item by its output on disk
    ///
    /// A failed item keeps the reason recorded during the run; any other item
    /// without a valid output gets a reason derived from the filesystem.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn validate(&self, items: &[WorkItem]) -> RunSummary {
        let mut summary = RunSummary::new();

        for item in items {
            match self.check_output(item.output_path()).await {
                Ok(_) => summary.record_success(item.id().clone()),
                Err(found) => {
                    let reason = item.failure_reason().map_or(found, ToString::to_string);
                    summary.record_failure(item.id().clone(), reason);
                },
            }
        }

        debug!(
            succeeded = summary.success_count(),
            failed = summary.failure_count(),
            "Validation complete"
        );
        summary
    }
}
