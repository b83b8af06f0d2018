#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! NYC taxi trip ingestion pipeline.
//!
//! Runs three steps in order, stopping at the first failure:
//!
//! 1. fetch the dataset archive (skipped if it is already on disk),
//! 2. extract it into a freshly wiped `raw/` directory,
//! 3. provision the bucket and upload every CSV under `raw/`.
//!
//! Each step talks to the outside world through a capability trait
//! ([`DatasetDownloader`], [`ArchiveTool`], [`ObjectStore`]) bundled in
//! [`Collaborators`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use taxi_ingest_archive::{ArchiveTool, ExtractError, ExtractOutcome, extract_archive};
use taxi_ingest_dataset::{DatasetDownloader, FetchError, FetchOutcome, fetch_dataset};
use taxi_ingest_models::progress::ProgressCallback;
use taxi_ingest_models::{IngestConfig, UploadStats};
use taxi_ingest_storage::upload::upload_directory;
use taxi_ingest_storage::{ObjectStore, StorageError};

/// Errors that abort the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The download step failed.
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    /// The extraction step failed.
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Bucket provisioning or upload failed.
    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),
}

/// External collaborators used by the pipeline.
pub struct Collaborators<'a> {
    /// Fetches the dataset archive.
    pub downloader: &'a dyn DatasetDownloader,
    /// Extracts the archive.
    pub extractor: &'a dyn ArchiveTool,
    /// Stores the extracted files.
    pub store: &'a dyn ObjectStore,
}

/// What a successful run did.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSummary {
    /// Fetch step result.
    pub fetch: FetchOutcome,
    /// Extraction step result.
    pub extract: ExtractOutcome,
    /// Upload step result.
    pub upload: UploadStats,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Runs fetch, extract, and upload in sequence.
///
/// `upload_progress` is called once, right before the upload step, to
/// create the progress indicator for the upload loop.
///
/// # Errors
///
/// Returns the first step's error; later steps are not attempted.
#[allow(clippy::future_not_send)]
pub async fn run_pipeline<F>(
    config: &IngestConfig,
    collaborators: &Collaborators<'_>,
    upload_progress: F,
) -> Result<PipelineSummary, IngestError>
where
    F: FnOnce() -> Arc<dyn ProgressCallback>,
{
    let start = Instant::now();

    match run_steps(config, collaborators, upload_progress).await {
        Ok((fetch, extract, upload)) => {
            let elapsed = start.elapsed();
            log::info!(
                "Data ingestion pipeline completed successfully: {upload} in {:.1}s",
                elapsed.as_secs_f64()
            );
            Ok(PipelineSummary {
                fetch,
                extract,
                upload,
                elapsed,
            })
        }
        Err(e) => {
            log::error!("Pipeline failed: {e}");
            Err(e)
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run_steps<F>(
    config: &IngestConfig,
    collaborators: &Collaborators<'_>,
    upload_progress: F,
) -> Result<(FetchOutcome, ExtractOutcome, UploadStats), IngestError>
where
    F: FnOnce() -> Arc<dyn ProgressCallback>,
{
    let fetch = fetch_dataset(config, collaborators.downloader).await?;
    let extract = extract_archive(config, collaborators.extractor).await?;

    let progress = upload_progress();
    let upload = upload_directory(collaborators.store, config, &progress).await?;

    Ok((fetch, extract, upload))
}
