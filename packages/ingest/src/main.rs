#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the taxi data ingestion pipeline.
//!
//! Takes no pipeline flags: running it downloads the dataset from Kaggle,
//! extracts it into `raw/`, and uploads the CSVs to S3. Settings can be
//! overridden through `TAXI_INGEST_*` environment variables (see
//! [`IngestConfig::from_env`]).

use clap::Parser;
use taxi_ingest::{Collaborators, run_pipeline};
use taxi_ingest_archive::tool_for;
use taxi_ingest_cli_utils::IndicatifProgress;
use taxi_ingest_dataset::KaggleCli;
use taxi_ingest_models::IngestConfig;
use taxi_ingest_storage::S3Store;

#[derive(Parser)]
#[command(
    name = "taxi_ingest",
    version,
    about = "Download the NYC taxi dataset from Kaggle, extract it, and upload the CSVs to S3"
)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = taxi_ingest_cli_utils::init_logger();
    let _cli = Cli::parse();

    let config = IngestConfig::from_env()?;
    log::info!(
        "Ingesting {} -> s3://{}/{} ({})",
        config.dataset,
        config.bucket,
        config.key_prefix,
        config.region
    );

    let downloader = KaggleCli::default();
    let extractor = tool_for(config.extractor);
    let store = S3Store::from_config(&config).await;

    run_pipeline(
        &config,
        &Collaborators {
            downloader: &downloader,
            extractor: extractor.as_ref(),
            store: &store,
        },
        || IndicatifProgress::files_bar(&multi, "Uploading"),
    )
    .await?;

    Ok(())
}
