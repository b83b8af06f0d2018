#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion configuration, progress, and result types.
//!
//! Every pipeline stage receives an [`IngestConfig`] explicitly instead of
//! reading process-wide constants, so tests can point the pipeline at a
//! temporary directory and a stub storage backend.
//!
//! # Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `TAXI_INGEST_DATASET` | `microize/newyork-yellow-taxi-trip-data-2020-2019` |
//! | `TAXI_INGEST_ARCHIVE` | `newyork-yellow-taxi-trip-data-2020-2019.zip` |
//! | `TAXI_INGEST_RAW_DIR` | `raw` |
//! | `TAXI_INGEST_BUCKET` | `taxi-demo-data-bucket` |
//! | `TAXI_INGEST_REGION` | `us-east-2` |
//! | `TAXI_INGEST_KEY_PREFIX` | `raw/` |
//! | `TAXI_INGEST_SUFFIX` | `.csv` |
//! | `TAXI_INGEST_EXTRACTOR` | `unzip` (or `native`) |
//! | `TAXI_INGEST_ENDPOINT_URL` | unset (AWS S3) |

pub mod progress;

use std::path::PathBuf;
use std::str::FromStr as _;

/// Kaggle dataset identifier (`owner/slug`) for the NYC yellow taxi trips.
pub const DEFAULT_DATASET: &str = "microize/newyork-yellow-taxi-trip-data-2020-2019";

/// Archive file name the Kaggle CLI produces for [`DEFAULT_DATASET`].
pub const DEFAULT_ARCHIVE: &str = "newyork-yellow-taxi-trip-data-2020-2019.zip";

/// Directory that receives the extracted archive contents.
pub const DEFAULT_RAW_DIR: &str = "raw";

/// Destination bucket name.
pub const DEFAULT_BUCKET: &str = "taxi-demo-data-bucket";

/// Region the bucket lives in (and is created in).
pub const DEFAULT_REGION: &str = "us-east-2";

/// Key prefix prepended to each uploaded file's base name.
pub const DEFAULT_KEY_PREFIX: &str = "raw/";

/// Only files ending with this suffix are uploaded.
pub const DEFAULT_SUFFIX: &str = ".csv";

/// Errors raised while building an [`IngestConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment override could not be interpreted.
    #[error("Invalid value for {name}: {value:?} ({message})")]
    InvalidValue {
        /// Environment variable name.
        name: String,
        /// Raw value that was rejected.
        value: String,
        /// Why it was rejected.
        message: String,
    },
}

/// Which backend extracts the downloaded archive.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::AsRefStr,
    strum::Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExtractorKind {
    /// Shell out to `unzip -o`.
    #[default]
    Unzip,
    /// Extract in-process with the `zip` crate.
    Native,
}

/// Configuration shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Dataset identifier passed to the download tool.
    pub dataset: String,
    /// Local path of the downloaded archive.
    pub archive_path: PathBuf,
    /// Extraction directory, wiped and recreated on every run.
    pub raw_dir: PathBuf,
    /// Destination bucket name.
    pub bucket: String,
    /// Bucket region.
    pub region: String,
    /// Key prefix for uploaded objects.
    pub key_prefix: String,
    /// File name suffix filter for uploads.
    pub suffix: String,
    /// Archive extraction backend.
    pub extractor: ExtractorKind,
    /// Custom S3-compatible endpoint (`MinIO`, `LocalStack`, ...).
    pub endpoint_url: Option<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            archive_path: PathBuf::from(DEFAULT_ARCHIVE),
            raw_dir: PathBuf::from(DEFAULT_RAW_DIR),
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            extractor: ExtractorKind::default(),
            endpoint_url: None,
        }
    }
}

impl IngestConfig {
    /// Builds a config from the defaults plus `TAXI_INGEST_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if an override is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from the defaults plus overrides resolved by
    /// `lookup`. Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if an override is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("TAXI_INGEST_DATASET") {
            config.dataset = v;
        }
        if let Some(v) = get("TAXI_INGEST_ARCHIVE") {
            config.archive_path = PathBuf::from(v);
        }
        if let Some(v) = get("TAXI_INGEST_RAW_DIR") {
            config.raw_dir = PathBuf::from(v);
        }
        if let Some(v) = get("TAXI_INGEST_BUCKET") {
            config.bucket = v;
        }
        if let Some(v) = get("TAXI_INGEST_REGION") {
            config.region = v;
        }
        if let Some(v) = get("TAXI_INGEST_KEY_PREFIX") {
            config.key_prefix = v;
        }
        if let Some(v) = get("TAXI_INGEST_SUFFIX") {
            config.suffix = v;
        }
        if let Some(v) = get("TAXI_INGEST_EXTRACTOR") {
            config.extractor =
                ExtractorKind::from_str(v.trim()).map_err(|e| ConfigError::InvalidValue {
                    name: "TAXI_INGEST_EXTRACTOR".to_string(),
                    message: format!("{e}; expected `unzip` or `native`"),
                    value: v,
                })?;
        }
        config.endpoint_url = get("TAXI_INGEST_ENDPOINT_URL");

        Ok(config)
    }

    /// Returns the remote key for a local file base name.
    #[must_use]
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}{file_name}", self.key_prefix)
    }
}

/// Result of an upload batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    /// Number of objects written.
    pub uploaded: u64,
    /// Total bytes written.
    pub bytes: u64,
}

impl UploadStats {
    /// Records one uploaded file of `size` bytes.
    pub const fn record(&mut self, size: u64) {
        self.uploaded += 1;
        self.bytes += size;
    }
}

impl std::fmt::Display for UploadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_precision_loss)] // display-only MB value
        let mb = self.bytes as f64 / 1_048_576.0;
        write!(f, "{} file(s) uploaded ({mb:.1} MB)", self.uploaded)
    }
}
