#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Object storage for the taxi ingestion pipeline.
//!
//! Provides the [`ObjectStore`] seam, its S3 implementation ([`S3Store`]),
//! the bucket provisioner ([`provision::provision_bucket`]) and the CSV
//! uploader ([`upload::upload_directory`]).
//!
//! ## Bucket probing
//!
//! [`ObjectStore::probe_bucket`] returns a tagged [`BucketStatus`]. Only a
//! genuine `NotFound` leads to bucket creation; permission and transport
//! failures propagate as [`StorageError::Probe`].
//!
//! # Environment Variables
//!
//! Credentials come from the standard AWS provider chain
//! (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`, `~/.aws/credentials`,
//! SSO, instance metadata, ...). `TAXI_INGEST_ENDPOINT_URL` points the
//! client at an S3-compatible endpoint instead of AWS.

pub mod provision;
pub mod s3;
pub mod upload;

use std::path::Path;

use async_trait::async_trait;

pub use s3::S3Store;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// `HeadBucket` failed for a reason other than "not found".
    #[error("Failed to probe bucket {bucket}: {source}")]
    Probe {
        /// Bucket name.
        bucket: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `CreateBucket` failed.
    #[error("Failed to create bucket {bucket} in {region}: {source}")]
    CreateBucket {
        /// Bucket name.
        bucket: String,
        /// Requested region.
        region: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Extraction directory is missing.
    #[error("Raw directory {0} not found")]
    DirectoryNotFound(String),

    /// I/O error reading local files.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Outcome of a bucket existence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// The bucket exists and is reachable.
    Exists,
    /// The service reported the bucket does not exist.
    NotFound,
}

/// Operations the pipeline needs from an object storage service.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Checks whether `bucket` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Probe`] for any failure other than
    /// "not found".
    async fn probe_bucket(&self, bucket: &str) -> Result<BucketStatus, StorageError>;

    /// Creates `bucket` in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateBucket`] if the service rejects it.
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), StorageError>;

    /// Uploads the file at `local_path` to `bucket`/`key`, overwriting any
    /// existing object. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Upload`] on service failures and
    /// [`StorageError::Io`] if the local file cannot be read.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<u64, StorageError>;
}
