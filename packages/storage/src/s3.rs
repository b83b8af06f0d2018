//! AWS S3 implementation of [`ObjectStore`].

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use taxi_ingest_models::IngestConfig;

use crate::{BucketStatus, ObjectStore, StorageError};

/// S3 rejects an explicit location constraint for its default region.
const DEFAULT_S3_REGION: &str = "us-east-1";

/// Client for the pipeline's S3 operations.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Wraps an already configured SDK client.
    #[must_use]
    pub const fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Builds a client for `config.region` using the default AWS
    /// credential chain.
    ///
    /// When `config.endpoint_url` is set the client targets that endpoint
    /// with path-style addressing (`MinIO`, `LocalStack`).
    pub async fn from_config(config: &IngestConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            log::info!("Using S3 endpoint {endpoint}");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn probe_bucket(&self, bucket: &str) -> Result<BucketStatus, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(BucketStatus::Exists),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found)
                {
                    return Ok(BucketStatus::NotFound);
                }
                Err(StorageError::Probe {
                    bucket: bucket.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), StorageError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(constraint) = location_constraint(region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(CreateBucketError::is_bucket_already_owned_by_you) =>
            {
                log::warn!("Bucket {bucket} is already owned by this account");
                Ok(())
            }
            Err(err) => Err(StorageError::CreateBucket {
                bucket: bucket.to_string(),
                region: region.to_string(),
                source: Box::new(err),
            }),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> Result<u64, StorageError> {
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| StorageError::Io {
                path: local_path.display().to_string(),
                source: e,
            })?
            .len();

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type(local_path))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(size)
    }
}

/// Location constraint for a `CreateBucket` call in `region`, or `None`
/// for the default region.
fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    if region.is_empty() || region == DEFAULT_S3_REGION {
        None
    } else {
        Some(BucketLocationConstraint::from(region))
    }
}

/// MIME type for an uploaded file, keyed on its extension.
fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
