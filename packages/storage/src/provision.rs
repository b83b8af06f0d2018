//! Bucket provisioning.

use std::path::Path;

use taxi_ingest_models::IngestConfig;

use crate::{BucketStatus, ObjectStore, StorageError};

/// A bucket known to exist, bound to the store that owns it.
pub struct Bucket<'a> {
    store: &'a dyn ObjectStore,
    name: String,
}

impl Bucket<'_> {
    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uploads `local_path` to `key` in this bucket.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`StorageError`].
    pub async fn put(&self, key: &str, local_path: &Path) -> Result<u64, StorageError> {
        self.store.put_object(&self.name, key, local_path).await
    }
}

/// Ensures `config.bucket` exists, creating it in `config.region` only when
/// the probe reports [`BucketStatus::NotFound`].
///
/// # Errors
///
/// Returns [`StorageError::Probe`] if the probe fails for another reason
/// and [`StorageError::CreateBucket`] if creation fails. Neither is retried.
pub async fn provision_bucket<'a>(
    store: &'a dyn ObjectStore,
    config: &IngestConfig,
) -> Result<Bucket<'a>, StorageError> {
    let name = config.bucket.clone();

    match store.probe_bucket(&name).await? {
        BucketStatus::Exists => {
            log::info!("Bucket {name} already exists");
        }
        BucketStatus::NotFound => {
            log::info!("Creating bucket {name} in region {}", config.region);
            store.create_bucket(&name, &config.region).await?;
            log::info!(
                "Bucket {name} created successfully in {}",
                config.region
            );
        }
    }

    Ok(Bucket { store, name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingStore};

    #[tokio::test]
    async fn existing_bucket_is_reused() {
        let store = RecordingStore::new(true);
        let config = IngestConfig::default();

        provision_bucket(&store, &config).await.unwrap();
        provision_bucket(&store, &config).await.unwrap();

        assert_eq!(store.creates(), 0);
        assert_eq!(
            store.calls(),
            vec![
                Call::Probe("taxi-demo-data-bucket".to_string()),
                Call::Probe("taxi-demo-data-bucket".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_bucket_is_created_once_in_region() {
        let store = RecordingStore::new(false);
        let config = IngestConfig::default();

        let bucket = provision_bucket(&store, &config).await.unwrap();
        assert_eq!(bucket.name(), "taxi-demo-data-bucket");
        provision_bucket(&store, &config).await.unwrap();

        assert_eq!(store.creates(), 1);
        assert!(store.calls().contains(&Call::Create(
            "taxi-demo-data-bucket".to_string(),
            "us-east-2".to_string()
        )));
    }

    #[tokio::test]
    async fn probe_failure_does_not_create() {
        let mut store = RecordingStore::new(false);
        store.probe_fails = true;

        let err = provision_bucket(&store, &IngestConfig::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, StorageError::Probe { .. }));
        assert_eq!(store.creates(), 0);
    }
}
