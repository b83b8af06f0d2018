//! Uploads extracted files to the bucket.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use taxi_ingest_models::progress::ProgressCallback;
use taxi_ingest_models::{IngestConfig, UploadStats};

use crate::provision::provision_bucket;
use crate::{ObjectStore, StorageError};

/// Uploads every file under `config.raw_dir` whose name ends with
/// `config.suffix` to `config.bucket`, keyed `key_prefix + file name`.
///
/// Provisions the bucket first. Files are uploaded one at a time in path
/// order and the first failure aborts the rest.
///
/// Each file goes out as a single `PutObject`, so a file larger than 5 GB
/// is rejected by S3 and fails the batch. Multipart upload is not used.
///
/// # Errors
///
/// Returns [`StorageError::DirectoryNotFound`] if the extraction directory
/// is missing, otherwise the first provisioning or upload error.
pub async fn upload_directory(
    store: &dyn ObjectStore,
    config: &IngestConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<UploadStats, StorageError> {
    let raw_dir = &config.raw_dir;
    if !raw_dir.is_dir() {
        return Err(StorageError::DirectoryNotFound(
            raw_dir.display().to_string(),
        ));
    }

    let bucket = provision_bucket(store, config).await?;

    let files = collect_files(raw_dir, &config.suffix).map_err(|e| StorageError::Io {
        path: raw_dir.display().to_string(),
        source: e,
    })?;
    log::info!(
        "Found {} {} files to upload",
        files.len(),
        config.suffix.trim_start_matches('.').to_uppercase()
    );

    progress.set_total(files.len() as u64);

    let mut stats = UploadStats::default();
    for path in &files {
        let name = file_name(path);
        let key = config.object_key(&name);
        progress.set_message(name);

        match bucket.put(&key, path).await {
            Ok(size) => {
                log::info!("Uploaded {key}");
                stats.record(size);
                progress.inc(1);
            }
            Err(e) => {
                log::error!("Failed to upload {key}: {e}");
                progress.finish_and_clear();
                return Err(e);
            }
        }
    }

    progress.finish(format!("Uploaded to s3://{}", bucket.name()));
    Ok(stats)
}

/// Recursively lists files under `dir` whose names end with `suffix`,
/// sorted by path.
///
/// # Errors
///
/// Returns an I/O error if a directory cannot be read.
pub fn collect_files(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(dir, suffix, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, suffix, out)?;
        } else if file_name(&path).ends_with(suffix) {
            out.push(path);
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::testing::{Call, RecordingStore};
    use taxi_ingest_models::progress::null_progress;

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl EventLog {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ProgressCallback for EventLog {
        fn set_total(&self, total: u64) {
            self.push(format!("total {total}"));
        }
        fn inc(&self, delta: u64) {
            self.push(format!("inc {delta}"));
        }
        fn set_message(&self, msg: String) {
            self.push(format!("file {msg}"));
        }
        fn finish(&self, msg: String) {
            self.push(format!("finish {msg}"));
        }
        fn finish_and_clear(&self) {
            self.push("clear".to_string());
        }
    }

    fn config_in(dir: &Path) -> IngestConfig {
        IngestConfig {
            archive_path: dir.join("trips.zip"),
            raw_dir: dir.join("raw"),
            ..IngestConfig::default()
        }
    }

    fn populate(raw_dir: &Path, files: &[&str]) {
        for file in files {
            let path = raw_dir.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "vendor_id,fare\n1,9.5\n").unwrap();
        }
    }

    #[tokio::test]
    async fn uploads_only_matching_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        populate(&config.raw_dir, &["a.csv", "b.csv", "notes.txt"]);

        let store = RecordingStore::new(true);
        let stats = upload_directory(&store, &config, &null_progress())
            .await
            .unwrap();

        assert_eq!(store.put_keys(), vec!["raw/a.csv", "raw/b.csv"]);
        assert_eq!(stats.uploaded, 2);
        assert!(
            store
                .calls()
                .iter()
                .all(|c| !matches!(c, Call::Put(_, _, p) if p.ends_with("notes.txt")))
        );
    }

    #[tokio::test]
    async fn nested_files_are_keyed_by_base_name() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        populate(&config.raw_dir, &["2019/yellow_2019.csv", "2020/yellow_2020.csv"]);

        let store = RecordingStore::new(true);
        upload_directory(&store, &config, &null_progress())
            .await
            .unwrap();

        assert_eq!(
            store.put_keys(),
            vec!["raw/yellow_2019.csv", "raw/yellow_2020.csv"]
        );
    }

    #[tokio::test]
    async fn provisions_bucket_before_uploading() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        populate(&config.raw_dir, &["a.csv"]);

        let store = RecordingStore::new(false);
        upload_directory(&store, &config, &null_progress())
            .await
            .unwrap();

        let calls = store.calls();
        assert!(matches!(calls[0], Call::Probe(_)));
        assert!(matches!(calls[1], Call::Create(..)));
        assert!(matches!(calls[2], Call::Put(..)));
    }

    #[tokio::test]
    async fn failed_upload_aborts_remaining_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        populate(&config.raw_dir, &["a.csv", "b.csv", "c.csv"]);

        let mut store = RecordingStore::new(true);
        store.fail_put_at = Some(2);
        let err = upload_directory(&store, &config, &null_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Upload { ref key, .. } if key == "raw/b.csv"));
        assert_eq!(store.put_keys(), vec!["raw/a.csv", "raw/b.csv"]);
    }

    #[tokio::test]
    async fn progress_follows_each_uploaded_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        populate(&config.raw_dir, &["a.csv", "b.csv"]);

        let recorder = Arc::new(EventLog::default());
        let progress: Arc<dyn ProgressCallback> = recorder.clone();
        upload_directory(&RecordingStore::new(true), &config, &progress)
            .await
            .unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                "total 2",
                "file a.csv",
                "inc 1",
                "file b.csv",
                "inc 1",
                "finish Uploaded to s3://taxi-demo-data-bucket",
            ]
        );
    }

    #[tokio::test]
    async fn progress_is_cleared_when_an_upload_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        populate(&config.raw_dir, &["a.csv", "b.csv"]);

        let mut store = RecordingStore::new(true);
        store.fail_put_at = Some(1);
        let recorder = Arc::new(EventLog::default());
        let progress: Arc<dyn ProgressCallback> = recorder.clone();
        upload_directory(&store, &config, &progress)
            .await
            .unwrap_err();

        assert_eq!(recorder.events(), vec!["total 2", "file a.csv", "clear"]);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal_before_any_remote_call() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let store = RecordingStore::new(true);
        let err = upload_directory(&store, &config, &null_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DirectoryNotFound(_)));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn collect_files_is_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        populate(tmp.path(), &["z.csv", "m/b.csv", "a.csv", "readme.md"]);

        let files = collect_files(tmp.path(), ".csv").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();

        assert_eq!(names, vec!["a.csv", "b.csv", "z.csv"]);
    }
}
