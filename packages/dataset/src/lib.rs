#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset fetcher for the taxi ingestion pipeline.
//!
//! Downloads the dataset archive through a [`DatasetDownloader`]. The
//! production backend is [`KaggleCli`], which shells out to
//! `kaggle datasets download`. Credentials are read by the Kaggle CLI itself
//! (`~/.kaggle/kaggle.json` or `KAGGLE_USERNAME` / `KAGGLE_KEY`).
//!
//! The fetch is skipped entirely when the archive already exists locally.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use taxi_ingest_models::IngestConfig;

/// Errors from dataset download operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The download tool could not be started (usually not installed).
    #[error("Failed to run {program} (is it installed and on PATH?): {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The download tool exited unsuccessfully.
    #[error("{program} exited with {status} while downloading {dataset}")]
    ToolFailed {
        /// Program that failed.
        program: String,
        /// Dataset being downloaded.
        dataset: String,
        /// Exit status of the process.
        status: ExitStatus,
    },

    /// The tool reported success but the archive was not produced.
    #[error("Download reported success but {path} was not created")]
    ArchiveMissing {
        /// Expected archive path.
        path: String,
    },

    /// I/O error while preparing the download directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Capability to fetch a dataset archive into a directory.
#[async_trait]
pub trait DatasetDownloader: Send + Sync {
    /// Downloads the archive for `dataset` into `dest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the download does not complete.
    async fn download(&self, dataset: &str, dest_dir: &Path) -> Result<(), FetchError>;
}

/// [`DatasetDownloader`] backed by the `kaggle` command-line tool.
#[derive(Debug, Clone)]
pub struct KaggleCli {
    program: PathBuf,
}

impl Default for KaggleCli {
    fn default() -> Self {
        Self::new("kaggle")
    }
}

impl KaggleCli {
    /// Creates a backend that invokes `program` instead of `kaggle`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to the Kaggle CLI for a download.
    #[must_use]
    pub fn command_args(dataset: &str, dest_dir: &Path) -> Vec<OsString> {
        vec![
            "datasets".into(),
            "download".into(),
            "-d".into(),
            dataset.into(),
            "-p".into(),
            dest_dir.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl DatasetDownloader for KaggleCli {
    async fn download(&self, dataset: &str, dest_dir: &Path) -> Result<(), FetchError> {
        let program = self.program.display().to_string();
        log::info!("Running {program} datasets download -d {dataset}");

        let status = tokio::process::Command::new(&self.program)
            .args(Self::command_args(dataset, dest_dir))
            .status()
            .await
            .map_err(|e| FetchError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(FetchError::ToolFailed {
                program,
                dataset: dataset.to_string(),
                status,
            });
        }

        Ok(())
    }
}

/// What [`fetch_dataset`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The archive was already present; nothing was run.
    Skipped,
    /// The archive was downloaded.
    Downloaded {
        /// Archive size in bytes.
        bytes: u64,
    },
}

/// Ensures the dataset archive exists at `config.archive_path`.
///
/// No-op if the archive is already present. Otherwise runs the downloader
/// into the archive's parent directory and checks that the archive appeared.
///
/// # Errors
///
/// Returns [`FetchError`] if the downloader fails or the archive is still
/// missing afterwards.
pub async fn fetch_dataset(
    config: &IngestConfig,
    downloader: &dyn DatasetDownloader,
) -> Result<FetchOutcome, FetchError> {
    let archive = &config.archive_path;

    if archive.exists() {
        log::info!(
            "File {} already exists, skipping download",
            archive.display()
        );
        return Ok(FetchOutcome::Skipped);
    }

    let dest_dir = download_dir(archive);
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| FetchError::Io {
            path: dest_dir.display().to_string(),
            source: e,
        })?;

    log::info!("Downloading dataset {}", config.dataset);
    if let Err(e) = downloader.download(&config.dataset, &dest_dir).await {
        log::error!("Failed to download dataset: {e}");
        return Err(e);
    }

    let Ok(meta) = tokio::fs::metadata(archive).await else {
        return Err(FetchError::ArchiveMissing {
            path: archive.display().to_string(),
        });
    };

    #[allow(clippy::cast_precision_loss)] // display-only MB value
    let mb = meta.len() as f64 / 1_048_576.0;
    log::info!("Download completed successfully ({mb:.1} MB)");

    Ok(FetchOutcome::Downloaded { bytes: meta.len() })
}

/// Directory the archive is downloaded into; the working directory when
/// the archive path has no parent component.
fn download_dir(archive: &Path) -> PathBuf {
    match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call; optionally writes the archive to simulate a
    /// successful download.
    struct StubDownloader {
        calls: Mutex<Vec<(String, PathBuf)>>,
        write_archive: Option<PathBuf>,
        fail: bool,
    }

    impl StubDownloader {
        fn new(write_archive: Option<PathBuf>, fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                write_archive,
                fail,
            }
        }

        fn calls(&self) -> Vec<(String, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatasetDownloader for StubDownloader {
        async fn download(&self, dataset: &str, dest_dir: &Path) -> Result<(), FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((dataset.to_string(), dest_dir.to_path_buf()));
            if self.fail {
                return Err(FetchError::Spawn {
                    program: "stub".to_string(),
                    source: std::io::Error::other("no credentials"),
                });
            }
            if let Some(path) = &self.write_archive {
                std::fs::write(path, b"PK fresh").unwrap();
            }
            Ok(())
        }
    }

    fn config_in(dir: &Path) -> IngestConfig {
        IngestConfig {
            archive_path: dir.join("trips.zip"),
            raw_dir: dir.join("raw"),
            ..IngestConfig::default()
        }
    }

    #[tokio::test]
    async fn skips_when_archive_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        std::fs::write(&config.archive_path, b"already here").unwrap();

        let stub = StubDownloader::new(Some(config.archive_path.clone()), false);
        let outcome = fetch_dataset(&config, &stub).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Skipped);
        assert!(stub.calls().is_empty());
        assert_eq!(std::fs::read(&config.archive_path).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn downloads_into_archive_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let stub = StubDownloader::new(Some(config.archive_path.clone()), false);
        let outcome = fetch_dataset(&config, &stub).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded { bytes: 8 });
        assert_eq!(
            stub.calls(),
            vec![(config.dataset.clone(), tmp.path().to_path_buf())]
        );
    }

    #[tokio::test]
    async fn missing_archive_after_success_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let stub = StubDownloader::new(None, false);
        let err = fetch_dataset(&config, &stub).await.unwrap_err();

        assert!(matches!(err, FetchError::ArchiveMissing { .. }));
    }

    #[tokio::test]
    async fn downloader_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());

        let stub = StubDownloader::new(None, true);
        let err = fetch_dataset(&config, &stub).await.unwrap_err();

        assert!(matches!(err, FetchError::Spawn { .. }));
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = KaggleCli::new("taxi-ingest-no-such-kaggle-binary");

        let err = cli.download("owner/slug", tmp.path()).await.unwrap_err();

        assert!(matches!(err, FetchError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_tool_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = KaggleCli::new("false");

        let err = cli.download("owner/slug", tmp.path()).await.unwrap_err();

        assert!(matches!(err, FetchError::ToolFailed { .. }));
    }

    #[test]
    fn kaggle_args_target_download_dir() {
        let args = KaggleCli::command_args("owner/slug", Path::new("/tmp/data"));
        assert_eq!(
            args,
            ["datasets", "download", "-d", "owner/slug", "-p", "/tmp/data"]
                .iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn bare_archive_name_downloads_into_working_dir() {
        assert_eq!(download_dir(Path::new("trips.zip")), PathBuf::from("."));
        assert_eq!(download_dir(Path::new("data/trips.zip")), PathBuf::from("data"));
    }
}
