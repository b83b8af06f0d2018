#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Archive extraction for the taxi ingestion pipeline.
//!
//! [`extract_archive`] wipes any stale extraction directory and unpacks the
//! dataset archive into a fresh one. Incremental or merged extraction is not
//! supported: if the directory holds anything at all, the whole tree goes.
//!
//! Two [`ArchiveTool`] backends are provided: [`UnzipCli`] (shells out to
//! `unzip -o`) and [`NativeZip`] (in-process via the `zip` crate).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use taxi_ingest_models::{ExtractorKind, IngestConfig};

/// Errors from archive operations.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Archive file not found.
    #[error("Zip file {0} not found")]
    ArchiveNotFound(String),

    /// The extraction tool could not be started.
    #[error("Failed to run {program} (is it installed and on PATH?): {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The extraction tool exited unsuccessfully.
    #[error("{program} exited with {status} while extracting {archive}")]
    ToolFailed {
        /// Program that failed.
        program: String,
        /// Archive being extracted.
        archive: String,
        /// Exit status of the process.
        status: ExitStatus,
    },

    /// The archive could not be read by the `zip` crate.
    #[error("Invalid zip archive {path}: {source}")]
    Zip {
        /// Archive path.
        path: String,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },

    /// I/O error while cleaning or creating the extraction directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Capability to extract an archive into a directory, overwriting
/// existing files.
#[async_trait]
pub trait ArchiveTool: Send + Sync {
    /// Extracts `archive` into `dest_dir`, which already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if extraction fails.
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError>;
}

/// [`ArchiveTool`] backed by the `unzip` command.
#[derive(Debug, Clone)]
pub struct UnzipCli {
    program: PathBuf,
}

impl Default for UnzipCli {
    fn default() -> Self {
        Self::new("unzip")
    }
}

impl UnzipCli {
    /// Creates a backend that invokes `program` instead of `unzip`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to `unzip`: overwrite, source archive, destination.
    #[must_use]
    pub fn command_args(archive: &Path, dest_dir: &Path) -> Vec<OsString> {
        vec![
            "-o".into(),
            archive.as_os_str().to_os_string(),
            "-d".into(),
            dest_dir.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl ArchiveTool for UnzipCli {
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
        let program = self.program.display().to_string();

        let status = tokio::process::Command::new(&self.program)
            .args(Self::command_args(archive, dest_dir))
            .status()
            .await
            .map_err(|e| ExtractError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(ExtractError::ToolFailed {
                program,
                archive: archive.display().to_string(),
                status,
            });
        }

        Ok(())
    }
}

/// [`ArchiveTool`] that extracts in-process with the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeZip;

#[async_trait]
impl ArchiveTool for NativeZip {
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
        let archive = archive.to_path_buf();
        let dest_dir = dest_dir.to_path_buf();
        let path = archive.display().to_string();

        tokio::task::spawn_blocking(move || extract_zip_sync(&archive, &dest_dir))
            .await
            .map_err(|e| ExtractError::Io {
                path,
                source: std::io::Error::other(e),
            })?
    }
}

/// Synchronous zip extraction (runs in a blocking thread).
fn extract_zip_sync(archive: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let file = std::fs::File::open(archive).map_err(|e| ExtractError::Io {
        path: archive.display().to_string(),
        source: e,
    })?;

    let mut zip = zip::ZipArchive::new(file).map_err(|e| ExtractError::Zip {
        path: archive.display().to_string(),
        source: e,
    })?;

    zip.extract(dest_dir).map_err(|e| ExtractError::Zip {
        path: archive.display().to_string(),
        source: e,
    })
}

/// Returns the [`ArchiveTool`] selected by `kind`.
#[must_use]
pub fn tool_for(kind: ExtractorKind) -> Box<dyn ArchiveTool> {
    match kind {
        ExtractorKind::Unzip => Box::new(UnzipCli::default()),
        ExtractorKind::Native => Box::new(NativeZip),
    }
}

/// Summary of an extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOutcome {
    /// Entries found (and removed) in the stale extraction directory.
    pub removed_entries: u64,
    /// Files present in the directory after extraction.
    pub extracted_files: u64,
}

/// Extracts `config.archive_path` into a freshly recreated `config.raw_dir`.
///
/// The archive is checked first; when it is missing nothing on disk is
/// touched.
///
/// # Errors
///
/// Returns [`ExtractError::ArchiveNotFound`] if the archive is absent,
/// [`ExtractError::Io`] if the directory cannot be cleaned or created, and
/// the tool's error if extraction fails.
pub async fn extract_archive(
    config: &IngestConfig,
    tool: &dyn ArchiveTool,
) -> Result<ExtractOutcome, ExtractError> {
    let archive = &config.archive_path;
    let raw_dir = &config.raw_dir;

    if !archive.exists() {
        return Err(ExtractError::ArchiveNotFound(archive.display().to_string()));
    }

    let removed_entries = clear_dir(raw_dir)?;

    std::fs::create_dir_all(raw_dir).map_err(|e| io_err(raw_dir, e))?;

    log::info!("Extracting {} to {}", archive.display(), raw_dir.display());
    if let Err(e) = tool.extract(archive, raw_dir).await {
        log::error!("Failed to extract data: {e}");
        return Err(e);
    }

    let extracted_files = count_files(raw_dir).map_err(|e| io_err(raw_dir, e))?;
    log::info!("Extraction completed successfully ({extracted_files} files)");

    Ok(ExtractOutcome {
        removed_entries,
        extracted_files,
    })
}

/// Removes `dir` if it holds any entries; returns how many were found.
fn clear_dir(dir: &Path) -> Result<u64, ExtractError> {
    if !dir.exists() {
        return Ok(0);
    }

    let existing = count_entries(dir).map_err(|e| io_err(dir, e))?;
    if existing > 0 {
        log::info!(
            "Found {existing} existing files in {}, cleaning up...",
            dir.display()
        );
        std::fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))?;
        log::info!("Existing raw directory cleaned up");
    }

    Ok(existing)
}

/// Counts files and directories below `dir`, recursively.
fn count_entries(dir: &Path) -> std::io::Result<u64> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        count += 1;
        if entry.file_type()?.is_dir() {
            count += count_entries(&entry.path())?;
        }
    }
    Ok(count)
}

/// Counts regular files below `dir`, recursively.
fn count_files(dir: &Path) -> std::io::Result<u64> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            count += count_files(&entry.path())?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

fn io_err(path: &Path, source: std::io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.display().to_string(),
        source,
    }
}
