//! Per-file feedback from the CSV upload loop.
//!
//! The uploader announces how many taxi CSVs it found, names each file as it
//! goes out, and closes the indicator once the batch ends. `taxi_ingest`
//! renders this as a terminal bar; library callers can pass
//! [`null_progress`].

use std::sync::Arc;

/// Sink for upload-loop events.
///
/// Call order for one batch: `set_total` once with the number of matching
/// files, then `set_message` + `inc(1)` per uploaded file, then `finish` on
/// success or `finish_and_clear` when an upload fails.
pub trait ProgressCallback: Send + Sync {
    /// Number of files in the batch.
    fn set_total(&self, total: u64);

    /// `delta` more files uploaded.
    fn inc(&self, delta: u64);

    /// File currently being uploaded.
    fn set_message(&self, msg: String);

    /// Batch done; `msg` names the destination.
    fn finish(&self, msg: String);

    /// Batch aborted. Drop the indicator so the error log stays readable.
    fn finish_and_clear(&self);
}

/// Discards every event.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// [`NullProgress`] behind an `Arc`, ready to hand to the uploader.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
