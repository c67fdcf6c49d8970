//! Durable output for batch results.

use std::path::{Path, PathBuf};

use super::error::{BatchError, BatchResult};
use super::record::PackageRecord;
use super::summary::RunSummary;

/// Name of the consolidated results file.
pub const CONSOLIDATED_FILE: &str = "matched_packages.json";
/// Name of the run summary file.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Destination for completed batches.
///
/// A batch handed to [`write_batch`](Self::write_batch) must be durable
/// when the call returns; later failures never touch it.
pub trait BatchSink {
    /// Persist the annotated records of batch `batch` (1-based).
    fn write_batch(&mut self, batch: usize, records: &[PackageRecord]) -> BatchResult<()>;

    /// A previously persisted batch, if one exists.
    fn load_batch(&mut self, batch: usize) -> BatchResult<Option<Vec<PackageRecord>>>;

    /// Persist all records of the run.
    fn write_consolidated(&mut self, records: &[PackageRecord]) -> BatchResult<()>;

    fn write_summary(&mut self, summary: &RunSummary) -> BatchResult<()>;
}

impl<S: BatchSink + ?Sized> BatchSink for &mut S {
    fn write_batch(&mut self, batch: usize, records: &[PackageRecord]) -> BatchResult<()> {
        (**self).write_batch(batch, records)
    }

    fn load_batch(&mut self, batch: usize) -> BatchResult<Option<Vec<PackageRecord>>> {
        (**self).load_batch(batch)
    }

    fn write_consolidated(&mut self, records: &[PackageRecord]) -> BatchResult<()> {
        (**self).write_consolidated(records)
    }

    fn write_summary(&mut self, summary: &RunSummary) -> BatchResult<()> {
        (**self).write_summary(summary)
    }
}

/// Writes pretty-printed JSON files into a directory:
/// `{prefix}batch_{n}_results.json`, `{prefix}matched_packages.json` and
/// `{prefix}run_summary.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
    prefix: String,
}

impl JsonDirSink {
    /// Create the output directory if needed.
    pub fn create(dir: &Path) -> BatchResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| BatchError::Persist {
            path: dir.display().to_string(),
            source: e,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: String::new(),
        })
    }

    /// The same directory with a file-name prefix, used to keep passes of
    /// an iterative run apart.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self {
            dir: self.dir.clone(),
            prefix: prefix.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn batch_path(&self, batch: usize) -> PathBuf {
        self.dir
            .join(format!("{}batch_{batch}_results.json", self.prefix))
    }

    pub fn consolidated_path(&self) -> PathBuf {
        self.dir.join(format!("{}{CONSOLIDATED_FILE}", self.prefix))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("{}{SUMMARY_FILE}", self.prefix))
    }
}

impl BatchSink for JsonDirSink {
    fn write_batch(&mut self, batch: usize, records: &[PackageRecord]) -> BatchResult<()> {
        write_json_atomic(&self.batch_path(batch), records)
    }

    fn load_batch(&mut self, batch: usize) -> BatchResult<Option<Vec<PackageRecord>>> {
        let path = self.batch_path(batch);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).map_err(|e| BatchError::Persist {
            path: path.display().to_string(),
            source: e,
        })?;
        match serde_json::from_str(&data) {
            Ok(records) => Ok(Some(records)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable batch file, recomputing"
                );
                Ok(None)
            }
        }
    }

    fn write_consolidated(&mut self, records: &[PackageRecord]) -> BatchResult<()> {
        write_json_atomic(&self.consolidated_path(), records)
    }

    fn write_summary(&mut self, summary: &RunSummary) -> BatchResult<()> {
        write_json_atomic(&self.summary_path(), summary)
    }
}

/// Serialize to a sibling temp file and rename it over `path`, so readers
/// see either the old file or the complete new one.
pub fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> BatchResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| BatchError::Serialize {
        what: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, json).map_err(|e| BatchError::Persist {
        path: tmp.display().to_string(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| BatchError::Persist {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "wrote results");
    Ok(())
}
