//! Pipeline result types.
//!
//! Contains types for representing the outcome of pipeline runs. Failures
//! are recorded per input file so one broken source never hides the rest of
//! the batch.

use std::path::PathBuf;
use std::time::Duration;

/// Status of a single input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// File built successfully
    Built,
    /// File skipped (dry run)
    Skipped,
    /// File failed with error
    Failed(String),
}

impl FileStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, FileStatus::Built | FileStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, FileStatus::Failed(_))
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileStatus::Built => write!(f, "built"),
            FileStatus::Skipped => write!(f, "skipped"),
            FileStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of processing a single input file (or bundle).
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Input path that was processed
    pub input: PathBuf,
    /// Outcome
    pub status: FileStatus,
    /// Output files written
    pub outputs: Vec<PathBuf>,
    /// Processing duration
    pub duration: Duration,
}

impl FileResult {
    /// Create a successful result.
    pub fn built(input: PathBuf, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { input, status: FileStatus::Built, outputs, duration }
    }

    /// Create a skipped (dry run) result with the outputs that would be written.
    pub fn skipped(input: PathBuf, outputs: Vec<PathBuf>) -> Self {
        Self { input, status: FileStatus::Skipped, outputs, duration: Duration::ZERO }
    }

    /// Create a failed result.
    pub fn failed(input: PathBuf, error: String, duration: Duration) -> Self {
        Self { input, status: FileStatus::Failed(error), outputs: vec![], duration }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Default)]
pub struct TaskResult {
    /// Name of the pipeline that ran
    pub pipeline: String,
    /// Per-file results
    pub files: Vec<FileResult>,
    /// Total run duration
    pub total_duration: Duration,
}

impl TaskResult {
    /// Create a new empty result for a pipeline.
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self { pipeline: pipeline.into(), files: vec![], total_duration: Duration::ZERO }
    }

    /// Add a file result.
    pub fn add(&mut self, result: FileResult) {
        self.files.push(result);
    }

    /// Whether every file in the run succeeded.
    pub fn is_success(&self) -> bool {
        self.files.iter().all(FileResult::is_success)
    }

    /// Number of failed files.
    pub fn error_count(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_failure()).count()
    }

    /// Number of built files.
    pub fn built_count(&self) -> usize {
        self.files.iter().filter(|f| f.status == FileStatus::Built).count()
    }

    /// Iterate over failed inputs with their error messages.
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.files.iter().filter_map(|f| match &f.status {
            FileStatus::Failed(err) => Some((&f.input, err.as_str())),
            _ => None,
        })
    }

    /// All output files written during the run.
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().flat_map(|f| f.outputs.iter())
    }
}
