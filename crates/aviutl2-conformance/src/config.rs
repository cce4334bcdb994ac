//! Harness configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConformanceError, Result};

/// Host version reported to plugins unless configured otherwise.
pub const DEFAULT_HOST_VERSION: u32 = 2_003_000;

/// Configuration for a conformance run.
///
/// Missing fields in a JSON file take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformanceConfig {
    /// Version passed to `InitializePlugin`.
    pub host_version: u32,
    /// Files opened by the input checks.
    pub input_files: Vec<PathBuf>,
    /// Threads used by the concurrent read check.
    pub concurrent_threads: usize,
    /// Frames read by each thread.
    pub reads_per_thread: usize,
    /// Frames in the simulated output job.
    pub output_frames: usize,
    /// The simulated user aborts the output job after this many polls.
    pub abort_after_frames: usize,
    /// Treat conformance gaps and skipped checks as failures.
    pub strict: bool,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            host_version: DEFAULT_HOST_VERSION,
            input_files: Vec::new(),
            concurrent_threads: 4,
            reads_per_thread: 16,
            output_frames: 60,
            abort_after_frames: 10,
            strict: false,
        }
    }
}

impl ConformanceConfig {
    /// Stricter run: more threads and reads, gaps fail.
    pub fn strict() -> Self {
        Self {
            concurrent_threads: 8,
            reads_per_thread: 64,
            output_frames: 240,
            strict: true,
            ..Self::default()
        }
    }

    /// Fast smoke run.
    pub fn quick() -> Self {
        Self {
            concurrent_threads: 2,
            reads_per_thread: 4,
            output_frames: 8,
            abort_after_frames: 3,
            ..Self::default()
        }
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConformanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write as pretty JSON.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConformanceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add an input file.
    #[must_use]
    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_files.push(path.into());
        self
    }
}
