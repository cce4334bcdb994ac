//! Error types for the conformance harness.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for harness operations.
#[derive(Error, Debug)]
pub enum ConformanceError {
    /// The plugin library could not be loaded.
    #[error("Library loading error: {0}")]
    Library(#[from] libloading::Error),

    /// The library exports no table getter and no `RegisterPlugin`.
    #[error("No plugin entry point found in {path}")]
    NoEntryPoint {
        /// Library path.
        path: PathBuf,
    },

    /// The plugin needs a newer host than the one being simulated.
    #[error("Plugin requires host version {required}, harness simulates {host}")]
    VersionTooOld {
        /// Version reported by `RequiredVersion`.
        required: u32,
        /// Simulated host version.
        host: u32,
    },

    /// `InitializePlugin` returned false.
    #[error("InitializePlugin returned false")]
    InitializationFailed,

    /// A host-side contract was broken by the harness's own caller.
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Reading a configuration file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An input file path is not valid for the host string encoding.
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    /// One or more checks failed.
    #[error("{failed} of {total} conformance checks failed")]
    ChecksFailed {
        /// Number of failed checks.
        failed: usize,
        /// Number of checks run.
        total: usize,
    },
}

/// Result type for harness operations.
pub type Result<T, E = ConformanceError> = std::result::Result<T, E>;
