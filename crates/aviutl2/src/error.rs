//! Error types for the safe SDK.

use thiserror::Error;

/// Error type for SDK operations.
#[derive(Error, Debug)]
pub enum Aviutl2Error {
    /// A string passed to the host contains an interior NUL.
    #[error("String contains an interior NUL: {0}")]
    Nul(#[from] std::ffi::NulError),

    /// The host returned bytes that are not valid UTF-8.
    #[error("Host returned invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A buffer exceeds a host-imposed ceiling.
    #[error("Data too large: {size} bytes exceeds the {max} byte limit")]
    DataTooLarge {
        /// Size that was offered.
        size: usize,
        /// Maximum the host accepts.
        max: usize,
    },

    /// A buffer does not have the length the host expects.
    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch {
        /// Length required by the host.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// The host refused an edit section (output is running).
    #[error("Edit section unavailable while output is in progress")]
    EditUnavailable,

    /// An edit section was requested from inside an active edit section.
    #[error("Edit section requested from inside an active edit section")]
    ReentrantEditSection,

    /// A host call reported failure.
    #[error("Host operation failed: {0}")]
    OperationFailed(&'static str),

    /// A filter item declaration is invalid.
    #[error("Invalid filter item {name:?}: {reason}")]
    InvalidFilterItem {
        /// Item name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The plugin singleton has not been created yet (or was torn down).
    #[error("Plugin is not initialized")]
    NotInitialized,

    /// The host table lacks a function this call needs.
    #[error("Host does not provide {0}")]
    Unsupported(&'static str),

    /// JSON encoding or decoding of a project value failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by plugin code.
    #[error("Plugin error: {0}")]
    Plugin(String),
}

impl Aviutl2Error {
    /// Check whether the caller may retry the same call later.
    ///
    /// Only edit availability is transient; it returns once output ends.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EditUnavailable)
    }
}

/// Result type for SDK operations.
pub type Result<T, E = Aviutl2Error> = std::result::Result<T, E>;

/// Result type returned by plugin trait methods.
pub type AnyResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
