//! Host logger channel (`aviutl2_log_handle`).
//!
//! Any plugin may export `InitializeLogger(struct aviutl2_log_handle *)`;
//! the host calls it before `InitializePlugin`.

use crate::WChar;

/// One severity-tagged log sink.
pub type LogFn = unsafe extern "C" fn(logger: *mut LogHandle, message: *const WChar);

/// Host-provided table of log sinks.
///
/// Messages are NUL-terminated UTF-16, at most
/// [`crate::MAX_LOG_MESSAGE_LEN`] code units; the host truncates longer ones.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LogHandle {
    /// Plugin log at the default level.
    pub log: Option<LogFn>,
    /// Info level.
    pub info: Option<LogFn>,
    /// Warning level.
    pub warn: Option<LogFn>,
    /// Error level.
    pub error: Option<LogFn>,
    /// Verbose level.
    pub verbose: Option<LogFn>,
}

#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<LogHandle>(), 40);
