//! Recording logger channel.
//!
//! The SDK keeps the handle for the life of the process and may log from any
//! thread, so records go to one global buffer.

use aviutl2::wide::read_wide;
use aviutl2_sys as sys;
use parking_lot::{Mutex, const_mutex};
use serde::Serialize;

use super::StaticTable;

/// Sink a record arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostLogLevel {
    /// `log`.
    Log,
    /// `info`.
    Info,
    /// `warn`.
    Warn,
    /// `error`.
    Error,
    /// `verbose`.
    Verbose,
}

/// One message received from a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Sink.
    pub level: HostLogLevel,
    /// Message text, truncated like the host does.
    pub message: String,
}

static RECORDS: Mutex<Vec<LogRecord>> = const_mutex(Vec::new());

fn push(level: HostLogLevel, message: *const u16) {
    // SAFETY: the plugin passes a NUL-terminated string valid for the call.
    let units = unsafe { read_wide(message) }.unwrap_or_default();
    let kept = units.get(..sys::MAX_LOG_MESSAGE_LEN).unwrap_or(units);
    let message = String::from_utf16_lossy(kept);
    RECORDS.lock().push(LogRecord { level, message });
}

unsafe extern "C" fn sink_log(_: *mut sys::LogHandle, message: *const u16) {
    push(HostLogLevel::Log, message);
}

unsafe extern "C" fn sink_info(_: *mut sys::LogHandle, message: *const u16) {
    push(HostLogLevel::Info, message);
}

unsafe extern "C" fn sink_warn(_: *mut sys::LogHandle, message: *const u16) {
    push(HostLogLevel::Warn, message);
}

unsafe extern "C" fn sink_error(_: *mut sys::LogHandle, message: *const u16) {
    push(HostLogLevel::Error, message);
}

unsafe extern "C" fn sink_verbose(_: *mut sys::LogHandle, message: *const u16) {
    push(HostLogLevel::Verbose, message);
}

/// Old edit-section log entry point; recorded at `log` level.
pub(crate) unsafe extern "C" fn deprecated_output_log(message: *const u16) {
    push(HostLogLevel::Log, message);
}

static HANDLE: StaticTable<sys::LogHandle> = StaticTable::new(sys::LogHandle {
    log: Some(sink_log),
    info: Some(sink_info),
    warn: Some(sink_warn),
    error: Some(sink_error),
    verbose: Some(sink_verbose),
});

/// Handle passed to `InitializeLogger`.
pub fn handle() -> *mut sys::LogHandle {
    HANDLE.as_ptr()
}

/// Copy of every record so far.
pub fn records() -> Vec<LogRecord> {
    RECORDS.lock().clone()
}

/// Remove and return every record.
pub fn drain() -> Vec<LogRecord> {
    std::mem::take(&mut *RECORDS.lock())
}

/// Number of records at `level`.
pub fn count(level: HostLogLevel) -> usize {
    RECORDS.lock().iter().filter(|r| r.level == level).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviutl2::WideString;

    #[test]
    fn test_sinks_record_level_and_text() {
        let message = WideString::new("conformance-logger-probe");
        // SAFETY: the static handle has every sink set.
        let table = unsafe { &*handle() };
        if let Some(warn) = table.warn {
            // SAFETY: live handle and NUL-terminated message.
            unsafe { warn(handle(), message.as_ptr()) };
        }
        assert!(records().iter().any(|r| {
            r.level == HostLogLevel::Warn && r.message == "conformance-logger-probe"
        }));
    }
}
