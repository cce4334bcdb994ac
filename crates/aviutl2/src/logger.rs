//! Host logger channel and the `tracing` bridge.
//!
//! [`init`] installs a [`HostLogLayer`] as the global `tracing` subscriber so
//! every `tracing` event emitted by the plugin (and by this SDK) ends up in
//! the host's log window at the matching level.

use std::ptr::NonNull;

use parking_lot::{RwLock, const_rwlock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use aviutl2_sys as sys;

use crate::wide::WideString;

/// Host log severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Plugin log at the default level.
    Log,
    /// Informational.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
    /// Verbose.
    Verbose,
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO => Self::Info,
            Level::DEBUG => Self::Log,
            _ => Self::Verbose,
        }
    }
}

/// Host-provided log sinks. Valid for the lifetime of the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHandle {
    raw: NonNull<sys::LogHandle>,
}

// SAFETY: the host keeps the handle alive for the whole plugin lifetime and
// its sinks may be called from any thread.
unsafe impl Send for LogHandle {}
// SAFETY: see above.
unsafe impl Sync for LogHandle {}

impl LogHandle {
    /// Wrap a raw handle. Returns `None` for NULL.
    ///
    /// # Safety
    ///
    /// `ptr` must be NULL or stay valid until the plugin is unloaded.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut sys::LogHandle) -> Option<Self> {
        NonNull::new(ptr).map(|raw| Self { raw })
    }

    /// Raw handle pointer.
    #[must_use]
    pub fn as_ptr(&self) -> *mut sys::LogHandle {
        self.raw.as_ptr()
    }

    /// Send `message` to the sink for `level`. Missing sinks are skipped.
    pub fn write(&self, level: LogLevel, message: &str) {
        // SAFETY: valid per the `from_raw` contract.
        let table = unsafe { self.raw.as_ref() };
        let sink = match level {
            LogLevel::Log => table.log,
            LogLevel::Info => table.info,
            LogLevel::Warn => table.warn,
            LogLevel::Error => table.error,
            LogLevel::Verbose => table.verbose,
        };
        let Some(sink) = sink else {
            return;
        };
        let wide = WideString::new(message);
        // SAFETY: handle and message are valid for the duration of the call.
        unsafe { sink(self.raw.as_ptr(), wide.as_ptr()) };
    }

    /// Plugin log.
    pub fn log(&self, message: &str) {
        self.write(LogLevel::Log, message);
    }

    /// Info log.
    pub fn info(&self, message: &str) {
        self.write(LogLevel::Info, message);
    }

    /// Warning log.
    pub fn warn(&self, message: &str) {
        self.write(LogLevel::Warn, message);
    }

    /// Error log.
    pub fn error(&self, message: &str) {
        self.write(LogLevel::Error, message);
    }

    /// Verbose log.
    pub fn verbose(&self, message: &str) {
        self.write(LogLevel::Verbose, message);
    }
}

static HOST_LOGGER: RwLock<Option<LogHandle>> = const_rwlock(None);

/// Logger handle received through `InitializeLogger`, if any.
#[must_use]
pub fn host_logger() -> Option<LogHandle> {
    *HOST_LOGGER.read()
}

/// `tracing` layer forwarding events to the host logger.
///
/// Levels map as `ERROR→error`, `WARN→warn`, `INFO→info`, `DEBUG→log`,
/// `TRACE→verbose`. Fields are appended as `key=value`.
#[derive(Debug, Clone, Copy)]
pub struct HostLogLayer {
    handle: Option<LogHandle>,
    max_level: LevelFilter,
}

impl HostLogLayer {
    /// Forward to a fixed handle.
    #[must_use]
    pub fn new(handle: LogHandle) -> Self {
        Self {
            handle: Some(handle),
            max_level: LevelFilter::TRACE,
        }
    }

    /// Forward to whichever handle [`init`] installed last.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: None,
            max_level: LevelFilter::TRACE,
        }
    }

    /// Drop events more verbose than `level`.
    #[must_use]
    pub fn with_max_level(mut self, level: LevelFilter) -> Self {
        self.max_level = level;
        self
    }
}

impl<S: Subscriber> Layer<S> for HostLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = event.metadata().level();
        if *level > self.max_level {
            return;
        }
        let Some(handle) = self.handle.or_else(host_logger) else {
            return;
        };
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        handle.write(LogLevel::from(level), &visitor.finish());
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.push_str(&format!(" {}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message.push_str(&format!("{value:?}"));
        } else {
            self.fields.push_str(&format!(" {}={value:?}", field.name()));
        }
    }
}

/// Remember `handle` and install the host layer as the global subscriber.
///
/// Returns `false` if a global subscriber was already installed; the handle
/// is still updated, so the existing layer follows it.
pub fn init(handle: LogHandle) -> bool {
    *HOST_LOGGER.write() = Some(handle);
    tracing_subscriber::registry()
        .with(HostLogLayer::current())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tracing_subscriber::layer::SubscriberExt;

    thread_local! {
        static CAPTURED: RefCell<Vec<(&'static str, String)>> = const { RefCell::new(Vec::new()) };
    }

    fn capture(level: &'static str, message: *const u16) {
        // SAFETY: the layer passes a live NUL-terminated string.
        let text = unsafe { crate::wide::read_wide_string(message) }.unwrap_or_default();
        CAPTURED.with(|c| c.borrow_mut().push((level, text)));
    }

    unsafe extern "C" fn sink_log(_: *mut sys::LogHandle, m: *const u16) {
        capture("log", m);
    }
    unsafe extern "C" fn sink_info(_: *mut sys::LogHandle, m: *const u16) {
        capture("info", m);
    }
    unsafe extern "C" fn sink_warn(_: *mut sys::LogHandle, m: *const u16) {
        capture("warn", m);
    }
    unsafe extern "C" fn sink_error(_: *mut sys::LogHandle, m: *const u16) {
        capture("error", m);
    }
    unsafe extern "C" fn sink_verbose(_: *mut sys::LogHandle, m: *const u16) {
        capture("verbose", m);
    }

    fn raw_handle() -> Box<sys::LogHandle> {
        Box::new(sys::LogHandle {
            log: Some(sink_log),
            info: Some(sink_info),
            warn: Some(sink_warn),
            error: Some(sink_error),
            verbose: Some(sink_verbose),
        })
    }

    fn take() -> Vec<(&'static str, String)> {
        CAPTURED.with(|c| std::mem::take(&mut *c.borrow_mut()))
    }

    #[test]
    fn test_direct_sinks() {
        let mut raw = raw_handle();
        // SAFETY: `raw` outlives the handle.
        let Some(handle) = (unsafe { LogHandle::from_raw(&mut *raw) }) else {
            return;
        };
        handle.info("hello");
        handle.verbose("detail");
        assert_eq!(
            take(),
            vec![("info", "hello".to_string()), ("verbose", "detail".to_string())]
        );
    }

    #[test]
    fn test_layer_level_mapping() {
        let mut raw = raw_handle();
        // SAFETY: `raw` outlives the handle.
        let Some(handle) = (unsafe { LogHandle::from_raw(&mut *raw) }) else {
            return;
        };
        let subscriber = tracing_subscriber::registry().with(HostLogLayer::new(handle));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("e");
            tracing::warn!("w");
            tracing::info!("i");
            tracing::debug!("d");
            tracing::trace!("t");
        });
        let levels: Vec<_> = take().into_iter().map(|(l, _)| l).collect();
        assert_eq!(levels, vec!["error", "warn", "info", "log", "verbose"]);
    }

    #[test]
    fn test_layer_formats_fields() {
        let mut raw = raw_handle();
        // SAFETY: `raw` outlives the handle.
        let Some(handle) = (unsafe { LogHandle::from_raw(&mut *raw) }) else {
            return;
        };
        let subscriber = tracing_subscriber::registry().with(HostLogLayer::new(handle));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(frame = 3, path = "a.wav", "opened");
        });
        assert_eq!(take(), vec![("info", "opened frame=3 path=a.wav".to_string())]);
    }

    #[test]
    fn test_max_level_filters() {
        let mut raw = raw_handle();
        // SAFETY: `raw` outlives the handle.
        let Some(handle) = (unsafe { LogHandle::from_raw(&mut *raw) }) else {
            return;
        };
        let layer = HostLogLayer::new(handle).with_max_level(LevelFilter::INFO);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden");
            tracing::warn!("shown");
        });
        assert_eq!(take(), vec![("warn", "shown".to_string())]);
    }

    #[test]
    fn test_null_handle_rejected() {
        // SAFETY: NULL is explicitly allowed.
        assert!(unsafe { LogHandle::from_raw(std::ptr::null_mut()) }.is_none());
    }
}
