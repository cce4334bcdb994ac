//! Plugin-wide state shared by every module kind.
//!
//! The host hands out raw tables and calls back through bare `extern "C"`
//! functions without a context pointer, so the state behind those callbacks
//! lives in a process-wide registry keyed by type. Each module kind stores
//! one state value per plugin type; the trampolines clone an `Arc` out of the
//! registry and release the lock before running plugin code.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, const_mutex, const_rwlock};

use crate::config::{self, ConfigHandle};
use crate::error::{Aviutl2Error, Result};
use crate::wide::WideString;

/// Information the host passes to `InitializePlugin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInfo {
    /// Host application version number.
    pub version: u32,
}

impl HostInfo {
    /// Create host information for `version`.
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    /// Configuration channel, if the host called `InitializeConfig`.
    #[must_use]
    pub fn config(&self) -> Option<ConfigHandle> {
        config::global()
    }
}

/// One entry of an open/save dialog filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    /// Label shown in the dialog.
    pub name: String,
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
}

impl FileFilter {
    /// Create a filter entry.
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
        }
    }

    /// Encode as the double-NUL terminated pair list the host expects:
    /// `"Name (*.a;*.b)\0*.a;*.b\0...\0"`.
    #[must_use]
    pub fn encode(filters: &[FileFilter]) -> WideString {
        let mut out = String::new();
        for filter in filters {
            let pattern = if filter.extensions.is_empty() {
                "*.*".to_string()
            } else {
                filter
                    .extensions
                    .iter()
                    .map(|e| format!("*.{e}"))
                    .collect::<Vec<_>>()
                    .join(";")
            };
            out.push_str(&format!("{} ({pattern})\0{pattern}\0", filter.name));
        }
        WideString::new(&out)
    }
}

/// Heap value with a stable address that the host may read and write.
///
/// The pointer is derived from `Box::leak`, so writes through
/// [`RawBox::as_ptr`] are permitted.
pub(crate) struct RawBox<T> {
    ptr: NonNull<T>,
}

impl<T> RawBox<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(value))),
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Copy the current value, including host writes.
    pub(crate) fn get(&self) -> T
    where
        T: Copy,
    {
        // SAFETY: the allocation is live until drop; volatile so host writes
        // made between calls are observed.
        unsafe { std::ptr::read_volatile(self.ptr.as_ptr()) }
    }
}

impl<T> Drop for RawBox<T> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `Box::leak` and is dropped exactly once.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

// SAFETY: a RawBox owns its allocation like a Box. The raw pointers inside
// host tables point into buffers owned by the same state value and are never
// mutated by Rust after construction.
unsafe impl<T> Send for RawBox<T> {}
// SAFETY: see above; shared access only reads.
unsafe impl<T> Sync for RawBox<T> {}

type Slot = Arc<dyn Any + Send + Sync>;

static STATES: RwLock<Option<HashMap<TypeId, Slot>>> = const_rwlock(None);
static RETAINED: Mutex<Vec<WideString>> = const_mutex(Vec::new());

/// Store the state of one plugin type. Fails if the type already has one.
pub(crate) fn install<S: Any + Send + Sync>(state: S) -> Result<Arc<S>> {
    let state = Arc::new(state);
    let slot: Slot = state.clone();
    let mut states = STATES.write();
    let map = states.get_or_insert_with(HashMap::new);
    if map.contains_key(&TypeId::of::<S>()) {
        return Err(Aviutl2Error::OperationFailed("plugin type registered twice"));
    }
    map.insert(TypeId::of::<S>(), slot);
    Ok(state)
}

/// Fetch the state of one plugin type.
pub(crate) fn state<S: Any + Send + Sync>() -> Result<Arc<S>> {
    let slot = STATES
        .read()
        .as_ref()
        .and_then(|map| map.get(&TypeId::of::<S>()).cloned())
        .ok_or(Aviutl2Error::NotInitialized)?;
    slot.downcast::<S>().ok().ok_or(Aviutl2Error::NotInitialized)
}

/// Whether any plugin state is installed.
#[must_use]
pub fn is_initialized() -> bool {
    STATES.read().as_ref().is_some_and(|map| !map.is_empty())
}

/// Keep a wide string alive until the plugin is unloaded and return its
/// address.
pub(crate) fn retain(s: WideString) -> *const u16 {
    let ptr = s.as_ptr();
    RETAINED.lock().push(s);
    ptr
}

/// Drop every installed state and retained string.
pub(crate) fn clear() {
    let states = STATES.write().take();
    let count = states.as_ref().map_or(0, HashMap::len);
    drop(states);
    RETAINED.lock().clear();
    if count > 0 {
        tracing::debug!(count, "released plugin state");
    }
}

/// Body of `InitializeLogger`: route `tracing` events to the host log.
///
/// # Safety
///
/// `handle` must be the pointer the host passed to `InitializeLogger`.
#[doc(hidden)]
pub unsafe fn __initialize_logger(handle: *mut aviutl2_sys::LogHandle) {
    // SAFETY: forwarded caller contract.
    let Some(handle) = (unsafe { crate::logger::LogHandle::from_raw(handle) }) else {
        return;
    };
    if !crate::logger::init(handle) {
        tracing::debug!("global subscriber already set; host logging limited to LogHandle");
    }
}

/// Body of `InitializeConfig`.
///
/// # Safety
///
/// `handle` must be the pointer the host passed to `InitializeConfig`.
#[doc(hidden)]
pub unsafe fn __initialize_config(handle: *mut aviutl2_sys::ConfigHandle) {
    // SAFETY: forwarded caller contract.
    if let Some(handle) = unsafe { ConfigHandle::from_raw(handle) } {
        config::set_global(handle);
    }
}

/// Body of `UninitializePlugin`.
#[doc(hidden)]
pub fn __uninitialize() {
    guard("UninitializePlugin", (), clear);
}

/// Serializes unit tests that touch the process-wide registry.
#[cfg(test)]
pub(crate) static TEST_LOCK: Mutex<()> = const_mutex(());

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run plugin code so that a panic never unwinds into the host.
///
/// On panic the event is logged and `fallback` is returned.
#[doc(hidden)]
pub fn guard<R>(callback: &'static str, fallback: R, f: impl FnOnce() -> R) -> R {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            tracing::error!(
                callback,
                panic = %panic_message(payload.as_ref()),
                "plugin panicked inside a host callback"
            );
            fallback
        }
    }
}

/// Log a plugin error surfaced at the ABI boundary.
pub(crate) fn report(callback: &'static str, err: &dyn std::fmt::Display) {
    tracing::error!(callback, error = %err, "plugin callback failed");
}

/// Convert a non-negative host integer to `usize`, clamping negatives to 0.
pub(crate) fn to_usize(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Convert a length to the host's `int`, saturating.
pub(crate) fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_filter_encoding() {
        let filters = [
            FileFilter::new("Wave", &["wav"]),
            FileFilter::new("Any", &[]),
        ];
        let encoded = FileFilter::encode(&filters).to_string_lossy();
        assert_eq!(encoded, "Wave (*.wav)\0*.wav\0Any (*.*)\0*.*\0");
    }

    #[test]
    fn test_file_filter_multiple_extensions() {
        let encoded = FileFilter::encode(&[FileFilter::new("Image", &["png", "bmp"])]);
        assert_eq!(
            encoded.to_string_lossy(),
            "Image (*.png;*.bmp)\0*.png;*.bmp\0"
        );
    }

    #[test]
    fn test_guard_catches_panic() {
        let value = guard("test", -1, || -> i32 { std::panic::panic_any("boom") });
        assert_eq!(value, -1);
        assert_eq!(guard("test", -1, || 7), 7);
    }

    #[test]
    fn test_raw_box_observes_writes() {
        let boxed = RawBox::new(1i32);
        // SAFETY: the pointer is live and uniquely used here.
        unsafe { boxed.as_ptr().write(5) };
        assert_eq!(boxed.get(), 5);
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(to_usize(-3), 0);
        assert_eq!(to_usize(12), 12);
        assert_eq!(to_i32(usize::MAX), i32::MAX);
    }
}
