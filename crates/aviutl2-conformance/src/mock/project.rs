//! Project file store.
//!
//! Binary values larger than [`sys::MAX_PROJECT_BINARY_SIZE`] are dropped
//! and counted, like the host drops them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::{CString, c_char, c_void};

use aviutl2::wide::read_c_str;
use aviutl2_sys as sys;

use super::to_usize;

/// Values stored by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectStore {
    strings: BTreeMap<String, CString>,
    binaries: BTreeMap<String, Vec<u8>>,
    /// Strings replaced during the current call; kept so pointers handed
    /// out earlier in the call stay valid.
    retired: Vec<CString>,
    /// `set_param_binary` calls rejected for size.
    pub rejected_binaries: usize,
    /// Largest binary size a plugin tried to store.
    pub largest_binary_attempt: usize,
}

impl ProjectStore {
    /// Stored string.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.strings.get(key).and_then(|v| v.to_str().ok())
    }

    /// Stored binary.
    pub fn binary(&self, key: &str) -> Option<&[u8]> {
        self.binaries.get(key).map(Vec::as_slice)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.strings.len() + self.binaries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a string directly, as if loaded from a project file.
    pub fn insert_string(&mut self, key: &str, value: &str) -> bool {
        match CString::new(value) {
            Ok(value) => {
                self.strings.insert(key.to_string(), value);
                true
            }
            Err(_) => false,
        }
    }

    /// Whether both stores hold the same keys and values.
    pub fn same_values(&self, other: &Self) -> bool {
        self.strings == other.strings && self.binaries == other.binaries
    }

    pub(crate) fn clear(&mut self) {
        let strings = std::mem::take(&mut self.strings);
        self.retired.extend(strings.into_values());
        self.binaries.clear();
    }
}

thread_local! {
    static STORE: RefCell<ProjectStore> = RefCell::new(ProjectStore::default());
}

fn key_string(key: *const c_char) -> Option<String> {
    // SAFETY: the plugin passes a NUL-terminated key valid for the call.
    unsafe { read_c_str(key) }.map(|k| k.to_string_lossy().into_owned())
}

unsafe extern "C" fn get_param_string(key: *const c_char) -> *const c_char {
    let Some(key) = key_string(key) else {
        return std::ptr::null();
    };
    STORE.with(|store| {
        store
            .borrow()
            .strings
            .get(&key)
            .map_or(std::ptr::null(), |v| v.as_ptr())
    })
}

unsafe extern "C" fn set_param_string(key: *const c_char, value: *const c_char) {
    let Some(key) = key_string(key) else {
        return;
    };
    // SAFETY: as for the key.
    let Some(value) = (unsafe { read_c_str(value) }) else {
        return;
    };
    let value = value.to_owned();
    STORE.with(|store| {
        let mut store = store.borrow_mut();
        if let Some(old) = store.strings.insert(key, value) {
            store.retired.push(old);
        }
    });
}

unsafe extern "C" fn get_param_binary(key: *const c_char, data: *mut c_void, size: i32) -> bool {
    let Some(key) = key_string(key) else {
        return false;
    };
    STORE.with(|store| {
        let store = store.borrow();
        let Some(stored) = store.binaries.get(&key) else {
            return false;
        };
        if data.is_null() || usize::try_from(size).ok() != Some(stored.len()) {
            return false;
        }
        // SAFETY: the plugin supplied `size` writable bytes and `size`
        // equals the stored length.
        unsafe { std::ptr::copy_nonoverlapping(stored.as_ptr(), data.cast::<u8>(), stored.len()) };
        true
    })
}

unsafe extern "C" fn set_param_binary(key: *const c_char, data: *mut c_void, size: i32) {
    let Some(key) = key_string(key) else {
        return;
    };
    let size = to_usize(size);
    STORE.with(|store| {
        let mut store = store.borrow_mut();
        store.largest_binary_attempt = store.largest_binary_attempt.max(size);
        if size > sys::MAX_PROJECT_BINARY_SIZE || data.is_null() {
            store.rejected_binaries += 1;
            tracing::debug!(key, size, "binary project value rejected");
            return;
        }
        // SAFETY: the plugin supplied `size` readable bytes.
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), size) };
        store.binaries.insert(key, bytes.to_vec());
    });
}

unsafe extern "C" fn clear_params() {
    STORE.with(|store| store.borrow_mut().clear());
}

/// Raw accessor table for a load or save callback.
pub fn table() -> sys::ProjectFile {
    sys::ProjectFile {
        get_param_string: Some(get_param_string),
        set_param_string: Some(set_param_string),
        get_param_binary: Some(get_param_binary),
        set_param_binary: Some(set_param_binary),
        clear_params: Some(clear_params),
    }
}

/// Invoke a project callback against this thread's store.
pub fn invoke(callback: sys::plugin::ProjectProc) {
    let mut raw = table();
    // SAFETY: `raw` outlives the call.
    unsafe { callback(&raw mut raw) };
    STORE.with(|store| store.borrow_mut().retired.clear());
}

/// Run `f` on this thread's store.
pub fn with_store<R>(f: impl FnOnce(&mut ProjectStore) -> R) -> R {
    STORE.with(|store| f(&mut store.borrow_mut()))
}

/// Snapshot of this thread's store.
pub fn snapshot() -> ProjectStore {
    with_store(|store| store.clone())
}

/// Empty this thread's store.
pub fn reset() {
    STORE.with(|store| *store.borrow_mut() = ProjectStore::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviutl2::ProjectFile;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn with_file<R>(f: impl FnOnce(&mut ProjectFile<'_>) -> R) -> Option<R> {
        let mut raw = table();
        // SAFETY: `raw` outlives the wrapper.
        let mut file = unsafe { ProjectFile::from_raw(&raw mut raw) }?;
        Some(f(&mut file))
    }

    #[test]
    fn test_binary_ceiling() -> TestResult {
        reset();
        let stored = with_file(|file| {
            let raw = table();
            let key = CString::new("big")?;
            let mut data = vec![7u8; sys::MAX_PROJECT_BINARY_SIZE + 1];
            if let Some(set) = raw.set_param_binary {
                // SAFETY: live key and buffer.
                unsafe { set(key.as_ptr(), data.as_mut_ptr().cast(), 4097) };
            }
            file.set_binary("edge", &[1u8; sys::MAX_PROJECT_BINARY_SIZE])?;
            Ok::<_, Box<dyn std::error::Error>>(())
        });
        stored.ok_or("null project file")??;
        let store = snapshot();
        assert_eq!(store.rejected_binaries, 1);
        assert_eq!(store.largest_binary_attempt, 4097);
        assert_eq!(store.binary("edge").map(<[u8]>::len), Some(4096));
        assert!(store.binary("big").is_none());
        Ok(())
    }

    #[test]
    fn test_clear_then_get_is_null() -> TestResult {
        reset();
        with_store(|store| store.insert_string("mode", "fast"));
        let value = with_file(|file| file.string("mode")).ok_or("null project file")??;
        assert_eq!(value.as_deref(), Some("fast"));
        unsafe extern "C" fn clear(project: *mut sys::ProjectFile) {
            // SAFETY: live table.
            if let Some(clear) = unsafe { (*project).clear_params } {
                // SAFETY: no arguments.
                unsafe { clear() };
            }
        }
        invoke(clear);
        assert!(snapshot().is_empty());
        Ok(())
    }
}
