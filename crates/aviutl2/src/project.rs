//! Per-plugin key/value storage inside the project file.
//!
//! Only valid inside the project load and save handlers. Strings are UTF-8,
//! binary values are capped at 4096 bytes.

use std::ffi::c_void;

use serde::Serialize;
use serde::de::DeserializeOwned;

use aviutl2_sys::{self as sys, MAX_PROJECT_BINARY_SIZE};

use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::plugin::{self, to_i32};
use crate::wide::{read_c_str, to_c_string};

/// Project storage for the running load or save handler.
#[derive(Debug)]
pub struct ProjectFile<'a> {
    raw: &'a sys::ProjectFile,
}

impl<'a> ProjectFile<'a> {
    /// Wrap the host's project accessor.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer passed to the running project handler.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::ProjectFile) -> Option<Self> {
        // SAFETY: per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self { raw })
    }

    /// String value for `key`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Fails if the key contains a NUL or the stored value is not UTF-8.
    pub fn string(&self, key: &str) -> Result<Option<String>> {
        let get = self
            .raw
            .get_param_string
            .ok_or(Aviutl2Error::Unsupported("get_param_string"))?;
        let key = to_c_string(key)?;
        // SAFETY: `key` outlives the call.
        let ptr = unsafe { get(key.as_ptr()) };
        // SAFETY: the value is copied at once.
        let Some(value) = (unsafe { read_c_str(ptr) }) else {
            return Ok(None);
        };
        Ok(Some(value.to_str()?.to_string()))
    }

    /// Store a string value.
    ///
    /// # Errors
    ///
    /// Fails if the key or value contains a NUL.
    pub fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        let set = self
            .raw
            .set_param_string
            .ok_or(Aviutl2Error::Unsupported("set_param_string"))?;
        let key = to_c_string(key)?;
        let value = to_c_string(value)?;
        // SAFETY: both strings outlive the call.
        unsafe { set(key.as_ptr(), value.as_ptr()) };
        Ok(())
    }

    /// Read a binary value into `buf`. Returns `false` if the key is absent
    /// or the stored size differs from `buf.len()`.
    ///
    /// # Errors
    ///
    /// Fails if the key contains a NUL or `buf` exceeds the size ceiling.
    pub fn binary_into(&self, key: &str, buf: &mut [u8]) -> Result<bool> {
        check_size(buf.len())?;
        let get = self
            .raw
            .get_param_binary
            .ok_or(Aviutl2Error::Unsupported("get_param_binary"))?;
        let key = to_c_string(key)?;
        // SAFETY: `buf` is writable for its full length.
        Ok(unsafe { get(key.as_ptr(), buf.as_mut_ptr().cast::<c_void>(), to_i32(buf.len())) })
    }

    /// Read a fixed-size binary value.
    ///
    /// # Errors
    ///
    /// See [`ProjectFile::binary_into`].
    pub fn binary<const N: usize>(&self, key: &str) -> Result<Option<[u8; N]>> {
        let mut buf = [0u8; N];
        Ok(self.binary_into(key, &mut buf)?.then_some(buf))
    }

    /// Store a binary value.
    ///
    /// # Errors
    ///
    /// Returns [`Aviutl2Error::DataTooLarge`] above 4096 bytes.
    pub fn set_binary(&mut self, key: &str, data: &[u8]) -> Result<()> {
        check_size(data.len())?;
        let set = self
            .raw
            .set_param_binary
            .ok_or(Aviutl2Error::Unsupported("set_param_binary"))?;
        let key = to_c_string(key)?;
        // The host only reads through the pointer.
        let ptr = data.as_ptr().cast_mut().cast::<c_void>();
        // SAFETY: `data` is readable for its full length.
        unsafe { set(key.as_ptr(), ptr, to_i32(data.len())) };
        Ok(())
    }

    /// Remove every value this plugin stored.
    pub fn clear(&mut self) {
        if let Some(clear) = self.raw.clear_params {
            // SAFETY: no arguments.
            unsafe { clear() };
        }
    }

    /// Decode a JSON value stored with [`ProjectFile::set_json`].
    ///
    /// # Errors
    ///
    /// Fails on string access errors or malformed JSON.
    pub fn json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.string(key)?
            .map(|s| serde_json::from_str(&s).map_err(Aviutl2Error::from))
            .transpose()
    }

    /// Store `value` as JSON text.
    ///
    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.set_string(key, &text)
    }
}

fn check_size(size: usize) -> Result<()> {
    if size > MAX_PROJECT_BINARY_SIZE {
        return Err(Aviutl2Error::DataTooLarge {
            size,
            max: MAX_PROJECT_BINARY_SIZE,
        });
    }
    Ok(())
}

/// Body of a project load or save handler.
pub type ProjectCallbackFn = fn(&mut ProjectFile<'_>) -> AnyResult<()>;

/// Run a project handler body.
///
/// # Safety
///
/// `project` must be the pointer the host passed to the running handler.
#[doc(hidden)]
pub unsafe fn __invoke_project_callback(name: &'static str, project: *mut sys::ProjectFile, body: ProjectCallbackFn) {
    plugin::guard("project callback", (), || {
        // SAFETY: forwarded caller contract.
        let Some(mut file) = (unsafe { ProjectFile::from_raw(project) }) else {
            return;
        };
        if let Err(e) = body(&mut file) {
            tracing::error!(callback = name, error = %e, "project callback failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::ffi::{CString, c_char};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    thread_local! {
        static STRINGS: RefCell<HashMap<String, CString>> = RefCell::new(HashMap::new());
        static BINARY: RefCell<HashMap<String, Vec<u8>>> = RefCell::new(HashMap::new());
    }

    fn key_of(key: *const c_char) -> String {
        // SAFETY: the SDK passes valid C strings.
        unsafe { read_c_str(key) }.map(|k| k.to_string_lossy().into_owned()).unwrap_or_default()
    }

    unsafe extern "C" fn get_string(key: *const c_char) -> *const c_char {
        STRINGS.with(|s| s.borrow().get(&key_of(key)).map_or(std::ptr::null(), |v| v.as_ptr()))
    }
    unsafe extern "C" fn set_string(key: *const c_char, value: *const c_char) {
        // SAFETY: the SDK passes valid C strings.
        let value = unsafe { read_c_str(value) }.map(CString::from).unwrap_or_default();
        STRINGS.with(|s| s.borrow_mut().insert(key_of(key), value));
    }
    unsafe extern "C" fn get_binary(key: *const c_char, data: *mut c_void, size: i32) -> bool {
        BINARY.with(|b| {
            let map = b.borrow();
            let Some(stored) = map.get(&key_of(key)) else {
                return false;
            };
            if i32::try_from(stored.len()) != Ok(size) {
                return false;
            }
            // SAFETY: the SDK passes a buffer of `size` bytes.
            unsafe { std::ptr::copy_nonoverlapping(stored.as_ptr(), data.cast::<u8>(), stored.len()) };
            true
        })
    }
    unsafe extern "C" fn set_binary(key: *const c_char, data: *mut c_void, size: i32) {
        let len = usize::try_from(size).unwrap_or(0);
        // SAFETY: the SDK passes `size` readable bytes.
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) }.to_vec();
        BINARY.with(|b| b.borrow_mut().insert(key_of(key), bytes));
    }
    unsafe extern "C" fn clear_params() {
        STRINGS.with(|s| s.borrow_mut().clear());
        BINARY.with(|b| b.borrow_mut().clear());
    }

    fn table() -> sys::ProjectFile {
        sys::ProjectFile {
            get_param_string: Some(get_string),
            set_param_string: Some(set_string),
            get_param_binary: Some(get_binary),
            set_param_binary: Some(set_binary),
            clear_params: Some(clear_params),
        }
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Settings {
        strength: u32,
        label: String,
    }

    #[test]
    fn test_string_round_trip_and_clear() -> TestResult {
        let mut raw = table();
        // SAFETY: `raw` outlives the file.
        let mut file = unsafe { ProjectFile::from_raw(&mut raw) }.ok_or("null project")?;
        file.set_string("name", "テスト")?;
        assert_eq!(file.string("name")?.as_deref(), Some("テスト"));
        file.clear();
        assert_eq!(file.string("name")?, None);
        Ok(())
    }

    #[test]
    fn test_binary_ceiling() -> TestResult {
        let mut raw = table();
        // SAFETY: `raw` outlives the file.
        let mut file = unsafe { ProjectFile::from_raw(&mut raw) }.ok_or("null project")?;
        file.set_binary("max", &[7u8; 4096])?;
        assert!(matches!(
            file.set_binary("over", &[0u8; 4097]),
            Err(Aviutl2Error::DataTooLarge { size: 4097, max: 4096 })
        ));
        let value = file.binary::<4096>("max")?.ok_or("missing")?;
        assert!(value.iter().all(|b| *b == 7));
        assert_eq!(file.binary::<16>("max")?, None);
        Ok(())
    }

    #[test]
    fn test_json_values() -> TestResult {
        let mut raw = table();
        // SAFETY: `raw` outlives the file.
        let mut file = unsafe { ProjectFile::from_raw(&mut raw) }.ok_or("null project")?;
        let settings = Settings {
            strength: 3,
            label: "glow".into(),
        };
        file.set_json("settings", &settings)?;
        assert_eq!(file.json::<Settings>("settings")?, Some(settings));
        file.set_string("broken", "{")?;
        assert!(matches!(file.json::<Settings>("broken"), Err(Aviutl2Error::Json(_))));
        Ok(())
    }
}
