//! String conversion between Rust and the host encodings.
//!
//! UI strings cross the boundary as NUL-terminated UTF-16, data strings as
//! NUL-terminated UTF-8.

use std::ffi::{CStr, CString, c_char};
use std::fmt;

use crate::error::Result;

/// Owned NUL-terminated UTF-16 string.
///
/// The buffer never moves once built, so [`WideString::as_ptr`] stays valid
/// for as long as the value is alive, even if the `WideString` itself is
/// moved.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WideString {
    buf: Vec<u16>,
}

impl WideString {
    /// Encode `s`. An interior NUL ends the string as the host sees it.
    #[must_use]
    pub fn new(s: &str) -> Self {
        let mut buf: Vec<u16> = s.encode_utf16().collect();
        buf.push(0);
        Self { buf }
    }

    /// Build from raw code units (without terminator).
    #[must_use]
    pub fn from_units(units: &[u16]) -> Self {
        let mut buf = Vec::with_capacity(units.len() + 1);
        buf.extend_from_slice(units);
        buf.push(0);
        Self { buf }
    }

    /// Pointer to the first code unit.
    #[must_use]
    pub fn as_ptr(&self) -> *const u16 {
        self.buf.as_ptr()
    }

    /// Code units without the terminator.
    #[must_use]
    pub fn as_units(&self) -> &[u16] {
        self.buf.split_last().map_or(&[], |(_, units)| units)
    }

    /// Code units including the terminator.
    #[must_use]
    pub fn as_units_with_nul(&self) -> &[u16] {
        &self.buf
    }

    /// Length in code units, terminator excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len().saturating_sub(1)
    }

    /// Whether the string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode back to UTF-8, replacing unpaired surrogates.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }
}

impl Default for WideString {
    fn default() -> Self {
        Self { buf: vec![0] }
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// Borrow a NUL-terminated UTF-16 string. Returns `None` for NULL.
///
/// # Safety
///
/// `ptr` must be NULL or point to a readable NUL-terminated UTF-16 string
/// that outlives `'a`.
#[must_use]
pub unsafe fn read_wide<'a>(ptr: *const u16) -> Option<&'a [u16]> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0usize;
    // SAFETY: the caller guarantees a terminator exists, so every offset up
    // to and including it is in bounds.
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }
    // SAFETY: `len` units starting at `ptr` were just read.
    Some(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Copy a NUL-terminated UTF-16 string into a `String`.
///
/// # Safety
///
/// Same contract as [`read_wide`].
#[must_use]
pub unsafe fn read_wide_string(ptr: *const u16) -> Option<String> {
    // SAFETY: forwarded caller contract.
    unsafe { read_wide(ptr) }.map(String::from_utf16_lossy)
}

/// Borrow a NUL-terminated UTF-8 string. Returns `None` for NULL.
///
/// # Safety
///
/// `ptr` must be NULL or point to a readable NUL-terminated string that
/// outlives `'a`.
#[must_use]
pub unsafe fn read_c_str<'a>(ptr: *const c_char) -> Option<&'a CStr> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    Some(unsafe { CStr::from_ptr(ptr) })
}

/// Encode a data string for the host.
///
/// # Errors
///
/// Returns [`crate::Aviutl2Error::Nul`] if `s` contains a NUL byte.
pub fn to_c_string(s: &str) -> Result<CString> {
    Ok(CString::new(s)?)
}
