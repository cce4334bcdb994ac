//! Host configuration channel.
//!
//! All lookups are fail-soft, mirroring the host: a missing key gives back
//! the original text, `0` or the default font. A stored `0` and a missing key
//! look the same; only color keys can tell them apart through
//! [`ConfigHandle::color_count`].

use std::ffi::CString;
use std::path::PathBuf;
use std::ptr::NonNull;

use parking_lot::{RwLock, const_rwlock};

use aviutl2_sys as sys;

use crate::plugin::to_usize;
use crate::wide::{WideString, read_wide_string};

/// Font description, copied out of the host's reused slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontInfo {
    /// Face name.
    pub name: String,
    /// Size.
    pub size: f32,
}

/// Host-provided configuration accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigHandle {
    raw: NonNull<sys::ConfigHandle>,
}

// SAFETY: the host keeps the handle alive for the plugin lifetime and its
// accessors are callable from any thread.
unsafe impl Send for ConfigHandle {}
// SAFETY: see above.
unsafe impl Sync for ConfigHandle {}

impl ConfigHandle {
    /// Wrap a raw handle. Returns `None` for NULL.
    ///
    /// # Safety
    ///
    /// `ptr` must be NULL or stay valid until the plugin is unloaded.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut sys::ConfigHandle) -> Option<Self> {
        NonNull::new(ptr).map(|raw| Self { raw })
    }

    /// Raw handle pointer.
    #[must_use]
    pub fn as_ptr(&self) -> *mut sys::ConfigHandle {
        self.raw.as_ptr()
    }

    fn table(&self) -> &sys::ConfigHandle {
        // SAFETY: valid per the `from_raw` contract.
        unsafe { self.raw.as_ref() }
    }

    fn key(key: &str) -> Option<CString> {
        match CString::new(key) {
            Ok(key) => Some(key),
            Err(_) => {
                tracing::debug!(key, "config key contains NUL");
                None
            }
        }
    }

    /// Application data folder.
    #[must_use]
    pub fn app_data_path(&self) -> PathBuf {
        // SAFETY: the host keeps this string alive for the plugin lifetime.
        let path = unsafe { read_wide_string(self.table().app_data_path) };
        PathBuf::from(path.unwrap_or_default())
    }

    /// Translate `text` using the plugin's language section.
    #[must_use]
    pub fn translate(&self, text: &str) -> String {
        let Some(func) = self.table().translate else {
            return text.to_string();
        };
        let wide = WideString::new(text);
        // SAFETY: handle and string are valid for the call.
        let ptr = unsafe { func(self.as_ptr(), wide.as_ptr()) };
        // SAFETY: the result is copied before any other config call.
        let translated = unsafe { read_wide_string(ptr) };
        translated.unwrap_or_else(|| text.to_string())
    }

    /// Translate `text` using an arbitrary language section.
    #[must_use]
    pub fn language_text(&self, section: &str, text: &str) -> String {
        let Some(func) = self.table().get_language_text else {
            return text.to_string();
        };
        let section = WideString::new(section);
        let wide = WideString::new(text);
        // SAFETY: handle and strings are valid for the call.
        let ptr = unsafe { func(self.as_ptr(), section.as_ptr(), wide.as_ptr()) };
        // SAFETY: as in `translate`.
        let translated = unsafe { read_wide_string(ptr) };
        translated.unwrap_or_else(|| text.to_string())
    }

    /// Font of a `[Font]` key in `style.conf`.
    #[must_use]
    pub fn font_info(&self, key: &str) -> FontInfo {
        let (Some(func), Some(key)) = (self.table().get_font_info, Self::key(key)) else {
            return FontInfo::default();
        };
        // SAFETY: the returned slot is read immediately, before the next call
        // can overwrite it.
        let raw = unsafe { func(self.as_ptr(), key.as_ptr()) };
        if raw.is_null() {
            return FontInfo::default();
        }
        // SAFETY: non-null slot owned by the host.
        let raw = unsafe { *raw };
        FontInfo {
            // SAFETY: the name is valid while the slot is.
            name: unsafe { read_wide_string(raw.name) }.unwrap_or_default(),
            size: raw.size,
        }
    }

    /// First color of a `[Color]` key, or 0.
    #[must_use]
    pub fn color_code(&self, key: &str) -> i32 {
        let (Some(func), Some(key)) = (self.table().get_color_code, Self::key(key)) else {
            return 0;
        };
        // SAFETY: handle and key are valid for the call.
        unsafe { func(self.as_ptr(), key.as_ptr()) }
    }

    /// Size from the `[Layout]` section, or 0.
    #[must_use]
    pub fn layout_size(&self, key: &str) -> i32 {
        let (Some(func), Some(key)) = (self.table().get_layout_size, Self::key(key)) else {
            return 0;
        };
        // SAFETY: handle and key are valid for the call.
        unsafe { func(self.as_ptr(), key.as_ptr()) }
    }

    fn color_index(&self, key: &str, index: i32) -> i32 {
        let (Some(func), Some(key)) = (self.table().get_color_code_index, Self::key(key)) else {
            return 0;
        };
        // SAFETY: handle and key are valid for the call.
        unsafe { func(self.as_ptr(), key.as_ptr(), index) }
    }

    /// Color at `index` of a multi-color key, or 0.
    #[must_use]
    pub fn color_code_at(&self, key: &str, index: usize) -> i32 {
        match i32::try_from(index) {
            Ok(index) => self.color_index(key, index),
            Err(_) => 0,
        }
    }

    /// Number of colors stored under `key` (0 when missing).
    #[must_use]
    pub fn color_count(&self, key: &str) -> usize {
        to_usize(self.color_index(key, -1))
    }

    /// Every color stored under `key`.
    #[must_use]
    pub fn color_codes(&self, key: &str) -> Vec<i32> {
        (0..self.color_count(key))
            .map(|index| self.color_code_at(key, index))
            .collect()
    }
}

static CONFIG: RwLock<Option<ConfigHandle>> = const_rwlock(None);

/// Remember the handle received through `InitializeConfig`.
pub fn set_global(handle: ConfigHandle) {
    *CONFIG.write() = Some(handle);
}

/// Configuration handle received through `InitializeConfig`, if any.
#[must_use]
pub fn global() -> Option<ConfigHandle> {
    *CONFIG.read()
}
