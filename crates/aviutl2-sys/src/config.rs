//! Host configuration channel (`aviutl2_config_handle`).
//!
//! Every lookup is fail-soft: a missing key yields the original text, `0`, or
//! the default font. A stored zero and an absent key are indistinguishable,
//! except for color keys via `get_color_code_index(key, -1)`.

use std::ffi::c_char;

use crate::WChar;

/// Font description returned by `get_font_info`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FontInfo {
    /// Font face name (UTF-16).
    pub name: *const WChar,
    /// Font size.
    pub size: f32,
}

/// Host-provided configuration accessors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ConfigHandle {
    /// Application data folder. Valid for the plugin lifetime.
    pub app_data_path: *const WChar,

    /// Translate `text` using the plugin's own language section.
    ///
    /// Returns `text` itself when no translation exists. The result stays
    /// valid until the language settings change.
    pub translate:
        Option<unsafe extern "C" fn(handle: *mut ConfigHandle, text: *const WChar) -> *const WChar>,

    /// Translate `text` using an arbitrary language section.
    pub get_language_text: Option<
        unsafe extern "C" fn(
            handle: *mut ConfigHandle,
            section: *const WChar,
            text: *const WChar,
        ) -> *const WChar,
    >,

    /// Font from the `[Font]` section of `style.conf`.
    ///
    /// The returned struct is a single slot reused by the next call.
    pub get_font_info:
        Option<unsafe extern "C" fn(handle: *mut ConfigHandle, key: *const c_char) -> *mut FontInfo>,

    /// First color of a `[Color]` key, or 0.
    pub get_color_code:
        Option<unsafe extern "C" fn(handle: *mut ConfigHandle, key: *const c_char) -> i32>,

    /// Size from the `[Layout]` section, or 0.
    pub get_layout_size:
        Option<unsafe extern "C" fn(handle: *mut ConfigHandle, key: *const c_char) -> i32>,

    /// Color at `index` of a `[Color]` key; `index = -1` returns the color count.
    pub get_color_code_index: Option<
        unsafe extern "C" fn(handle: *mut ConfigHandle, key: *const c_char, index: i32) -> i32,
    >,
}

#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<FontInfo>(), 16);
#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<ConfigHandle>(), 56);
