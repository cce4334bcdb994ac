//! Configuration channel with a small fixed style table.
//!
//! Translations echo their input. Unknown keys fall back the way the host
//! does: `0` for colors and sizes, the default font for fonts.

use std::cell::UnsafeCell;
use std::ffi::c_char;

use aviutl2::wide::read_c_str;
use aviutl2_sys as sys;
use aviutl2_sys::constants::ascii_wide;

use super::{StaticTable, to_i32};

static APP_DATA_PATH: [u16; 23] = ascii_wide(b"C:\\ProgramData\\aviutl2\0");
static DEFAULT_FONT: [u16; 13] = ascii_wide(b"Yu Gothic UI\0");
static MONOSPACE_FONT: [u16; 9] = ascii_wide(b"Consolas\0");

/// `[Color]` entries, as `0xRRGGBB` values.
pub const COLORS: &[(&str, &[i32])] = &[
    ("Background", &[0x00_20_20_20]),
    ("Grid", &[0x00_40_40_40, 0x00_30_30_30]),
    ("Layer", &[0x00_50_60_70, 0x00_48_58_68, 0x00_40_50_60]),
];

/// `[Layout]` entries.
pub const LAYOUT: &[(&str, i32)] = &[("ScrollBarSize", 16), ("TimelineLayerHeight", 24)];

/// Default font size.
pub const DEFAULT_FONT_SIZE: f32 = 9.0;

thread_local! {
    static FONT_SLOT: UnsafeCell<sys::FontInfo> = const {
        UnsafeCell::new(sys::FontInfo {
            name: std::ptr::null(),
            size: 0.0,
        })
    };
}

fn key_str<'a>(key: *const c_char) -> Option<&'a str> {
    // SAFETY: the plugin passes a NUL-terminated key valid for the call.
    unsafe { read_c_str(key) }.and_then(|k| k.to_str().ok())
}

fn colors(key: *const c_char) -> &'static [i32] {
    let Some(key) = key_str(key) else {
        return &[];
    };
    COLORS
        .iter()
        .find(|(name, _)| *name == key)
        .map_or(&[], |(_, values)| *values)
}

unsafe extern "C" fn translate(_: *mut sys::ConfigHandle, text: *const u16) -> *const u16 {
    text
}

unsafe extern "C" fn get_language_text(
    _: *mut sys::ConfigHandle,
    _section: *const u16,
    text: *const u16,
) -> *const u16 {
    text
}

unsafe extern "C" fn get_font_info(
    _: *mut sys::ConfigHandle,
    key: *const c_char,
) -> *mut sys::FontInfo {
    let font = match key_str(key) {
        Some("Console" | "Editor") => sys::FontInfo {
            name: MONOSPACE_FONT.as_ptr(),
            size: 10.0,
        },
        _ => sys::FontInfo {
            name: DEFAULT_FONT.as_ptr(),
            size: DEFAULT_FONT_SIZE,
        },
    };
    FONT_SLOT.with(|slot| {
        let ptr = slot.get();
        // SAFETY: the slot belongs to this thread; the previous result is
        // documented to be overwritten by the next call.
        unsafe { ptr.write(font) };
        ptr
    })
}

unsafe extern "C" fn get_color_code(_: *mut sys::ConfigHandle, key: *const c_char) -> i32 {
    colors(key).first().copied().unwrap_or(0)
}

unsafe extern "C" fn get_layout_size(_: *mut sys::ConfigHandle, key: *const c_char) -> i32 {
    let Some(key) = key_str(key) else {
        return 0;
    };
    LAYOUT
        .iter()
        .find(|(name, _)| *name == key)
        .map_or(0, |(_, size)| *size)
}

unsafe extern "C" fn get_color_code_index(
    _: *mut sys::ConfigHandle,
    key: *const c_char,
    index: i32,
) -> i32 {
    let values = colors(key);
    if index == -1 {
        return to_i32(values.len());
    }
    usize::try_from(index)
        .ok()
        .and_then(|i| values.get(i))
        .copied()
        .unwrap_or(0)
}

static HANDLE: StaticTable<sys::ConfigHandle> = StaticTable::new(sys::ConfigHandle {
    app_data_path: APP_DATA_PATH.as_ptr(),
    translate: Some(translate),
    get_language_text: Some(get_language_text),
    get_font_info: Some(get_font_info),
    get_color_code: Some(get_color_code),
    get_layout_size: Some(get_layout_size),
    get_color_code_index: Some(get_color_code_index),
});

/// Handle passed to `InitializeConfig`.
pub fn handle() -> *mut sys::ConfigHandle {
    HANDLE.as_ptr()
}

/// Application data folder reported to plugins.
pub fn app_data_path() -> String {
    let units = APP_DATA_PATH.split_last().map_or(&[][..], |(_, rest)| rest);
    String::from_utf16_lossy(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviutl2::ConfigHandle;

    fn config() -> Option<ConfigHandle> {
        // SAFETY: the static handle lives for the whole process.
        unsafe { ConfigHandle::from_raw(handle()) }
    }

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_lookups_through_sdk() -> TestResult {
        let config = config().ok_or("static handle is null")?;
        assert_eq!(config.translate("Brightness"), "Brightness");
        assert_eq!(config.color_codes("Grid"), vec![0x40_40_40, 0x30_30_30]);
        assert_eq!(config.color_count("Missing"), 0);
        assert_eq!(config.color_code("Missing"), 0);
        assert_eq!(config.layout_size("ScrollBarSize"), 16);
        assert_eq!(config.font_info("Control").name, "Yu Gothic UI");
        assert_eq!(config.font_info("Editor").name, "Consolas");
        assert_eq!(config.app_data_path().to_string_lossy(), app_data_path());
        Ok(())
    }

    #[test]
    fn test_app_data_path_is_terminated() {
        assert_eq!(app_data_path(), "C:\\ProgramData\\aviutl2");
        assert_eq!(APP_DATA_PATH.last(), Some(&0));
    }
}
