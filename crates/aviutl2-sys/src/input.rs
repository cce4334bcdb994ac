//! Input plugin ABI (`aviutl2_input_plugin_table`).
//!
//! Required export: `GetInputPluginTable() -> *mut InputPluginTable`.
//!
//! Handle state machine: `func_open` allocates, every later call takes the
//! returned handle, `func_close` frees it. With [`InputPluginFlags::CONCURRENT`]
//! the host may read from different handles on different threads at once,
//! but never shares one handle between concurrent calls.

use std::ffi::c_void;

use bitflags::bitflags;

use crate::WChar;
use crate::win32::{BitmapInfoHeader, Hinstance, Hwnd, WaveFormatEx};

/// Opaque per-file handle returned by `func_open`.
pub type InputHandle = *mut c_void;

bitflags! {
    /// Flags of [`InputInfo::flag`].
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputInfoFlags: i32 {
        /// The file has video.
        const VIDEO         = 1;
        /// The file has audio.
        const AUDIO         = 2;
        /// Frame numbers come from `func_time_to_frame`.
        const TIME_TO_FRAME = 16;
    }
}

bitflags! {
    /// Flags of [`InputPluginTable::flag`].
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputPluginFlags: i32 {
        /// Supports video input.
        const VIDEO       = 1;
        /// Supports audio input.
        const AUDIO       = 2;
        /// Reads may run concurrently on distinct handles.
        const CONCURRENT  = 16;
        /// `func_set_track` is called right after open.
        const MULTI_TRACK = 32;
    }
}

/// Track kinds passed as `type` to `func_set_track`.
pub mod track_type {
    /// Video track.
    pub const VIDEO: i32 = 0;
    /// Audio track.
    pub const AUDIO: i32 = 1;
}

/// `func_set_track` index asking for the number of tracks.
pub const TRACK_QUERY_COUNT: i32 = -1;

/// Input file information filled by `func_info_get`.
///
/// `format` and `audio_format` must stay valid until the next callback on the
/// same handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InputInfo {
    /// [`InputInfoFlags`] bits.
    pub flag: i32,
    /// Frame rate numerator.
    pub rate: i32,
    /// Frame rate denominator.
    pub scale: i32,
    /// Number of frames.
    pub n: i32,
    /// Image format.
    pub format: *mut BitmapInfoHeader,
    /// Size of `*format` in bytes.
    pub format_size: i32,
    /// Number of audio samples.
    pub audio_n: i32,
    /// Audio format.
    pub audio_format: *mut WaveFormatEx,
    /// Size of `*audio_format` in bytes.
    pub audio_format_size: i32,
}

impl Default for InputInfo {
    fn default() -> Self {
        Self {
            flag: 0,
            rate: 0,
            scale: 0,
            n: 0,
            format: std::ptr::null_mut(),
            format_size: 0,
            audio_n: 0,
            audio_format: std::ptr::null_mut(),
            audio_format_size: 0,
        }
    }
}

impl InputInfo {
    /// Get the flags as a bitflags struct.
    #[must_use]
    pub fn flags(&self) -> InputInfoFlags {
        InputInfoFlags::from_bits_truncate(self.flag)
    }
}

/// Input plugin definition returned by `GetInputPluginTable`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InputPluginTable {
    /// [`InputPluginFlags`] bits.
    pub flag: i32,
    /// Plugin name.
    pub name: *const WChar,
    /// Open dialog filter (`"Name (*.ext)\0*.ext\0"` pairs).
    pub filefilter: *const WChar,
    /// Plugin information.
    pub information: *const WChar,
    /// Open a file. Returns NULL on failure.
    pub func_open: Option<unsafe extern "C" fn(file: *const WChar) -> InputHandle>,
    /// Close a handle.
    pub func_close: Option<unsafe extern "C" fn(ih: InputHandle) -> bool>,
    /// Describe the file.
    pub func_info_get: Option<unsafe extern "C" fn(ih: InputHandle, iip: *mut InputInfo) -> bool>,
    /// Read one frame into `buf`. Returns the number of bytes written.
    pub func_read_video:
        Option<unsafe extern "C" fn(ih: InputHandle, frame: i32, buf: *mut c_void) -> i32>,
    /// Read `length` samples starting at `start`. Returns the samples read.
    pub func_read_audio: Option<
        unsafe extern "C" fn(ih: InputHandle, start: i32, length: i32, buf: *mut c_void) -> i32,
    >,
    /// Show the configuration dialog. NULL when unsupported.
    pub func_config: Option<unsafe extern "C" fn(hwnd: Hwnd, dll_hinst: Hinstance) -> bool>,
    /// Select a track (`index = -1` queries the count). Called once per kind
    /// right after open, only with [`InputPluginFlags::MULTI_TRACK`].
    pub func_set_track: Option<unsafe extern "C" fn(ih: InputHandle, kind: i32, index: i32) -> i32>,
    /// Map media time in seconds to a frame number, only with
    /// [`InputInfoFlags::TIME_TO_FRAME`].
    pub func_time_to_frame: Option<unsafe extern "C" fn(ih: InputHandle, time: f64) -> i32>,
}

impl InputPluginTable {
    /// Get the flags as a bitflags struct.
    #[must_use]
    pub fn flags(&self) -> InputPluginFlags {
        InputPluginFlags::from_bits_truncate(self.flag)
    }
}

#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<InputInfo>(), 48);
#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<InputPluginTable>(), 96);
static_assertions::const_assert_eq!(std::mem::size_of::<InputPluginFlags>(), 4);
