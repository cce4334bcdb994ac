//! Output plugin ABI (`aviutl2_output_plugin_table`).
//!
//! Required export: `GetOutputPluginTable() -> *mut OutputPluginTable`.
//!
//! Data flows host → plugin by pull: inside `func_output` the plugin calls
//! `func_get_video` / `func_get_audio` and polls `func_is_abort` between
//! frames. There is no push-based cancellation.

use std::ffi::c_void;

use bitflags::bitflags;

use crate::WChar;
use crate::win32::{Hinstance, Hwnd};

bitflags! {
    /// Flags of [`OutputInfo::flag`].
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputInfoFlags: i32 {
        /// Video is to be written.
        const VIDEO = 1;
        /// Audio is to be written.
        const AUDIO = 2;
    }
}

bitflags! {
    /// Flags of [`OutputPluginTable::flag`].
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputPluginFlags: i32 {
        /// Supports video output.
        const VIDEO = 1;
        /// Supports audio output.
        const AUDIO = 2;
    }
}

/// Output job description passed to `func_output`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OutputInfo {
    /// [`OutputInfoFlags`] bits.
    pub flag: i32,
    /// Image width.
    pub w: i32,
    /// Image height.
    pub h: i32,
    /// Frame rate numerator.
    pub rate: i32,
    /// Frame rate denominator.
    pub scale: i32,
    /// Number of frames.
    pub n: i32,
    /// Audio sample rate.
    pub audio_rate: i32,
    /// Audio channel count.
    pub audio_ch: i32,
    /// Number of audio samples.
    pub audio_n: i32,
    /// Destination file name.
    pub savefile: *const WChar,
    /// Pull one frame in `format` (see [`crate::video_format`]). The data is
    /// valid until the next pull.
    pub func_get_video: Option<unsafe extern "C" fn(frame: i32, format: u32) -> *mut c_void>,
    /// Pull `length` samples in `format` (see [`crate::audio_format`]);
    /// `readed` receives the number actually read.
    pub func_get_audio: Option<
        unsafe extern "C" fn(start: i32, length: i32, readed: *mut i32, format: u32) -> *mut c_void,
    >,
    /// True once the user asked to abort.
    pub func_is_abort: Option<unsafe extern "C" fn() -> bool>,
    /// Update the remaining-time display.
    pub func_rest_time_disp: Option<unsafe extern "C" fn(now: i32, total: i32)>,
    /// Advisory prefetch depth, in frames (default 4).
    pub func_set_buffer_size: Option<unsafe extern "C" fn(video_size: i32, audio_size: i32)>,
}

impl OutputInfo {
    /// Get the flags as a bitflags struct.
    #[must_use]
    pub fn flags(&self) -> OutputInfoFlags {
        OutputInfoFlags::from_bits_truncate(self.flag)
    }
}

/// Output plugin definition returned by `GetOutputPluginTable`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OutputPluginTable {
    /// [`OutputPluginFlags`] bits.
    pub flag: i32,
    /// Plugin name.
    pub name: *const WChar,
    /// Save dialog filter.
    pub filefilter: *const WChar,
    /// Plugin information.
    pub information: *const WChar,
    /// Run the output job.
    pub func_output: Option<unsafe extern "C" fn(oip: *mut OutputInfo) -> bool>,
    /// Show the configuration dialog. NULL when unsupported.
    pub func_config: Option<unsafe extern "C" fn(hwnd: Hwnd, dll_hinst: Hinstance) -> bool>,
    /// Describe the current configuration. NULL when unsupported.
    pub func_get_config_text: Option<unsafe extern "C" fn() -> *const WChar>,
}

impl OutputPluginTable {
    /// Get the flags as a bitflags struct.
    #[must_use]
    pub fn flags(&self) -> OutputPluginFlags {
        OutputPluginFlags::from_bits_truncate(self.flag)
    }
}

#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<OutputInfo>(), 88);
#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(std::mem::size_of::<OutputPluginTable>(), 56);
