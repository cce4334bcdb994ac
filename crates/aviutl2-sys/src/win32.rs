//! Minimal mirrors of the Win32 types the plugin headers pull in.
//!
//! Only the layouts matter here; the crate never calls into Win32.

use std::ffi::c_void;

/// Window handle (`HWND`).
pub type Hwnd = *mut c_void;

/// Module instance handle (`HINSTANCE`).
pub type Hinstance = *mut c_void;

/// `BITMAPINFOHEADER` describing an input video frame.
///
/// # Memory Layout
///
/// 40 bytes, 4-byte alignment, identical to `wingdi.h`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitmapInfoHeader {
    /// Size of this structure (40).
    pub size: u32,
    /// Frame width in pixels.
    pub width: i32,
    /// Frame height in pixels.
    pub height: i32,
    /// Always 1.
    pub planes: u16,
    /// Bits per pixel.
    pub bit_count: u16,
    /// `BI_RGB` or a FOURCC from [`crate::video_format`].
    pub compression: u32,
    /// Size of one frame in bytes (may be 0 for `BI_RGB`).
    pub size_image: u32,
    /// Horizontal resolution, pixels per meter.
    pub x_pels_per_meter: i32,
    /// Vertical resolution, pixels per meter.
    pub y_pels_per_meter: i32,
    /// Palette entries used.
    pub clr_used: u32,
    /// Palette entries required.
    pub clr_important: u32,
}

/// `WAVEFORMATEX` describing input audio.
///
/// The Win32 declaration is byte-packed, so this is 18 bytes with no
/// trailing padding. Read fields by value; references to them are unaligned.
#[repr(C, packed(1))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveFormatEx {
    /// [`crate::audio_format::PCM`] or [`crate::audio_format::IEEE_FLOAT`].
    pub format_tag: u16,
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub samples_per_sec: u32,
    /// `samples_per_sec * block_align`.
    pub avg_bytes_per_sec: u32,
    /// Bytes per sample frame across all channels.
    pub block_align: u16,
    /// Bits per single-channel sample.
    pub bits_per_sample: u16,
    /// Size of extra format bytes following the struct (0 here).
    pub cb_size: u16,
}

static_assertions::const_assert_eq!(std::mem::size_of::<BitmapInfoHeader>(), 40);
static_assertions::const_assert_eq!(std::mem::align_of::<BitmapInfoHeader>(), 4);
static_assertions::const_assert_eq!(std::mem::size_of::<WaveFormatEx>(), 18);
static_assertions::const_assert_eq!(std::mem::align_of::<WaveFormatEx>(), 1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_info_header_offsets() {
        assert_eq!(std::mem::offset_of!(BitmapInfoHeader, bit_count), 14);
        assert_eq!(std::mem::offset_of!(BitmapInfoHeader, compression), 16);
        assert_eq!(std::mem::offset_of!(BitmapInfoHeader, clr_important), 36);
    }

    #[test]
    fn test_wave_format_offsets() {
        assert_eq!(std::mem::offset_of!(WaveFormatEx, samples_per_sec), 4);
        assert_eq!(std::mem::offset_of!(WaveFormatEx, block_align), 12);
        assert_eq!(std::mem::offset_of!(WaveFormatEx, cb_size), 16);
    }
}
