//! Format tags, item type tags and size ceilings.
//!
//! These values are part of the wire contract between host and plugin.

/// Maximum length of one log message, in UTF-16 code units.
///
/// Longer messages are truncated by the host.
pub const MAX_LOG_MESSAGE_LEN: usize = 1024;

/// Maximum size of a generic data filter item block, in bytes.
pub const MAX_FILTER_DATA_SIZE: usize = 1024;

/// Maximum size of one binary value stored in the project file, in bytes.
pub const MAX_PROJECT_BINARY_SIZE: usize = 4096;

/// Build a Win32 `MAKEFOURCC` code (first character in the low byte).
#[must_use]
pub const fn make_fourcc(code: [u8; 4]) -> u32 {
    u32::from_le_bytes(code)
}

/// Video format tags used by `biCompression` and `func_get_video`.
pub mod video_format {
    use super::make_fourcc;

    /// Uncompressed RGB (24bit) or RGBA (32bit) DIB.
    pub const BI_RGB: u32 = 0;
    /// `DXGI_FORMAT_R16G16B16A16_UNORM`, premultiplied alpha.
    pub const PA64: u32 = make_fourcc(*b"PA64");
    /// `DXGI_FORMAT_R16G16B16A16_FLOAT`, premultiplied alpha (host internal format).
    pub const HF64: u32 = make_fourcc(*b"HF64");
    /// Packed YUV 4:2:2.
    pub const YUY2: u32 = make_fourcc(*b"YUY2");
    /// Legacy compatibility format (three `i16` per pixel).
    pub const YC48: u32 = make_fourcc(*b"YC48");
}

/// Audio format tags (`WAVEFORMATEX::wFormatTag` and `func_get_audio`).
pub mod audio_format {
    /// `WAVE_FORMAT_PCM`, signed 16-bit samples.
    pub const PCM: u16 = 1;
    /// `WAVE_FORMAT_IEEE_FLOAT`, 32-bit float samples.
    pub const IEEE_FLOAT: u16 = 3;
}

/// Encode an ASCII byte string (including its NUL) as UTF-16 at compile time.
#[must_use]
#[allow(clippy::indexing_slicing, reason = "i < N bounds both arrays")]
pub const fn ascii_wide<const N: usize>(bytes: &[u8; N]) -> [u16; N] {
    let mut out = [0u16; N];
    let mut i = 0;
    while i < N {
        out[i] = bytes[i] as u16;
        i += 1;
    }
    out
}

/// NUL-terminated UTF-16 type tags leading every filter item struct.
pub mod item_type {
    use super::ascii_wide;

    /// Track bar (`aviutl2_filter_item_track`).
    pub const TRACK: [u16; 6] = ascii_wide(b"track\0");
    /// Check box (`aviutl2_filter_item_check`).
    pub const CHECK: [u16; 6] = ascii_wide(b"check\0");
    /// Color picker (`aviutl2_filter_item_color`).
    pub const COLOR: [u16; 6] = ascii_wide(b"color\0");
    /// Select list (`aviutl2_filter_item_select`).
    pub const SELECT: [u16; 7] = ascii_wide(b"select\0");
    /// File path (`aviutl2_filter_item_file`).
    pub const FILE: [u16; 5] = ascii_wide(b"file\0");
    /// Folder path (`aviutl2_filter_item_folder`).
    pub const FOLDER: [u16; 7] = ascii_wide(b"folder\0");
    /// Single-line string (`aviutl2_filter_item_string`).
    pub const STRING: [u16; 7] = ascii_wide(b"string\0");
    /// Multi-line text (`aviutl2_filter_item_text`).
    pub const TEXT: [u16; 5] = ascii_wide(b"text\0");
    /// Opaque data block (`aviutl2_filter_item_data`).
    pub const DATA: [u16; 5] = ascii_wide(b"data\0");
    /// Group marker (`aviutl2_filter_item_group`).
    pub const GROUP: [u16; 6] = ascii_wide(b"group\0");
    /// Button (`aviutl2_filter_item_button`).
    pub const BUTTON: [u16; 7] = ascii_wide(b"button\0");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_wide_widens_each_byte() {
        assert_eq!(ascii_wide(b"ab\0"), [97, 98, 0]);
        assert_eq!(item_type::TRACK.last(), Some(&0));
    }

    #[test]
    fn test_size_ceilings() {
        assert_eq!(MAX_LOG_MESSAGE_LEN, 1024);
        assert_eq!(MAX_FILTER_DATA_SIZE, 1024);
        assert_eq!(MAX_PROJECT_BINARY_SIZE, 4096);
    }

    #[test]
    fn test_fourcc_low_byte_first() {
        assert_eq!(video_format::YUY2, 0x3259_5559);
        assert_eq!(video_format::PA64 & 0xFF, u32::from(b'P'));
        assert_eq!(video_format::HF64 >> 24, u32::from(b'4'));
    }

    #[test]
    fn test_fourcc_tags_distinct() {
        let tags = [
            video_format::BI_RGB,
            video_format::PA64,
            video_format::HF64,
            video_format::YUY2,
            video_format::YC48,
        ];
        for (i, a) in tags.iter().enumerate() {
            for b in tags.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_audio_tags() {
        assert_eq!(audio_format::PCM, 1);
        assert_eq!(audio_format::IEEE_FLOAT, 3);
    }

    #[test]
    fn test_item_tags_nul_terminated() {
        assert_eq!(item_type::TRACK, [116, 114, 97, 99, 107, 0]);
        assert_eq!(item_type::SELECT.last(), Some(&0));
        assert_eq!(item_type::BUTTON.last(), Some(&0));
    }
}
