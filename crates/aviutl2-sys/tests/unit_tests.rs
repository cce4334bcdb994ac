//! Unit tests for the raw ABI layouts.
//!
//! Sizes and offsets are checked against the C headers for 64-bit Windows.

use aviutl2_sys::prelude::*;
use aviutl2_sys::{FontInfo, input};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[cfg(target_pointer_width = "64")]
mod size_and_alignment {
    use super::*;

    #[test]
    fn test_host_channels() {
        assert_eq!(std::mem::size_of::<LogHandle>(), 40);
        assert_eq!(std::mem::size_of::<ConfigHandle>(), 56);
        assert_eq!(std::mem::size_of::<FontInfo>(), 16);
    }

    #[test]
    fn test_module_tables() {
        assert_eq!(std::mem::size_of::<InputInfo>(), 48);
        assert_eq!(std::mem::size_of::<InputPluginTable>(), 96);
        assert_eq!(std::mem::size_of::<OutputInfo>(), 88);
        assert_eq!(std::mem::size_of::<OutputPluginTable>(), 56);
        assert_eq!(std::mem::size_of::<FilterPluginTable>(), 56);
        assert_eq!(std::mem::size_of::<ScriptModuleTable>(), 16);
    }

    #[test]
    fn test_registration_surface() {
        assert_eq!(std::mem::size_of::<HostAppTable>(), 104);
        assert_eq!(std::mem::size_of::<EditSection>(), 120);
        assert_eq!(std::mem::size_of::<ProjectFile>(), 40);
        assert_eq!(std::mem::align_of::<HostAppTable>(), 8);
    }

    #[test]
    fn test_win32_mirrors() {
        assert_eq!(std::mem::size_of::<BitmapInfoHeader>(), 40);
        assert_eq!(std::mem::size_of::<WaveFormatEx>(), 18);
        assert_eq!(std::mem::align_of::<WaveFormatEx>(), 1);
    }

    #[test]
    fn test_input_table_offsets() {
        assert_eq!(std::mem::offset_of!(InputPluginTable, func_open), 32);
        assert_eq!(std::mem::offset_of!(InputPluginTable, func_time_to_frame), 88);
        assert_eq!(std::mem::offset_of!(InputInfo, audio_format), 32);
    }

    #[test]
    fn test_output_info_offsets() {
        assert_eq!(std::mem::offset_of!(OutputInfo, savefile), 40);
        assert_eq!(std::mem::offset_of!(OutputInfo, func_set_buffer_size), 80);
    }
}

mod flags {
    use super::*;

    #[test]
    fn test_flags_accessor_drops_unknown_bits() {
        let table = OutputPluginTable {
            flag: 0x103,
            name: std::ptr::null(),
            filefilter: std::ptr::null(),
            information: std::ptr::null(),
            func_output: None,
            func_config: None,
            func_get_config_text: None,
        };
        assert_eq!(table.flags(), OutputPluginFlags::VIDEO | OutputPluginFlags::AUDIO);
    }

    #[test]
    fn test_input_info_default_is_empty() {
        let info = InputInfo::default();
        assert!(info.flags().is_empty());
        assert!(info.format.is_null());
        assert!(info.audio_format.is_null());
    }

    #[test]
    fn test_input_plugin_flag_values() {
        assert_eq!(InputPluginFlags::CONCURRENT.bits(), 16);
        assert_eq!(InputPluginFlags::MULTI_TRACK.bits(), 32);
        assert_eq!(input::TRACK_QUERY_COUNT, -1);
        assert_eq!(input::track_type::AUDIO, 1);
    }

    #[test]
    fn test_output_info_flag_values() {
        assert_eq!(OutputInfoFlags::all().bits(), 3);
    }
}

mod symbols {
    use super::*;

    #[test]
    fn test_symbol_names() -> TestResult {
        let name = std::ffi::CStr::from_bytes_with_nul(REGISTER_PLUGIN)?;
        assert_eq!(name.to_str()?, "RegisterPlugin");
        let name = std::ffi::CStr::from_bytes_with_nul(GET_SCRIPT_MODULE_TABLE)?;
        assert_eq!(name.to_str()?, "GetScriptModuleTable");
        Ok(())
    }

    #[test]
    fn test_all_symbols_unique() {
        let mut names = ALL_SYMBOLS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL_SYMBOLS.len());
    }
}

mod formats {
    use super::*;

    #[test]
    fn test_fourcc_matches_makefourcc() {
        let expected = u32::from(b'Y')
            | (u32::from(b'C') << 8)
            | (u32::from(b'4') << 16)
            | (u32::from(b'8') << 24);
        assert_eq!(video_format::YC48, expected);
        assert_eq!(make_fourcc(*b"YC48"), expected);
    }

    #[test]
    fn test_item_tags_decode() -> TestResult {
        let tag = &item_type::CHECK[..item_type::CHECK.len() - 1];
        assert_eq!(String::from_utf16(tag)?, "check");
        Ok(())
    }
}
