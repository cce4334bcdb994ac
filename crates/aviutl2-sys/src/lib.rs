//! Raw C ABI definitions for AviUtl ExEdit2 plugins.
//!
//! This crate mirrors the plugin SDK headers field for field:
//! - Host-provided channels: [`logger`] and [`config`]
//! - Plugin-provided module tables: [`input`], [`output`], [`filter`], [`module`]
//! - The registration surface passed to `RegisterPlugin`: [`plugin`]
//! - Entry point names and signatures: [`entry`]
//! - Media format tags and size ceilings: [`constants`]
//!
//! # ABI Stability Guarantees
//!
//! Every structure is `#[repr(C)]` and its size is asserted at compile time
//! for the 64-bit Windows target the host ships on. Function pointers are
//! wrapped in `Option` so that a NULL entry (an unsupported optional
//! callback) is representable without undefined behaviour.
//!
//! # String Encoding
//!
//! UI-facing strings are NUL-terminated UTF-16 (`*const u16`, the host's
//! `wchar_t`). Data-facing strings (script parameters, project keys, alias
//! data) are NUL-terminated UTF-8 (`*const c_char`).
//!
//! # Pointer Lifetimes
//!
//! Any pointer received through a callback is valid only for the duration of
//! that callback unless a field documents otherwise. Nothing in this crate
//! enforces that; the safe `aviutl2` crate does.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod constants;
pub mod entry;
pub mod filter;
pub mod input;
pub mod logger;
pub mod module;
pub mod output;
pub mod plugin;
pub mod prelude;
pub mod win32;

pub use config::{ConfigHandle, FontInfo};
pub use constants::{
    MAX_FILTER_DATA_SIZE, MAX_LOG_MESSAGE_LEN, MAX_PROJECT_BINARY_SIZE, audio_format, item_type,
    video_format,
};
pub use filter::{
    FilterItemButton, FilterItemCheck, FilterItemColor, FilterItemData, FilterItemFile,
    FilterItemFolder, FilterItemGroup, FilterItemSelect, FilterItemSelectItem, FilterItemString,
    FilterItemText, FilterItemTrack, FilterPluginFlags, FilterPluginTable, FilterProcAudio,
    FilterProcVideo, ObjectInfo, PixelRgba, SceneInfo, Texture2d,
};
pub use input::{InputHandle, InputInfo, InputInfoFlags, InputPluginFlags, InputPluginTable};
pub use logger::LogHandle;
pub use module::{ScriptModuleFunction, ScriptModuleParam, ScriptModuleTable};
pub use output::{OutputInfo, OutputInfoFlags, OutputPluginFlags, OutputPluginTable};
pub use plugin::{
    EditHandle, EditInfo, EditParamProc, EditProc, EditSection, HostAppTable, ObjectHandle,
    ObjectLayerFrame, ProjectFile, ProjectProc,
};
pub use win32::{BitmapInfoHeader, Hinstance, Hwnd, WaveFormatEx};

/// Host `wchar_t`: one UTF-16 code unit.
pub type WChar = u16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wchar_is_utf16_unit() {
        assert_eq!(std::mem::size_of::<WChar>(), 2);
    }

    #[test]
    fn test_re_exports() {
        let _ = MAX_LOG_MESSAGE_LEN;
        let _ = MAX_FILTER_DATA_SIZE;
        let _ = MAX_PROJECT_BINARY_SIZE;
        let _ = video_format::BI_RGB;
        let _ = audio_format::PCM;
        let _ = item_type::TRACK;
        let _ = entry::REGISTER_PLUGIN;
    }

    #[test]
    fn test_callback_aliases_at_root() {
        let pointer = std::mem::size_of::<usize>();
        assert_eq!(std::mem::size_of::<Option<EditProc>>(), pointer);
        assert_eq!(std::mem::size_of::<Option<EditParamProc>>(), pointer);
        assert_eq!(std::mem::size_of::<Option<ProjectProc>>(), pointer);
    }
}
