//! Filter plugin ABI (`aviutl2_filter_plugin_table`).
//!
//! Required export: `GetFilterPluginTable() -> *mut FilterPluginTable`.
//!
//! A filter declares its settings as a NULL-terminated array of pointers to
//! item structs. Every item struct starts with a `type` tag (see
//! [`crate::item_type`]) followed by the display `name`; the tag decides the
//! rest of the layout. The host writes the current setting into each `value`
//! field right before every process call.

use std::ffi::c_void;
use std::marker::{PhantomData, PhantomPinned};

use bitflags::bitflags;

use crate::WChar;
use crate::plugin::EditSection;

/// Track bar item (`L"track"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemTrack {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Current value, refreshed before each process call.
    pub value: f64,
    /// Minimum.
    pub s: f64,
    /// Maximum.
    pub e: f64,
    /// Step (`1.0`, `0.1`, `0.01` or `0.001`).
    pub step: f64,
}

/// Check box item (`L"check"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemCheck {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Current value.
    pub value: bool,
}

/// Color picker item (`L"color"`).
///
/// The C declaration is a union of `uint32_t code` and `{b, g, r, x}` bytes;
/// both views share one little-endian `u32`, which is what `value` holds.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemColor {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Color code (`0x00RRGGBB`).
    pub value: u32,
}

impl FilterItemColor {
    /// The `{b, g, r, x}` view of the union.
    #[must_use]
    pub fn components(&self) -> [u8; 4] {
        self.value.to_le_bytes()
    }
}

/// One entry of a select list. The list ends with a NULL `name`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemSelectItem {
    /// Option label.
    pub name: *const WChar,
    /// Option value.
    pub value: i32,
}

/// Select list item (`L"select"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemSelect {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Selected option value.
    pub value: i32,
    /// Options, terminated by an entry with a NULL name.
    pub list: *mut FilterItemSelectItem,
}

/// File path item (`L"file"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemFile {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Current path.
    pub value: *const WChar,
    /// Open dialog filter.
    pub filefilter: *const WChar,
}

/// Folder path item (`L"folder"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemFolder {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Current path.
    pub value: *const WChar,
}

/// Single-line string item (`L"string"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemString {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Current text.
    pub value: *const WChar,
}

/// Multi-line text item (`L"text"`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemText {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Current text.
    pub value: *const WChar,
}

/// Generic data item (`L"data"`), not shown in the UI.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemData {
    /// Type tag.
    pub type_: *const WChar,
    /// Setting name.
    pub name: *const WChar,
    /// Data block, refreshed before each process call.
    pub value: *mut c_void,
    /// Block size in bytes, at most [`crate::MAX_FILTER_DATA_SIZE`].
    pub size: i32,
}

/// Group marker (`L"group"`). An empty name closes the open group.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemGroup {
    /// Type tag.
    pub type_: *const WChar,
    /// Group name, empty for the closing marker.
    pub name: *const WChar,
    /// Whether the group starts expanded.
    pub default_visible: bool,
}

/// Button item (`L"button"`). The callback runs with edit-section access.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterItemButton {
    /// Type tag.
    pub type_: *const WChar,
    /// Button label.
    pub name: *const WChar,
    /// Invoked when the button is pressed.
    pub callback: Option<unsafe extern "C" fn(edit: *mut EditSection)>,
}

/// RGBA pixel, 8 bits per channel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PixelRgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

/// Scene parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneInfo {
    /// Scene width.
    pub width: i32,
    /// Scene height.
    pub height: i32,
    /// Frame rate numerator.
    pub rate: i32,
    /// Frame rate denominator.
    pub scale: i32,
    /// Audio sample rate.
    pub sample_rate: i32,
}

/// Object being processed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObjectInfo {
    /// Object ID, unique within the application.
    pub id: i64,
    /// Current frame relative to the object start.
    pub frame: i32,
    /// Object length in frames.
    pub frame_total: i32,
    /// Current time relative to the object start, in seconds.
    pub time: f64,
    /// Object length in seconds.
    pub time_total: f64,
    /// Current image width (video filters).
    pub width: i32,
    /// Current image height (video filters).
    pub height: i32,
    /// Current sample position (audio filters).
    pub sample_index: i64,
    /// Total samples (audio filters).
    pub sample_total: i64,
    /// Samples in this block (audio filters).
    pub sample_num: i32,
    /// Channel count (audio filters), usually 2.
    pub channel_num: i32,
    /// Effect instance ID, unique for the application lifetime.
    pub effect_id: i64,
}

/// Opaque `ID3D11Texture2D`.
#[repr(C)]
pub struct Texture2d {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Video processing context passed to `func_proc_video`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterProcVideo {
    /// Scene parameters.
    pub scene: *const SceneInfo,
    /// Object parameters.
    pub object: *const ObjectInfo,
    /// Copy the current image (`width * height` pixels) into `buffer`.
    pub get_image_data: Option<unsafe extern "C" fn(buffer: *mut PixelRgba)>,
    /// Replace the current image. A NULL buffer resizes with uninitialized data.
    pub set_image_data:
        Option<unsafe extern "C" fn(buffer: *mut PixelRgba, width: i32, height: i32)>,
    /// Current image texture, valid until `set_image_data` or the call returns.
    pub get_image_texture2d: Option<unsafe extern "C" fn() -> *mut Texture2d>,
    /// Framebuffer texture, valid until the call returns.
    pub get_framebuffer_texture2d: Option<unsafe extern "C" fn() -> *mut Texture2d>,
}

/// Audio processing context passed to `func_proc_audio`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterProcAudio {
    /// Scene parameters.
    pub scene: *const SceneInfo,
    /// Object parameters.
    pub object: *const ObjectInfo,
    /// Copy `sample_num` float samples of `channel` into `buffer`.
    pub get_sample_data: Option<unsafe extern "C" fn(buffer: *mut f32, channel: i32)>,
    /// Replace `sample_num` float samples of `channel`.
    pub set_sample_data: Option<unsafe extern "C" fn(buffer: *mut f32, channel: i32)>,
}

bitflags! {
    /// Flags of [`FilterPluginTable::flag`].
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FilterPluginFlags: i32 {
        /// Video filter.
        const VIDEO  = 1;
        /// Audio filter.
        const AUDIO  = 2;
        /// Usable as a media object (generates content).
        const INPUT  = 4;
        /// Usable as a filter object; image size must not change.
        const FILTER = 8;
    }
}

/// Filter plugin definition returned by `GetFilterPluginTable`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FilterPluginTable {
    /// [`FilterPluginFlags`] bits.
    pub flag: i32,
    /// Plugin name.
    pub name: *const WChar,
    /// Label (category) shown in menus, NULL for the default.
    pub label: *const WChar,
    /// Plugin information.
    pub information: *const WChar,
    /// NULL-terminated array of pointers to `FilterItem*` structs.
    pub items: *mut *mut c_void,
    /// Video process function, used with [`FilterPluginFlags::VIDEO`].
    pub func_proc_video: Option<unsafe extern "C" fn(video: *mut FilterProcVideo) -> bool>,
    /// Audio process function, used with [`FilterPluginFlags::AUDIO`].
    pub func_proc_audio: Option<unsafe extern "C" fn(audio: *mut FilterProcAudio) -> bool>,
}

impl FilterPluginTable {
    /// Get the flags as a bitflags struct.
    #[must_use]
    pub fn flags(&self) -> FilterPluginFlags {
        FilterPluginFlags::from_bits_truncate(self.flag)
    }
}

#[cfg(target_pointer_width = "64")]
mod layout {
    use super::*;
    use static_assertions::const_assert_eq;
    use std::mem::size_of;

    const_assert_eq!(size_of::<FilterItemTrack>(), 48);
    const_assert_eq!(size_of::<FilterItemCheck>(), 24);
    const_assert_eq!(size_of::<FilterItemColor>(), 24);
    const_assert_eq!(size_of::<FilterItemSelectItem>(), 16);
    const_assert_eq!(size_of::<FilterItemSelect>(), 32);
    const_assert_eq!(size_of::<FilterItemFile>(), 32);
    const_assert_eq!(size_of::<FilterItemFolder>(), 24);
    const_assert_eq!(size_of::<FilterItemString>(), 24);
    const_assert_eq!(size_of::<FilterItemText>(), 24);
    const_assert_eq!(size_of::<FilterItemData>(), 32);
    const_assert_eq!(size_of::<FilterItemGroup>(), 24);
    const_assert_eq!(size_of::<FilterItemButton>(), 24);
    const_assert_eq!(size_of::<SceneInfo>(), 20);
    const_assert_eq!(size_of::<ObjectInfo>(), 72);
    const_assert_eq!(size_of::<FilterProcVideo>(), 48);
    const_assert_eq!(size_of::<FilterProcAudio>(), 32);
    const_assert_eq!(size_of::<FilterPluginTable>(), 56);
}

static_assertions::const_assert_eq!(std::mem::size_of::<PixelRgba>(), 4);
