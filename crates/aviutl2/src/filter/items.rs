//! Filter setting items.
//!
//! [`FilterItem`] describes one setting; [`FilterItemArray`] lays the raw
//! item structs out at stable addresses and exposes the NULL-terminated
//! pointer array the host reads. The host writes each current value back
//! into those structs right before a process call, so values are read with
//! [`FilterItemArray::snapshot`] at the start of every call and never kept.

use std::ffi::c_void;

use aviutl2_sys::{self as sys, MAX_FILTER_DATA_SIZE, item_type, plugin::EditProc};

use crate::error::{Aviutl2Error, Result};
use crate::plugin::{RawBox, to_i32, to_usize};
use crate::wide::{WideString, read_wide_string};

/// Declaration of one filter setting.
#[derive(Debug, Clone)]
pub enum FilterItem {
    /// Track bar.
    Track {
        /// Setting name.
        name: String,
        /// Initial value.
        default: f64,
        /// Minimum.
        min: f64,
        /// Maximum.
        max: f64,
        /// Step: `1.0`, `0.1`, `0.01` or `0.001`.
        step: f64,
    },
    /// Check box.
    Check {
        /// Setting name.
        name: String,
        /// Initial state.
        default: bool,
    },
    /// Color picker.
    Color {
        /// Setting name.
        name: String,
        /// Initial color (`0x00RRGGBB`).
        default: u32,
    },
    /// Select list.
    Select {
        /// Setting name.
        name: String,
        /// Initially selected value.
        default: i32,
        /// `(label, value)` pairs.
        options: Vec<(String, i32)>,
    },
    /// File path.
    File {
        /// Setting name.
        name: String,
        /// Open dialog filter.
        filter: String,
    },
    /// Folder path.
    Folder {
        /// Setting name.
        name: String,
    },
    /// Single-line string.
    String {
        /// Setting name.
        name: String,
        /// Initial text.
        default: String,
    },
    /// Multi-line text.
    Text {
        /// Setting name.
        name: String,
        /// Initial text.
        default: String,
    },
    /// Opaque data block, not shown in the UI.
    Data {
        /// Setting name.
        name: String,
        /// Initial contents; its length is the block size.
        default: Vec<u8>,
    },
    /// Start of a collapsible group.
    Group {
        /// Group name.
        name: String,
        /// Whether the group starts expanded.
        default_visible: bool,
    },
    /// End of the current group.
    GroupEnd,
    /// Button running `callback` inside an edit section.
    Button {
        /// Button label.
        name: String,
        /// Callback, usually produced by [`crate::edit_callback!`].
        callback: EditProc,
    },
}

impl FilterItem {
    /// Track bar item.
    pub fn track(name: impl Into<String>, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self::Track {
            name: name.into(),
            default,
            min,
            max,
            step,
        }
    }

    /// Check box item.
    pub fn check(name: impl Into<String>, default: bool) -> Self {
        Self::Check {
            name: name.into(),
            default,
        }
    }

    /// Color item.
    pub fn color(name: impl Into<String>, default: u32) -> Self {
        Self::Color {
            name: name.into(),
            default,
        }
    }

    /// Select list item.
    pub fn select(name: impl Into<String>, default: i32, options: &[(&str, i32)]) -> Self {
        Self::Select {
            name: name.into(),
            default,
            options: options
                .iter()
                .map(|(label, value)| ((*label).to_string(), *value))
                .collect(),
        }
    }

    /// File item.
    pub fn file(name: impl Into<String>, filter: impl Into<String>) -> Self {
        Self::File {
            name: name.into(),
            filter: filter.into(),
        }
    }

    /// Folder item.
    pub fn folder(name: impl Into<String>) -> Self {
        Self::Folder { name: name.into() }
    }

    /// Single-line string item.
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::String {
            name: name.into(),
            default: default.into(),
        }
    }

    /// Multi-line text item.
    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            default: default.into(),
        }
    }

    /// Data item.
    pub fn data(name: impl Into<String>, default: Vec<u8>) -> Self {
        Self::Data {
            name: name.into(),
            default,
        }
    }

    /// Group start.
    pub fn group(name: impl Into<String>, default_visible: bool) -> Self {
        Self::Group {
            name: name.into(),
            default_visible,
        }
    }

    /// Button item.
    pub fn button(name: impl Into<String>, callback: EditProc) -> Self {
        Self::Button {
            name: name.into(),
            callback,
        }
    }

    /// Setting name (empty for [`FilterItem::GroupEnd`]).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Track { name, .. }
            | Self::Check { name, .. }
            | Self::Color { name, .. }
            | Self::Select { name, .. }
            | Self::File { name, .. }
            | Self::Folder { name }
            | Self::String { name, .. }
            | Self::Text { name, .. }
            | Self::Data { name, .. }
            | Self::Group { name, .. }
            | Self::Button { name, .. } => name,
            Self::GroupEnd => "",
        }
    }

    fn invalid(&self, reason: &'static str) -> Aviutl2Error {
        Aviutl2Error::InvalidFilterItem {
            name: self.name().to_string(),
            reason,
        }
    }
}

/// Current value of one setting.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Track bar position.
    Track(f64),
    /// Check state.
    Check(bool),
    /// Color code.
    Color(u32),
    /// Selected option value.
    Select(i32),
    /// File or folder path.
    Path(String),
    /// String or text contents.
    String(String),
    /// Data block contents.
    Data(Vec<u8>),
}

/// Snapshot of every setting value, taken at the start of a process call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterConfig {
    values: Vec<(String, FilterValue)>,
}

impl FilterConfig {
    /// Build a snapshot from name/value pairs.
    #[must_use]
    pub fn from_values(values: Vec<(String, FilterValue)>) -> Self {
        Self { values }
    }

    /// Value of the first setting named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// All values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Track bar value.
    #[must_use]
    pub fn track(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            FilterValue::Track(v) => Some(*v),
            _ => None,
        }
    }

    /// Check box state.
    #[must_use]
    pub fn check(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FilterValue::Check(v) => Some(*v),
            _ => None,
        }
    }

    /// Color code.
    #[must_use]
    pub fn color(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            FilterValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// Selected option value.
    #[must_use]
    pub fn select(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            FilterValue::Select(v) => Some(*v),
            _ => None,
        }
    }

    /// File or folder path.
    #[must_use]
    pub fn path(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FilterValue::Path(v) => Some(v),
            _ => None,
        }
    }

    /// String or text contents.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            FilterValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Data block contents.
    #[must_use]
    pub fn data(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            FilterValue::Data(v) => Some(v),
            _ => None,
        }
    }
}

enum RawItem {
    Track(RawBox<sys::FilterItemTrack>),
    Check(RawBox<sys::FilterItemCheck>),
    Color(RawBox<sys::FilterItemColor>),
    Select(RawBox<sys::FilterItemSelect>),
    File(RawBox<sys::FilterItemFile>),
    Folder(RawBox<sys::FilterItemFolder>),
    String(RawBox<sys::FilterItemString>),
    Text(RawBox<sys::FilterItemText>),
    Data(RawBox<sys::FilterItemData>, usize),
    Group(RawBox<sys::FilterItemGroup>),
    Button(RawBox<sys::FilterItemButton>),
}

impl RawItem {
    fn as_ptr(&self) -> *mut c_void {
        match self {
            Self::Track(b) => b.as_ptr().cast(),
            Self::Check(b) => b.as_ptr().cast(),
            Self::Color(b) => b.as_ptr().cast(),
            Self::Select(b) => b.as_ptr().cast(),
            Self::File(b) => b.as_ptr().cast(),
            Self::Folder(b) => b.as_ptr().cast(),
            Self::String(b) => b.as_ptr().cast(),
            Self::Text(b) => b.as_ptr().cast(),
            Self::Data(b, _) => b.as_ptr().cast(),
            Self::Group(b) => b.as_ptr().cast(),
            Self::Button(b) => b.as_ptr().cast(),
        }
    }
}

static TRACK: [u16; 6] = item_type::TRACK;
static CHECK: [u16; 6] = item_type::CHECK;
static COLOR: [u16; 6] = item_type::COLOR;
static SELECT: [u16; 7] = item_type::SELECT;
static FILE: [u16; 5] = item_type::FILE;
static FOLDER: [u16; 7] = item_type::FOLDER;
static STRING: [u16; 7] = item_type::STRING;
static TEXT: [u16; 5] = item_type::TEXT;
static DATA: [u16; 5] = item_type::DATA;
static GROUP: [u16; 6] = item_type::GROUP;
static BUTTON: [u16; 7] = item_type::BUTTON;

/// Raw item structs plus the NULL-terminated pointer array handed to the
/// host.
pub struct FilterItemArray {
    names: Vec<(String, RawItem)>,
    pointers: Vec<*mut c_void>,
    pointers_ptr: *mut *mut c_void,
    strings: Vec<WideString>,
    select_lists: Vec<Vec<sys::FilterItemSelectItem>>,
    data_blocks: Vec<Vec<u8>>,
}

impl std::fmt::Debug for FilterItemArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterItemArray")
            .field("items", &self.names.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

impl FilterItemArray {
    /// Validate `items` and lay out their raw structs.
    ///
    /// # Errors
    ///
    /// Returns [`Aviutl2Error::InvalidFilterItem`] for a data item above
    /// [`MAX_FILTER_DATA_SIZE`] bytes, a track with a non-finite bound, a
    /// minimum above its maximum or a step that is not a positive finite
    /// number, a select list without options,
    /// or a group end with no open group.
    pub fn build(items: &[FilterItem]) -> Result<Self> {
        let mut array = Self {
            names: Vec::with_capacity(items.len()),
            pointers: Vec::new(),
            pointers_ptr: std::ptr::null_mut(),
            strings: Vec::new(),
            select_lists: Vec::new(),
            data_blocks: Vec::new(),
        };
        let mut group_open = false;
        for item in items {
            let raw = array.lay_out(item, &mut group_open)?;
            array.names.push((item.name().to_string(), raw));
        }
        let mut pointers: Vec<*mut c_void> = array.names.iter().map(|(_, r)| r.as_ptr()).collect();
        pointers.push(std::ptr::null_mut());
        array.pointers_ptr = pointers.as_mut_ptr();
        array.pointers = pointers;
        Ok(array)
    }

    fn wide(&mut self, s: &str) -> *const u16 {
        let wide = WideString::new(s);
        let ptr = wide.as_ptr();
        self.strings.push(wide);
        ptr
    }

    fn lay_out(&mut self, item: &FilterItem, group_open: &mut bool) -> Result<RawItem> {
        let name = self.wide(item.name());
        let raw = match item {
            FilterItem::Track {
                default,
                min,
                max,
                step,
                ..
            } => {
                if !(min.is_finite() && max.is_finite()) {
                    return Err(item.invalid("range bounds must be finite"));
                }
                if min > max {
                    return Err(item.invalid("minimum exceeds maximum"));
                }
                if !(step.is_finite() && *step > 0.0) {
                    return Err(item.invalid("step must be positive"));
                }
                RawItem::Track(RawBox::new(sys::FilterItemTrack {
                    type_: TRACK.as_ptr(),
                    name,
                    value: default.clamp(*min, *max),
                    s: *min,
                    e: *max,
                    step: *step,
                }))
            }
            FilterItem::Check { default, .. } => RawItem::Check(RawBox::new(sys::FilterItemCheck {
                type_: CHECK.as_ptr(),
                name,
                value: *default,
            })),
            FilterItem::Color { default, .. } => RawItem::Color(RawBox::new(sys::FilterItemColor {
                type_: COLOR.as_ptr(),
                name,
                value: *default,
            })),
            FilterItem::Select {
                default, options, ..
            } => {
                if options.is_empty() {
                    return Err(item.invalid("select list has no options"));
                }
                let mut list: Vec<sys::FilterItemSelectItem> = options
                    .iter()
                    .map(|(label, value)| sys::FilterItemSelectItem {
                        name: self.wide(label),
                        value: *value,
                    })
                    .collect();
                list.push(sys::FilterItemSelectItem {
                    name: std::ptr::null(),
                    value: 0,
                });
                let list_ptr = list.as_mut_ptr();
                self.select_lists.push(list);
                RawItem::Select(RawBox::new(sys::FilterItemSelect {
                    type_: SELECT.as_ptr(),
                    name,
                    value: *default,
                    list: list_ptr,
                }))
            }
            FilterItem::File { filter, .. } => {
                let empty = self.wide("");
                RawItem::File(RawBox::new(sys::FilterItemFile {
                    type_: FILE.as_ptr(),
                    name,
                    value: empty,
                    filefilter: self.wide(filter),
                }))
            }
            FilterItem::Folder { .. } => RawItem::Folder(RawBox::new(sys::FilterItemFolder {
                type_: FOLDER.as_ptr(),
                name,
                value: self.wide(""),
            })),
            FilterItem::String { default, .. } => {
                RawItem::String(RawBox::new(sys::FilterItemString {
                    type_: STRING.as_ptr(),
                    name,
                    value: self.wide(default),
                }))
            }
            FilterItem::Text { default, .. } => RawItem::Text(RawBox::new(sys::FilterItemText {
                type_: TEXT.as_ptr(),
                name,
                value: self.wide(default),
            })),
            FilterItem::Data { default, .. } => {
                if default.len() > MAX_FILTER_DATA_SIZE {
                    return Err(item.invalid("data block exceeds 1024 bytes"));
                }
                let mut block = default.clone();
                let size = block.len();
                let ptr = block.as_mut_ptr().cast::<c_void>();
                self.data_blocks.push(block);
                RawItem::Data(
                    RawBox::new(sys::FilterItemData {
                        type_: DATA.as_ptr(),
                        name,
                        value: ptr,
                        size: to_i32(size),
                    }),
                    size,
                )
            }
            FilterItem::Group {
                default_visible, ..
            } => {
                *group_open = true;
                RawItem::Group(RawBox::new(sys::FilterItemGroup {
                    type_: GROUP.as_ptr(),
                    name,
                    default_visible: *default_visible,
                }))
            }
            FilterItem::GroupEnd => {
                if !*group_open {
                    return Err(item.invalid("group end without an open group"));
                }
                *group_open = false;
                RawItem::Group(RawBox::new(sys::FilterItemGroup {
                    type_: GROUP.as_ptr(),
                    name,
                    default_visible: false,
                }))
            }
            FilterItem::Button { callback, .. } => {
                RawItem::Button(RawBox::new(sys::FilterItemButton {
                    type_: BUTTON.as_ptr(),
                    name,
                    callback: Some(*callback),
                }))
            }
        };
        Ok(raw)
    }

    /// NULL-terminated array of item pointers for the plugin table.
    #[must_use]
    pub fn as_raw(&self) -> *mut *mut c_void {
        self.pointers_ptr
    }

    /// Number of items (terminator excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pointers.len().saturating_sub(1)
    }

    /// Whether there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the values the host last wrote into the item structs.
    #[must_use]
    pub fn snapshot(&self) -> FilterConfig {
        let values = self
            .names
            .iter()
            .filter_map(|(name, raw)| Some((name.clone(), Self::read(raw)?)))
            .collect();
        FilterConfig { values }
    }

    fn read(raw: &RawItem) -> Option<FilterValue> {
        let value = match raw {
            RawItem::Track(b) => FilterValue::Track(b.get().value),
            RawItem::Check(b) => FilterValue::Check(b.get().value),
            RawItem::Color(b) => FilterValue::Color(b.get().value),
            RawItem::Select(b) => FilterValue::Select(b.get().value),
            // SAFETY: the host keeps path and text values alive until the
            // process call returns; they are copied immediately.
            RawItem::File(b) => FilterValue::Path(unsafe { read_wide_string(b.get().value) }?),
            // SAFETY: as above.
            RawItem::Folder(b) => FilterValue::Path(unsafe { read_wide_string(b.get().value) }?),
            // SAFETY: as above.
            RawItem::String(b) => FilterValue::String(unsafe { read_wide_string(b.get().value) }?),
            // SAFETY: as above.
            RawItem::Text(b) => FilterValue::String(unsafe { read_wide_string(b.get().value) }?),
            RawItem::Data(b, declared) => {
                let raw = b.get();
                if raw.value.is_null() {
                    return None;
                }
                let size = to_usize(raw.size).min(*declared);
                // SAFETY: the block holds at least the declared size, which
                // the host never exceeds.
                let bytes = unsafe { std::slice::from_raw_parts(raw.value.cast::<u8>(), size) };
                FilterValue::Data(bytes.to_vec())
            }
            RawItem::Group(_) | RawItem::Button(_) => return None,
        };
        Some(value)
    }
}

// SAFETY: every raw pointer refers to buffers owned by this value. After
// `build` Rust only reads them; the host writes values between calls.
unsafe impl Send for FilterItemArray {}
// SAFETY: see above.
unsafe impl Sync for FilterItemArray {}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    unsafe extern "C" fn noop(_: *mut sys::EditSection) {}

    fn sample() -> Vec<FilterItem> {
        vec![
            FilterItem::track("Strength", 50.0, 0.0, 100.0, 1.0),
            FilterItem::group("Advanced", false),
            FilterItem::check("Invert", true),
            FilterItem::select("Mode", 1, &[("Add", 0), ("Mul", 1)]),
            FilterItem::GroupEnd,
            FilterItem::color("Tint", 0x00FF_8800),
            FilterItem::string("Label", "hi"),
            FilterItem::data("State", vec![1, 2, 3]),
            FilterItem::button("Reset", noop),
        ]
    }

    #[test]
    fn test_array_is_null_terminated() -> TestResult {
        let array = FilterItemArray::build(&sample())?;
        assert_eq!(array.len(), 9);
        let raw = array.as_raw();
        // SAFETY: the array holds len + 1 pointers.
        let terminator = unsafe { *raw.add(array.len()) };
        assert!(terminator.is_null());
        Ok(())
    }

    #[test]
    fn test_items_start_with_type_tag() -> TestResult {
        let array = FilterItemArray::build(&sample())?;
        // SAFETY: the array holds at least one item pointer.
        let item = unsafe { *array.as_raw() };
        // SAFETY: every item starts with the type pointer.
        let first = unsafe { *item.cast::<*const u16>() };
        // SAFETY: the tag is a static NUL-terminated string.
        let tag = unsafe { read_wide_string(first) };
        assert_eq!(tag.as_deref(), Some("track"));
        Ok(())
    }

    #[test]
    fn test_snapshot_reads_defaults() -> TestResult {
        let config = FilterItemArray::build(&sample())?.snapshot();
        assert_eq!(config.track("Strength"), Some(50.0));
        assert_eq!(config.check("Invert"), Some(true));
        assert_eq!(config.select("Mode"), Some(1));
        assert_eq!(config.color("Tint"), Some(0x00FF_8800));
        assert_eq!(config.string("Label"), Some("hi"));
        assert_eq!(config.data("State"), Some(&[1u8, 2, 3][..]));
        assert_eq!(config.track("Invert"), None);
        assert!(config.get("Advanced").is_none());
        Ok(())
    }

    #[test]
    fn test_snapshot_observes_host_writes() -> TestResult {
        let array = FilterItemArray::build(&[FilterItem::track("T", 0.0, 0.0, 10.0, 0.1)])?;
        // SAFETY: the array holds at least one item pointer.
        let track = unsafe { *array.as_raw() }.cast::<sys::FilterItemTrack>();
        // SAFETY: item 0 is a track item owned by `array`.
        unsafe { (*track).value = 7.5 };
        assert_eq!(array.snapshot().track("T"), Some(7.5));
        Ok(())
    }

    #[test]
    fn test_validation() {
        let too_big = FilterItem::data("Big", vec![0; MAX_FILTER_DATA_SIZE + 1]);
        assert!(matches!(
            FilterItemArray::build(&[too_big]),
            Err(Aviutl2Error::InvalidFilterItem { .. })
        ));
        let inverted = FilterItem::track("T", 0.0, 10.0, 0.0, 1.0);
        assert!(matches!(FilterItemArray::build(&[inverted]), Err(Aviutl2Error::InvalidFilterItem { .. })));
        let empty_select = FilterItem::select("S", 0, &[]);
        assert!(matches!(FilterItemArray::build(&[empty_select]), Err(Aviutl2Error::InvalidFilterItem { .. })));
        assert!(matches!(FilterItemArray::build(&[FilterItem::GroupEnd]), Err(Aviutl2Error::InvalidFilterItem { .. })));
    }

    #[test]
    fn test_data_at_limit_accepted() -> TestResult {
        let array = FilterItemArray::build(&[FilterItem::data("D", vec![7; MAX_FILTER_DATA_SIZE])])?;
        assert_eq!(array.snapshot().data("D").map(<[u8]>::len), Some(MAX_FILTER_DATA_SIZE));
        Ok(())
    }

    #[test]
    fn test_track_default_clamped() -> TestResult {
        let array = FilterItemArray::build(&[FilterItem::track("T", 500.0, 0.0, 100.0, 1.0)])?;
        assert_eq!(array.snapshot().track("T"), Some(100.0));
        Ok(())
    }

    #[test]
    fn test_track_rejects_non_finite_range() {
        for track in [
            FilterItem::track("T", 0.0, f64::NAN, 1.0, 0.1),
            FilterItem::track("T", 0.0, 0.0, f64::NAN, 0.1),
            FilterItem::track("T", 0.0, f64::NEG_INFINITY, f64::INFINITY, 0.1),
            FilterItem::track("T", 0.0, 0.0, 1.0, f64::NAN),
            FilterItem::track("T", 0.0, 0.0, 1.0, f64::INFINITY),
        ] {
            assert!(matches!(
                FilterItemArray::build(&[track]),
                Err(Aviutl2Error::InvalidFilterItem { .. })
            ));
        }
    }
}
