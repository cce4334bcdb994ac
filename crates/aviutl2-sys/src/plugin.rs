//! Generic plugin ABI: host app table, edit sections and project files.
//!
//! Required export: `RegisterPlugin(host: *mut HostAppTable)`.
//!
//! Frame and layer numbers in this module are 0-based (the UI shows them
//! 1-based).

use std::ffi::{c_char, c_void};

use crate::filter::FilterPluginTable;
use crate::input::InputPluginTable;
use crate::module::ScriptModuleTable;
use crate::output::OutputPluginTable;
use crate::win32::Hwnd;
use crate::WChar;

/// Opaque object handle, NULL for "none".
pub type ObjectHandle = *mut c_void;

/// Layer and frame range of an object.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ObjectLayerFrame {
    /// Layer number.
    pub layer: i32,
    /// First frame.
    pub start: i32,
    /// Last frame (inclusive).
    pub end: i32,
}

/// Snapshot of the edit state at the start of an edit section.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditInfo {
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
    /// Cursor frame.
    pub frame: i32,
    /// Selected layer.
    pub layer: i32,
    /// Highest frame occupied by an object.
    pub frame_max: i32,
    /// Highest layer occupied by an object.
    pub layer_max: i32,
}

/// Mutation surface valid only inside an edit callback.
///
/// Edits made here are recorded as one undo step.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EditSection {
    /// Edit state snapshot.
    pub info: *mut EditInfo,
    /// Create an object from UTF-8 alias text; NULL on overlap or bad alias.
    pub create_object_from_alias: Option<
        unsafe extern "C" fn(alias: *const c_char, layer: i32, frame: i32, length: i32) -> ObjectHandle,
    >,
    /// First object on `layer` at or after `frame`, NULL if none.
    pub find_object: Option<unsafe extern "C" fn(layer: i32, frame: i32) -> ObjectHandle>,
    /// Number of effects named `effect` on the object.
    pub count_object_effect:
        Option<unsafe extern "C" fn(object: ObjectHandle, effect: *const WChar) -> i32>,
    /// Position of the object.
    pub get_object_layer_frame:
        Option<unsafe extern "C" fn(object: ObjectHandle) -> ObjectLayerFrame>,
    /// Alias text (UTF-8) of the object, valid until the callback returns.
    pub get_object_alias: Option<unsafe extern "C" fn(object: ObjectHandle) -> *const c_char>,
    /// Item value (UTF-8), valid until the callback returns.
    pub get_object_item_value: Option<
        unsafe extern "C" fn(
            object: ObjectHandle,
            effect: *const WChar,
            item: *const WChar,
        ) -> *const c_char,
    >,
    /// Set an item value; false if the effect or item does not exist.
    pub set_object_item_value: Option<
        unsafe extern "C" fn(
            object: ObjectHandle,
            effect: *const WChar,
            item: *const WChar,
            value: *const c_char,
        ) -> bool,
    >,
    /// Move the object; false if the destination is occupied.
    pub move_object:
        Option<unsafe extern "C" fn(object: ObjectHandle, layer: i32, frame: i32) -> bool>,
    /// Delete the object.
    pub delete_object: Option<unsafe extern "C" fn(object: ObjectHandle)>,
    /// Object shown in the settings window, NULL if none.
    pub get_focus_object: Option<unsafe extern "C" fn() -> ObjectHandle>,
    /// Focus an object once the callback returns.
    pub set_focus_object: Option<unsafe extern "C" fn(object: ObjectHandle)>,
    /// Superseded by the logger handle.
    pub deprecated_output_log: Option<unsafe extern "C" fn(message: *const WChar)>,
    /// Selected object by index, NULL when out of range.
    pub get_selected_object: Option<unsafe extern "C" fn(index: i32) -> ObjectHandle>,
    /// Number of selected objects.
    pub get_selected_object_num: Option<unsafe extern "C" fn() -> i32>,
}

/// Edit callback without user data.
pub type EditProc = unsafe extern "C" fn(edit: *mut EditSection);

/// Edit callback with user data.
pub type EditParamProc = unsafe extern "C" fn(param: *mut c_void, edit: *mut EditSection);

/// Project load/save callback.
pub type ProjectProc = unsafe extern "C" fn(project: *mut ProjectFile);

/// Requests edit sections. Calls fail (return false) while output runs.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EditHandle {
    /// Run `func_proc_edit` on the main thread inside an edit section.
    pub call_edit_section: Option<unsafe extern "C" fn(func_proc_edit: Option<EditProc>) -> bool>,
    /// Same as `call_edit_section`, forwarding `param`.
    pub call_edit_section_param: Option<
        unsafe extern "C" fn(param: *mut c_void, func_proc_edit: Option<EditParamProc>) -> bool,
    >,
}

/// Key/value store of plugin data inside the project file.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProjectFile {
    /// Stored UTF-8 string, NULL if unset.
    pub get_param_string: Option<unsafe extern "C" fn(key: *const c_char) -> *const c_char>,
    /// Store a UTF-8 string.
    pub set_param_string: Option<unsafe extern "C" fn(key: *const c_char, value: *const c_char)>,
    /// Read a binary value; false unless `size` equals the stored size.
    pub get_param_binary:
        Option<unsafe extern "C" fn(key: *const c_char, data: *mut c_void, size: i32) -> bool>,
    /// Store a binary value of at most [`crate::MAX_PROJECT_BINARY_SIZE`] bytes.
    pub set_param_binary:
        Option<unsafe extern "C" fn(key: *const c_char, data: *mut c_void, size: i32)>,
    /// Remove every stored value.
    pub clear_params: Option<unsafe extern "C" fn()>,
}

/// Registration surface passed to `RegisterPlugin`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostAppTable {
    /// Set the plugin information string.
    pub set_plugin_information: Option<unsafe extern "C" fn(information: *const WChar)>,
    /// Register an input plugin.
    pub register_input_plugin: Option<unsafe extern "C" fn(table: *mut InputPluginTable)>,
    /// Register an output plugin.
    pub register_output_plugin: Option<unsafe extern "C" fn(table: *mut OutputPluginTable)>,
    /// Register a filter plugin.
    pub register_filter_plugin: Option<unsafe extern "C" fn(table: *mut FilterPluginTable)>,
    /// Register a script module.
    pub register_script_module: Option<unsafe extern "C" fn(table: *mut ScriptModuleTable)>,
    /// Register an import menu entry.
    pub register_import_menu:
        Option<unsafe extern "C" fn(name: *const WChar, func_proc_import: Option<EditProc>)>,
    /// Register an export menu entry.
    pub register_export_menu:
        Option<unsafe extern "C" fn(name: *const WChar, func_proc_export: Option<EditProc>)>,
    /// Dock a window into the host UI.
    pub register_window_client: Option<unsafe extern "C" fn(name: *const WChar, hwnd: Hwnd)>,
    /// Obtain an edit handle.
    pub create_edit_handle: Option<unsafe extern "C" fn() -> *mut EditHandle>,
    /// Called when a project is loaded or initialized.
    pub register_project_load_handler:
        Option<unsafe extern "C" fn(func_project_load: Option<ProjectProc>)>,
    /// Called right before a project is saved.
    pub register_project_save_handler:
        Option<unsafe extern "C" fn(func_project_save: Option<ProjectProc>)>,
    /// Register a layer context menu entry.
    pub register_layer_menu:
        Option<unsafe extern "C" fn(name: *const WChar, func_proc_layer_menu: Option<EditProc>)>,
    /// Register an object context menu entry.
    pub register_object_menu:
        Option<unsafe extern "C" fn(name: *const WChar, func_proc_object_menu: Option<EditProc>)>,
}

#[cfg(target_pointer_width = "64")]
mod layout {
    use super::*;
    use static_assertions::const_assert_eq;
    use std::mem::size_of;

    const_assert_eq!(size_of::<EditSection>(), 15 * 8);
    const_assert_eq!(size_of::<EditHandle>(), 16);
    const_assert_eq!(size_of::<ProjectFile>(), 40);
    const_assert_eq!(size_of::<HostAppTable>(), 13 * 8);
}

static_assertions::const_assert_eq!(std::mem::size_of::<ObjectLayerFrame>(), 12);
static_assertions::const_assert_eq!(std::mem::size_of::<EditInfo>(), 36);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_section_offsets() {
        assert_eq!(std::mem::offset_of!(EditSection, create_object_from_alias), 8);
        assert_eq!(std::mem::offset_of!(EditSection, deprecated_output_log), 96);
        assert_eq!(std::mem::offset_of!(EditSection, get_selected_object_num), 112);
    }

    #[test]
    fn test_host_app_table_menu_entries_last() {
        assert_eq!(std::mem::offset_of!(HostAppTable, create_edit_handle), 64);
        assert_eq!(std::mem::offset_of!(HostAppTable, register_object_menu), 96);
    }
}
