//! Recording host application table for `RegisterPlugin`.

use std::cell::RefCell;
use std::fmt;

use aviutl2::wide::read_wide_string;
use aviutl2_sys as sys;
use aviutl2_sys::plugin::{EditProc, ProjectProc};
use serde::Serialize;

/// Context menu a callback was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    /// File → Import.
    Import,
    /// File → Export.
    Export,
    /// Layer context menu.
    Layer,
    /// Object context menu.
    Object,
}

/// One registered menu entry.
#[derive(Clone, Copy)]
pub struct MenuEntry {
    /// Menu.
    pub kind: MenuKind,
    /// Callback.
    pub callback: EditProc,
}

impl fmt::Debug for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuEntry").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Everything a plugin registered during one `RegisterPlugin` call.
#[derive(Debug, Default)]
pub struct RecordedRegistration {
    /// Plugin information string.
    pub information: Option<String>,
    /// Input plugin tables.
    pub inputs: Vec<*mut sys::InputPluginTable>,
    /// Output plugin tables.
    pub outputs: Vec<*mut sys::OutputPluginTable>,
    /// Filter plugin tables.
    pub filters: Vec<*mut sys::FilterPluginTable>,
    /// Script module tables.
    pub scripts: Vec<*mut sys::ScriptModuleTable>,
    /// Menu entries with their names.
    pub menus: Vec<(String, MenuEntry)>,
    /// Docked window names.
    pub windows: Vec<String>,
    /// `create_edit_handle` calls.
    pub edit_handles: usize,
    /// Project load handlers.
    pub load_handlers: Vec<ProjectProc>,
    /// Project save handlers.
    pub save_handlers: Vec<ProjectProc>,
    /// Calls with a NULL table, name or callback.
    pub null_arguments: usize,
}

impl RecordedRegistration {
    /// Number of module tables.
    pub fn table_count(&self) -> usize {
        self.inputs.len() + self.outputs.len() + self.filters.len() + self.scripts.len()
    }

    /// Registered menu names of `kind`.
    pub fn menu_names(&self, kind: MenuKind) -> Vec<&str> {
        self.menus
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Registration state machine of one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RegistrationState {
    /// Loaded, nothing registered yet.
    Unregistered,
    /// `RegisterPlugin` (or a table getter) returned.
    Registered {
        /// Module tables registered.
        tables: usize,
        /// Menu entries registered.
        menus: usize,
    },
    /// `UninitializePlugin` ran; every table is invalid.
    Unloaded,
}

impl RegistrationState {
    /// Move to `Registered` from `Unregistered`.
    pub fn register(self, tables: usize, menus: usize) -> Option<Self> {
        match self {
            Self::Unregistered => Some(Self::Registered { tables, menus }),
            _ => None,
        }
    }

    /// Move to `Unloaded` from any loaded state.
    pub fn unload(self) -> Option<Self> {
        match self {
            Self::Unloaded => None,
            _ => Some(Self::Unloaded),
        }
    }
}

thread_local! {
    static RECORDING: RefCell<RecordedRegistration> = RefCell::new(RecordedRegistration::default());
}

fn record(f: impl FnOnce(&mut RecordedRegistration)) {
    RECORDING.with(|r| f(&mut r.borrow_mut()));
}

fn record_table<T>(table: *mut T, f: impl FnOnce(&mut RecordedRegistration, *mut T)) {
    record(|r| {
        if table.is_null() {
            r.null_arguments += 1;
        } else {
            f(r, table);
        }
    });
}

fn record_menu(kind: MenuKind, name: *const u16, callback: Option<EditProc>) {
    // SAFETY: the plugin passes a NUL-terminated name valid for the call.
    let name = unsafe { read_wide_string(name) };
    record(|r| match (name, callback) {
        (Some(name), Some(callback)) => r.menus.push((name, MenuEntry { kind, callback })),
        _ => r.null_arguments += 1,
    });
}

unsafe extern "C" fn set_plugin_information(information: *const u16) {
    // SAFETY: NUL-terminated string valid for the call.
    let information = unsafe { read_wide_string(information) };
    record(|r| r.information = information);
}

unsafe extern "C" fn register_input_plugin(table: *mut sys::InputPluginTable) {
    record_table(table, |r, t| r.inputs.push(t));
}

unsafe extern "C" fn register_output_plugin(table: *mut sys::OutputPluginTable) {
    record_table(table, |r, t| r.outputs.push(t));
}

unsafe extern "C" fn register_filter_plugin(table: *mut sys::FilterPluginTable) {
    record_table(table, |r, t| r.filters.push(t));
}

unsafe extern "C" fn register_script_module(table: *mut sys::ScriptModuleTable) {
    record_table(table, |r, t| r.scripts.push(t));
}

unsafe extern "C" fn register_import_menu(name: *const u16, callback: Option<EditProc>) {
    record_menu(MenuKind::Import, name, callback);
}

unsafe extern "C" fn register_export_menu(name: *const u16, callback: Option<EditProc>) {
    record_menu(MenuKind::Export, name, callback);
}

unsafe extern "C" fn register_layer_menu(name: *const u16, callback: Option<EditProc>) {
    record_menu(MenuKind::Layer, name, callback);
}

unsafe extern "C" fn register_object_menu(name: *const u16, callback: Option<EditProc>) {
    record_menu(MenuKind::Object, name, callback);
}

unsafe extern "C" fn register_window_client(name: *const u16, _hwnd: sys::Hwnd) {
    // SAFETY: NUL-terminated string valid for the call.
    let name = unsafe { read_wide_string(name) };
    record(|r| match name {
        Some(name) => r.windows.push(name),
        None => r.null_arguments += 1,
    });
}

unsafe extern "C" fn create_edit_handle() -> *mut sys::EditHandle {
    record(|r| r.edit_handles += 1);
    super::edit::handle()
}

unsafe extern "C" fn register_project_load_handler(handler: Option<ProjectProc>) {
    record(|r| match handler {
        Some(handler) => r.load_handlers.push(handler),
        None => r.null_arguments += 1,
    });
}

unsafe extern "C" fn register_project_save_handler(handler: Option<ProjectProc>) {
    record(|r| match handler {
        Some(handler) => r.save_handlers.push(handler),
        None => r.null_arguments += 1,
    });
}

/// Host application table whose entries record into this thread.
pub fn table() -> sys::HostAppTable {
    sys::HostAppTable {
        set_plugin_information: Some(set_plugin_information),
        register_input_plugin: Some(register_input_plugin),
        register_output_plugin: Some(register_output_plugin),
        register_filter_plugin: Some(register_filter_plugin),
        register_script_module: Some(register_script_module),
        register_import_menu: Some(register_import_menu),
        register_export_menu: Some(register_export_menu),
        register_window_client: Some(register_window_client),
        create_edit_handle: Some(create_edit_handle),
        register_project_load_handler: Some(register_project_load_handler),
        register_project_save_handler: Some(register_project_save_handler),
        register_layer_menu: Some(register_layer_menu),
        register_object_menu: Some(register_object_menu),
    }
}

/// Call `RegisterPlugin` and collect what it registered.
pub fn record_registration(register: sys::entry::RegisterPluginFn) -> RecordedRegistration {
    reset();
    let mut host = table();
    // SAFETY: `host` outlives the call; the plugin must not keep it.
    unsafe { register(&raw mut host) };
    RECORDING.with(RefCell::take)
}

/// Drop any partial recording on this thread.
pub fn reset() {
    RECORDING.with(|r| *r.borrow_mut() = RecordedRegistration::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviutl2::WideString;

    unsafe extern "C" fn noop_menu(_: *mut sys::EditSection) {}

    unsafe extern "C" fn register(host: *mut sys::HostAppTable) {
        // SAFETY: live host table.
        let host = unsafe { &*host };
        let name = WideString::new("Split");
        let info = WideString::new("Sample 1.0");
        if let (Some(set), Some(menu), Some(edit)) =
            (host.set_plugin_information, host.register_object_menu, host.create_edit_handle)
        {
            // SAFETY: live string.
            unsafe { set(info.as_ptr()) };
            // SAFETY: live string and callback.
            unsafe { menu(name.as_ptr(), Some(noop_menu)) };
            // SAFETY: no arguments.
            let handle = unsafe { edit() };
            assert!(!handle.is_null());
        }
        if let Some(filter) = host.register_filter_plugin {
            // SAFETY: NULL is recorded, never dereferenced.
            unsafe { filter(std::ptr::null_mut()) };
        }
    }

    #[test]
    fn test_records_everything() {
        let recorded = record_registration(register);
        assert_eq!(recorded.information.as_deref(), Some("Sample 1.0"));
        assert_eq!(recorded.menu_names(MenuKind::Object), vec!["Split"]);
        assert_eq!(recorded.edit_handles, 1);
        assert_eq!(recorded.null_arguments, 1);
        assert_eq!(recorded.table_count(), 0);
    }

    #[test]
    fn test_state_machine() {
        let state = RegistrationState::Unregistered;
        let registered = state.register(2, 1);
        assert_eq!(registered, Some(RegistrationState::Registered { tables: 2, menus: 1 }));
        let unloaded = registered.and_then(RegistrationState::unload);
        assert_eq!(unloaded, Some(RegistrationState::Unloaded));
        assert_eq!(unloaded.and_then(RegistrationState::unload), None);
        assert_eq!(unloaded.and_then(|s| s.register(1, 0)), None);
    }
}
