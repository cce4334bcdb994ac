//! Generic plugins and the host application table.
//!
//! A generic plugin exports `RegisterPlugin` and uses [`HostApp`] to
//! register any mix of input, output, filter and script modules, menus and
//! project handlers. Registration is additive and lasts until the plugin is
//! unloaded.

use parking_lot::Mutex;

use aviutl2_sys::{self as sys, EditProc, ProjectProc};

use crate::edit::EditHandle;
use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::filter::{self, FilterPlugin};
use crate::input::{self, InputPlugin};
use crate::output::{self, OutputPlugin};
use crate::plugin::{self, HostInfo, report};
use crate::project::ProjectFile;
use crate::script::{self, ScriptModule};
use crate::wide::WideString;

/// What a [`HostApp`] has registered so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registrations {
    /// Module tables (input, output, filter, script).
    pub tables: usize,
    /// Menu entries.
    pub menus: usize,
    /// Window clients.
    pub windows: usize,
    /// Project load/save handlers.
    pub project_handlers: usize,
}

/// The host's registration table, valid during `RegisterPlugin`.
#[derive(Debug)]
pub struct HostApp<'a> {
    raw: &'a sys::HostAppTable,
    info: HostInfo,
    registered: Registrations,
}

impl<'a> HostApp<'a> {
    /// Wrap the host's table.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer passed to the running `RegisterPlugin`.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::HostAppTable, info: HostInfo) -> Option<Self> {
        // SAFETY: per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self {
            raw,
            info,
            registered: Registrations::default(),
        })
    }

    /// Host information from `InitializePlugin`.
    #[must_use]
    pub fn info(&self) -> HostInfo {
        self.info
    }

    /// Everything registered through this table so far.
    #[must_use]
    pub fn registrations(&self) -> Registrations {
        self.registered
    }

    /// Set the text shown in the plugin list.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn set_plugin_information(&mut self, information: &str) -> Result<()> {
        let set = self
            .raw
            .set_plugin_information
            .ok_or(Aviutl2Error::Unsupported("set_plugin_information"))?;
        let ptr = plugin::retain(WideString::new(information));
        // SAFETY: the string is retained until unload.
        unsafe { set(ptr) };
        Ok(())
    }

    /// Create `I` and register its table.
    ///
    /// # Errors
    ///
    /// Fails if `I::new` fails, `I` is already registered or the host lacks
    /// the function.
    pub fn register_input_plugin<I: InputPlugin>(&mut self) -> Result<()> {
        let register = self
            .raw
            .register_input_plugin
            .ok_or(Aviutl2Error::Unsupported("register_input_plugin"))?;
        let table = input::install::<I>(self.info)?;
        // SAFETY: the table lives in the registry until unload.
        unsafe { register(table) };
        self.registered.tables += 1;
        Ok(())
    }

    /// Create `O` and register its table.
    ///
    /// # Errors
    ///
    /// See [`HostApp::register_input_plugin`].
    pub fn register_output_plugin<O: OutputPlugin>(&mut self) -> Result<()> {
        let register = self
            .raw
            .register_output_plugin
            .ok_or(Aviutl2Error::Unsupported("register_output_plugin"))?;
        let table = output::install::<O>(self.info)?;
        // SAFETY: the table lives in the registry until unload.
        unsafe { register(table) };
        self.registered.tables += 1;
        Ok(())
    }

    /// Create `F` and register its table.
    ///
    /// # Errors
    ///
    /// See [`HostApp::register_input_plugin`].
    pub fn register_filter_plugin<F: FilterPlugin>(&mut self) -> Result<()> {
        let register = self
            .raw
            .register_filter_plugin
            .ok_or(Aviutl2Error::Unsupported("register_filter_plugin"))?;
        let table = filter::install::<F>(self.info)?;
        // SAFETY: the table lives in the registry until unload.
        unsafe { register(table) };
        self.registered.tables += 1;
        Ok(())
    }

    /// Create `M` and register its table.
    ///
    /// # Errors
    ///
    /// See [`HostApp::register_input_plugin`].
    pub fn register_script_module<M: ScriptModule>(&mut self) -> Result<()> {
        let register = self
            .raw
            .register_script_module
            .ok_or(Aviutl2Error::Unsupported("register_script_module"))?;
        let table = script::install::<M>(self.info)?;
        // SAFETY: the table lives in the registry until unload.
        unsafe { register(table) };
        self.registered.tables += 1;
        Ok(())
    }

    fn register_menu(
        &mut self,
        register: Option<unsafe extern "C" fn(*const u16, Option<EditProc>)>,
        what: &'static str,
        name: &str,
        callback: EditProc,
    ) -> Result<()> {
        let register = register.ok_or(Aviutl2Error::Unsupported(what))?;
        let ptr = plugin::retain(WideString::new(name));
        // SAFETY: the name is retained until unload.
        unsafe { register(ptr, Some(callback)) };
        self.registered.menus += 1;
        tracing::debug!(menu = what, name, "menu registered");
        Ok(())
    }

    /// Add an entry to the import menu.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_import_menu(&mut self, name: &str, callback: EditProc) -> Result<()> {
        self.register_menu(self.raw.register_import_menu, "register_import_menu", name, callback)
    }

    /// Add an entry to the export menu.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_export_menu(&mut self, name: &str, callback: EditProc) -> Result<()> {
        self.register_menu(self.raw.register_export_menu, "register_export_menu", name, callback)
    }

    /// Add an entry to the layer context menu.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_layer_menu(&mut self, name: &str, callback: EditProc) -> Result<()> {
        self.register_menu(self.raw.register_layer_menu, "register_layer_menu", name, callback)
    }

    /// Add an entry to the object context menu.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_object_menu(&mut self, name: &str, callback: EditProc) -> Result<()> {
        self.register_menu(self.raw.register_object_menu, "register_object_menu", name, callback)
    }

    /// Dock a plugin window into the host.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_window_client(&mut self, name: &str, hwnd: sys::Hwnd) -> Result<()> {
        let register = self
            .raw
            .register_window_client
            .ok_or(Aviutl2Error::Unsupported("register_window_client"))?;
        let ptr = plugin::retain(WideString::new(name));
        // SAFETY: the name is retained until unload; the window belongs to
        // the plugin.
        unsafe { register(ptr, hwnd) };
        self.registered.windows += 1;
        Ok(())
    }

    /// Obtain a handle for opening edit sections later, from any callback.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function or returns null.
    pub fn create_edit_handle(&mut self) -> Result<EditHandle> {
        let create = self
            .raw
            .create_edit_handle
            .ok_or(Aviutl2Error::Unsupported("create_edit_handle"))?;
        // SAFETY: no arguments.
        let raw = unsafe { create() };
        // SAFETY: the host owns the handle until unload.
        unsafe { EditHandle::from_raw(raw) }.ok_or(Aviutl2Error::OperationFailed("create_edit_handle"))
    }

    /// Call `handler` when a project is loaded.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_project_load_handler(&mut self, handler: ProjectProc) -> Result<()> {
        let register = self
            .raw
            .register_project_load_handler
            .ok_or(Aviutl2Error::Unsupported("register_project_load_handler"))?;
        // SAFETY: plain function pointer.
        unsafe { register(Some(handler)) };
        self.registered.project_handlers += 1;
        Ok(())
    }

    /// Call `handler` when a project is saved.
    ///
    /// # Errors
    ///
    /// Fails if the host lacks the function.
    pub fn register_project_save_handler(&mut self, handler: ProjectProc) -> Result<()> {
        let register = self
            .raw
            .register_project_save_handler
            .ok_or(Aviutl2Error::Unsupported("register_project_save_handler"))?;
        // SAFETY: plain function pointer.
        unsafe { register(Some(handler)) };
        self.registered.project_handlers += 1;
        Ok(())
    }
}

/// A plugin that registers its features through [`HostApp`].
///
/// The instance sits behind a lock: `register` and the project hooks get
/// `&mut self`.
pub trait GenericPlugin: Send + Sized + 'static {
    /// Create the plugin.
    fn new(info: HostInfo) -> AnyResult<Self>;

    /// Register modules, menus and windows.
    fn register(&mut self, host: &mut HostApp<'_>) -> AnyResult<()>;

    /// Restore state from a project being loaded.
    fn on_project_load(&mut self, _project: &mut ProjectFile<'_>) -> AnyResult<()> {
        Ok(())
    }

    /// Store state into a project being saved.
    fn on_project_save(&mut self, _project: &mut ProjectFile<'_>) -> AnyResult<()> {
        Ok(())
    }
}

struct GenericState<G> {
    plugin: Mutex<G>,
    info: HostInfo,
}

/// Run `f` with exclusive access to the installed instance of `G`.
///
/// # Errors
///
/// Returns [`Aviutl2Error::NotInitialized`] if `G` is not installed, or
/// [`Aviutl2Error::OperationFailed`] if the instance is already borrowed
/// further up the stack.
pub fn with_instance<G: GenericPlugin, R>(f: impl FnOnce(&mut G) -> R) -> Result<R> {
    let state = plugin::state::<GenericState<G>>()?;
    let mut plugin = state
        .plugin
        .try_lock()
        .ok_or(Aviutl2Error::OperationFailed("plugin instance is busy"))?;
    Ok(f(&mut plugin))
}

unsafe extern "C" fn project_load<G: GenericPlugin>(project: *mut sys::ProjectFile) {
    // SAFETY: forwarded host pointer.
    unsafe { project_hook::<G>("project load", project, G::on_project_load) };
}

unsafe extern "C" fn project_save<G: GenericPlugin>(project: *mut sys::ProjectFile) {
    // SAFETY: forwarded host pointer.
    unsafe { project_hook::<G>("project save", project, G::on_project_save) };
}

unsafe fn project_hook<G: GenericPlugin>(
    name: &'static str,
    project: *mut sys::ProjectFile,
    hook: fn(&mut G, &mut ProjectFile<'_>) -> AnyResult<()>,
) {
    plugin::guard(name, (), || {
        // SAFETY: the host passes a project file valid for this call.
        let Some(mut file) = (unsafe { ProjectFile::from_raw(project) }) else {
            return;
        };
        match with_instance::<G, _>(|plugin| hook(plugin, &mut file)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => report(name, &e),
            Err(e) => tracing::warn!(callback = name, error = %e, "project hook skipped"),
        }
    });
}

#[doc(hidden)]
pub fn __initialize<G: GenericPlugin>(version: u32) -> bool {
    plugin::guard("InitializePlugin", false, || {
        plugin::clear();
        let info = HostInfo::new(version);
        let result = G::new(info)
            .map_err(|e| Aviutl2Error::Plugin(e.to_string()))
            .and_then(|plugin| {
                plugin::install(GenericState {
                    plugin: Mutex::new(plugin),
                    info,
                })
            });
        match result {
            Ok(_) => true,
            Err(e) => {
                report("InitializePlugin", &e);
                false
            }
        }
    })
}

/// Body of `RegisterPlugin`.
///
/// # Safety
///
/// `host` must be the pointer the host passed to `RegisterPlugin`.
#[doc(hidden)]
pub unsafe fn __register<G: GenericPlugin>(host: *mut sys::HostAppTable) {
    plugin::guard("RegisterPlugin", (), || {
        let state = match plugin::state::<GenericState<G>>() {
            Ok(state) => state,
            Err(e) => {
                report("RegisterPlugin", &e);
                return;
            }
        };
        // SAFETY: forwarded caller contract.
        let Some(mut app) = (unsafe { HostApp::from_raw(host, state.info) }) else {
            return;
        };
        let Some(mut plugin) = state.plugin.try_lock() else {
            tracing::warn!("RegisterPlugin re-entered; ignored");
            return;
        };
        if let Err(e) = plugin.register(&mut app) {
            report("RegisterPlugin", &e);
        }
        drop(plugin);
        for (result, hook) in [
            (app.register_project_load_handler(project_load::<G>), "load"),
            (app.register_project_save_handler(project_save::<G>), "save"),
        ] {
            if let Err(e) = result {
                tracing::debug!(hook, error = %e, "project handler not registered");
            }
        }
        let registered = app.registrations();
        tracing::info!(
            tables = registered.tables,
            menus = registered.menus,
            windows = registered.windows,
            "plugin registered"
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(call: &str) {
        CALLS.with(|c| c.borrow_mut().push(call.to_string()));
    }

    unsafe extern "C" fn set_information(info: *const u16) {
        // SAFETY: the SDK passes a NUL-terminated string.
        let info = unsafe { crate::wide::read_wide_string(info) }.unwrap_or_default();
        record(&format!("info:{info}"));
    }
    unsafe extern "C" fn register_layer_menu(name: *const u16, _proc: Option<EditProc>) {
        // SAFETY: the SDK passes a NUL-terminated string.
        let name = unsafe { crate::wide::read_wide_string(name) }.unwrap_or_default();
        record(&format!("layer:{name}"));
    }
    unsafe extern "C" fn register_load(_proc: Option<ProjectProc>) {
        record("load");
    }
    unsafe extern "C" fn register_save(_proc: Option<ProjectProc>) {
        record("save");
    }
    unsafe extern "C" fn menu(_edit: *mut sys::EditSection) {}

    fn table() -> sys::HostAppTable {
        sys::HostAppTable {
            set_plugin_information: Some(set_information),
            register_input_plugin: None,
            register_output_plugin: None,
            register_filter_plugin: None,
            register_script_module: None,
            register_import_menu: None,
            register_export_menu: None,
            register_window_client: None,
            create_edit_handle: None,
            register_project_load_handler: Some(register_load),
            register_project_save_handler: Some(register_save),
            register_layer_menu: Some(register_layer_menu),
            register_object_menu: None,
        }
    }

    struct Menus {
        loads: usize,
    }

    impl GenericPlugin for Menus {
        fn new(_info: HostInfo) -> AnyResult<Self> {
            Ok(Self { loads: 0 })
        }

        fn register(&mut self, host: &mut HostApp<'_>) -> AnyResult<()> {
            host.set_plugin_information("menus v1")?;
            host.register_layer_menu("Split", menu)?;
            assert!(matches!(
                host.register_object_menu("Nope", menu),
                Err(Aviutl2Error::Unsupported("register_object_menu"))
            ));
            Ok(())
        }

        fn on_project_load(&mut self, _project: &mut ProjectFile<'_>) -> AnyResult<()> {
            self.loads += 1;
            Ok(())
        }
    }

    #[test]
    fn test_register_generic_plugin() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let _lock = plugin::TEST_LOCK.lock();
        CALLS.with(|c| c.borrow_mut().clear());
        assert!(__initialize::<Menus>(2_000_000));
        let mut raw = table();
        // SAFETY: `raw` outlives the call.
        unsafe { __register::<Menus>(&mut raw) };
        let calls = CALLS.with(|c| c.borrow().clone());
        assert_eq!(calls, vec!["info:menus v1", "layer:Split", "load", "save"]);
        assert_eq!(with_instance::<Menus, _>(|m| m.loads)?, 0);
        plugin::clear();
        assert!(matches!(with_instance::<Menus, _>(|m| m.loads), Err(Aviutl2Error::NotInitialized)));
        Ok(())
    }

    #[test]
    fn test_nested_instance_access_is_refused() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let _lock = plugin::TEST_LOCK.lock();
        assert!(__initialize::<Menus>(1));
        let nested = with_instance::<Menus, _>(|_| with_instance::<Menus, _>(|m| m.loads))?;
        assert!(matches!(nested, Err(Aviutl2Error::OperationFailed(_))));
        plugin::clear();
        Ok(())
    }
}
