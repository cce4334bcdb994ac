//! Plugin library loading and entry-point resolution.

use std::fmt;
use std::path::{Path, PathBuf};

use aviutl2_sys::entry::{
    self, GetFilterPluginTableFn, GetInputPluginTableFn, GetOutputPluginTableFn,
    GetScriptModuleTableFn, InitializeConfigFn, InitializeLoggerFn, InitializePluginFn,
    RegisterPluginFn, RequiredVersionFn, UninitializePluginFn,
};
use libloading::Library;

use crate::error::{ConformanceError, Result};

/// Resolved exports of one plugin. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryPoints {
    /// `GetInputPluginTable`.
    pub get_input_plugin_table: Option<GetInputPluginTableFn>,
    /// `GetOutputPluginTable`.
    pub get_output_plugin_table: Option<GetOutputPluginTableFn>,
    /// `GetFilterPluginTable`.
    pub get_filter_plugin_table: Option<GetFilterPluginTableFn>,
    /// `GetScriptModuleTable`.
    pub get_script_module_table: Option<GetScriptModuleTableFn>,
    /// `RegisterPlugin`.
    pub register_plugin: Option<RegisterPluginFn>,
    /// `InitializeLogger`.
    pub initialize_logger: Option<InitializeLoggerFn>,
    /// `InitializeConfig`.
    pub initialize_config: Option<InitializeConfigFn>,
    /// `InitializePlugin`.
    pub initialize_plugin: Option<InitializePluginFn>,
    /// `UninitializePlugin`.
    pub uninitialize_plugin: Option<UninitializePluginFn>,
    /// `RequiredVersion`.
    pub required_version: Option<RequiredVersionFn>,
}

/// Resolve one symbol, `None` if absent.
///
/// # Safety
///
/// `T` must be the function type the symbol is exported with.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Option<T> {
    // SAFETY: forwarded caller contract.
    match unsafe { library.get::<T>(name) } {
        Ok(symbol) => Some(*symbol),
        Err(e) => {
            tracing::trace!(symbol = %String::from_utf8_lossy(name), error = %e, "symbol not exported");
            None
        }
    }
}

impl EntryPoints {
    /// Resolve every known export of `library`.
    ///
    /// # Safety
    ///
    /// Exports with these names must have the ABI signatures declared in
    /// [`aviutl2_sys::entry`].
    pub unsafe fn from_library(library: &Library) -> Self {
        macro_rules! resolve {
            ($name:expr) => {
                // SAFETY: each name is paired with its declared signature.
                unsafe { symbol(library, $name) }
            };
        }
        Self {
            get_input_plugin_table: resolve!(entry::GET_INPUT_PLUGIN_TABLE),
            get_output_plugin_table: resolve!(entry::GET_OUTPUT_PLUGIN_TABLE),
            get_filter_plugin_table: resolve!(entry::GET_FILTER_PLUGIN_TABLE),
            get_script_module_table: resolve!(entry::GET_SCRIPT_MODULE_TABLE),
            register_plugin: resolve!(entry::REGISTER_PLUGIN),
            initialize_logger: resolve!(entry::INITIALIZE_LOGGER),
            initialize_config: resolve!(entry::INITIALIZE_CONFIG),
            initialize_plugin: resolve!(entry::INITIALIZE_PLUGIN),
            uninitialize_plugin: resolve!(entry::UNINITIALIZE_PLUGIN),
            required_version: resolve!(entry::REQUIRED_VERSION),
        }
    }

    /// Whether any module entry point (table getter or `RegisterPlugin`) exists.
    pub fn has_module(&self) -> bool {
        self.get_input_plugin_table.is_some()
            || self.get_output_plugin_table.is_some()
            || self.get_filter_plugin_table.is_some()
            || self.get_script_module_table.is_some()
            || self.register_plugin.is_some()
    }

    /// Names of the resolved exports.
    pub fn exported(&self) -> Vec<&'static str> {
        let present = [
            ("GetInputPluginTable", self.get_input_plugin_table.is_some()),
            ("GetOutputPluginTable", self.get_output_plugin_table.is_some()),
            ("GetFilterPluginTable", self.get_filter_plugin_table.is_some()),
            ("GetScriptModuleTable", self.get_script_module_table.is_some()),
            ("RegisterPlugin", self.register_plugin.is_some()),
            ("InitializeLogger", self.initialize_logger.is_some()),
            ("InitializeConfig", self.initialize_config.is_some()),
            ("InitializePlugin", self.initialize_plugin.is_some()),
            ("UninitializePlugin", self.uninitialize_plugin.is_some()),
            ("RequiredVersion", self.required_version.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(name, found)| found.then_some(name))
            .collect()
    }
}

/// A loaded plugin DLL. Entry points are valid while this value lives.
pub struct PluginLibrary {
    path: PathBuf,
    entry: EntryPoints,
    _library: Library,
}

impl fmt::Debug for PluginLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLibrary")
            .field("path", &self.path)
            .field("exports", &self.entry.exported())
            .finish_non_exhaustive()
    }
}

impl PluginLibrary {
    /// Load a plugin library and resolve its exports.
    ///
    /// # Errors
    ///
    /// Fails if the library cannot be loaded or exports no module entry point.
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the library's initializers; plugin DLLs are
        // trusted input to the harness.
        let library = unsafe { Library::new(path) }?;
        // SAFETY: plugin exports follow the declared ABI.
        let entry = unsafe { EntryPoints::from_library(&library) };
        if !entry.has_module() {
            return Err(ConformanceError::NoEntryPoint {
                path: path.to_path_buf(),
            });
        }
        tracing::info!(path = %path.display(), exports = ?entry.exported(), "plugin library loaded");
        Ok(Self {
            path: path.to_path_buf(),
            entry,
            _library: library,
        })
    }

    /// Library path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolved exports.
    pub fn entry_points(&self) -> EntryPoints {
        self.entry
    }
}

/// Lifecycle hook, in the order the host calls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// `RequiredVersion`.
    RequiredVersion,
    /// `InitializeLogger`.
    InitializeLogger,
    /// `InitializeConfig`.
    InitializeConfig,
    /// `InitializePlugin`.
    InitializePlugin,
    /// Table getter or `RegisterPlugin`.
    Register,
    /// `UninitializePlugin`.
    Uninitialize,
}

/// Hooks called so far, in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LifecycleLog {
    events: Vec<LifecycleEvent>,
}

impl LifecycleLog {
    /// Record a hook call.
    pub fn push(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    /// Calls so far.
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    /// Whether every hook ran at most once and in host order.
    pub fn is_ordered(&self) -> bool {
        self.events.windows(2).all(|pair| matches!(pair, [a, b] if a < b))
    }
}
