//! Export macros.
//!
//! Each `export_*` macro emits the full set of entry points for one plugin
//! type: the optional lifecycle hooks plus the kind's table getter or
//! `RegisterPlugin`. Use exactly one per `cdylib`.

#[doc(hidden)]
#[macro_export]
macro_rules! __export_lifecycle {
    ($kind:ident, $plugin:ty) => {
        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub unsafe extern "C" fn InitializeLogger(handle: *mut $crate::sys::LogHandle) {
            // SAFETY: the host passes its logger, valid until unload.
            unsafe { $crate::plugin::__initialize_logger(handle) }
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub unsafe extern "C" fn InitializeConfig(handle: *mut $crate::sys::ConfigHandle) {
            // SAFETY: the host passes its config handle, valid until unload.
            unsafe { $crate::plugin::__initialize_config(handle) }
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn InitializePlugin(version: u32) -> bool {
            $crate::$kind::__initialize::<$plugin>(version)
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn UninitializePlugin() {
            $crate::plugin::__uninitialize()
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __export_required_version {
    ($version:expr) => {
        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn RequiredVersion() -> u32 {
            $version
        }
    };
}

/// Export an [`InputPlugin`](crate::input::InputPlugin).
///
/// ```ignore
/// aviutl2::export_input_plugin!(MyReader);
/// aviutl2::export_input_plugin!(MyReader, required_version = 2_003_000);
/// ```
#[macro_export]
macro_rules! export_input_plugin {
    ($plugin:ty) => {
        $crate::__export_lifecycle!(input, $plugin);

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn GetInputPluginTable() -> *mut $crate::sys::InputPluginTable {
            $crate::input::__table::<$plugin>()
        }
    };
    ($plugin:ty, required_version = $version:expr) => {
        $crate::export_input_plugin!($plugin);
        $crate::__export_required_version!($version);
    };
}

/// Export an [`OutputPlugin`](crate::output::OutputPlugin).
#[macro_export]
macro_rules! export_output_plugin {
    ($plugin:ty) => {
        $crate::__export_lifecycle!(output, $plugin);

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn GetOutputPluginTable() -> *mut $crate::sys::OutputPluginTable {
            $crate::output::__table::<$plugin>()
        }
    };
    ($plugin:ty, required_version = $version:expr) => {
        $crate::export_output_plugin!($plugin);
        $crate::__export_required_version!($version);
    };
}

/// Export a [`FilterPlugin`](crate::filter::FilterPlugin).
#[macro_export]
macro_rules! export_filter_plugin {
    ($plugin:ty) => {
        $crate::__export_lifecycle!(filter, $plugin);

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn GetFilterPluginTable() -> *mut $crate::sys::FilterPluginTable {
            $crate::filter::__table::<$plugin>()
        }
    };
    ($plugin:ty, required_version = $version:expr) => {
        $crate::export_filter_plugin!($plugin);
        $crate::__export_required_version!($version);
    };
}

/// Export a [`ScriptModule`](crate::script::ScriptModule).
///
/// ```ignore
/// aviutl2::export_script_module!(MathModule, required_version = 2_001_000);
/// ```
#[macro_export]
macro_rules! export_script_module {
    ($module:ty) => {
        $crate::__export_lifecycle!(script, $module);

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub extern "C" fn GetScriptModuleTable() -> *mut $crate::sys::ScriptModuleTable {
            $crate::script::__table::<$module>()
        }
    };
    ($module:ty, required_version = $version:expr) => {
        $crate::export_script_module!($module);
        $crate::__export_required_version!($version);
    };
}

/// Export a [`GenericPlugin`](crate::host::GenericPlugin) through
/// `RegisterPlugin`.
#[macro_export]
macro_rules! export_generic_plugin {
    ($plugin:ty) => {
        $crate::__export_lifecycle!(host, $plugin);

        #[unsafe(no_mangle)]
        #[allow(non_snake_case, reason = "host entry point name")]
        pub unsafe extern "C" fn RegisterPlugin(host: *mut $crate::sys::HostAppTable) {
            // SAFETY: the host passes its table for the duration of the call.
            unsafe { $crate::host::__register::<$plugin>(host) }
        }
    };
    ($plugin:ty, required_version = $version:expr) => {
        $crate::export_generic_plugin!($plugin);
        $crate::__export_required_version!($version);
    };
}

/// Turn `fn(&mut EditSection<'_>) -> AnyResult<()>` into a raw menu or
/// button callback.
///
/// ```ignore
/// host.register_layer_menu("Split here", aviutl2::edit_callback!(split_here))?;
/// ```
#[macro_export]
macro_rules! edit_callback {
    ($path:path) => {{
        unsafe extern "C" fn __edit_callback(edit: *mut $crate::sys::EditSection) {
            // SAFETY: the host passes a section valid for this call.
            unsafe { $crate::edit::__invoke_edit_callback(stringify!($path), edit, $path) }
        }
        __edit_callback as $crate::sys::EditProc
    }};
}

/// Turn `fn(&mut ProjectFile<'_>) -> AnyResult<()>` into a raw project
/// handler.
#[macro_export]
macro_rules! project_callback {
    ($path:path) => {{
        unsafe extern "C" fn __project_callback(project: *mut $crate::sys::ProjectFile) {
            // SAFETY: the host passes a project file valid for this call.
            unsafe { $crate::project::__invoke_project_callback(stringify!($path), project, $path) }
        }
        __project_callback as $crate::sys::ProjectProc
    }};
}

/// Build a [`ScriptFunction`](crate::script::ScriptFunction) from a name and
/// `fn(&mut ScriptCall<'_>) -> Result<(), ScriptError>`.
///
/// ```ignore
/// ScriptModuleTable::new("math", vec![aviutl2::script_function!("sum", sum)])
/// ```
#[macro_export]
macro_rules! script_function {
    ($name:literal, $path:path) => {{
        unsafe extern "C" fn __script_function(param: *mut $crate::sys::ScriptModuleParam) {
            // SAFETY: the host passes the parameter table of the running call.
            unsafe { $crate::script::__invoke($name, param, $path) }
        }
        $crate::script::ScriptFunction::new($name, __script_function)
    }};
}
