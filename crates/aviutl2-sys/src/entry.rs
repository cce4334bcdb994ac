//! Exported entry point names and signatures.
//!
//! The host resolves these symbols by name after loading a plugin DLL. Call
//! order on load is: `RequiredVersion`, `InitializeLogger`,
//! `InitializeConfig`, `InitializePlugin`, then the table getter or
//! `RegisterPlugin`. `UninitializePlugin` runs last on unload.

use crate::config::ConfigHandle;
use crate::filter::FilterPluginTable;
use crate::input::InputPluginTable;
use crate::logger::LogHandle;
use crate::module::ScriptModuleTable;
use crate::output::OutputPluginTable;
use crate::plugin::HostAppTable;

/// `GetInputPluginTable` symbol.
pub const GET_INPUT_PLUGIN_TABLE: &[u8] = b"GetInputPluginTable\0";
/// `GetOutputPluginTable` symbol.
pub const GET_OUTPUT_PLUGIN_TABLE: &[u8] = b"GetOutputPluginTable\0";
/// `GetFilterPluginTable` symbol.
pub const GET_FILTER_PLUGIN_TABLE: &[u8] = b"GetFilterPluginTable\0";
/// `GetScriptModuleTable` symbol.
pub const GET_SCRIPT_MODULE_TABLE: &[u8] = b"GetScriptModuleTable\0";
/// `RegisterPlugin` symbol.
pub const REGISTER_PLUGIN: &[u8] = b"RegisterPlugin\0";
/// `InitializeLogger` symbol.
pub const INITIALIZE_LOGGER: &[u8] = b"InitializeLogger\0";
/// `InitializeConfig` symbol.
pub const INITIALIZE_CONFIG: &[u8] = b"InitializeConfig\0";
/// `InitializePlugin` symbol.
pub const INITIALIZE_PLUGIN: &[u8] = b"InitializePlugin\0";
/// `UninitializePlugin` symbol.
pub const UNINITIALIZE_PLUGIN: &[u8] = b"UninitializePlugin\0";
/// `RequiredVersion` symbol.
pub const REQUIRED_VERSION: &[u8] = b"RequiredVersion\0";

/// `GetInputPluginTable()`.
pub type GetInputPluginTableFn = unsafe extern "C" fn() -> *mut InputPluginTable;
/// `GetOutputPluginTable()`.
pub type GetOutputPluginTableFn = unsafe extern "C" fn() -> *mut OutputPluginTable;
/// `GetFilterPluginTable()`.
pub type GetFilterPluginTableFn = unsafe extern "C" fn() -> *mut FilterPluginTable;
/// `GetScriptModuleTable()`.
pub type GetScriptModuleTableFn = unsafe extern "C" fn() -> *mut ScriptModuleTable;
/// `RegisterPlugin(host)`.
pub type RegisterPluginFn = unsafe extern "C" fn(host: *mut HostAppTable);
/// `InitializeLogger(logger)`.
pub type InitializeLoggerFn = unsafe extern "C" fn(logger: *mut LogHandle);
/// `InitializeConfig(config)`.
pub type InitializeConfigFn = unsafe extern "C" fn(config: *mut ConfigHandle);
/// `InitializePlugin(version)`; returning false aborts the load.
pub type InitializePluginFn = unsafe extern "C" fn(version: u32) -> bool;
/// `UninitializePlugin()`.
pub type UninitializePluginFn = unsafe extern "C" fn();
/// `RequiredVersion()`; the host refuses plugins newer than itself.
pub type RequiredVersionFn = unsafe extern "C" fn() -> u32;

/// Every symbol name a plugin DLL may export.
pub const ALL_SYMBOLS: [&[u8]; 10] = [
    GET_INPUT_PLUGIN_TABLE,
    GET_OUTPUT_PLUGIN_TABLE,
    GET_FILTER_PLUGIN_TABLE,
    GET_SCRIPT_MODULE_TABLE,
    REGISTER_PLUGIN,
    INITIALIZE_LOGGER,
    INITIALIZE_CONFIG,
    INITIALIZE_PLUGIN,
    UNINITIALIZE_PLUGIN,
    REQUIRED_VERSION,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_nul_terminated() {
        for name in ALL_SYMBOLS {
            assert_eq!(name.last(), Some(&0));
            assert_eq!(name.iter().filter(|b| **b == 0).count(), 1);
        }
    }
}
