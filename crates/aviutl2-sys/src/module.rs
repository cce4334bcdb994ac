//! Script module ABI (`aviutl2_script_module_*`).
//!
//! Required export: `GetScriptModuleTable() -> *mut ScriptModuleTable`.
//!
//! A script function receives a [`ScriptModuleParam`] that reads its
//! arguments and collects its results. Results are returned to the script in
//! push order. Every string returned by a getter stays valid only until the
//! function returns.

use std::ffi::{c_char, c_void};

use crate::WChar;

/// Parameter and result interface of one script function call.
///
/// Getters return `0`, `0.0`, `false` or NULL when the argument is missing
/// or has another type; a real zero is indistinguishable from "absent".
///
/// # Memory Layout
///
/// 26 function pointers, 208 bytes on 64-bit targets. The order below is
/// the C declaration order, boolean accessors last.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScriptModuleParam {
    /// Number of arguments.
    pub get_param_num: Option<unsafe extern "C" fn() -> i32>,
    /// Argument as integer.
    pub get_param_int: Option<unsafe extern "C" fn(index: i32) -> i32>,
    /// Argument as double.
    pub get_param_double: Option<unsafe extern "C" fn(index: i32) -> f64>,
    /// Argument as UTF-8 string.
    pub get_param_string: Option<unsafe extern "C" fn(index: i32) -> *const c_char>,
    /// Argument as opaque data pointer.
    pub get_param_data: Option<unsafe extern "C" fn(index: i32) -> *mut c_void>,
    /// Table argument element as integer.
    pub get_param_table_int: Option<unsafe extern "C" fn(index: i32, key: *const c_char) -> i32>,
    /// Table argument element as double.
    pub get_param_table_double:
        Option<unsafe extern "C" fn(index: i32, key: *const c_char) -> f64>,
    /// Table argument element as UTF-8 string.
    pub get_param_table_string:
        Option<unsafe extern "C" fn(index: i32, key: *const c_char) -> *const c_char>,
    /// Array argument length.
    pub get_param_array_num: Option<unsafe extern "C" fn(index: i32) -> i32>,
    /// Array argument element as integer.
    pub get_param_array_int: Option<unsafe extern "C" fn(index: i32, key: i32) -> i32>,
    /// Array argument element as double.
    pub get_param_array_double: Option<unsafe extern "C" fn(index: i32, key: i32) -> f64>,
    /// Array argument element as UTF-8 string.
    pub get_param_array_string:
        Option<unsafe extern "C" fn(index: i32, key: i32) -> *const c_char>,
    /// Push an integer result.
    pub push_result_int: Option<unsafe extern "C" fn(value: i32)>,
    /// Push a double result.
    pub push_result_double: Option<unsafe extern "C" fn(value: f64)>,
    /// Push a UTF-8 string result.
    pub push_result_string: Option<unsafe extern "C" fn(value: *const c_char)>,
    /// Push an opaque data pointer result.
    pub push_result_data: Option<unsafe extern "C" fn(value: *mut c_void)>,
    /// Push a table of integers.
    pub push_result_table_int:
        Option<unsafe extern "C" fn(key: *mut *const c_char, value: *mut i32, num: i32)>,
    /// Push a table of doubles.
    pub push_result_table_double:
        Option<unsafe extern "C" fn(key: *mut *const c_char, value: *mut f64, num: i32)>,
    /// Push a table of UTF-8 strings.
    pub push_result_table_string: Option<
        unsafe extern "C" fn(key: *mut *const c_char, value: *mut *const c_char, num: i32),
    >,
    /// Push an array of integers.
    pub push_result_array_int: Option<unsafe extern "C" fn(value: *mut i32, num: i32)>,
    /// Push an array of doubles.
    pub push_result_array_double: Option<unsafe extern "C" fn(value: *mut f64, num: i32)>,
    /// Push an array of UTF-8 strings.
    pub push_result_array_string:
        Option<unsafe extern "C" fn(value: *mut *const c_char, num: i32)>,
    /// Report an error to the script.
    pub set_error: Option<unsafe extern "C" fn(message: *const c_char)>,
    /// Argument as boolean.
    pub get_param_boolean: Option<unsafe extern "C" fn(index: i32) -> bool>,
    /// Push a boolean result.
    pub push_result_boolean: Option<unsafe extern "C" fn(value: bool)>,
    /// Table argument element as boolean.
    pub get_param_table_boolean:
        Option<unsafe extern "C" fn(index: i32, key: *const c_char) -> bool>,
}

/// One exported script function. The list ends with a NULL `name`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScriptModuleFunction {
    /// Name the script calls the function by.
    pub name: *const WChar,
    /// Implementation.
    pub func: Option<unsafe extern "C" fn(param: *mut ScriptModuleParam)>,
}

impl ScriptModuleFunction {
    /// The terminating entry.
    pub const END: Self = Self {
        name: std::ptr::null(),
        func: None,
    };
}

/// Script module definition returned by `GetScriptModuleTable`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScriptModuleTable {
    /// Module name and description.
    pub information: *const WChar,
    /// Function list terminated by [`ScriptModuleFunction::END`].
    pub functions: *mut ScriptModuleFunction,
}

#[cfg(target_pointer_width = "64")]
mod layout {
    use super::*;
    use static_assertions::const_assert_eq;
    use std::mem::size_of;

    const_assert_eq!(size_of::<ScriptModuleParam>(), 26 * 8);
    const_assert_eq!(size_of::<ScriptModuleFunction>(), 16);
    const_assert_eq!(size_of::<ScriptModuleTable>(), 16);
}
