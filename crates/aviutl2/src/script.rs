//! Script modules: native functions callable from scripts.
//!
//! Each function receives a [`ScriptCall`] that reads arguments and pushes
//! results. Results reach the script in push order, and a [`ScriptError`]
//! returned from the body is reported through `set_error` after whatever was
//! already pushed.

use std::ffi::{CString, c_char, c_void};

use thiserror::Error;

use aviutl2_sys as sys;

use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::plugin::{self, HostInfo, RawBox, report, to_i32, to_usize};
use crate::wide::{WideString, read_c_str};

/// Error returned from a script function body.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Fewer arguments than required.
    #[error("missing argument #{0}")]
    MissingArgument(usize),

    /// An argument has the wrong shape.
    #[error("invalid argument #{index}: {reason}")]
    InvalidArgument {
        /// 0-based argument index.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Free-form message shown to the script author.
    #[error("{0}")]
    Message(String),

    /// SDK failure.
    #[error(transparent)]
    Sdk(#[from] Aviutl2Error),
}

/// Arguments and results of one script function call.
///
/// Getters are fail-soft: a missing host function or an out-of-range index
/// yields zero, `false` or `None`.
pub struct ScriptCall<'a> {
    raw: &'a sys::ScriptModuleParam,
    keep: Vec<CString>,
}

impl std::fmt::Debug for ScriptCall<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptCall").field("len", &self.len()).finish_non_exhaustive()
    }
}

fn key(key: &str) -> Option<CString> {
    CString::new(key).ok()
}

impl<'a> ScriptCall<'a> {
    /// Wrap the host's parameter table.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer passed to the running script function, and
    /// the call must not outlive it.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::ScriptModuleParam) -> Option<Self> {
        // SAFETY: per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self {
            raw,
            keep: Vec::new(),
        })
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: no arguments.
        self.raw.get_param_num.map_or(0, |f| to_usize(unsafe { f() }))
    }

    /// Whether the call has no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail with [`ScriptError::MissingArgument`] unless at least `count`
    /// arguments were passed.
    ///
    /// # Errors
    ///
    /// Returns the index of the first missing argument.
    pub fn require(&self, count: usize) -> std::result::Result<(), ScriptError> {
        let len = self.len();
        if len < count {
            return Err(ScriptError::MissingArgument(len));
        }
        Ok(())
    }

    /// Integer argument.
    #[must_use]
    pub fn int(&self, index: usize) -> i32 {
        // SAFETY: plain integer argument.
        self.raw.get_param_int.map_or(0, |f| unsafe { f(to_i32(index)) })
    }

    /// Number argument.
    #[must_use]
    pub fn double(&self, index: usize) -> f64 {
        // SAFETY: plain integer argument.
        self.raw.get_param_double.map_or(0.0, |f| unsafe { f(to_i32(index)) })
    }

    /// Boolean argument.
    #[must_use]
    pub fn boolean(&self, index: usize) -> bool {
        // SAFETY: plain integer argument.
        self.raw.get_param_boolean.is_some_and(|f| unsafe { f(to_i32(index)) })
    }

    /// String argument, borrowed for the rest of the call. `None` if absent
    /// or not UTF-8.
    #[must_use]
    pub fn str(&self, index: usize) -> Option<&'a str> {
        let f = self.raw.get_param_string?;
        // SAFETY: plain integer argument.
        let ptr = unsafe { f(to_i32(index)) };
        // SAFETY: the host keeps the string valid until the function returns,
        // which bounds `'a`.
        unsafe { read_c_str(ptr) }.and_then(|s| s.to_str().ok())
    }

    /// String argument, copied.
    #[must_use]
    pub fn string(&self, index: usize) -> Option<String> {
        self.str(index).map(str::to_string)
    }

    /// Opaque data argument, null if absent.
    #[must_use]
    pub fn data(&self, index: usize) -> *mut c_void {
        // SAFETY: plain integer argument.
        self.raw
            .get_param_data
            .map_or(std::ptr::null_mut(), |f| unsafe { f(to_i32(index)) })
    }

    /// Integer field of a table argument.
    #[must_use]
    pub fn table_int(&self, index: usize, name: &str) -> i32 {
        let (Some(f), Some(k)) = (self.raw.get_param_table_int, key(name)) else {
            return 0;
        };
        // SAFETY: `k` outlives the call.
        unsafe { f(to_i32(index), k.as_ptr()) }
    }

    /// Number field of a table argument.
    #[must_use]
    pub fn table_double(&self, index: usize, name: &str) -> f64 {
        let (Some(f), Some(k)) = (self.raw.get_param_table_double, key(name)) else {
            return 0.0;
        };
        // SAFETY: `k` outlives the call.
        unsafe { f(to_i32(index), k.as_ptr()) }
    }

    /// Boolean field of a table argument.
    #[must_use]
    pub fn table_boolean(&self, index: usize, name: &str) -> bool {
        let (Some(f), Some(k)) = (self.raw.get_param_table_boolean, key(name)) else {
            return false;
        };
        // SAFETY: `k` outlives the call.
        unsafe { f(to_i32(index), k.as_ptr()) }
    }

    /// String field of a table argument.
    #[must_use]
    pub fn table_str(&self, index: usize, name: &str) -> Option<&'a str> {
        let f = self.raw.get_param_table_string?;
        let k = key(name)?;
        // SAFETY: `k` outlives the call.
        let ptr = unsafe { f(to_i32(index), k.as_ptr()) };
        // SAFETY: the result lives until the function returns.
        unsafe { read_c_str(ptr) }.and_then(|s| s.to_str().ok())
    }

    /// Length of an array argument.
    #[must_use]
    pub fn array_len(&self, index: usize) -> usize {
        // SAFETY: plain integer argument.
        self.raw.get_param_array_num.map_or(0, |f| to_usize(unsafe { f(to_i32(index)) }))
    }

    /// Integer element of an array argument.
    #[must_use]
    pub fn array_int(&self, index: usize, element: usize) -> i32 {
        // SAFETY: plain integer arguments.
        self.raw
            .get_param_array_int
            .map_or(0, |f| unsafe { f(to_i32(index), to_i32(element)) })
    }

    /// Number element of an array argument.
    #[must_use]
    pub fn array_double(&self, index: usize, element: usize) -> f64 {
        // SAFETY: plain integer arguments.
        self.raw
            .get_param_array_double
            .map_or(0.0, |f| unsafe { f(to_i32(index), to_i32(element)) })
    }

    /// String element of an array argument.
    #[must_use]
    pub fn array_str(&self, index: usize, element: usize) -> Option<&'a str> {
        let f = self.raw.get_param_array_string?;
        // SAFETY: plain integer arguments.
        let ptr = unsafe { f(to_i32(index), to_i32(element)) };
        // SAFETY: the result lives until the function returns.
        unsafe { read_c_str(ptr) }.and_then(|s| s.to_str().ok())
    }

    /// All numbers of an array argument.
    #[must_use]
    pub fn array_doubles(&self, index: usize) -> Vec<f64> {
        (0..self.array_len(index)).map(|i| self.array_double(index, i)).collect()
    }

    fn hold(&mut self, s: &str) -> Result<*const c_char> {
        let c = CString::new(s)?;
        let ptr = c.as_ptr();
        self.keep.push(c);
        Ok(ptr)
    }

    /// Push an integer result.
    pub fn push_int(&mut self, value: i32) {
        if let Some(f) = self.raw.push_result_int {
            // SAFETY: plain value.
            unsafe { f(value) };
        }
    }

    /// Push a number result.
    pub fn push_double(&mut self, value: f64) {
        if let Some(f) = self.raw.push_result_double {
            // SAFETY: plain value.
            unsafe { f(value) };
        }
    }

    /// Push a boolean result.
    pub fn push_bool(&mut self, value: bool) {
        if let Some(f) = self.raw.push_result_boolean {
            // SAFETY: plain value.
            unsafe { f(value) };
        }
    }

    /// Push an opaque data result.
    pub fn push_data(&mut self, value: *mut c_void) {
        if let Some(f) = self.raw.push_result_data {
            // SAFETY: the host treats the pointer as opaque.
            unsafe { f(value) };
        }
    }

    /// Push a string result.
    ///
    /// # Errors
    ///
    /// Fails if `value` contains an interior NUL.
    pub fn push_str(&mut self, value: &str) -> Result<()> {
        let ptr = self.hold(value)?;
        if let Some(f) = self.raw.push_result_string {
            // SAFETY: `ptr` is kept alive until the call ends.
            unsafe { f(ptr) };
        }
        Ok(())
    }

    fn hold_keys<T>(&mut self, entries: &[(&str, T)]) -> Result<Vec<*const c_char>> {
        entries.iter().map(|(k, _)| self.hold(k)).collect()
    }

    /// Push a table of integers.
    ///
    /// # Errors
    ///
    /// Fails if a key contains an interior NUL.
    pub fn push_table_int(&mut self, entries: &[(&str, i32)]) -> Result<()> {
        let mut keys = self.hold_keys(entries)?;
        let mut values: Vec<i32> = entries.iter().map(|(_, v)| *v).collect();
        if let Some(f) = self.raw.push_result_table_int {
            // SAFETY: both arrays have `entries.len()` elements.
            unsafe { f(keys.as_mut_ptr(), values.as_mut_ptr(), to_i32(entries.len())) };
        }
        Ok(())
    }

    /// Push a table of numbers.
    ///
    /// # Errors
    ///
    /// Fails if a key contains an interior NUL.
    pub fn push_table_double(&mut self, entries: &[(&str, f64)]) -> Result<()> {
        let mut keys = self.hold_keys(entries)?;
        let mut values: Vec<f64> = entries.iter().map(|(_, v)| *v).collect();
        if let Some(f) = self.raw.push_result_table_double {
            // SAFETY: both arrays have `entries.len()` elements.
            unsafe { f(keys.as_mut_ptr(), values.as_mut_ptr(), to_i32(entries.len())) };
        }
        Ok(())
    }

    /// Push a table of strings.
    ///
    /// # Errors
    ///
    /// Fails if a key or value contains an interior NUL.
    pub fn push_table_str(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        let mut keys = self.hold_keys(entries)?;
        let mut values = entries
            .iter()
            .map(|(_, v)| self.hold(v))
            .collect::<Result<Vec<_>>>()?;
        if let Some(f) = self.raw.push_result_table_string {
            // SAFETY: both arrays have `entries.len()` elements.
            unsafe { f(keys.as_mut_ptr(), values.as_mut_ptr(), to_i32(entries.len())) };
        }
        Ok(())
    }

    /// Push an array of integers.
    pub fn push_array_int(&mut self, values: &[i32]) {
        let mut values = values.to_vec();
        if let Some(f) = self.raw.push_result_array_int {
            // SAFETY: the array has `values.len()` elements.
            unsafe { f(values.as_mut_ptr(), to_i32(values.len())) };
        }
    }

    /// Push an array of numbers.
    pub fn push_array_double(&mut self, values: &[f64]) {
        let mut values = values.to_vec();
        if let Some(f) = self.raw.push_result_array_double {
            // SAFETY: the array has `values.len()` elements.
            unsafe { f(values.as_mut_ptr(), to_i32(values.len())) };
        }
    }

    /// Push an array of strings.
    ///
    /// # Errors
    ///
    /// Fails if an element contains an interior NUL.
    pub fn push_array_str(&mut self, values: &[&str]) -> Result<()> {
        let mut ptrs = values
            .iter()
            .map(|v| self.hold(v))
            .collect::<Result<Vec<_>>>()?;
        if let Some(f) = self.raw.push_result_array_string {
            // SAFETY: the array has `values.len()` elements.
            unsafe { f(ptrs.as_mut_ptr(), to_i32(ptrs.len())) };
        }
        Ok(())
    }

    /// Report an error to the script. Interior NULs truncate the message.
    pub fn set_error(&mut self, message: &str) {
        let message = message.split('\0').next().unwrap_or_default();
        let Ok(ptr) = self.hold(message) else {
            return;
        };
        if let Some(f) = self.raw.set_error {
            // SAFETY: `ptr` is kept alive until the call ends.
            unsafe { f(ptr) };
        }
    }
}

/// Body of a script function.
pub type ScriptFn = fn(&mut ScriptCall<'_>) -> std::result::Result<(), ScriptError>;

/// Raw entry point generated by [`script_function!`](crate::script_function).
pub type RawScriptFn = unsafe extern "C" fn(*mut sys::ScriptModuleParam);

/// One exported function.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    name: String,
    func: RawScriptFn,
}

impl ScriptFunction {
    /// Pair a script-visible name with its raw entry point.
    #[must_use]
    pub fn new(name: impl Into<String>, func: RawScriptFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Script-visible name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owned module table: information string, UTF-16 names and the
/// NULL-terminated function array.
pub struct ScriptModuleTable {
    _information: WideString,
    _names: Vec<WideString>,
    functions: Vec<sys::ScriptModuleFunction>,
    table: RawBox<sys::ScriptModuleTable>,
}

impl std::fmt::Debug for ScriptModuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptModuleTable")
            .field("functions", &self.len())
            .finish_non_exhaustive()
    }
}

// SAFETY: the raw pointers point into buffers owned by this value, which are
// never mutated after construction.
unsafe impl Send for ScriptModuleTable {}
// SAFETY: see above.
unsafe impl Sync for ScriptModuleTable {}

impl ScriptModuleTable {
    /// Lay out the raw table.
    #[must_use]
    pub fn new(information: &str, functions: Vec<ScriptFunction>) -> Self {
        let information = WideString::new(information);
        let names: Vec<WideString> = functions.iter().map(|f| WideString::new(&f.name)).collect();
        let mut raw: Vec<sys::ScriptModuleFunction> = names
            .iter()
            .zip(&functions)
            .map(|(name, f)| sys::ScriptModuleFunction {
                name: name.as_ptr(),
                func: Some(f.func),
            })
            .collect();
        raw.push(sys::ScriptModuleFunction::END);
        let table = RawBox::new(sys::ScriptModuleTable {
            information: information.as_ptr(),
            functions: raw.as_mut_ptr(),
        });
        Self {
            _information: information,
            _names: names,
            functions: raw,
            table,
        }
    }

    /// Number of functions, terminator excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len().saturating_sub(1)
    }

    /// Whether the module exports nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw table for the host.
    #[must_use]
    pub fn as_raw(&self) -> *mut sys::ScriptModuleTable {
        self.table.as_ptr()
    }
}

/// A script module.
pub trait ScriptModule: Send + Sync + Sized + 'static {
    /// Create the module.
    fn new(info: HostInfo) -> AnyResult<Self>;

    /// Describe the module and its functions.
    fn module_table(&self) -> ScriptModuleTable;
}

struct ScriptState<M> {
    module: M,
    table: ScriptModuleTable,
}

pub(crate) fn install<M: ScriptModule>(info: HostInfo) -> Result<*mut sys::ScriptModuleTable> {
    let module = M::new(info).map_err(|e| Aviutl2Error::Plugin(e.to_string()))?;
    let table = module.module_table();
    let ptr = table.as_raw();
    let count = table.len();
    plugin::install(ScriptState { module, table })?;
    tracing::info!(functions = count, "script module ready");
    Ok(ptr)
}

/// Run `f` with the installed instance of `M`.
///
/// # Errors
///
/// Returns [`Aviutl2Error::NotInitialized`] if `M` is not installed.
pub fn with_instance<M: ScriptModule, R>(f: impl FnOnce(&M) -> R) -> Result<R> {
    let state = plugin::state::<ScriptState<M>>()?;
    Ok(f(&state.module))
}

/// Run a script function body against the raw parameter table.
///
/// # Safety
///
/// `param` must be the pointer the host passed to the running function.
#[doc(hidden)]
pub unsafe fn __invoke(name: &'static str, param: *mut sys::ScriptModuleParam, body: ScriptFn) {
    plugin::guard("script function", (), || {
        // SAFETY: forwarded caller contract.
        let Some(mut call) = (unsafe { ScriptCall::from_raw(param) }) else {
            return;
        };
        if let Err(e) = body(&mut call) {
            tracing::debug!(function = name, error = %e, "script function failed");
            call.set_error(&e.to_string());
        }
    });
}

#[doc(hidden)]
pub fn __initialize<M: ScriptModule>(version: u32) -> bool {
    plugin::guard("InitializePlugin", false, || {
        plugin::clear();
        match install::<M>(HostInfo::new(version)) {
            Ok(_) => true,
            Err(e) => {
                report("InitializePlugin", &e);
                false
            }
        }
    })
}

#[doc(hidden)]
pub fn __table<M: ScriptModule>() -> *mut sys::ScriptModuleTable {
    plugin::state::<ScriptState<M>>().map_or(std::ptr::null_mut(), |state| state.table.as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[derive(Debug, Clone, PartialEq)]
    enum Pushed {
        Int(i32),
        Str(String),
        Ints(Vec<i32>),
        Error(String),
    }

    thread_local! {
        static PUSHED: RefCell<Vec<Pushed>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn param_num() -> i32 {
        2
    }
    unsafe extern "C" fn param_int(index: i32) -> i32 {
        index * 10
    }
    unsafe extern "C" fn param_string(index: i32) -> *const c_char {
        if index == 1 { c"hello".as_ptr() } else { std::ptr::null() }
    }
    unsafe extern "C" fn push_int(value: i32) {
        PUSHED.with(|p| p.borrow_mut().push(Pushed::Int(value)));
    }
    unsafe extern "C" fn push_string(value: *const c_char) {
        // SAFETY: test host receives a valid C string.
        let s = unsafe { read_c_str(value) }.map(|s| s.to_string_lossy().into_owned());
        PUSHED.with(|p| p.borrow_mut().push(Pushed::Str(s.unwrap_or_default())));
    }
    unsafe extern "C" fn push_array_int(value: *mut i32, num: i32) {
        // SAFETY: `num` elements are readable.
        let values = unsafe { std::slice::from_raw_parts(value, to_usize(num)) }.to_vec();
        PUSHED.with(|p| p.borrow_mut().push(Pushed::Ints(values)));
    }
    unsafe extern "C" fn set_error(value: *const c_char) {
        // SAFETY: test host receives a valid C string.
        let s = unsafe { read_c_str(value) }.map(|s| s.to_string_lossy().into_owned());
        PUSHED.with(|p| p.borrow_mut().push(Pushed::Error(s.unwrap_or_default())));
    }

    fn param() -> sys::ScriptModuleParam {
        sys::ScriptModuleParam {
            get_param_num: Some(param_num),
            get_param_int: Some(param_int),
            get_param_double: None,
            get_param_string: Some(param_string),
            get_param_data: None,
            get_param_table_int: None,
            get_param_table_double: None,
            get_param_table_string: None,
            get_param_array_num: None,
            get_param_array_int: None,
            get_param_array_double: None,
            get_param_array_string: None,
            push_result_int: Some(push_int),
            push_result_double: None,
            push_result_string: Some(push_string),
            push_result_data: None,
            push_result_table_int: None,
            push_result_table_double: None,
            push_result_table_string: None,
            push_result_array_int: Some(push_array_int),
            push_result_array_double: None,
            push_result_array_string: None,
            set_error: Some(set_error),
            get_param_boolean: None,
            push_result_boolean: None,
            get_param_table_boolean: None,
        }
    }

    fn pushes_then_fails(call: &mut ScriptCall<'_>) -> std::result::Result<(), ScriptError> {
        call.push_int(call.int(1));
        call.push_str(call.str(1).unwrap_or("none"))?;
        call.push_array_int(&[1, 2, 3]);
        Err(ScriptError::Message("boom".into()))
    }

    #[test]
    fn test_results_keep_push_order_and_error_comes_last() {
        PUSHED.with(|p| p.borrow_mut().clear());
        let mut raw = param();
        // SAFETY: `raw` outlives the call.
        unsafe { __invoke("pushes_then_fails", &mut raw, pushes_then_fails) };
        let pushed = PUSHED.with(|p| p.borrow().clone());
        assert_eq!(
            pushed,
            vec![
                Pushed::Int(10),
                Pushed::Str("hello".into()),
                Pushed::Ints(vec![1, 2, 3]),
                Pushed::Error("boom".into()),
            ]
        );
    }

    #[test]
    fn test_missing_host_functions_are_fail_soft() -> TestResult {
        let mut raw = param();
        // SAFETY: `raw` outlives the call.
        let call = unsafe { ScriptCall::from_raw(&mut raw) }.ok_or("null param")?;
        assert_eq!(call.len(), 2);
        assert!(call.double(0).abs() < f64::EPSILON);
        assert!(!call.boolean(0));
        assert!(call.str(0).is_none());
        assert_eq!(call.table_int(0, "x"), 0);
        assert_eq!(call.array_len(0), 0);
        assert!(matches!(call.require(3), Err(ScriptError::MissingArgument(2))));
        Ok(())
    }

    #[test]
    fn test_interior_nul_rejected() -> TestResult {
        let mut raw = param();
        // SAFETY: `raw` outlives the call.
        let mut call = unsafe { ScriptCall::from_raw(&mut raw) }.ok_or("null param")?;
        assert!(matches!(call.push_str("a\0b"), Err(Aviutl2Error::Nul(_))));
        Ok(())
    }

    unsafe extern "C" fn noop(_: *mut sys::ScriptModuleParam) {}

    #[test]
    fn test_module_table_is_null_terminated() {
        let table = ScriptModuleTable::new(
            "test module",
            vec![ScriptFunction::new("a", noop), ScriptFunction::new("b", noop)],
        );
        assert_eq!(table.len(), 2);
        // SAFETY: the table is alive.
        let functions = unsafe { (*table.as_raw()).functions };
        // SAFETY: three entries including the terminator.
        let entries = unsafe { std::slice::from_raw_parts(functions, 3) };
        assert!(entries.get(2).is_some_and(|e| e.name.is_null()));
        assert!(entries.iter().take(2).all(|e| !e.name.is_null() && e.func.is_some()));
    }
}
