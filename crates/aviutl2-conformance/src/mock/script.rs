//! Script call host: argument getters and an ordered result list.

use std::cell::RefCell;
use std::ffi::{CString, c_char, c_void};

use aviutl2::wide::read_c_str;
use aviutl2_sys as sys;
use serde::Serialize;

use super::{to_i32, to_usize};

/// Argument passed to a script function.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// `nil`.
    Nil,
    /// Integer.
    Int(i32),
    /// Number.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
    /// Opaque pointer, as an address.
    Data(usize),
    /// Table with string keys.
    Table(Vec<(String, ScriptValue)>),
    /// Array.
    Array(Vec<ScriptValue>),
}

impl ScriptValue {
    #[allow(clippy::cast_possible_truncation, reason = "scripts truncate numbers toward zero")]
    fn as_int(&self) -> i32 {
        match self {
            Self::Int(v) => *v,
            Self::Double(v) => *v as i32,
            _ => 0,
        }
    }

    fn as_double(&self) -> f64 {
        match self {
            Self::Int(v) => f64::from(*v),
            Self::Double(v) => *v,
            _ => 0.0,
        }
    }

    fn as_bool(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(v) => Some(v.to_string()),
            Self::Double(v) => Some(v.to_string()),
            _ => None,
        }
    }

    fn field(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Table(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn element(&self, index: i32) -> Option<&Self> {
        match self {
            Self::Array(values) => usize::try_from(index).ok().and_then(|i| values.get(i)),
            _ => None,
        }
    }
}

/// One result pushed by a script function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScriptResult {
    /// `push_result_int`.
    Int(i32),
    /// `push_result_double`.
    Double(f64),
    /// `push_result_boolean`.
    Bool(bool),
    /// `push_result_string`.
    Str(String),
    /// `push_result_data`, as an address.
    Data(usize),
    /// `push_result_table_int`.
    TableInt(Vec<(String, i32)>),
    /// `push_result_table_double`.
    TableDouble(Vec<(String, f64)>),
    /// `push_result_table_string`.
    TableStr(Vec<(String, String)>),
    /// `push_result_array_int`.
    ArrayInt(Vec<i32>),
    /// `push_result_array_double`.
    ArrayDouble(Vec<f64>),
    /// `push_result_array_string`.
    ArrayStr(Vec<String>),
}

/// Everything a script function returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptOutcome {
    /// Results in push order.
    pub results: Vec<ScriptResult>,
    /// Message passed to `set_error`, if any.
    pub error: Option<String>,
}

#[derive(Default)]
struct Frame {
    args: Vec<ScriptValue>,
    outcome: ScriptOutcome,
    scratch: Vec<CString>,
}

impl Frame {
    fn arg(&self, index: i32) -> Option<&ScriptValue> {
        usize::try_from(index).ok().and_then(|i| self.args.get(i))
    }

    fn keep(&mut self, text: Option<String>) -> *const c_char {
        match text.map(CString::new) {
            Some(Ok(text)) => {
                let ptr = text.as_ptr();
                self.scratch.push(text);
                ptr
            }
            _ => std::ptr::null(),
        }
    }
}

thread_local! {
    static FRAME: RefCell<Frame> = RefCell::new(Frame::default());
}

fn with_frame<R>(f: impl FnOnce(&mut Frame) -> R) -> R {
    FRAME.with(|frame| f(&mut frame.borrow_mut()))
}

fn push(result: ScriptResult) {
    with_frame(|frame| frame.outcome.results.push(result));
}

fn c_text(ptr: *const c_char) -> String {
    // SAFETY: the plugin passes NUL-terminated UTF-8 valid for the call.
    unsafe { read_c_str(ptr) }.map_or_else(String::new, |s| s.to_string_lossy().into_owned())
}

/// Copy `num` elements out of a plugin-owned array.
///
/// # Safety
///
/// `ptr` must be NULL or point to `num` readable elements.
unsafe fn elements<T: Copy>(ptr: *const T, num: i32) -> Vec<T> {
    if ptr.is_null() {
        return Vec::new();
    }
    // SAFETY: per the function contract.
    unsafe { std::slice::from_raw_parts(ptr, to_usize(num)) }.to_vec()
}

unsafe extern "C" fn get_param_num() -> i32 {
    with_frame(|frame| to_i32(frame.args.len()))
}

unsafe extern "C" fn get_param_int(index: i32) -> i32 {
    with_frame(|frame| frame.arg(index).map_or(0, ScriptValue::as_int))
}

unsafe extern "C" fn get_param_double(index: i32) -> f64 {
    with_frame(|frame| frame.arg(index).map_or(0.0, ScriptValue::as_double))
}

unsafe extern "C" fn get_param_boolean(index: i32) -> bool {
    with_frame(|frame| frame.arg(index).is_some_and(ScriptValue::as_bool))
}

unsafe extern "C" fn get_param_string(index: i32) -> *const c_char {
    with_frame(|frame| {
        let text = frame.arg(index).and_then(ScriptValue::as_text);
        frame.keep(text)
    })
}

unsafe extern "C" fn get_param_data(index: i32) -> *mut c_void {
    with_frame(|frame| match frame.arg(index) {
        Some(ScriptValue::Data(addr)) => std::ptr::without_provenance_mut(*addr),
        _ => std::ptr::null_mut(),
    })
}

unsafe extern "C" fn get_param_table_int(index: i32, key: *const c_char) -> i32 {
    let key = c_text(key);
    with_frame(|frame| frame.arg(index).and_then(|t| t.field(&key)).map_or(0, ScriptValue::as_int))
}

unsafe extern "C" fn get_param_table_double(index: i32, key: *const c_char) -> f64 {
    let key = c_text(key);
    with_frame(|frame| {
        frame
            .arg(index)
            .and_then(|t| t.field(&key))
            .map_or(0.0, ScriptValue::as_double)
    })
}

unsafe extern "C" fn get_param_table_boolean(index: i32, key: *const c_char) -> bool {
    let key = c_text(key);
    with_frame(|frame| frame.arg(index).and_then(|t| t.field(&key)).is_some_and(ScriptValue::as_bool))
}

unsafe extern "C" fn get_param_table_string(index: i32, key: *const c_char) -> *const c_char {
    let key = c_text(key);
    with_frame(|frame| {
        let text = frame.arg(index).and_then(|t| t.field(&key)).and_then(ScriptValue::as_text);
        frame.keep(text)
    })
}

unsafe extern "C" fn get_param_array_num(index: i32) -> i32 {
    with_frame(|frame| match frame.arg(index) {
        Some(ScriptValue::Array(values)) => to_i32(values.len()),
        _ => 0,
    })
}

unsafe extern "C" fn get_param_array_int(index: i32, key: i32) -> i32 {
    with_frame(|frame| frame.arg(index).and_then(|a| a.element(key)).map_or(0, ScriptValue::as_int))
}

unsafe extern "C" fn get_param_array_double(index: i32, key: i32) -> f64 {
    with_frame(|frame| {
        frame
            .arg(index)
            .and_then(|a| a.element(key))
            .map_or(0.0, ScriptValue::as_double)
    })
}

unsafe extern "C" fn get_param_array_string(index: i32, key: i32) -> *const c_char {
    with_frame(|frame| {
        let text = frame.arg(index).and_then(|a| a.element(key)).and_then(ScriptValue::as_text);
        frame.keep(text)
    })
}

unsafe extern "C" fn push_result_int(value: i32) {
    push(ScriptResult::Int(value));
}

unsafe extern "C" fn push_result_double(value: f64) {
    push(ScriptResult::Double(value));
}

unsafe extern "C" fn push_result_boolean(value: bool) {
    push(ScriptResult::Bool(value));
}

unsafe extern "C" fn push_result_string(value: *const c_char) {
    push(ScriptResult::Str(c_text(value)));
}

unsafe extern "C" fn push_result_data(value: *mut c_void) {
    push(ScriptResult::Data(value.addr()));
}

/// Keys of a pushed table.
///
/// # Safety
///
/// `keys` must be NULL or point to `num` string pointers.
unsafe fn table_keys(keys: *mut *const c_char, num: i32) -> Vec<String> {
    // SAFETY: per the function contract.
    let keys = unsafe { elements(keys.cast_const(), num) };
    keys.into_iter().map(c_text).collect()
}

unsafe extern "C" fn push_result_table_int(keys: *mut *const c_char, values: *mut i32, num: i32) {
    // SAFETY: the plugin passes `num` keys.
    let keys = unsafe { table_keys(keys, num) };
    // SAFETY: the plugin passes `num` values.
    let values = unsafe { elements(values.cast_const(), num) };
    push(ScriptResult::TableInt(keys.into_iter().zip(values).collect()));
}

unsafe extern "C" fn push_result_table_double(keys: *mut *const c_char, values: *mut f64, num: i32) {
    // SAFETY: the plugin passes `num` keys.
    let keys = unsafe { table_keys(keys, num) };
    // SAFETY: the plugin passes `num` values.
    let values = unsafe { elements(values.cast_const(), num) };
    push(ScriptResult::TableDouble(keys.into_iter().zip(values).collect()));
}

unsafe extern "C" fn push_result_table_string(
    keys: *mut *const c_char,
    values: *mut *const c_char,
    num: i32,
) {
    // SAFETY: the plugin passes `num` keys.
    let keys = unsafe { table_keys(keys, num) };
    // SAFETY: the plugin passes `num` values.
    let values = unsafe { table_keys(values, num) };
    push(ScriptResult::TableStr(keys.into_iter().zip(values).collect()));
}

unsafe extern "C" fn push_result_array_int(values: *mut i32, num: i32) {
    // SAFETY: the plugin passes `num` values.
    push(ScriptResult::ArrayInt(unsafe { elements(values.cast_const(), num) }));
}

unsafe extern "C" fn push_result_array_double(values: *mut f64, num: i32) {
    // SAFETY: the plugin passes `num` values.
    push(ScriptResult::ArrayDouble(unsafe { elements(values.cast_const(), num) }));
}

unsafe extern "C" fn push_result_array_string(values: *mut *const c_char, num: i32) {
    // SAFETY: the plugin passes `num` values.
    push(ScriptResult::ArrayStr(unsafe { table_keys(values, num) }));
}

unsafe extern "C" fn set_error(message: *const c_char) {
    let message = c_text(message);
    with_frame(|frame| frame.outcome.error = Some(message));
}

fn param_table() -> sys::ScriptModuleParam {
    sys::ScriptModuleParam {
        get_param_num: Some(get_param_num),
        get_param_int: Some(get_param_int),
        get_param_double: Some(get_param_double),
        get_param_string: Some(get_param_string),
        get_param_data: Some(get_param_data),
        get_param_table_int: Some(get_param_table_int),
        get_param_table_double: Some(get_param_table_double),
        get_param_table_string: Some(get_param_table_string),
        get_param_array_num: Some(get_param_array_num),
        get_param_array_int: Some(get_param_array_int),
        get_param_array_double: Some(get_param_array_double),
        get_param_array_string: Some(get_param_array_string),
        push_result_int: Some(push_result_int),
        push_result_double: Some(push_result_double),
        push_result_string: Some(push_result_string),
        push_result_data: Some(push_result_data),
        push_result_table_int: Some(push_result_table_int),
        push_result_table_double: Some(push_result_table_double),
        push_result_table_string: Some(push_result_table_string),
        push_result_array_int: Some(push_result_array_int),
        push_result_array_double: Some(push_result_array_double),
        push_result_array_string: Some(push_result_array_string),
        set_error: Some(set_error),
        get_param_boolean: Some(get_param_boolean),
        push_result_boolean: Some(push_result_boolean),
        get_param_table_boolean: Some(get_param_table_boolean),
    }
}

/// Call one script function with `args` on this thread.
pub fn call(func: unsafe extern "C" fn(*mut sys::ScriptModuleParam), args: Vec<ScriptValue>) -> ScriptOutcome {
    with_frame(|frame| {
        *frame = Frame {
            args,
            ..Frame::default()
        };
    });
    let mut param = param_table();
    // SAFETY: `param` outlives the call.
    unsafe { func(&raw mut param) };
    with_frame(|frame| std::mem::take(frame).outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aviutl2::ScriptCall;

    unsafe extern "C" fn echo(param: *mut sys::ScriptModuleParam) {
        // SAFETY: live parameter table.
        let Some(mut call) = (unsafe { ScriptCall::from_raw(param) }) else {
            return;
        };
        let count = call.array_len(1);
        let name = call.table_str(0, "name").unwrap_or_default().to_string();
        let flag = call.table_boolean(0, "flag");
        call.push_int(call.int(2));
        if call.push_str(&name).is_err() {
            call.set_error("push failed");
        }
        call.push_bool(flag);
        call.push_array_int(&[i32::try_from(count).unwrap_or(0)]);
        if call.push_table_str(&[("k", "v")]).is_err() {
            call.set_error("push failed");
        }
    }

    unsafe extern "C" fn fail(param: *mut sys::ScriptModuleParam) {
        // SAFETY: live parameter table.
        if let Some(mut call) = unsafe { ScriptCall::from_raw(param) } {
            call.set_error("bad input");
        }
    }

    #[test]
    fn test_getters_and_result_order() {
        let outcome = call(
            echo,
            vec![
                ScriptValue::Table(vec![
                    ("name".into(), ScriptValue::Str("clip".into())),
                    ("flag".into(), ScriptValue::Bool(true)),
                ]),
                ScriptValue::Array(vec![ScriptValue::Int(1), ScriptValue::Int(2)]),
                ScriptValue::Double(7.9),
            ],
        );
        assert_eq!(outcome.error, None);
        assert_eq!(
            outcome.results,
            vec![
                ScriptResult::Int(7),
                ScriptResult::Str("clip".into()),
                ScriptResult::Bool(true),
                ScriptResult::ArrayInt(vec![2]),
                ScriptResult::TableStr(vec![("k".into(), "v".into())]),
            ]
        );
    }

    #[test]
    fn test_missing_args_read_as_zero() {
        let outcome = call(echo, Vec::new());
        assert_eq!(outcome.results.first(), Some(&ScriptResult::Int(0)));
        assert_eq!(outcome.results.get(1), Some(&ScriptResult::Str(String::new())));
    }

    #[test]
    fn test_error_recorded() {
        let outcome = call(fail, vec![ScriptValue::Nil]);
        assert_eq!(outcome.error.as_deref(), Some("bad input"));
        assert!(outcome.results.is_empty());
    }
}
